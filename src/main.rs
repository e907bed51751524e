use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use faceplug::{AppConfig, LateralMapping, SessionConfig};

/// Desk, approach, eyelids, world. Embedded-page messages are read from
/// stdin as JSON lines, e.g. {"type":"startTransitionGlitch"}.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding the models and the cubemap
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Seed for popup placement and light flicker
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Seconds without input before the session reloads
    #[arg(long, default_value_t = 300.0)]
    idle_timeout: f32,

    /// Minimum time the loader stays up, in seconds
    #[arg(long, default_value_t = 5.0)]
    minimum_loading: f32,

    /// Swap the A/D strafe directions
    #[arg(long)]
    swapped_lateral: bool,

    /// Ignore stdin instead of reading messages from it
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let lateral = if args.swapped_lateral {
        LateralMapping::Swapped
    } else {
        LateralMapping::Conventional
    };
    let session = SessionConfig::new()
        .asset_root(&args.assets)
        .idle_timeout(args.idle_timeout)
        .minimum_loading(args.minimum_loading)
        .lateral_mapping(lateral);

    let config = AppConfig::new()
        .size(args.width, args.height)
        .seed(args.seed)
        .stdin_messages(!args.no_stdin)
        .session(session);

    faceplug::run(config)
        .with_context(|| format!("running with assets from {}", args.assets.display()))
}
