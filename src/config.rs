//! Session constants.
//!
//! There is no configuration file. Every duration, speed and threshold the
//! experience uses lives here with its default, and the binary overrides a
//! handful of them from the command line.

use std::path::PathBuf;

use glam::{Vec2, Vec3};

use crate::navigation::LateralMapping;

/// Everything a [`Session`](crate::Session) needs to know up front.
///
/// # Example
///
/// ```ignore
/// let config = SessionConfig::default()
///     .asset_root("assets")
///     .idle_timeout(120.0)
///     .lateral_mapping(LateralMapping::Swapped);
/// ```
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Seconds without input before the session reloads.
    pub idle_timeout: f32,
    pub transition: TransitionTimings,
    pub overlays: OverlayTimings,
    pub payment: PaymentTimings,
    pub navigation: NavigationConfig,
    pub desk: DeskConfig,
    pub world: WorldConfig,
    pub assets: AssetPaths,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle_timeout(mut self, seconds: f32) -> Self {
        self.idle_timeout = seconds;
        self
    }

    pub fn minimum_loading(mut self, seconds: f32) -> Self {
        self.transition.minimum_loading = seconds;
        self
    }

    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets.root = root.into();
        self
    }

    pub fn lateral_mapping(mut self, mapping: LateralMapping) -> Self {
        self.navigation.lateral = mapping;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: 5.0 * 60.0,
            transition: TransitionTimings::default(),
            overlays: OverlayTimings::default(),
            payment: PaymentTimings::default(),
            navigation: NavigationConfig::default(),
            desk: DeskConfig::default(),
            world: WorldConfig::default(),
            assets: AssetPaths::default(),
        }
    }
}

/// Timings of the desk-to-world sequence.
#[derive(Clone, Debug)]
pub struct TransitionTimings {
    pub approach_duration: f32,
    pub approach_target: Vec3,
    /// Length of the glitch that starts when the approach finishes.
    pub disruption_duration: f32,
    /// Delay from the trigger message to the eyelids starting to close.
    pub eyes_close_delay: f32,
    pub eyelid_transition: f32,
    /// Extra slack on top of `eyelid_transition` before the fallback fires.
    pub eyelid_fallback_margin: f32,
    pub minimum_loading: f32,
    /// Glitch length for a `paymentConfirmed` message.
    pub payment_glitch: f32,
}

impl Default for TransitionTimings {
    fn default() -> Self {
        Self {
            approach_duration: 3.5,
            approach_target: Vec3::new(0.0, 0.0, 3.3),
            disruption_duration: 3.0,
            eyes_close_delay: 3.0,
            eyelid_transition: 1.5,
            eyelid_fallback_margin: 0.1,
            minimum_loading: 5.0,
            payment_glitch: 0.15,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OverlayTimings {
    /// Delay between the world becoming ready and the first ad.
    pub ad_first_delay: f32,
    pub ad_respawn_delay: f32,
    pub ad_max_appearances: u32,
    pub apparel_ad_delay: f32,
    pub barrage_count: usize,
    pub barrage_lifetime: f32,
    pub barrage_popup_size: Vec2,
    /// Reload delay used when the completion overlay cannot be shown.
    pub completion_fallback_delay: f32,
}

impl Default for OverlayTimings {
    fn default() -> Self {
        Self {
            ad_first_delay: 5.0,
            ad_respawn_delay: 5.0,
            ad_max_appearances: 2,
            apparel_ad_delay: 3.0,
            barrage_count: 15,
            barrage_lifetime: 3.0,
            barrage_popup_size: Vec2::new(280.0, 180.0),
            completion_fallback_delay: 1.0,
        }
    }
}

/// What happens inside the world once payment is confirmed.
#[derive(Clone, Debug)]
pub struct PaymentTimings {
    pub brighten_duration: f32,
    pub descent_duration: f32,
    pub descent_target_y: f32,
    pub barrage_delay: f32,
    pub emissive_color: Vec3,
    pub emissive_intensity: f32,
}

impl Default for PaymentTimings {
    fn default() -> Self {
        Self {
            brighten_duration: 4.0,
            descent_duration: 2.0,
            descent_target_y: -1500.0,
            barrage_delay: 10.0,
            emissive_color: Vec3::new(215.0, 255.0, 194.0) / 255.0,
            emissive_intensity: 0.45,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NavigationConfig {
    pub speed: f32,
    pub sensitivity: f32,
    /// Allowed polar angle, measured from straight up, in radians.
    pub min_polar: f32,
    pub max_polar: f32,
    pub lateral: LateralMapping,
    /// Delay before the capture hint appears in the world.
    pub indicator_delay: f32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            sensitivity: 0.002,
            min_polar: 0.01,
            max_polar: std::f32::consts::PI - 0.01,
            lateral: LateralMapping::default(),
            indicator_delay: 8.0,
        }
    }
}

/// Desk camera and overhead light.
#[derive(Clone, Debug)]
pub struct DeskConfig {
    pub camera_start: Vec3,
    pub fov: f32,
    pub zoom_fov: f32,
    pub zoom_z: f32,
    pub zoom_y: f32,
    /// Downward tilt while zoomed, radians.
    pub zoom_tilt: f32,
    pub zoom_speed: f32,
    pub rotation_smoothing: f32,
    pub fov_smoothing: f32,
    pub rotation_range: f32,
    pub background: Vec3,
    pub light_intensity: f32,
    pub flicker: FlickerConfig,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            camera_start: Vec3::new(0.0, 0.0, 14.0),
            fov: 35.0,
            zoom_fov: 25.0,
            zoom_z: 3.5,
            zoom_y: 0.17,
            zoom_tilt: (-2.0f32).to_radians(),
            zoom_speed: 0.049,
            rotation_smoothing: 0.07,
            fov_smoothing: 0.05,
            rotation_range: 0.04,
            background: Vec3::splat(240.0 / 255.0),
            light_intensity: 0.05,
            flicker: FlickerConfig::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FlickerConfig {
    pub min_interval: f32,
    pub max_interval: f32,
    pub probability: f64,
    pub duration: f32,
    pub min_factor: f32,
    pub max_factor: f32,
}

impl Default for FlickerConfig {
    fn default() -> Self {
        Self {
            min_interval: 20.0,
            max_interval: 45.0,
            probability: 0.05,
            duration: 4.0,
            min_factor: 0.1,
            max_factor: 1.1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorldConfig {
    pub camera_start: Vec3,
    pub fov: f32,
    pub far: f32,
    pub background: Vec3,
    /// Background used when the cubemap fails to load.
    pub fallback_background: Vec3,
    pub hemisphere_intensity: f32,
    pub directional_intensity: f32,
    pub shadow_map_size: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            camera_start: Vec3::new(0.0, 1.6, 10.0),
            fov: 60.0,
            far: 20_000.0,
            background: Vec3::ZERO,
            fallback_background: Vec3::splat(0x11 as f32 / 255.0),
            hemisphere_intensity: 0.8,
            directional_intensity: 1.5,
            shadow_map_size: 2048,
        }
    }
}

/// Where the models and the cubemap live, relative to `root`.
#[derive(Clone, Debug)]
pub struct AssetPaths {
    pub root: PathBuf,
    pub screen: String,
    pub room: String,
    pub approach_model: String,
    pub world: String,
    pub inside: String,
    pub cubemap_dir: String,
    /// Face order: +x, -x, +y, -y, +z, -z.
    pub cubemap_faces: [String; 6],
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            screen: "screenwarp.stl".into(),
            room: "room.stl".into(),
            approach_model: "faceplug.stl".into(),
            world: "world.stl".into(),
            inside: "biginside.stl".into(),
            cubemap_dir: "envmap".into(),
            cubemap_faces: ["px", "nx", "py", "ny", "pz", "nz"].map(|f| format!("{f}.png")),
        }
    }
}
