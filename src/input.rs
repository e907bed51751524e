//! Typed input events and their translation from winit.
//!
//! The session never looks at winit events. The window loop translates
//! them here and pushes the results into the session's event queue.

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// Cursor moved to `position` (physical pixels).
    PointerMoved { position: Vec2 },
    /// Relative motion reported while the pointer is captured.
    PointerDelta(Vec2),
    /// Primary button pressed. `on_embed` is set when the click landed on
    /// the embedded page projected in the desk scene.
    Click { position: Vec2, on_embed: bool },
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    /// The pointer entered or left the embedded page.
    EmbedHover(bool),
    Resized { width: u32, height: u32 },
}

impl InputEvent {
    /// Whether this event counts as the user being present.
    pub fn is_activity(&self) -> bool {
        !matches!(self, InputEvent::Resized { .. })
    }
}

/// Stateful translation from winit window events.
///
/// Keeps the last cursor position so clicks can carry it, and tracks
/// whether the cursor is over the embed region reported by the host.
#[derive(Debug, Default)]
pub struct InputTranslator {
    cursor: Vec2,
    over_embed: bool,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    /// Translate one window event. `embed_contains` reports whether a
    /// cursor position lies on the embedded page, if one is showing.
    pub fn translate(
        &mut self,
        event: &WindowEvent,
        embed_contains: impl Fn(Vec2) -> bool,
    ) -> Vec<InputEvent> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return Vec::new();
                };
                match event.state {
                    ElementState::Pressed => vec![InputEvent::KeyDown(key)],
                    ElementState::Released => vec![InputEvent::KeyUp(key)],
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => vec![InputEvent::Click {
                position: self.cursor,
                on_embed: embed_contains(self.cursor),
            }],
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                let mut events = vec![InputEvent::PointerMoved {
                    position: self.cursor,
                }];
                let over = embed_contains(self.cursor);
                if over != self.over_embed {
                    self.over_embed = over;
                    events.push(InputEvent::EmbedHover(over));
                }
                events
            }
            WindowEvent::CursorLeft { .. } if self.over_embed => {
                self.over_embed = false;
                vec![InputEvent::EmbedHover(false)]
            }
            WindowEvent::Resized(size) => vec![InputEvent::Resized {
                width: size.width,
                height: size.height,
            }],
            _ => Vec::new(),
        }
    }

    /// Translate raw mouse motion from a device event.
    pub fn motion(&self, delta: (f64, f64)) -> InputEvent {
        InputEvent::PointerDelta(Vec2::new(delta.0 as f32, delta.1 as f32))
    }
}
