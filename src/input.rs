use glam::Vec2;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
pub mod wasm;

/// Identifier for a mouse button (left button is zero), DOM numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const MIDDLE: Self = Self(1);
    pub const RIGHT: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Pointer input relevant to the orbit controller.
///
/// Positions are in logical pixels relative to the viewport's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown { button: MouseButton, position: Vec2 },
    PointerMove { position: Vec2 },
    PointerUp { button: MouseButton },
    /// Positive values scroll away from the user (zoom out).
    Wheel { delta_y: f32 },
}

/// Events gathered by the host between frames, drained by the render loop.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: Mutex<Vec<InputEvent>>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: InputEvent) {
        self.events.lock().push(event);
    }

    /// Takes every queued event in arrival order.
    pub fn drain(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_events_in_order() {
        let queue = InputQueue::new();
        queue.push(InputEvent::PointerDown {
            button: MouseButton::LEFT,
            position: Vec2::new(1.0, 2.0),
        });
        queue.push(InputEvent::Wheel { delta_y: -3.0 });
        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], InputEvent::Wheel { delta_y } if delta_y == -3.0));
        assert!(queue.is_empty());
    }

    #[test]
    fn buttons_use_dom_numbering() {
        assert_eq!(MouseButton::new(0), MouseButton::LEFT);
        assert_eq!(MouseButton::MIDDLE.index(), 1);
        assert_eq!(MouseButton::RIGHT.index(), 2);
    }
}
