use std::sync::Arc;

use glam::Vec2;
use gloo_events::{EventListener, EventListenerOptions};
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use super::{InputEvent, InputQueue, MouseButton};

/// Translates DOM pointer and wheel events on the canvas into [`InputEvent`]s.
///
/// Listeners are removed when the handler is dropped.
pub struct WasmInputHandler {
    _listeners: Vec<EventListener>,
}

impl WasmInputHandler {
    pub fn attach(canvas: &HtmlCanvasElement, queue: Arc<InputQueue>) -> Self {
        let mut listeners = Vec::new();

        {
            let queue = Arc::clone(&queue);
            let target = canvas.clone();
            listeners.push(EventListener::new(canvas, "pointerdown", move |event| {
                let Some(event) = event.dyn_ref::<PointerEvent>() else {
                    return;
                };
                // Keep receiving moves while dragging outside the canvas.
                let _ = target.set_pointer_capture(event.pointer_id());
                queue.push(InputEvent::PointerDown {
                    button: button_of(event),
                    position: position_of(event),
                });
            }));
        }

        {
            let queue = Arc::clone(&queue);
            listeners.push(EventListener::new(canvas, "pointermove", move |event| {
                if let Some(event) = event.dyn_ref::<PointerEvent>() {
                    queue.push(InputEvent::PointerMove {
                        position: position_of(event),
                    });
                }
            }));
        }

        for kind in ["pointerup", "pointercancel"] {
            let queue = Arc::clone(&queue);
            listeners.push(EventListener::new(canvas, kind, move |event| {
                if let Some(event) = event.dyn_ref::<PointerEvent>() {
                    queue.push(InputEvent::PointerUp {
                        button: button_of(event),
                    });
                }
            }));
        }

        {
            let queue = Arc::clone(&queue);
            listeners.push(EventListener::new_with_options(
                canvas,
                "wheel",
                EventListenerOptions::enable_prevent_default(),
                move |event| {
                    let Some(event) = event.dyn_ref::<WheelEvent>() else {
                        return;
                    };
                    event.prevent_default();
                    queue.push(InputEvent::Wheel {
                        delta_y: event.delta_y() as f32,
                    });
                },
            ));
        }

        // Right drag pans; keep the browser menu out of the way.
        listeners.push(EventListener::new_with_options(
            canvas,
            "contextmenu",
            EventListenerOptions::enable_prevent_default(),
            |event| event.prevent_default(),
        ));

        Self {
            _listeners: listeners,
        }
    }
}

fn button_of(event: &MouseEvent) -> MouseButton {
    MouseButton::new(event.button().clamp(0, u8::MAX as i16) as u8)
}

fn position_of(event: &MouseEvent) -> Vec2 {
    Vec2::new(event.offset_x() as f32, event.offset_y() as f32)
}
