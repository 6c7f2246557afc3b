//! Desktop host: a winit window stands in for the page container and its
//! title bar for the status element.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use glam::Vec2;
use log::{debug, info};
use parking_lot::Mutex;
use pollster::block_on;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{
    ElementState, Event, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent,
};
use winit::event_loop::{EventLoop, EventLoopWindowTarget};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::{Window, WindowBuilder};

use crate::app::{print_model_summary, Viewer};
use crate::config::ViewerConfig;
use crate::input::{InputEvent, InputQueue, MouseButton};
use crate::loader::{AssetLoader, LOADING_MESSAGE};
use crate::model::Model;
use crate::render::Renderer;
use crate::scene::Scene;
use crate::source::FsSource;
use crate::status::{ConsoleStatus, StatusLine};

pub const WINDOW_TITLE: &str = "Model Viewer";

/// Wheel lines are converted to DOM-like pixel deltas.
const PIXELS_PER_LINE: f32 = 100.0;

/// Loads the model without opening a window and prints what would be shown.
pub fn run_headless(config: ViewerConfig) -> Result<()> {
    let status = ConsoleStatus::default();
    let mut scene = Scene::new();
    let mut loader = AssetLoader::new(FsSource, config);
    block_on(loader.load_into(&status, |model| {
        if let Err(model) = scene.insert_model(model) {
            debug!("dropping extra model {}", model.name);
        }
    }))?;

    if let Some(model) = scene.model() {
        print_model_summary(model);
    }
    Ok(())
}

/// Opens the viewer window and runs until it is closed.
///
/// Fails with [`WindowInitError`] when no display is available, so callers can
/// fall back to [`run_headless`].
pub fn run_interactive(config: ViewerConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let window = Arc::new(
        WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let scale_factor = window.scale_factor();
    let size = logical_size(window.inner_size(), scale_factor);
    let renderer = block_on(Renderer::new(
        Arc::clone(&window),
        size.width,
        size.height,
        scale_factor,
    ))?;
    let viewer = Viewer::new(size.width, size.height, scale_factor, renderer);

    let status = Arc::new(StatusLine::new(LOADING_MESSAGE));
    let mailbox: Arc<Mutex<Option<Model>>> = Arc::new(Mutex::new(None));
    spawn_loader(config, Arc::clone(&status), Arc::clone(&mailbox), Arc::clone(&window))?;

    let mut app = DesktopApp {
        input: viewer.input(),
        viewer,
        window,
        status,
        mailbox,
        title: String::new(),
        cursor: Vec2::ZERO,
        last_error: None,
    };
    app.sync_title();

    event_loop
        .run_on_demand(|event, target| {
            if let Err(err) = app.process_event(event, target) {
                app.last_error = Some(err);
                target.exit();
            }
        })
        .context("event loop failed")?;

    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Runs the asset loader on its own thread; the finished model is left in
/// `mailbox` for the UI thread.
fn spawn_loader(
    config: ViewerConfig,
    status: Arc<StatusLine>,
    mailbox: Arc<Mutex<Option<Model>>>,
    window: Arc<Window>,
) -> Result<()> {
    thread::Builder::new()
        .name("asset-loader".into())
        .spawn(move || {
            let mut loader = AssetLoader::new(FsSource, config);
            let result = block_on(loader.load_into(&status, |model| {
                *mailbox.lock() = Some(model);
            }));
            if let Err(err) = result {
                debug!("loader stopped after {} failure", err.stage());
            }
            window.request_redraw();
        })
        .context("failed to spawn loader thread")?;
    Ok(())
}

struct DesktopApp {
    viewer: Viewer<Renderer>,
    input: Arc<InputQueue>,
    window: Arc<Window>,
    status: Arc<StatusLine>,
    mailbox: Arc<Mutex<Option<Model>>>,
    title: String,
    cursor: Vec2,
    last_error: Option<anyhow::Error>,
}

impl DesktopApp {
    fn process_event(
        &mut self,
        event: Event<()>,
        target: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if window_id == self.window.id() => {
                match event {
                    WindowEvent::CloseRequested => target.exit(),
                    WindowEvent::Resized(size) => {
                        let size = logical_size(size, self.window.scale_factor());
                        self.viewer.resize(size.width, size.height);
                    }
                    WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                        self.viewer.set_pixel_ratio(scale_factor);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        self.cursor = logical_position(position, self.window.scale_factor());
                        self.input.push(InputEvent::PointerMove {
                            position: self.cursor,
                        });
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        let button = map_mouse_button(button);
                        self.input.push(match state {
                            ElementState::Pressed => InputEvent::PointerDown {
                                button,
                                position: self.cursor,
                            },
                            ElementState::Released => InputEvent::PointerUp { button },
                        });
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        // winit reports wheel-up as positive, the DOM as negative.
                        let delta_y = match delta {
                            MouseScrollDelta::LineDelta(_, y) => -y * PIXELS_PER_LINE,
                            MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                        };
                        self.input.push(InputEvent::Wheel { delta_y });
                    }
                    WindowEvent::RedrawRequested => self.redraw()?,
                    _ => {}
                }
            }
            Event::AboutToWait => self.window.request_redraw(),
            _ => {}
        }
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        if let Some(model) = self.mailbox.lock().take() {
            info!("displaying {}", model.name);
            self.viewer.insert_model(model);
        }
        self.sync_title();
        self.viewer.frame()
    }

    /// Mirrors the status line into the window title.
    fn sync_title(&mut self) {
        let status = self.status.snapshot();
        let title = if status.visible {
            format!("{WINDOW_TITLE} - {}", status.text)
        } else {
            WINDOW_TITLE.to_string()
        };
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }
}

fn logical_size(size: PhysicalSize<u32>, scale_factor: f64) -> LogicalSize<u32> {
    size.to_logical(scale_factor)
}

fn logical_position(position: PhysicalPosition<f64>, scale_factor: f64) -> Vec2 {
    let position = position.to_logical::<f64>(scale_factor);
    Vec2::new(position.x as f32, position.y as f32)
}

fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    let index = match button {
        WinitMouseButton::Left => 0,
        WinitMouseButton::Middle => 1,
        WinitMouseButton::Right => 2,
        WinitMouseButton::Back => 3,
        WinitMouseButton::Forward => 4,
        WinitMouseButton::Other(value) => value.min(u8::MAX as u16) as u8,
    };
    MouseButton::new(index)
}

/// No window could be opened, typically because there is no display.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_buttons_follow_dom_numbering() {
        assert_eq!(map_mouse_button(WinitMouseButton::Left), MouseButton::LEFT);
        assert_eq!(map_mouse_button(WinitMouseButton::Middle), MouseButton::MIDDLE);
        assert_eq!(map_mouse_button(WinitMouseButton::Right), MouseButton::RIGHT);
        assert_eq!(map_mouse_button(WinitMouseButton::Other(900)).index(), u8::MAX);
    }

    #[test]
    fn sizes_are_converted_to_logical_pixels() {
        let size = logical_size(PhysicalSize::new(2560, 1440), 2.0);
        assert_eq!((size.width, size.height), (1280, 720));
        let cursor = logical_position(PhysicalPosition::new(300.0, 150.0), 1.5);
        assert_eq!(cursor, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(Box::new("no display")), "no display");
        assert_eq!(panic_message(Box::new(String::from("boom"))), "boom");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }
}
