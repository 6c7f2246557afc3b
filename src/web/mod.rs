//! Browser entry point.
//!
//! `start(container_id, status_id)` appends a canvas to the container, builds
//! the viewer, follows window resizes, drives frames with
//! `requestAnimationFrame` and runs the asset loader as a local task.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use gloo_events::EventListener;
use log::{debug, error, info};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlCanvasElement, HtmlElement};

use crate::app::Viewer;
use crate::config::ViewerConfig;
use crate::input::wasm::WasmInputHandler;
use crate::loader::AssetLoader;
use crate::render::Renderer;

mod fetch;
mod status;

pub use fetch::FetchSource;
pub use status::DomStatus;

type WebViewer = Viewer<Renderer>;

#[wasm_bindgen(start)]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Starts a viewer inside the element `container_id`, reporting progress in
/// the element `status_id` when the page has one.
#[wasm_bindgen]
pub fn start(container_id: &str, status_id: &str) -> Result<(), JsValue> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| JsValue::from_str("document not available"))?;
    let container: HtmlElement = document
        .get_element_by_id(container_id)
        .ok_or_else(|| JsValue::from_str("container element not found"))?
        .dyn_into()
        .map_err(|_| JsValue::from_str("container is not an HTML element"))?;
    let status = document
        .get_element_by_id(status_id)
        .and_then(|element| element.dyn_into::<HtmlElement>().ok())
        .map(DomStatus::new);

    let canvas: HtmlCanvasElement = document
        .create_element("canvas")?
        .dyn_into()
        .map_err(|_| JsValue::from_str("failed to create canvas"))?;
    let style = canvas.style();
    style.set_property("display", "block")?;
    style.set_property("width", "100%")?;
    style.set_property("height", "100%")?;
    container.append_child(&canvas)?;

    spawn_local(async move {
        if let Err(err) = run(container, canvas, status).await {
            error!("viewer failed to start: {err:?}");
        }
    });
    Ok(())
}

async fn run(
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    status: Option<DomStatus>,
) -> Result<()> {
    let window = web_sys::window().context("window not available")?;
    let pixel_ratio = window.device_pixel_ratio();
    let (width, height) = container_size(&container);

    let renderer = Renderer::new(
        wgpu::SurfaceTarget::Canvas(canvas.clone()),
        width,
        height,
        pixel_ratio,
    )
    .await?;
    let viewer = Rc::new(RefCell::new(Viewer::new(width, height, pixel_ratio, renderer)));
    size_canvas(&canvas, &viewer.borrow());
    info!("viewer started at {width}x{height} (pixel ratio {pixel_ratio})");

    let input_handler = WasmInputHandler::attach(&canvas, viewer.borrow().input());

    {
        let viewer = Rc::clone(&viewer);
        let canvas = canvas.clone();
        // Lives as long as the page.
        EventListener::new(&window, "resize", move |_| {
            let (width, height) = container_size(&container);
            let mut viewer = viewer.borrow_mut();
            viewer.resize(width, height);
            size_canvas(&canvas, &viewer);
        })
        .forget();
    }

    let target = Rc::clone(&viewer);
    spawn_local(async move {
        let mut loader = AssetLoader::new(FetchSource, ViewerConfig::default());
        let loaded = loader
            .load_into(&status, |model| target.borrow_mut().insert_model(model))
            .await;
        if let Err(err) = loaded {
            debug!("loader stopped after {} failure", err.stage());
        }
    });

    schedule_animation_loop(Rc::new(FrameLoop {
        viewer,
        _input: input_handler,
    }))
}

struct FrameLoop {
    viewer: Rc<RefCell<WebViewer>>,
    _input: WasmInputHandler,
}

fn schedule_animation_loop(state: Rc<FrameLoop>) -> Result<()> {
    let callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let next = Rc::clone(&callback);

    *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        if let Err(err) = state.viewer.borrow_mut().frame() {
            error!("frame failed: {err:?}");
        }
        if let Some(closure) = next.borrow().as_ref() {
            if let Err(err) = request_animation_frame(closure) {
                error!("{err:?}");
            }
        }
    }) as Box<dyn FnMut()>));

    if let Some(closure) = callback.borrow().as_ref() {
        request_animation_frame(closure)?;
    }
    Ok(())
}

fn request_animation_frame(closure: &Closure<dyn FnMut()>) -> Result<()> {
    web_sys::window()
        .context("window not available")?
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;
    Ok(())
}

fn container_size(container: &HtmlElement) -> (u32, u32) {
    (
        container.client_width().max(0) as u32,
        container.client_height().max(0) as u32,
    )
}

fn size_canvas(canvas: &HtmlCanvasElement, viewer: &WebViewer) {
    let (width, height) = viewer.viewport().drawing_buffer_size();
    canvas.set_width(width);
    canvas.set_height(height);
}
