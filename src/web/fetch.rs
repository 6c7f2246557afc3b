use anyhow::{anyhow, bail, Context, Result};
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{ReadableStreamDefaultReader, Response};

use crate::source::{AssetSource, LoadProgress};

/// Fetches assets over HTTP relative to the page, streaming the body so
/// progress can be reported while it arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchSource;

impl AssetSource for FetchSource {
    async fn fetch(&self, path: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>> {
        let window = web_sys::window().context("window not available")?;
        let response: Response = JsFuture::from(window.fetch_with_str(path))
            .await
            .map_err(js_error)
            .with_context(|| format!("request for {path} failed"))?
            .dyn_into()
            .map_err(|_| anyhow!("fetch for {path} did not return a Response"))?;
        if !response.ok() {
            bail!(
                "{path}: HTTP {} {}",
                response.status(),
                response.status_text()
            );
        }

        let total = response
            .headers()
            .get("Content-Length")
            .ok()
            .flatten()
            .and_then(|length| length.trim().parse::<u64>().ok());

        let Some(body) = response.body() else {
            return Ok(Vec::new());
        };
        let reader: ReadableStreamDefaultReader = body
            .get_reader()
            .dyn_into()
            .map_err(|_| anyhow!("response body for {path} is not readable"))?;

        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        loop {
            let chunk = JsFuture::from(reader.read())
                .await
                .map_err(js_error)
                .with_context(|| format!("failed reading {path}"))?;
            let done = Reflect::get(&chunk, &JsValue::from_str("done"))
                .map_err(js_error)?
                .as_bool()
                .unwrap_or(true);
            if done {
                break;
            }
            let value = Reflect::get(&chunk, &JsValue::from_str("value")).map_err(js_error)?;
            bytes.extend(Uint8Array::new(&value).to_vec());
            progress(LoadProgress {
                loaded: bytes.len() as u64,
                total,
            });
        }
        Ok(bytes)
    }
}

fn js_error(value: JsValue) -> anyhow::Error {
    anyhow!("{value:?}")
}
