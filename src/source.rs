use std::collections::HashMap;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

/// Bytes received so far for one asset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    /// Expected size, when the source knows it.
    pub total: Option<u64>,
}

impl LoadProgress {
    /// Rounded percentage, or `None` when the total is unknown or zero.
    pub fn percent(&self) -> Option<u64> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.loaded as f64 / total as f64 * 100.0).round() as u64)
            }
            _ => None,
        }
    }
}

/// Somewhere the viewer can fetch asset files from.
///
/// `progress` is called zero or more times while bytes arrive.
#[allow(async_fn_in_trait)]
pub trait AssetSource {
    async fn fetch(&self, path: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>>;
}

impl<T: AssetSource> AssetSource for &T {
    async fn fetch(&self, path: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>> {
        (**self).fetch(path, progress).await
    }
}

/// Reads assets from the local filesystem in fixed-size chunks.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

#[cfg(not(target_arch = "wasm32"))]
impl FsSource {
    const CHUNK_SIZE: usize = 64 * 1024;
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetSource for FsSource {
    async fn fetch(&self, path: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>> {
        use std::io::Read;

        use anyhow::Context;

        let mut file =
            std::fs::File::open(path).with_context(|| format!("unable to open {path}"))?;
        let total = file.metadata().ok().map(|meta| meta.len());
        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; Self::CHUNK_SIZE];
        loop {
            let read = file
                .read(&mut chunk)
                .with_context(|| format!("failed reading {path}"))?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..read]);
            progress(LoadProgress {
                loaded: bytes.len() as u64,
                total,
            });
        }
        Ok(bytes)
    }
}

/// In-memory asset table, handy for embedding assets and for tests.
///
/// Every requested path is recorded, including failed lookups.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), bytes.into());
        self
    }

    /// Paths requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl AssetSource for MemorySource {
    async fn fetch(&self, path: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>> {
        self.requests.lock().push(path.to_string());
        let bytes = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("{path} not found"))?;
        let total = bytes.len() as u64;
        let half = total / 2;
        progress(LoadProgress {
            loaded: half,
            total: Some(total),
        });
        progress(LoadProgress {
            loaded: total,
            total: Some(total),
        });
        Ok(bytes)
    }
}
