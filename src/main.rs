#[cfg(not(target_arch = "wasm32"))]
use std::env;

#[cfg(not(target_arch = "wasm32"))]
use anyhow::{anyhow, Result};

#[cfg(not(target_arch = "wasm32"))]
use model_viewer::desktop::{run_headless, run_interactive, WindowInitError};
#[cfg(not(target_arch = "wasm32"))]
use model_viewer::ViewerConfig;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let config = match &options.models_dir {
        Some(dir) => ViewerConfig::with_base_path(dir.clone()),
        None => ViewerConfig::default(),
    };

    if options.summary_only {
        return run_headless(config);
    }
    match run_interactive(config.clone()) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(config)
        }
        Err(err) => Err(err),
    }
}

#[cfg(not(target_arch = "wasm32"))]
const USAGE: &str = "Usage: model-viewer [models-dir] [--summary-only]";

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, PartialEq)]
struct CliOptions {
    models_dir: Option<String>,
    summary_only: bool,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut models_dir = None;
        let mut summary_only = false;
        for arg in args {
            if arg == "--summary-only" {
                summary_only = true;
            } else if arg.starts_with("--") {
                return Err(anyhow!("Unknown argument: {arg}. {USAGE}"));
            } else if models_dir.is_some() {
                return Err(anyhow!("Unexpected argument: {arg}. {USAGE}"));
            } else {
                models_dir = Some(arg);
            }
        }
        Ok(Self {
            models_dir,
            summary_only,
        })
    }
}
