mod engine;
mod loader;
mod tool;

use crate::tool::app_config::AppConfig;
use crate::tool::window_runner::WindowRunner;
use anyhow::Result;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // Set up tracing
    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if cfg!(debug_assertions) { "trace" } else { "info" }))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    info!("Starting celshade");

    let config = AppConfig::load()?;
    WindowRunner::run(config)
}
