pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod simulate; // UI-development stand-in behind the Validator seam
pub mod templates;

#[cfg(test)]
mod test_support;

use tracing_subscriber::EnvFilter;

pub use batch::{BatchDocument, BatchItem, BatchValidator};
pub use config::EngineConfig;
pub use engine::{CancelToken, Engine, ValidationRequest, Validator};
pub use error::{ConfigError, EngineError};
pub use models::{DeclaredFormat, Status, TemplateKey, ValidationReport};
pub use simulate::SimulatedEngine;
pub use templates::TemplateResolver;

/// Install the global tracing subscriber. The filter comes from
/// `CERTIMORPH_LOG`, then `RUST_LOG`, then the built-in default. Logs go to
/// stderr so JSON on stdout stays clean. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(config::LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("{} v{} tracing initialised", config::APP_NAME, config::APP_VERSION);
}
