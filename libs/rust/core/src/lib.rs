//! Core shared library for the prediction serving services.
//!
//! Holds the model wrapper, the in-memory registry + prediction log, the
//! batched scoring dispatcher, and the ambient glue (tracing init, config
//! loading) the service binaries share.

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

pub mod dispatch;
pub mod error;
pub mod frame;
pub mod model;
pub mod registry;

pub use dispatch::{score, ScoreInput, ScoreRecord, ScoreRequest, CREATED_AT_FORMAT, RESERVED_FIELDS};
pub use error::ServingError;
pub use frame::{FeatureFrame, FeatureValue, Matrix};
pub use model::{
    LinearRegressor, MeanRegressor, PredictionModel, Predictor, Preprocessor, Regressor,
};
pub use registry::ModelRegistry;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Initializes the fmt subscriber with an env-filter. Safe to call more than
/// once; only the first call installs the subscriber.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
        Ok(())
    })?;
    info!(service, "tracing initialized");
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServingConfig {
    pub service_name: String,
    /// Address the gateway binds, e.g. "0.0.0.0:8000".
    pub bind_addr: String,
    /// Directory scanned for serialized model artifacts.
    pub model_dir: PathBuf,
    pub log_level: Option<String>,
}

/// Layered config: built-in defaults, then an optional YAML file named by
/// `SERVING_CONFIG_FILE`, then `SERVING__*` environment overrides.
pub fn load_config(service: &str) -> Result<ServingConfig> {
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("bind_addr", "0.0.0.0:8000")?
        .set_default("model_dir", "models")?;

    if let Ok(file) = std::env::var("SERVING_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix("SERVING").separator("__"));

    let cfg: ServingConfig = builder.build()?.try_deserialize()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_apply() {
        let cfg = load_config("test-service").unwrap();
        assert_eq!(cfg.service_name, "test-service");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.model_dir, PathBuf::from("models"));
    }
}
