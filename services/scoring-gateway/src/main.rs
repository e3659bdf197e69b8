use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use serving_core::{init_tracing, load_config, ModelRegistry};

use scoring_gateway::routes::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("scoring-gateway")?;
    let cfg = load_config("scoring-gateway")?;
    info!(?cfg, "config loaded");

    let registry = ModelRegistry::new();
    let loaded = registry.load_models(&cfg.model_dir, true)?;
    info!(loaded, model_dir = %cfg.model_dir.display(), "model registry initialized");

    let state = Arc::new(AppState { registry });
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!(addr = %cfg.bind_addr, "scoring gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown");
        })
        .await?;
    Ok(())
}
