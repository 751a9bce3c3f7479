//! Binary entrypoint for the QC API server.
use qc_api::{run, AppState, TemplateCatalog};
use qc_runs::{MemorySnapshotSource, OrchestratorConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Default listen address can be overridden with QC_ADDR
    let addr = std::env::var("QC_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());

    let config = match std::env::var("QC_CONFIG") {
        Ok(path) => OrchestratorConfig::from_file(&path)?,
        Err(_) => OrchestratorConfig::default(),
    };
    config.validate()?;

    let snapshots = match std::env::var("QC_TEMPLATES") {
        Ok(path) => {
            let catalog = TemplateCatalog::from_file(&path)?;
            tracing::info!(templates = catalog.templates.len(), path = %path, "template catalogue loaded");
            catalog.into_source()
        }
        Err(_) => {
            tracing::warn!("QC_TEMPLATES not set; every run will fail with TEMPLATE_VERSION_NOT_FOUND");
            MemorySnapshotSource::new()
        }
    };

    let state = AppState::in_memory(config, snapshots)?;
    run(&addr, state).await?;
    Ok(())
}
