use anyhow::{Context, Result};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use zip_expander::{
    config::{self, Backend, InvocationSettings},
    models::event::S3Event,
    routes,
    services::{
        expander::ArchiveExpander,
        object_client::ObjectClient,
        storage::{LocalStorage, ObjectStorage, S3Storage},
    },
    state::{AppState, SettingsSource},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let (cfg, event_file) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting zip-expander with config: {:?}", cfg);

    // --- Ensure staging root exists ---
    if !cfg.staging_root.exists() {
        fs::create_dir_all(&cfg.staging_root)?;
        tracing::info!("Created staging root at {}", cfg.staging_root.display());
    }

    // --- Storage client, built once and shared by every invocation ---
    let storage: Arc<dyn ObjectStorage> = match cfg.backend {
        Backend::S3 => Arc::new(S3Storage::from_env(cfg.endpoint_url.as_deref()).await),
        Backend::Local => {
            fs::create_dir_all(&cfg.local_store_dir)?;
            tracing::info!("Using local bucket store at {}", cfg.local_store_dir.display());
            Arc::new(LocalStorage::new(cfg.local_store_dir.clone()))
        }
    };
    let expander = ArchiveExpander::new(ObjectClient::new(storage), cfg.staging_root.clone());

    // --- One-shot mode ---
    if let Some(path) = event_file {
        return run_once(&expander, &path, cfg.process_all_records).await;
    }

    // --- Build router ---
    let state = AppState {
        expander,
        settings: SettingsSource::Environment {
            process_all_records: cfg.process_all_records,
        },
    };
    let app = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Listening for notifications on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Process a single notification file and exit.
async fn run_once(expander: &ArchiveExpander, path: &Path, process_all_records: bool) -> Result<()> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading event file {}", path.display()))?;
    let event: S3Event = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing event file {}", path.display()))?;

    let settings = InvocationSettings::from_env(process_all_records);
    let report = expander.handle(&event.records, &settings).await?;
    tracing::info!(?report, "invocation complete");

    Ok(())
}
