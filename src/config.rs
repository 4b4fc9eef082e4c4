use crate::services::expander::BatchMode;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf};

/// Which object storage the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Amazon S3 or an S3-compatible endpoint, ambient credentials.
    S3,
    /// Directory-per-bucket store on the local filesystem.
    Local,
}

/// Centralized process configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub staging_root: PathBuf,
    pub backend: Backend,
    pub local_store_dir: PathBuf,
    pub endpoint_url: Option<String>,
    /// Forces [`BatchMode::All`] regardless of the per-invocation environment.
    pub process_all_records: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Expands ZIP archives dropped into object storage")]
pub struct Args {
    /// Host to bind to (overrides EXPANDER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides EXPANDER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root for per-invocation staging directories (overrides EXPANDER_STAGING_ROOT)
    #[arg(long)]
    pub staging_root: Option<PathBuf>,

    /// Storage backend (overrides EXPANDER_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Bucket directory for the local backend (overrides EXPANDER_LOCAL_STORE_DIR)
    #[arg(long)]
    pub local_store_dir: Option<PathBuf>,

    /// Custom S3 endpoint, e.g. MinIO (overrides EXPANDER_S3_ENDPOINT)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Expand every archive in a batch instead of stopping after the first
    #[arg(long)]
    pub process_all_records: bool,

    /// Process a single S3 event notification JSON file and exit
    #[arg(long)]
    pub event_file: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the
    /// optional one-shot event file.
    pub fn from_env_and_args() -> Result<(Self, Option<PathBuf>)> {
        let args = Args::parse();
        let event_file = args.event_file.clone();
        let cfg = Self::from_parts(args, |name| env::var(name).ok())?;
        Ok((cfg, event_file))
    }

    /// Merge parsed arguments over values read through `lookup`.
    pub fn from_parts<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Environment fallback ---
        let env_host = lookup("EXPANDER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match lookup("EXPANDER_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing EXPANDER_PORT value `{}`", value))?,
            None => 3000,
        };
        let env_staging = lookup("EXPANDER_STAGING_ROOT").unwrap_or_else(|| "/tmp".into());
        let env_backend = match lookup("EXPANDER_BACKEND") {
            Some(value) => <Backend as ValueEnum>::from_str(&value, true)
                .map_err(|err| anyhow!("parsing EXPANDER_BACKEND value `{}`: {}", value, err))?,
            None => Backend::S3,
        };
        let env_store =
            lookup("EXPANDER_LOCAL_STORE_DIR").unwrap_or_else(|| "./data/buckets".into());
        let env_endpoint = lookup("EXPANDER_S3_ENDPOINT").filter(|v| !v.is_empty());

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            staging_root: args.staging_root.unwrap_or_else(|| env_staging.into()),
            backend: args.backend.unwrap_or(env_backend),
            local_store_dir: args.local_store_dir.unwrap_or_else(|| env_store.into()),
            endpoint_url: args.endpoint_url.or(env_endpoint),
            process_all_records: args.process_all_records,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings read from the environment at the start of every invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationSettings {
    /// `DST_BUCKET`; empty when unset, which fails at upload time.
    pub destination_bucket: String,
    /// `DELETE_SOURCE == "1"`.
    pub delete_source: bool,
    /// `EXPANDER_PROCESS_ALL_RECORDS == "1"` selects [`BatchMode::All`].
    pub batch_mode: BatchMode,
}

impl InvocationSettings {
    pub fn from_env(process_all_records: bool) -> Self {
        Self::from_lookup(|name| env::var(name).ok(), process_all_records)
    }

    pub fn from_lookup<F>(lookup: F, process_all_records: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let all = process_all_records || flag_enabled(lookup("EXPANDER_PROCESS_ALL_RECORDS"));
        Self {
            destination_bucket: lookup("DST_BUCKET").unwrap_or_default(),
            delete_source: flag_enabled(lookup("DELETE_SOURCE")),
            batch_mode: if all {
                BatchMode::All
            } else {
                BatchMode::FirstArchive
            },
        }
    }
}

/// Only the literal string `"1"` turns a flag on.
fn flag_enabled(value: Option<String>) -> bool {
    value.as_deref() == Some("1")
}
