use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub pipeline: PipelineConfig,
}

/// Blob-store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root of the primary store (reference tables, snapshots, exports).
    #[serde(default = "default_primary_root")]
    pub primary_root: PathBuf,

    /// Root of the mirror store (exports only).
    #[serde(default = "default_mirror_root")]
    pub mirror_root: PathBuf,

    #[serde(default = "default_postal_key")]
    pub postal_key: String,

    #[serde(default = "default_forex_key")]
    pub forex_key: String,

    #[serde(default = "default_exports_prefix")]
    pub exports_prefix: String,
}

/// Exchange-rate provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Prefix under which per-crawl snapshot CSVs are stored.
    #[serde(default = "default_snapshots_prefix")]
    pub snapshots_prefix: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_primary_root() -> PathBuf {
    PathBuf::from("data/primary")
}
fn default_mirror_root() -> PathBuf {
    PathBuf::from("data/mirror")
}
fn default_postal_key() -> String {
    "jp_postal_code_to_geo_info.csv".to_string()
}
fn default_forex_key() -> String {
    "forexrec.csv".to_string()
}
fn default_exports_prefix() -> String {
    "exports".to_string()
}
fn default_provider_url() -> String {
    "https://api.exchangerate.host".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_snapshots_prefix() -> String {
    "snapshots".to_string()
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("JPSTARTUP").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                primary_root: default_primary_root(),
                mirror_root: default_mirror_root(),
                postal_key: default_postal_key(),
                forex_key: default_forex_key(),
                exports_prefix: default_exports_prefix(),
            },
            provider: ProviderConfig {
                base_url: default_provider_url(),
                timeout_secs: default_timeout_secs(),
            },
            pipeline: PipelineConfig {
                snapshots_prefix: default_snapshots_prefix(),
            },
        }
    }
}
