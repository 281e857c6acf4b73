use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fetch scheduler parameters (`[fetch]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Seconds a started job may run before it is reported as timed out.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Peer outbound-queue parameters (`[peer]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Largest chunk a queued buffer is split into.
    pub max_chunk_bytes: usize,
    /// Transmit the first chunk inside `enqueue` when the queue was empty,
    /// instead of waiting for the next drain pass.
    pub send_on_enqueue: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: 4096,
            send_on_enqueue: false,
        }
    }
}

/// Global configuration loaded from `~/.config/outpost/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutpostConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub peer: PeerConfig,
    /// Remote ban list sources, fetched in order by the refresher.
    #[serde(default)]
    pub ban_lists: Vec<String>,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("outpost")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<OutpostConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = OutpostConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<OutpostConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: OutpostConfig = toml::from_str(&data)?;
    Ok(cfg)
}
