//! Configuration resolution for `CampusQR`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/campusqr/settings.json)
//! 3. Project config (.campusqr/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete `CampusQR` configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub emitter: EmitterConfig,
    pub scanner: ScannerConfig,
    pub storage: StorageConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            emitter: EmitterConfig::default(),
            scanner: ScannerConfig::default(),
            storage: StorageConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Attendance backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout; a timed-out mark request counts as `failed`.
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://campusqr-4.onrender.com".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ApiConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Teacher-side token rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub interval_ms: u64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self { interval_ms: 3_000 }
    }
}

impl EmitterConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Student-side scan validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Maximum token age accepted for submission.
    pub freshness_ms: i64,
    /// Delay before an `expired`/`failed` outcome unlocks the scanner.
    pub reset_cooldown_ms: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            freshness_ms: 10_000,
            reset_cooldown_ms: 2_000,
        }
    }
}

/// Local key-value store location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved store path, falling back to `~/.campusqr/store.json`.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".campusqr").join("store.json")))
    }
}

impl Config {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url is empty".into()));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(Error::Config("api.request_timeout_ms must be positive".into()));
        }
        if self.emitter.interval_ms == 0 {
            return Err(Error::Config("emitter.interval_ms must be positive".into()));
        }
        if self.scanner.freshness_ms <= 0 {
            return Err(Error::Config("scanner.freshness_ms must be positive".into()));
        }
        if self.scanner.reset_cooldown_ms < 0 {
            return Err(Error::Config(
                "scanner.reset_cooldown_ms must not be negative".into(),
            ));
        }
        // A token must survive at least one full rotation plus latency.
        let interval = i64::try_from(self.emitter.interval_ms).unwrap_or(i64::MAX);
        if self.scanner.freshness_ms <= interval {
            return Err(Error::Config(format!(
                "scanner.freshness_ms ({}) must exceed emitter.interval_ms ({})",
                self.scanner.freshness_ms, self.emitter.interval_ms
            )));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = load_config_files(global_config_path().as_deref(), project_dir)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Resolve the file layers only (defaults, global, project).
pub fn load_config_files(global_path: Option<&Path>, project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            let global = load_config_file(global_path)?;
            merge_config(&mut config, global);
        }
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".campusqr").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".campusqr").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/campusqr/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("campusqr").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// One config file. Only the fields a file names are set.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    api: ApiLayer,
    emitter: EmitterLayer,
    scanner: ScannerLayer,
    storage: StorageLayer,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiLayer {
    base_url: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmitterLayer {
    interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScannerLayer {
    freshness_ms: Option<i64>,
    reset_cooldown_ms: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageLayer {
    path: Option<PathBuf>,
}

fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Overlay every field the layer sets.
fn merge_config(base: &mut Config, layer: ConfigLayer) {
    if let Some(v) = layer.api.base_url {
        base.api.base_url = v;
    }
    if let Some(v) = layer.api.request_timeout_ms {
        base.api.request_timeout_ms = v;
    }
    if let Some(v) = layer.emitter.interval_ms {
        base.emitter.interval_ms = v;
    }
    if let Some(v) = layer.scanner.freshness_ms {
        base.scanner.freshness_ms = v;
    }
    if let Some(v) = layer.scanner.reset_cooldown_ms {
        base.scanner.reset_cooldown_ms = v;
    }
    if let Some(v) = layer.storage.path {
        base.storage.path = Some(v);
    }
    if let Some(v) = layer.log_level {
        base.log_level = v;
    }
}

/// Apply `CAMPUSQR_*` overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("CAMPUSQR_API_URL") {
        config.api.base_url = val;
    }
    if let Some(n) = lookup("CAMPUSQR_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.api.request_timeout_ms = n;
    }
    if let Some(n) = lookup("CAMPUSQR_EMIT_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.emitter.interval_ms = n;
    }
    if let Some(n) = lookup("CAMPUSQR_FRESHNESS_MS").and_then(|v| v.parse().ok()) {
        config.scanner.freshness_ms = n;
    }
    if let Some(n) = lookup("CAMPUSQR_RESET_COOLDOWN_MS").and_then(|v| v.parse().ok()) {
        config.scanner.reset_cooldown_ms = n;
    }
    if let Some(val) = lookup("CAMPUSQR_STORE_PATH") {
        config.storage.path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("CAMPUSQR_LOG_LEVEL") {
        config.log_level = val;
    }
}
