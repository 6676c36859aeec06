//! CLI configuration management.
//!
//! Applies command-line overrides on top of the resolved core
//! [`Config`] and opens the on-disk student store.

use std::path::PathBuf;

use campusqr_core::config::{Config, load_config};
use campusqr_core::{JsonFileStore, StudentContextCache};

/// Global flags that override the config file and environment layers.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GlobalArgs {
    /// Attendance backend base URL.
    #[arg(long, global = true, env = "CAMPUSQR_API_URL")]
    pub api_url: Option<String>,

    /// Path of the local key-value store.
    #[arg(long, global = true, env = "CAMPUSQR_STORE_PATH")]
    pub store: Option<PathBuf>,

    /// Emit JSON log lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

impl GlobalArgs {
    /// Apply the flags to an already resolved config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url.clone_from(url);
        }
        if let Some(path) = &self.store {
            config.storage.path = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
    }

    /// Resolve the full config hierarchy for the current directory.
    pub fn resolve(&self) -> anyhow::Result<Config> {
        let cwd = std::env::current_dir().ok();
        let mut config = load_config(cwd.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Open the student-context cache backed by the configured store file.
pub fn open_cache(config: &Config) -> anyhow::Result<StudentContextCache<JsonFileStore>> {
    let path = config
        .storage
        .resolved_path()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory; pass --store <path>"))?;
    Ok(StudentContextCache::new(JsonFileStore::open(&path)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campusqr_core::KeyValueStore;

    #[test]
    fn flags_override_resolved_values() {
        let mut config = Config::default();
        let args = GlobalArgs {
            api_url: Some("http://localhost:5000".into()),
            store: Some(PathBuf::from("/tmp/store.json")),
            log_json: false,
            log_level: Some("debug".into()),
        };
        args.apply(&mut config);
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/store.json")));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = Config::default();
        GlobalArgs::default().apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn open_cache_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("nested").join("store.json"));

        let cache = open_cache(&config).unwrap();
        assert!(cache.store().get("studentId").is_none());
        assert_eq!(
            cache.store().path(),
            dir.path().join("nested").join("store.json")
        );
    }
}
