use crate::errors::{LookupError, Result};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "MEDIA_CACHE_DB";
pub const ENV_TIMEOUT_MS: &str = "MEDIA_CACHE_TIMEOUT_MS";

/// Runtime configuration for the cache read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite file holding one table per category.
    pub db_path: PathBuf,
    /// Categories lookups may touch. Anything else is rejected.
    pub categories: Vec<Category>,
    /// Per-lookup deadline in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: crate::get_cache_path(),
            categories: Category::ALL.to_vec(),
            timeout_ms: None,
        }
    }
}

impl CacheConfig {
    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Loading cache config from: {:?}", path);
        let raw = std::fs::read_to_string(path)?;
        let config: CacheConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the per-user config file if one exists, defaults otherwise.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply `MEDIA_CACHE_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(raw) = var(ENV_TIMEOUT_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                LookupError::Config(format!("{} must be milliseconds, got {:?}: {}", ENV_TIMEOUT_MS, raw, e))
            })?;
            self.timeout_ms = Some(ms);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(LookupError::Config("at least one category must be enabled".to_string()));
        }
        for (i, category) in self.categories.iter().enumerate() {
            if self.categories[..i].contains(category) {
                return Err(LookupError::Config(format!("category listed twice: {}", category)));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// `<config dir>/media-cache/config.json`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("media-cache").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.db_path, PathBuf::from("data").join("cache.db"));
        assert_eq!(config.categories, vec![Category::Movies, Category::Series]);
        assert_eq!(config.timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "categories": ["movies"], "timeout_ms": 250 }"#).unwrap();

        let config = CacheConfig::load(&path).unwrap();
        assert_eq!(config.categories, vec![Category::Movies]);
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.db_path, crate::get_cache_path());
    }

    #[test]
    fn test_unknown_category_in_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "categories": ["movies", "sqlite_master"] }"#).unwrap();

        let err = CacheConfig::load(&path).unwrap_err();
        assert!(matches!(err, LookupError::Serialization(_)));
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        let mut config = CacheConfig {
            categories: vec![],
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(LookupError::Config(_))));

        config.categories = vec![Category::Series, Category::Series];
        assert!(matches!(config.validate(), Err(LookupError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CacheConfig::default();
        config
            .apply_overrides(vars(&[(ENV_DB_PATH, "/tmp/other.db"), (ENV_TIMEOUT_MS, " 1500 ")]))
            .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.timeout_ms, Some(1500));

        let err = config
            .apply_overrides(vars(&[(ENV_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, LookupError::Config(_)));
    }

    #[test]
    fn test_blank_db_override_is_ignored() {
        let mut config = CacheConfig::default();
        config.apply_overrides(vars(&[(ENV_DB_PATH, "  ")])).unwrap();
        assert_eq!(config.db_path, crate::get_cache_path());
    }
}
