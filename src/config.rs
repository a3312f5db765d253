use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CatalogError;

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub library: LibraryConfig,
    pub import: ImportConfig,
    /// Enabled sources, in lookup order.
    pub plugins: Vec<String>,
    /// Per-source settings, keyed by source name. Opaque to the pipeline.
    pub sources: BTreeMap<String, toml::Table>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    pub path: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    pub threads: usize,
    pub queue_capacity: usize,
    pub max_edit_attempts: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            import: ImportConfig::default(),
            plugins: vec!["file".to_string()],
            sources: BTreeMap::new(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/playdex/library.yaml".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            queue_capacity: 64,
            max_edit_attempts: 3,
        }
    }
}

impl CatalogConfig {
    pub fn library_path(&self) -> PathBuf {
        expand_path(&self.library.path)
    }

    /// Worker count for a run: the flag if given, else the configured value, never below 1.
    pub fn resolve_threads(&self, flag: Option<usize>) -> usize {
        flag.unwrap_or(self.import.threads).max(1)
    }
}

pub fn validate(config: &CatalogConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.library.path.trim().is_empty() {
        errors.push("library.path must not be empty".to_string());
    }

    if config.import.queue_capacity < 1 {
        errors.push("import.queue_capacity must be >= 1".to_string());
    }

    if config.import.max_edit_attempts < 1 {
        errors.push("import.max_edit_attempts must be >= 1".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    for plugin in &config.plugins {
        if !seen.insert(plugin) {
            errors.push(format!("plugins: duplicate source '{}'", plugin));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `$XDG_CONFIG_HOME/playdex/config.toml`, falling back to `~/.config/playdex/config.toml`.
pub fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"));
    base.join("playdex").join("config.toml")
}

/// Load configuration from `explicit` (which must exist) or the default location.
///
/// A missing default file yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<CatalogConfig, CatalogError> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path();
            if !path.exists() {
                return Ok(CatalogConfig::default());
            }
            path
        }
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| CatalogError::Read {
        path: config_path.clone(),
        source: e,
    })?;

    let config: CatalogConfig = toml::from_str(&contents).map_err(|e| CatalogError::Parse {
        path: config_path.clone(),
        message: e.to_string(),
    })?;

    validate(&config).map_err(|errors| {
        CatalogError::InvalidConfig(
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })?;

    Ok(config)
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(raw: &str) -> PathBuf {
    match raw.strip_prefix('~') {
        Some("") => home_dir(),
        Some(rest) if rest.starts_with('/') => home_dir().join(&rest[1..]),
        _ => PathBuf::from(raw),
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
