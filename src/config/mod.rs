//! Configuration module
//!
//! Handles locating and loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit settings file
pub const SETTINGS_PATH_ENV: &str = "METASEARCH_SETTINGS_PATH";

/// Candidate settings files, in lookup order, when no path is given
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("metasearch-rs").join("settings.yml"));
    }
    paths
}

/// Load settings from `explicit`, the environment, a default location or
/// built-in defaults, then apply environment overrides.
///
/// An explicitly named file that does not exist is an error; the default
/// locations are only used when present.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let env_path = std::env::var_os(SETTINGS_PATH_ENV).map(PathBuf::from);
    let mut settings = match explicit.map(Path::to_path_buf).or(env_path) {
        Some(path) => {
            if !path.exists() {
                bail!("settings file {} does not exist", path.display());
            }
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)?
        }
        None => match default_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                info!("Loading settings from: {}", path.display());
                Settings::from_file(&path)?
            }
            None => {
                debug!("No settings file found, using defaults");
                Settings::default()
            }
        },
    };
    settings.merge_env();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_order() {
        let paths = default_paths();
        assert_eq!(paths[0], PathBuf::from("settings.yml"));
        assert_eq!(paths[1], PathBuf::from("config/settings.yml"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = load_settings(Some(Path::new("/nonexistent/metasearch.yml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_explicit_file() {
        let path = std::env::temp_dir().join(format!(
            "metasearch-settings-{}.yml",
            std::process::id()
        ));
        std::fs::write(&path, "search:\n  default_limit: 3\n").unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.search.default_limit, 3);
        assert_eq!(settings.providers.len(), 3);
    }
}
