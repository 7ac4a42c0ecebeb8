//! Provider loader for building the registry from configuration

use super::registry::ProviderRegistry;
use super::traits::Provider;
use super::{duckduckgo, google, wikipedia};
use crate::config::{ProviderConfig, Settings};
use crate::network::HttpClient;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Loader for initializing providers from configuration
pub struct ProviderLoader;

impl ProviderLoader {
    /// Build a registry with every enabled provider in `settings`.
    ///
    /// Disabled entries and unknown provider types are skipped with a
    /// warning; a duplicate ID is an error.
    pub fn load(settings: &Settings, client: &HttpClient) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();

        for config in &settings.providers {
            if config.disabled {
                debug!("Skipping disabled provider: {}", config.name);
                continue;
            }

            match Self::create_provider(config, client) {
                Ok(provider) => {
                    registry.register(provider)?;
                    info!("Loaded provider: {} ({})", config.name, config.provider);
                }
                Err(e) => {
                    warn!("Failed to load provider {}: {}", config.name, e);
                }
            }
        }

        debug!("Loaded {} providers", registry.len());
        Ok(registry)
    }

    /// Create a provider instance from its configuration
    fn create_provider(config: &ProviderConfig, client: &HttpClient) -> Result<Arc<dyn Provider>> {
        let client = match config.timeout {
            Some(secs) if secs > 0.0 => client.with_timeout(Duration::from_secs_f64(secs)),
            _ => client.clone(),
        };
        let id = if config.name.is_empty() {
            config.provider.clone()
        } else {
            config.name.clone()
        };
        let base_url = config.base_url.as_deref();

        let provider: Arc<dyn Provider> = match config.provider.as_str() {
            "duckduckgo" => {
                let mut p = duckduckgo::DuckDuckGo::new(client).with_id(id);
                if let Some(url) = base_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
            "google" => {
                let mut p = google::Google::new(client).with_id(id);
                if let Some(url) = base_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
            "wikipedia" => {
                let mut p = wikipedia::Wikipedia::new(client).with_id(id);
                if let Some(url) = base_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
            other => return Err(anyhow!("Unknown provider type: {:?}", other)),
        };
        Ok(provider)
    }

    /// Get list of available provider types
    pub fn available_providers() -> Vec<&'static str> {
        vec![
            duckduckgo::PROVIDER_ID,
            google::PROVIDER_ID,
            wikipedia::PROVIDER_ID,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::new().unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let registry = ProviderLoader::load(&Settings::default(), &client()).unwrap();
        assert_eq!(registry.ids(), vec!["duckduckgo", "google", "wikipedia"]);
        let with_ac: Vec<_> = registry.autocompleters().map(|(id, _)| id).collect();
        assert_eq!(with_ac, vec!["duckduckgo", "wikipedia"]);
    }

    #[test]
    fn test_skips_disabled_and_unknown() {
        let mut settings = Settings::default();
        settings.providers = vec![
            ProviderConfig::new("ddg", "duckduckgo"),
            ProviderConfig {
                disabled: true,
                ..ProviderConfig::new("wiki", "wikipedia")
            },
            ProviderConfig::new("yahoo", "yahoo"),
        ];
        let registry = ProviderLoader::load(&settings, &client()).unwrap();
        assert_eq!(registry.ids(), vec!["ddg"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut settings = Settings::default();
        settings.providers = vec![
            ProviderConfig::new("web", "duckduckgo"),
            ProviderConfig::new("web", "google"),
        ];
        let err = ProviderLoader::load(&settings, &client()).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_available_providers() {
        assert_eq!(
            ProviderLoader::available_providers(),
            vec!["duckduckgo", "google", "wikipedia"]
        );
    }
}
