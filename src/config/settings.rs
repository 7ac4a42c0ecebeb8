//! Settings structures for metasearch configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Main settings structure, mirrors settings.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub search: SearchSettings,
    pub outgoing: OutgoingSettings,
    pub providers: Vec<ProviderConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            search: SearchSettings::default(),
            outgoing: OutgoingSettings::default(),
            providers: default_providers(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(settings)
    }

    /// Merge with environment variables (METASEARCH_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("METASEARCH_DEBUG") {
            self.general.debug = parse_flag(&val);
        }
        if let Some(val) = var("METASEARCH_DEBUG_HTTP") {
            self.outgoing.debug_http = parse_flag(&val);
        }
        if let Some(val) = var("METASEARCH_TIMEOUT") {
            if let Ok(secs) = val.trim().parse::<f64>() {
                if secs > 0.0 {
                    self.outgoing.request_timeout = secs;
                }
            }
        }
    }

    /// Get provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Get all enabled providers, in declaration order
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| !p.disabled).collect()
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// General settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
}

/// Search behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Results printed by `query` when no limit is given
    pub default_limit: usize,
    /// Default language code (e.g. "en-US")
    pub default_lang: Option<String>,
    /// Default region code (e.g. "US")
    pub default_region: Option<String>,
    /// Safe search preference; unset leaves the provider default
    pub safe_search: Option<bool>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_lang: None,
            default_region: None,
            safe_search: None,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
    /// Log every request and response
    pub debug_http: bool,
}

impl OutgoingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 5.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            extra_headers: HashMap::new(),
            debug_http: false,
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Individual provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider ID (unique, appears in tokens)
    pub name: String,
    /// Provider implementation to use
    pub provider: String,
    /// Whether provider is disabled
    pub disabled: bool,
    /// Override of the upstream base URL
    pub base_url: Option<String>,
    /// Custom timeout for this provider, in seconds
    pub timeout: Option<f64>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            ..Default::default()
        }
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("duckduckgo", "duckduckgo"),
        ProviderConfig::new("google", "google"),
        ProviderConfig::new("wikipedia", "wikipedia"),
    ]
}
