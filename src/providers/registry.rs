//! Provider registry

use super::traits::Provider;
use crate::autocomplete::AutoComplete;
use crate::error::{Result, SearchError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registered providers, kept in registration order
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    /// Provider index by ID
    by_id: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of providers
    pub fn from_providers(providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Result<Self> {
        let mut registry = Self::new();
        for provider in providers {
            registry.register(provider)?;
        }
        Ok(registry)
    }

    /// Register a provider; IDs must be unique
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<()> {
        let id = provider.id().to_string();
        if self.by_id.contains_key(&id) {
            return Err(SearchError::DuplicateProvider(id));
        }
        self.by_id.insert(id, self.providers.len());
        self.providers.push(provider);
        Ok(())
    }

    /// Get a provider by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.by_id.get(id).map(|&i| &self.providers[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    /// Providers with autocomplete support, in registration order
    pub fn autocompleters(&self) -> impl Iterator<Item = (&str, &dyn AutoComplete)> {
        self.providers
            .iter()
            .filter_map(|p| p.as_autocomplete().map(|ac| (p.id(), ac)))
    }

    /// Provider IDs, in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}
