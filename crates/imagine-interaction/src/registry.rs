//! Lookup table from service id to provider.

use imagine_core::catalog::{ServiceId, ServiceSpec};
use imagine_core::provider::ImageProvider;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::openai_image_provider::OpenAiImageProvider;
use crate::stability_image_provider::StabilityImageProvider;

/// Registered providers, iterated in [`ServiceId`] order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ServiceId, Arc<dyn ImageProvider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in provider.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiImageProvider::new()));
        registry.register(Arc::new(StabilityImageProvider::new()));
        registry
    }

    /// Registers `provider` under its spec's id, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn ImageProvider>) {
        self.providers.insert(provider.spec().id, provider);
    }

    pub fn get(&self, id: ServiceId) -> Option<Arc<dyn ImageProvider>> {
        self.providers.get(&id).cloned()
    }

    pub fn specs(&self) -> impl Iterator<Item = &'static ServiceSpec> + '_ {
        self.providers.values().map(|provider| provider.spec())
    }

    /// Credential keys of the registered services.
    pub fn known_keys(&self) -> Vec<&'static str> {
        self.providers.keys().map(|id| id.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
