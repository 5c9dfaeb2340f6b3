//! String-keyed registry of provider factories
//!
//! The registry is built once at configuration-load time and is immutable
//! afterwards: construction consumes the builder-style `with_factory` calls,
//! and the shared value only exposes lookups.

use std::collections::HashMap;
use std::sync::Arc;

use crate::check::CheckResult;
use crate::error::ConfigError;
use crate::provider::TunnelProvider;

/// Builds provider instances of one transport kind from opaque
/// configuration strings.
pub trait ProviderFactory: Send + Sync {
    /// Registry key for this transport, e.g. `"ssh"`.
    fn name(&self) -> &'static str;

    /// Validates a configuration string without constructing anything.
    fn check_config(&self, raw: &str) -> CheckResult;

    /// Builds a provider from a configuration string. Construction parses
    /// and validates but never opens a network connection.
    fn create(&self, raw: &str) -> Result<Arc<dyn TunnelProvider>, ConfigError>;
}

/// Immutable map from transport name to factory
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Adds a factory under its own name. Last registration wins for
    /// duplicate names.
    pub fn with_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factories.insert(factory.name(), factory);
        self
    }

    /// Looks up a factory by transport name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderFactory>> {
        self.factories.get(name).cloned()
    }

    /// Registered transport names, sorted for stable display.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopFactory;

    #[test]
    fn resolves_factories_by_name() {
        let registry = ProviderRegistry::new().with_factory(Arc::new(NoopFactory));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("noop").is_some());
        assert!(registry.get("carrier-pigeon").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let registry = ProviderRegistry::new().with_factory(Arc::new(NoopFactory));
        assert_eq!(registry.names(), vec!["noop"]);
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("noop").is_none());
    }
}
