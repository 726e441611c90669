//! Constructor registry
//!
//! Maps `(subtype, model)` to component constructors, `subtype` to service
//! constructors, and `subtype` to reconfigurable wrappers. Modules register
//! explicitly at startup; the resource manager only sees [`ConstructorLookup`].

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use sinew_core::{ComponentConfig, Resource, ServiceConfig};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Already constructed resources a component declared in `depends_on`, keyed by name
#[derive(Default, Clone)]
pub struct Dependencies {
    resources: HashMap<String, Arc<dyn Resource>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, resource: Arc<dyn Resource>) {
        self.resources.insert(name.into(), resource);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Resource>> {
        self.resources.get(name)
    }

    /// Like [`Dependencies::get`] but an absent dependency is an error
    pub fn require(&self, name: &str) -> Result<&Arc<dyn Resource>> {
        self.resources
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("dependency {} not found", name))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
pub trait ComponentConstructor: Send + Sync {
    async fn construct(
        &self,
        deps: &Dependencies,
        config: &ComponentConfig,
    ) -> Result<Arc<dyn Resource>>;
}

#[async_trait]
pub trait ServiceConstructor: Send + Sync {
    async fn construct(&self, config: &ServiceConfig) -> Result<Arc<dyn Resource>>;
}

/// Wraps a freshly constructed resource so its implementation can be swapped later
pub type ReconfigurableWrapper =
    Arc<dyn Fn(Arc<dyn Resource>) -> Result<Arc<dyn Resource>> + Send + Sync>;

/// Component constructor backed by a plain closure
pub struct FnComponent<F>(pub F);

#[async_trait]
impl<F> ComponentConstructor for FnComponent<F>
where
    F: Fn(&Dependencies, &ComponentConfig) -> Result<Arc<dyn Resource>> + Send + Sync,
{
    async fn construct(
        &self,
        deps: &Dependencies,
        config: &ComponentConfig,
    ) -> Result<Arc<dyn Resource>> {
        (self.0)(deps, config)
    }
}

/// Service constructor backed by a plain closure
pub struct FnService<F>(pub F);

#[async_trait]
impl<F> ServiceConstructor for FnService<F>
where
    F: Fn(&ServiceConfig) -> Result<Arc<dyn Resource>> + Send + Sync,
{
    async fn construct(&self, config: &ServiceConfig) -> Result<Arc<dyn Resource>> {
        (self.0)(config)
    }
}

/// The lookup surface the resource manager consumes
pub trait ConstructorLookup: Send + Sync {
    fn lookup_component(&self, subtype: &str, model: &str) -> Option<Arc<dyn ComponentConstructor>>;

    fn lookup_service(&self, subtype: &str) -> Option<Arc<dyn ServiceConstructor>>;

    fn lookup_reconfigurable(&self, subtype: &str) -> Option<ReconfigurableWrapper>;
}

#[derive(Default)]
pub struct Registry {
    components: HashMap<(String, String), Arc<dyn ComponentConstructor>>,
    services: HashMap<String, Arc<dyn ServiceConstructor>>,
    wrappers: HashMap<String, ReconfigurableWrapper>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_component(
        &mut self,
        subtype: &str,
        model: &str,
        constructor: Arc<dyn ComponentConstructor>,
    ) {
        let key = (subtype.to_string(), model.to_string());
        if self.components.insert(key, constructor).is_some() {
            warn!(subtype = %subtype, model = %model, "Replaced component constructor");
        }
    }

    pub fn register_component_fn<F>(&mut self, subtype: &str, model: &str, f: F)
    where
        F: Fn(&Dependencies, &ComponentConfig) -> Result<Arc<dyn Resource>> + Send + Sync + 'static,
    {
        self.register_component(subtype, model, Arc::new(FnComponent(f)));
    }

    pub fn register_service(&mut self, subtype: &str, constructor: Arc<dyn ServiceConstructor>) {
        if self.services.insert(subtype.to_string(), constructor).is_some() {
            warn!(subtype = %subtype, "Replaced service constructor");
        }
    }

    pub fn register_service_fn<F>(&mut self, subtype: &str, f: F)
    where
        F: Fn(&ServiceConfig) -> Result<Arc<dyn Resource>> + Send + Sync + 'static,
    {
        self.register_service(subtype, Arc::new(FnService(f)));
    }

    pub fn register_reconfigurable(&mut self, subtype: &str, wrapper: ReconfigurableWrapper) {
        self.wrappers.insert(subtype.to_string(), wrapper);
    }
}

impl ConstructorLookup for Registry {
    fn lookup_component(&self, subtype: &str, model: &str) -> Option<Arc<dyn ComponentConstructor>> {
        self.components
            .get(&(subtype.to_string(), model.to_string()))
            .cloned()
    }

    fn lookup_service(&self, subtype: &str) -> Option<Arc<dyn ServiceConstructor>> {
        self.services.get(subtype).cloned()
    }

    fn lookup_reconfigurable(&self, subtype: &str) -> Option<ReconfigurableWrapper> {
        self.wrappers.get(subtype).cloned()
    }
}

static GLOBAL: OnceLock<RwLock<Registry>> = OnceLock::new();

/// The process-wide registry, created empty on first use
pub fn global() -> &'static RwLock<Registry> {
    GLOBAL.get_or_init(|| RwLock::new(Registry::new()))
}

/// [`ConstructorLookup`] over the process-wide registry
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalRegistry;

impl ConstructorLookup for GlobalRegistry {
    fn lookup_component(&self, subtype: &str, model: &str) -> Option<Arc<dyn ComponentConstructor>> {
        global().read().lookup_component(subtype, model)
    }

    fn lookup_service(&self, subtype: &str) -> Option<Arc<dyn ServiceConstructor>> {
        global().read().lookup_service(subtype)
    }

    fn lookup_reconfigurable(&self, subtype: &str) -> Option<ReconfigurableWrapper> {
        global().read().lookup_reconfigurable(subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::fake::FakeComponent;

    fn fake(config: &ComponentConfig) -> Result<Arc<dyn Resource>> {
        Ok(Arc::new(FakeComponent::new(config.clone())))
    }

    #[tokio::test]
    async fn test_lookup_component_by_subtype_and_model() {
        let mut registry = Registry::new();
        registry.register_component_fn("arm", "fake", |_, cfg| fake(cfg));

        assert!(registry.lookup_component("arm", "fake").is_some());
        assert!(registry.lookup_component("arm", "ur5").is_none());
        assert!(registry.lookup_component("gripper", "fake").is_none());

        let constructor = registry.lookup_component("arm", "fake").unwrap();
        let config = ComponentConfig::new("arm1", "arm", "fake");
        let resource = constructor.construct(&Dependencies::new(), &config).await.unwrap();
        let arm = resource.as_any().downcast_ref::<FakeComponent>().unwrap();
        assert_eq!(arm.config().name, "arm1");
    }

    #[test]
    fn test_lookup_service_and_wrapper() {
        let mut registry = Registry::new();
        assert!(registry.lookup_service("status").is_none());
        registry.register_service_fn("status", |_| {
            Ok(Arc::new(FakeComponent::new(ComponentConfig::new("s", "status", "builtin"))))
        });
        assert!(registry.lookup_service("status").is_some());

        assert!(registry.lookup_reconfigurable("arm").is_none());
        registry.register_reconfigurable(
            "arm",
            Arc::new(|r: Arc<dyn Resource>| -> Result<Arc<dyn Resource>> { Ok(r) }),
        );
        assert!(registry.lookup_reconfigurable("arm").is_some());
    }

    #[test]
    fn test_dependencies_require() {
        let mut deps = Dependencies::new();
        assert!(deps.require("arm1").is_err());
        deps.insert("arm1", fake(&ComponentConfig::new("arm1", "arm", "fake")).unwrap());
        assert!(deps.require("arm1").is_ok());
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_global_registry() {
        global()
            .write()
            .register_component_fn("motor", "global-test", |_, cfg| fake(cfg));
        assert!(GlobalRegistry.lookup_component("motor", "global-test").is_some());
        assert!(GlobalRegistry.lookup_component("motor", "missing").is_none());
    }
}
