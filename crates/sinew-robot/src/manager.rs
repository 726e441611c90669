//! Resource manager
//!
//! Owns every constructed resource and connected remote of a robot. A single
//! lock guards the maps; constructors, remote round-trips, and closes run
//! outside of it.

use sinew_core::{
    ComponentConfig, FrameError, RemoteConfig, RemoteConnector, Resource, ResourceMap,
    ResourceName, RobotConfig, RobotSource,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::reconfigurable::ReconfigurableResource;
use crate::registry::{ConstructorLookup, Dependencies};

#[derive(Error, Debug)]
pub enum RobotError {
    #[error("resource {0} not found")]
    NotFound(ResourceName),
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),
    #[error("duplicate remote name: {0}")]
    DuplicateRemote(String),
    #[error("unknown component subtype: {subtype} and/or model: {model}")]
    UnknownModel { subtype: String, model: String },
    #[error("unknown service type: {0}")]
    UnknownService(String),
    #[error("dependency {dependency} of component {component} not found")]
    DependencyNotFound {
        component: String,
        dependency: String,
    },
    #[error("dependency cycle involving component {0}")]
    DependencyCycle(String),
    #[error("failed to construct {name}: {source}")]
    Construction {
        name: ResourceName,
        source: anyhow::Error,
    },
    #[error("remote {name} unavailable: {source}")]
    RemoteUnavailable { name: String, source: anyhow::Error },
    #[error("remote {name}: {source}")]
    Remote { name: String, source: anyhow::Error },
    #[error("resource {0} is not reconfigurable")]
    NotReconfigurable(ResourceName),
    #[error("failed to update {name}: {source}")]
    Update {
        name: ResourceName,
        source: anyhow::Error,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("failed to close: {}", CloseFailures(.0))]
    CloseFailed(Vec<CloseFailure>),
}

/// One resource or remote that failed to close
#[derive(Debug, Clone)]
pub struct CloseFailure {
    pub name: String,
    pub error: String,
}

struct CloseFailures<'a>(&'a [CloseFailure]);

impl fmt::Display for CloseFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", failure.name, failure.error)?;
        }
        Ok(())
    }
}

/// A remote that answered during configuration processing
#[derive(Clone)]
pub struct ConnectedRemote {
    pub config: RemoteConfig,
    pub source: Arc<dyn RobotSource>,
    /// Resource names reported by the remote when it connected
    pub names: Vec<ResourceName>,
}

#[derive(Default)]
struct ManagerState {
    resources: HashMap<ResourceName, Arc<dyn Resource>>,
    /// Insertion order, used to close in reverse
    order: Vec<ResourceName>,
    remotes: BTreeMap<String, ConnectedRemote>,
    remote_failures: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct ResourceManager {
    state: RwLock<ManagerState>,
    remote_timeout: Option<Duration>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each remote connection attempt by `limit`
    pub fn with_remote_timeout(limit: Duration) -> Self {
        Self {
            state: RwLock::default(),
            remote_timeout: Some(limit),
        }
    }

    /// Connect remotes, then construct components in dependency order, then services.
    ///
    /// Malformed configuration is fatal. A remote that cannot be reached is
    /// recorded and skipped unless it is marked `required`.
    pub async fn process_config(
        &self,
        config: &RobotConfig,
        lookup: &dyn ConstructorLookup,
        connector: &dyn RemoteConnector,
    ) -> Result<(), RobotError> {
        check_unique_names(config)?;

        for remote in &config.remotes {
            self.connect_remote(remote, connector).await?;
        }

        for component in construction_order(&config.components)? {
            self.construct_component(component, lookup).await?;
        }

        for service in &config.services {
            let name = service.resource_name();
            let constructor = lookup
                .lookup_service(&service.subtype)
                .ok_or_else(|| RobotError::UnknownService(service.subtype.clone()))?;
            let resource = constructor
                .construct(service)
                .await
                .map_err(|source| RobotError::Construction {
                    name: name.clone(),
                    source,
                })?;
            self.add_resource(name, resource).await?;
        }

        Ok(())
    }

    async fn connect_remote(
        &self,
        remote: &RemoteConfig,
        connector: &dyn RemoteConnector,
    ) -> Result<(), RobotError> {
        let attempt = async {
            let source = connector.connect(remote).await?;
            let names = source.resource_names().await?;
            Ok::<_, anyhow::Error>(ConnectedRemote {
                config: remote.clone(),
                source,
                names,
            })
        };
        let connected = match self.remote_timeout {
            Some(limit) => match timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", limit)),
            },
            None => attempt.await,
        };

        let mut state = self.state.write().await;
        match connected {
            Ok(connected) => {
                info!(
                    remote = %remote.name,
                    address = %remote.address,
                    resources = connected.names.len(),
                    "Connected to remote"
                );
                state.remotes.insert(remote.name.clone(), connected);
                Ok(())
            }
            Err(source) if remote.required => Err(RobotError::RemoteUnavailable {
                name: remote.name.clone(),
                source,
            }),
            Err(e) => {
                warn!(
                    remote = %remote.name,
                    address = %remote.address,
                    error = %e,
                    "Remote unavailable, continuing without it"
                );
                state
                    .remote_failures
                    .insert(remote.name.clone(), e.to_string());
                Ok(())
            }
        }
    }

    async fn construct_component(
        &self,
        config: &ComponentConfig,
        lookup: &dyn ConstructorLookup,
    ) -> Result<(), RobotError> {
        let name = config.resource_name();
        let constructor = lookup
            .lookup_component(&config.subtype, &config.model)
            .ok_or_else(|| RobotError::UnknownModel {
                subtype: config.subtype.clone(),
                model: config.model.clone(),
            })?;

        let deps = self.dependencies(config).await?;
        let construction_error = |source| RobotError::Construction {
            name: name.clone(),
            source,
        };
        let mut resource = constructor
            .construct(&deps, config)
            .await
            .map_err(construction_error)?;
        if let Some(wrap) = lookup.lookup_reconfigurable(&config.subtype) {
            resource = wrap(resource).map_err(construction_error)?;
        }

        debug!(resource = %name, "Constructed component");
        self.add_resource(name, resource).await
    }

    async fn dependencies(&self, config: &ComponentConfig) -> Result<Dependencies, RobotError> {
        let state = self.state.read().await;
        let mut deps = Dependencies::new();
        for dependency in &config.depends_on {
            let resource = state
                .resources
                .iter()
                .find(|(name, _)| name.is_component() && &name.name == dependency)
                .map(|(_, resource)| resource.clone())
                .ok_or_else(|| RobotError::DependencyNotFound {
                    component: config.name.clone(),
                    dependency: dependency.clone(),
                })?;
            deps.insert(dependency.clone(), resource);
        }
        Ok(deps)
    }

    /// Record a resource under `name`; the manager becomes responsible for closing it
    pub async fn add_resource(
        &self,
        name: ResourceName,
        resource: Arc<dyn Resource>,
    ) -> Result<(), RobotError> {
        let mut state = self.state.write().await;
        if state.resources.contains_key(&name) {
            return Err(RobotError::DuplicateResource(name.to_string()));
        }
        state.order.push(name.clone());
        state.resources.insert(name, resource);
        Ok(())
    }

    /// Exact lookup: local resources first, then resources reported by remotes
    pub async fn resource_by_name(
        &self,
        name: &ResourceName,
    ) -> Result<Arc<dyn Resource>, RobotError> {
        let remote = {
            let state = self.state.read().await;
            if let Some(resource) = state.resources.get(name) {
                return Ok(resource.clone());
            }
            state
                .remotes
                .values()
                .find(|r| r.names.contains(name))
                .cloned()
        };

        match remote {
            Some(remote) => remote
                .source
                .resource_by_name(name)
                .await
                .map_err(|source| RobotError::Remote {
                    name: remote.config.name.clone(),
                    source,
                }),
            None => Err(RobotError::NotFound(name.clone())),
        }
    }

    /// Local and remote resource names, sorted and deduplicated
    pub async fn resource_names(&self) -> Vec<ResourceName> {
        let state = self.state.read().await;
        let mut names: Vec<ResourceName> = state
            .resources
            .keys()
            .chain(state.remotes.values().flat_map(|r| r.names.iter()))
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Names of connected remotes, sorted
    pub async fn remote_names(&self) -> Vec<String> {
        self.state.read().await.remotes.keys().cloned().collect()
    }

    pub async fn remote_by_name(&self, name: &str) -> Option<Arc<dyn RobotSource>> {
        self.state
            .read()
            .await
            .remotes
            .get(name)
            .map(|r| r.source.clone())
    }

    pub async fn remotes(&self) -> Vec<ConnectedRemote> {
        self.state.read().await.remotes.values().cloned().collect()
    }

    /// Remotes that could not be reached, with the reason
    pub async fn remote_failures(&self) -> BTreeMap<String, String> {
        self.state.read().await.remote_failures.clone()
    }

    /// Local resources by name
    pub async fn snapshot(&self) -> ResourceMap {
        self.state.read().await.resources.clone()
    }

    /// Swap the implementation behind a reconfigurable resource and close the old one
    pub async fn reconfigure(
        &self,
        name: &ResourceName,
        next: Arc<dyn Resource>,
    ) -> Result<(), RobotError> {
        let resource = {
            let state = self.state.read().await;
            state
                .resources
                .get(name)
                .cloned()
                .ok_or_else(|| RobotError::NotFound(name.clone()))?
        };
        let wrapper = resource
            .as_any()
            .downcast_ref::<ReconfigurableResource>()
            .ok_or_else(|| RobotError::NotReconfigurable(name.clone()))?;

        let previous = wrapper.swap(next);
        info!(resource = %name, "Reconfigured resource");
        previous.close().await.map_err(|e| {
            RobotError::CloseFailed(vec![CloseFailure {
                name: name.to_string(),
                error: e.to_string(),
            }])
        })
    }

    /// Close every resource (newest first) and every remote.
    ///
    /// Failures are collected and every close is attempted. Calling this again
    /// finds nothing left to close.
    pub async fn close(&self) -> Result<(), RobotError> {
        let (mut resources, order, remotes) = {
            let mut state = self.state.write().await;
            (
                std::mem::take(&mut state.resources),
                std::mem::take(&mut state.order),
                std::mem::take(&mut state.remotes),
            )
        };

        let mut failures = Vec::new();
        for name in order.iter().rev() {
            let Some(resource) = resources.remove(name) else {
                continue;
            };
            if let Err(e) = resource.close().await {
                warn!(resource = %name, error = %e, "Failed to close resource");
                failures.push(CloseFailure {
                    name: name.to_string(),
                    error: e.to_string(),
                });
            }
        }

        for (name, remote) in remotes {
            if let Err(e) = remote.source.close().await {
                warn!(remote = %name, error = %e, "Failed to close remote");
                failures.push(CloseFailure {
                    name,
                    error: e.to_string(),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RobotError::CloseFailed(failures))
        }
    }
}

fn check_unique_names(config: &RobotConfig) -> Result<(), RobotError> {
    let mut components = HashSet::new();
    for component in &config.components {
        if !components.insert(component.name.as_str()) {
            return Err(RobotError::DuplicateResource(component.name.clone()));
        }
    }
    let mut services = HashSet::new();
    for service in &config.services {
        if !services.insert(service.subtype.as_str()) {
            return Err(RobotError::DuplicateResource(
                service.resource_name().to_string(),
            ));
        }
    }
    let mut remotes = HashSet::new();
    for remote in &config.remotes {
        if !remotes.insert(remote.name.as_str()) {
            return Err(RobotError::DuplicateRemote(remote.name.clone()));
        }
    }
    Ok(())
}

/// Order components so each comes after everything it depends on.
///
/// Among components whose dependencies are satisfied, declaration order wins.
fn construction_order(components: &[ComponentConfig]) -> Result<Vec<&ComponentConfig>, RobotError> {
    let declared: HashSet<&str> = components.iter().map(|c| c.name.as_str()).collect();
    for component in components {
        for dependency in &component.depends_on {
            if !declared.contains(dependency.as_str()) {
                return Err(RobotError::DependencyNotFound {
                    component: component.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(components.len());
    while ordered.len() < components.len() {
        let next = components.iter().find(|c| {
            !placed.contains(c.name.as_str())
                && c.depends_on.iter().all(|d| placed.contains(d.as_str()))
        });
        match next {
            Some(component) => {
                placed.insert(component.name.as_str());
                ordered.push(component);
            }
            None => {
                let stuck = components
                    .iter()
                    .find(|c| !placed.contains(c.name.as_str()))
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                return Err(RobotError::DependencyCycle(stuck));
            }
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::fake::FakeComponent;
    use crate::registry::Registry;
    use crate::remote::InProcessConnector;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::any::Any;

    /// Records construction order and can be told to fail on close
    struct Recording {
        fail_close: bool,
        closed: Mutex<u32>,
    }

    #[async_trait]
    impl Resource for Recording {
        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn close(&self) -> anyhow::Result<()> {
            *self.closed.lock() += 1;
            if self.fail_close {
                Err(anyhow!("stuck brake"))
            } else {
                Ok(())
            }
        }
    }

    fn recording_registry(log: Arc<Mutex<Vec<String>>>) -> Registry {
        let mut registry = Registry::new();
        registry.register_component_fn("arm", "fake", |_, cfg| {
            Ok(Arc::new(FakeComponent::new(cfg.clone())))
        });
        registry.register_component_fn("motor", "recording", move |deps, cfg| {
            for dependency in &cfg.depends_on {
                deps.require(dependency)?;
            }
            log.lock().push(cfg.name.clone());
            Ok(Arc::new(Recording {
                fail_close: cfg.attributes.contains_key("fail_close"),
                closed: Mutex::new(0),
            }))
        });
        registry.register_component_fn("motor", "broken", |_, _| Err(anyhow!("no power")));
        registry
    }

    fn motor(name: &str, depends_on: &[&str]) -> ComponentConfig {
        let mut config = ComponentConfig::new(name, "motor", "recording");
        config.depends_on = depends_on.iter().map(|d| d.to_string()).collect();
        config
    }

    #[tokio::test]
    async fn test_dependencies_constructed_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(log.clone());
        let config = RobotConfig {
            components: vec![
                motor("wheel", &["axle"]),
                motor("axle", &["base"]),
                motor("base", &[]),
                motor("light", &[]),
            ],
            ..Default::default()
        };

        let manager = ResourceManager::new();
        manager
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["base", "light", "axle", "wheel"]);
        assert_eq!(manager.resource_names().await.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_dependency() {
        let registry = recording_registry(Arc::new(Mutex::new(Vec::new())));
        let config = RobotConfig {
            components: vec![motor("wheel", &["axle"])],
            ..Default::default()
        };
        let err = ResourceManager::new()
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RobotError::DependencyNotFound { ref component, ref dependency }
                if component == "wheel" && dependency == "axle"
        ));
    }

    #[tokio::test]
    async fn test_dependency_cycle() {
        let registry = recording_registry(Arc::new(Mutex::new(Vec::new())));
        let config = RobotConfig {
            components: vec![motor("a", &["b"]), motor("b", &["a"]), motor("c", &[])],
            ..Default::default()
        };
        let err = ResourceManager::new()
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RobotError::DependencyCycle(ref name) if name == "a"));
    }

    #[tokio::test]
    async fn test_duplicate_names_and_unknown_model() {
        let registry = recording_registry(Arc::new(Mutex::new(Vec::new())));
        let config = RobotConfig {
            components: vec![motor("m", &[]), motor("m", &[])],
            ..Default::default()
        };
        let err = ResourceManager::new()
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RobotError::DuplicateResource(ref name) if name == "m"));

        let config = RobotConfig {
            components: vec![ComponentConfig::new("arm1", "arm", "ur5")],
            ..Default::default()
        };
        let err = ResourceManager::new()
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown component subtype: arm and/or model: ur5"
        );
    }

    #[tokio::test]
    async fn test_constructor_failure_is_fatal() {
        let registry = recording_registry(Arc::new(Mutex::new(Vec::new())));
        let config = RobotConfig {
            components: vec![ComponentConfig::new("m", "motor", "broken")],
            ..Default::default()
        };
        let err = ResourceManager::new()
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to construct rdk:component:motor/m: no power"
        );
    }

    #[tokio::test]
    async fn test_resource_by_name_not_found() {
        let manager = ResourceManager::new();
        let name = ResourceName::component("arm", "ghost");
        let err = manager.resource_by_name(&name).await.err().unwrap();
        assert!(matches!(err, RobotError::NotFound(ref n) if *n == name));
    }

    #[tokio::test]
    async fn test_close_collects_failures_and_is_idempotent() {
        let registry = recording_registry(Arc::new(Mutex::new(Vec::new())));
        let mut failing = motor("stuck", &[]);
        failing
            .attributes
            .insert("fail_close".to_string(), serde_json::Value::Bool(true));
        let config = RobotConfig {
            components: vec![failing, motor("fine", &[])],
            ..Default::default()
        };
        let manager = ResourceManager::new();
        manager
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap();
        let fine = manager
            .resource_by_name(&ResourceName::component("motor", "fine"))
            .await
            .unwrap();

        let err = manager.close().await.unwrap_err();
        match err {
            RobotError::CloseFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].name, "rdk:component:motor/stuck");
                assert_eq!(failures[0].error, "stuck brake");
            }
            other => panic!("unexpected error: {}", other),
        }
        let fine = fine.as_any().downcast_ref::<Recording>().unwrap();
        assert_eq!(*fine.closed.lock(), 1);

        manager.close().await.unwrap();
        assert_eq!(*fine.closed.lock(), 1);
        assert!(manager.resource_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_empty_manager() {
        let manager = ResourceManager::new();
        manager.close().await.unwrap();
        manager.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconfigure() {
        let mut registry = recording_registry(Arc::new(Mutex::new(Vec::new())));
        registry.register_reconfigurable("arm", ReconfigurableResource::wrapper());
        let config = RobotConfig {
            components: vec![ComponentConfig::new("arm1", "arm", "fake"), motor("m", &[])],
            ..Default::default()
        };
        let manager = ResourceManager::new();
        manager
            .process_config(&config, &registry, &InProcessConnector::new())
            .await
            .unwrap();

        let name = ResourceName::component("arm", "arm1");
        let held = manager.resource_by_name(&name).await.unwrap();
        let old = held
            .as_any()
            .downcast_ref::<ReconfigurableResource>()
            .unwrap()
            .current();

        let next = Arc::new(FakeComponent::new(ComponentConfig::new("arm1", "arm", "ur5")));
        manager.reconfigure(&name, next).await.unwrap();

        let again = manager.resource_by_name(&name).await.unwrap();
        assert!(Arc::ptr_eq(&held, &again));
        let current = held
            .as_any()
            .downcast_ref::<ReconfigurableResource>()
            .unwrap()
            .current();
        let current = current.as_any().downcast_ref::<FakeComponent>().unwrap();
        assert_eq!(current.config().model, "ur5");
        let old = old.as_any().downcast_ref::<FakeComponent>().unwrap();
        assert_eq!(old.close_count(), 1);

        let motor_name = ResourceName::component("motor", "m");
        let err = manager
            .reconfigure(&motor_name, Arc::new(FakeComponent::new(motor("m", &[]))))
            .await
            .unwrap_err();
        assert!(matches!(err, RobotError::NotReconfigurable(_)));
    }

    #[test]
    fn test_construction_order_keeps_declaration_order() {
        let components = vec![motor("a", &[]), motor("b", &[]), motor("c", &["a"])];
        let order: Vec<&str> = construction_order(&components)
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);

        let components = vec![motor("self", &["self"])];
        assert!(matches!(
            construction_order(&components),
            Err(RobotError::DependencyCycle(_))
        ));
    }
}
