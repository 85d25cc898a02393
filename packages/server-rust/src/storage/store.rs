//! Registry of [`StatefulResource`]s with cross-resource dispatch.
//!
//! The store lock guards only the name → resource map and the observer
//! reference. Item contents are guarded by each resource's own lock, and
//! the store never holds its lock while calling into a resource.

use std::collections::HashMap;
use std::sync::Arc;

use mockgrid_core::{system_clock, EngineError, EngineResult, SharedClock};
use parking_lot::RwLock;
use serde::Serialize;

use super::config::ResourceConfig;
use super::observer::{noop_observer, Observer};
use super::path::PathMatch;
use super::resource::{ResourceInfo, StatefulResource};

/// Store-wide summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOverview {
    pub resource_count: usize,
    pub total_items: usize,
    pub resources: Vec<ResourceInfo>,
}

struct Registry {
    resources: HashMap<String, Arc<StatefulResource>>,
    observer: Arc<dyn Observer>,
}

/// Owns every resource of one engine instance.
pub struct StateStore {
    registry: RwLock<Registry>,
    clock: SharedClock,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Creates an empty store whose resources stamp items with `clock`.
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            registry: RwLock::new(Registry {
                resources: HashMap::new(),
                observer: noop_observer(),
            }),
            clock,
        }
    }

    /// Builds, seeds and registers a routable resource.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the name or base path is
    /// missing, the base path is malformed, the seed data has duplicate IDs,
    /// or the name is already registered.
    pub fn register(&self, config: &ResourceConfig) -> EngineResult<Arc<StatefulResource>> {
        if config.name.trim().is_empty() {
            return Err(EngineError::invalid_config("resource name is required"));
        }
        if config.base_path.is_empty() {
            return Err(EngineError::invalid_config(format!(
                "resource '{}': basePath is required",
                config.name
            )));
        }
        let resource = StatefulResource::new(config, Arc::clone(&self.clock))?;
        self.insert(resource)
    }

    /// Registers an already-built resource. Unlike [`register`](Self::register)
    /// this accepts bridge-only resources with an empty base path.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the name is already taken.
    pub fn insert(&self, resource: StatefulResource) -> EngineResult<Arc<StatefulResource>> {
        let resource = Arc::new(resource);
        let mut registry = self.registry.write();
        if registry.resources.contains_key(resource.name()) {
            return Err(EngineError::invalid_config(format!(
                "resource '{}' is already registered",
                resource.name()
            )));
        }
        registry
            .resources
            .insert(resource.name().to_string(), Arc::clone(&resource));
        drop(registry);

        tracing::info!(
            resource = %resource.name(),
            base_path = %resource.base_path(),
            seeded = resource.seed_count(),
            "resource registered"
        );
        Ok(resource)
    }

    /// Registers every config in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first [`register`](Self::register) error.
    pub fn register_all<'a>(
        &self,
        configs: impl IntoIterator<Item = &'a ResourceConfig>,
    ) -> EngineResult<usize> {
        let mut registered = 0;
        for config in configs {
            self.register(config)?;
            registered += 1;
        }
        Ok(registered)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<StatefulResource>> {
        self.registry.read().resources.get(name).cloned()
    }

    /// Like [`get`](Self::get) but reports absence as an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if no resource has that name.
    pub fn require(&self, name: &str) -> EngineResult<Arc<StatefulResource>> {
        self.get(name)
            .ok_or_else(|| EngineError::not_found("resource", name))
    }

    /// Registered resource names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().resources.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.read().resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.read().resources.is_empty()
    }

    #[must_use]
    pub fn overview(&self) -> StoreOverview {
        let mut resources: Vec<ResourceInfo> =
            self.snapshot().iter().map(|r| r.info()).collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        StoreOverview {
            resource_count: resources.len(),
            total_items: resources.iter().map(|r| r.count).sum(),
            resources,
        }
    }

    #[must_use]
    pub fn resource_info(&self, name: &str) -> Option<ResourceInfo> {
        self.get(name).map(|r| r.info())
    }

    /// Finds the resource whose route matches `path`.
    ///
    /// Routes are tried longest base path first, ties broken by name, so a
    /// nested route like `/users/:id/orders` wins over `/users`.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(Arc<StatefulResource>, PathMatch)> {
        let mut candidates: Vec<Arc<StatefulResource>> = self
            .snapshot()
            .into_iter()
            .filter(|r| !r.base_path().is_empty())
            .collect();
        candidates.sort_by(|a, b| {
            b.base_path()
                .len()
                .cmp(&a.base_path().len())
                .then_with(|| a.name().cmp(b.name()))
        });
        candidates
            .into_iter()
            .find_map(|r| r.match_path(path).map(|m| (r, m)))
    }

    /// Resets one resource, or all of them when `name` is `None`.
    /// Returns the sorted names of the resources reset.
    ///
    /// The registry lock is only held while picking the targets; each
    /// resource is then reset under its own lock.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `name` is not registered.
    pub fn reset(&self, name: Option<&str>) -> EngineResult<Vec<String>> {
        let targets = match name {
            Some(name) => vec![self.require(name)?],
            None => self.snapshot(),
        };
        let mut names: Vec<String> = targets
            .iter()
            .map(|r| {
                r.reset();
                r.name().to_string()
            })
            .collect();
        names.sort_unstable();
        tracing::info!(resources = ?names, "state reset");
        Ok(names)
    }

    /// Empties one resource without reseeding. Returns the prior count.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `name` is not registered.
    pub fn clear_resource(&self, name: &str) -> EngineResult<usize> {
        Ok(self.require(name)?.clear())
    }

    /// Drops every resource. Returns how many were registered.
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut self.registry.write().resources).len();
        tracing::info!(removed, "store cleared");
        removed
    }

    /// Unregisters one resource.
    pub fn remove(&self, name: &str) -> Option<Arc<StatefulResource>> {
        let removed = self.registry.write().resources.remove(name);
        if removed.is_some() {
            tracing::info!(resource = name, "resource removed");
        }
        removed
    }

    pub fn set_observer(&self, observer: Arc<dyn Observer>) {
        self.registry.write().observer = observer;
    }

    #[must_use]
    pub fn observer(&self) -> Arc<dyn Observer> {
        Arc::clone(&self.registry.read().observer)
    }

    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    fn snapshot(&self) -> Vec<Arc<StatefulResource>> {
        self.registry.read().resources.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use mockgrid_core::item::Data;
    use serde_json::{json, Value};

    use super::*;
    use crate::storage::observer::tests::CountingObserver;
    use crate::storage::path::PathParams;

    fn data(v: Value) -> Data {
        v.as_object().cloned().unwrap()
    }

    fn store() -> StateStore {
        let store = StateStore::new();
        store
            .register(&ResourceConfig::new("users", "/users").with_seed(vec![
                data(json!({"id": "u1"})),
                data(json!({"id": "u2"})),
            ]))
            .unwrap();
        store
            .register(
                &ResourceConfig::new("orders", "/users/:userId/orders")
                    .with_parent_field("userId")
                    .with_seed(vec![data(json!({"id": "o1", "userId": "u1"}))]),
            )
            .unwrap();
        store
    }

    #[test]
    fn register_validates_config() {
        let s = StateStore::new();
        assert!(s.register(&ResourceConfig::new("", "/x")).is_err());
        assert!(s.register(&ResourceConfig::new("x", "")).is_err());
        assert!(s.register(&ResourceConfig::new("x", "x")).is_err());
        assert!(s.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let s = store();
        let err = s.register(&ResourceConfig::new("users", "/people")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn list_is_sorted_and_overview_totals() {
        let s = store();
        assert_eq!(s.list(), vec!["orders".to_string(), "users".to_string()]);
        let overview = s.overview();
        assert_eq!(overview.resource_count, 2);
        assert_eq!(overview.total_items, 3);
        assert_eq!(overview.resources[0].name, "orders");
        assert_eq!(s.resource_info("users").unwrap().count, 2);
        assert!(s.resource_info("ghost").is_none());
    }

    #[test]
    fn match_path_prefers_longest_route() {
        let s = store();
        let (r, m) = s.match_path("/users/u1/orders/o1").unwrap();
        assert_eq!(r.name(), "orders");
        assert_eq!(m.item_id.as_deref(), Some("o1"));
        assert_eq!(m.params.get("userId").map(String::as_str), Some("u1"));

        let (r, m) = s.match_path("/users/u1").unwrap();
        assert_eq!(r.name(), "users");
        assert_eq!(m.item_id.as_deref(), Some("u1"));

        assert!(s.match_path("/nothing").is_none());
    }

    #[test]
    fn equal_length_routes_tie_break_by_name() {
        let s = StateStore::new();
        s.register(&ResourceConfig::new("zeta", "/:kind")).unwrap();
        s.register(&ResourceConfig::new("alpha", "/:type")).unwrap();
        let (r, _) = s.match_path("/things").unwrap();
        assert_eq!(r.name(), "alpha");
    }

    #[test]
    fn bridge_only_resources_are_skipped_by_routing() {
        let s = StateStore::new();
        let resource =
            StatefulResource::new(&ResourceConfig::new("ledger", ""), Arc::clone(s.clock())).unwrap();
        s.insert(resource).unwrap();
        assert!(s.get("ledger").is_some());
        assert!(s.match_path("/ledger").is_none());
    }

    #[test]
    fn reset_all_and_single() {
        let s = store();
        let users = s.get("users").unwrap();
        users.create(Data::new(), &PathParams::new()).unwrap();
        s.get("orders").unwrap().clear();

        assert_eq!(s.reset(Some("users")).unwrap(), vec!["users".to_string()]);
        assert_eq!(users.count(), 2);
        assert_eq!(s.get("orders").unwrap().count(), 0);

        assert_eq!(
            s.reset(None).unwrap(),
            vec!["orders".to_string(), "users".to_string()]
        );
        assert_eq!(s.get("orders").unwrap().count(), 1);
        assert!(matches!(s.reset(Some("ghost")), Err(EngineError::NotFound { .. })));
    }

    #[test]
    fn clear_resource_remove_and_clear() {
        let s = store();
        assert_eq!(s.clear_resource("users").unwrap(), 2);
        assert!(s.clear_resource("ghost").is_err());
        assert!(s.remove("users").is_some());
        assert!(s.remove("users").is_none());
        assert_eq!(s.clear(), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn observer_can_be_swapped() {
        let s = StateStore::new();
        let counting = Arc::new(CountingObserver::default());
        s.set_observer(counting.clone());
        s.observer()
            .on_create("r", "1", std::time::Duration::ZERO);
        assert_eq!(CountingObserver::get(&counting.create_count), 1);
    }

    #[test]
    fn bulk_reset_runs_alongside_registrations() {
        let s = store();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..50 {
                    s.reset(None).unwrap();
                }
            });
            scope.spawn(|| {
                for i in 0..50 {
                    s.register(&ResourceConfig::new(format!("r{i}"), format!("/r{i}")))
                        .unwrap();
                }
            });
        });
        assert_eq!(s.len(), 52);
    }
}
