//! A named, independently locked collection of items.
//!
//! [`StatefulResource`] owns seed loading, path matching, CRUD and
//! capacity enforcement for one resource. Every public method takes the
//! resource's own lock for the duration of the map access only; no method
//! ever touches another resource.

use std::collections::HashMap;

use mockgrid_core::item::{stringify, strip_system_fields, Data};
use mockgrid_core::query::{self, Filter, ListPage};
use mockgrid_core::{EngineError, EngineResult, ResourceItem, SharedClock};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use super::config::ResourceConfig;
use super::path::{PathMatch, PathParams, PathPattern};

/// Summary of a resource for admin endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub name: String,
    pub base_path: String,
    pub id_field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_field: Option<String>,
    pub max_items: usize,
    pub count: usize,
    pub seed_count: usize,
}

/// In-memory CRUD collection with seeding and capacity limits.
pub struct StatefulResource {
    name: String,
    base_path: String,
    id_field: String,
    parent_field: Option<String>,
    max_items: usize,
    pattern: Option<PathPattern>,
    /// Seed items with their IDs fixed at construction time.
    seed: Vec<(String, Data)>,
    items: RwLock<HashMap<String, ResourceItem>>,
    clock: SharedClock,
}

impl std::fmt::Debug for StatefulResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatefulResource")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

impl StatefulResource {
    /// Builds a resource from `config` and loads its seed data.
    ///
    /// An empty `base_path` yields a bridge-only resource that never matches
    /// a request path.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the name is empty, the base
    /// path does not start with `/`, or two seed items share an ID.
    pub fn new(config: &ResourceConfig, clock: SharedClock) -> EngineResult<Self> {
        if config.name.trim().is_empty() {
            return Err(EngineError::invalid_config("resource name is required"));
        }
        let pattern = if config.base_path.is_empty() {
            None
        } else {
            Some(PathPattern::compile(&config.base_path)?)
        };

        let id_field = config.id_field().to_string();
        let mut seed = Vec::with_capacity(config.seed_data.len());
        let mut seen = std::collections::HashSet::new();
        for (index, raw) in config.seed_data.iter().enumerate() {
            let id = raw
                .get(&id_field)
                .map(stringify)
                .filter(|id| !id.is_empty())
                .unwrap_or_else(generate_id);
            if !seen.insert(id.clone()) {
                return Err(EngineError::invalid_config(format!(
                    "resource '{}': seed item at index {index} has duplicate id '{id}'",
                    config.name
                )));
            }
            let mut data = raw.clone();
            strip_system_fields(&mut data);
            seed.push((id, data));
        }

        let resource = Self {
            name: config.name.clone(),
            base_path: config.base_path.clone(),
            id_field,
            parent_field: config.parent_field.clone().filter(|f| !f.is_empty()),
            max_items: config.max_items,
            pattern,
            seed,
            items: RwLock::new(HashMap::new()),
            clock,
        };
        resource.reset();
        Ok(resource)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    #[must_use]
    pub fn parent_field(&self) -> Option<&str> {
        self.parent_field.as_deref()
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Number of seed items loaded on every reset.
    #[must_use]
    pub fn seed_count(&self) -> usize {
        self.seed.len()
    }

    /// Current number of stored items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.read().len()
    }

    #[must_use]
    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            name: self.name.clone(),
            base_path: self.base_path.clone(),
            id_field: self.id_field.clone(),
            parent_field: self.parent_field.clone(),
            max_items: self.max_items,
            count: self.count(),
            seed_count: self.seed.len(),
        }
    }

    /// Matches a request path against this resource's route.
    ///
    /// Always `None` for bridge-only resources.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<PathMatch> {
        self.pattern.as_ref()?.matches(path)
    }

    /// Copies the parent key from `params` into `data` when this resource is
    /// nested and the parameter is present.
    pub fn scope_to_parent(&self, data: &mut Data, params: &PathParams) {
        if let Some(field) = &self.parent_field {
            if let Some(parent_id) = params.get(field) {
                data.insert(field.clone(), Value::String(parent_id.clone()));
            }
        }
    }

    /// Creates an item. The ID comes from the ID field of `data`, or is
    /// generated when absent.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Conflict`] if the ID already exists
    /// - [`EngineError::CapacityExceeded`] if the resource is full
    pub fn create(&self, mut data: Data, params: &PathParams) -> EngineResult<ResourceItem> {
        let id = data
            .get(&self.id_field)
            .map(stringify)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_id);
        self.scope_to_parent(&mut data, params);
        self.pin_id(&mut data, &id);

        let mut items = self.items.write();
        if items.contains_key(&id) {
            return Err(EngineError::Conflict {
                resource: self.name.clone(),
                id,
            });
        }
        if self.max_items > 0 && items.len() >= self.max_items {
            return Err(EngineError::CapacityExceeded {
                resource: self.name.clone(),
                max_items: self.max_items,
            });
        }
        let item = ResourceItem::new(id.clone(), data, self.clock.now());
        items.insert(id, item.clone());
        drop(items);

        tracing::debug!(resource = %self.name, id = %item.id, "item created");
        Ok(item)
    }

    /// Returns a copy of the item, or `None` when absent.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ResourceItem> {
        self.items.read().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.items.read().contains_key(id)
    }

    /// Filters, sorts and paginates a snapshot of the items.
    ///
    /// A filter with a parent ID but no parent field is scoped by this
    /// resource's own parent field.
    #[must_use]
    pub fn list(&self, filter: &Filter) -> ListPage {
        let snapshot: Vec<ResourceItem> = self.items.read().values().cloned().collect();
        if filter.parent_id.is_some() && filter.parent_field.is_none() && self.parent_field.is_some() {
            let scoped = Filter {
                parent_field: self.parent_field.clone(),
                ..filter.clone()
            };
            return query::query(snapshot, &scoped);
        }
        query::query(snapshot, filter)
    }

    /// Replaces the item's data wholesale, keeping its ID and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the item does not exist.
    pub fn update(&self, id: &str, mut data: Data) -> EngineResult<ResourceItem> {
        strip_system_fields(&mut data);
        self.pin_id(&mut data, id);

        let now = self.clock.now();
        let mut items = self.items.write();
        let item = items.get_mut(id).ok_or_else(|| self.missing(id))?;
        item.data = data;
        item.updated_at = now;
        let updated = item.clone();
        drop(items);

        tracing::debug!(resource = %self.name, id, "item replaced");
        Ok(updated)
    }

    /// Merges `data` over the item's existing fields. System fields and the
    /// ID field in the patch are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the item does not exist.
    pub fn patch(&self, id: &str, mut data: Data) -> EngineResult<ResourceItem> {
        strip_system_fields(&mut data);
        data.remove(&self.id_field);

        let now = self.clock.now();
        let mut items = self.items.write();
        let item = items.get_mut(id).ok_or_else(|| self.missing(id))?;
        item.data.extend(data);
        item.updated_at = now;
        let patched = item.clone();
        drop(items);

        tracing::debug!(resource = %self.name, id, "item patched");
        Ok(patched)
    }

    /// Removes the item and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the item does not exist.
    pub fn delete(&self, id: &str) -> EngineResult<ResourceItem> {
        let removed = self
            .items
            .write()
            .remove(id)
            .ok_or_else(|| self.missing(id))?;
        tracing::debug!(resource = %self.name, id, "item deleted");
        Ok(removed)
    }

    /// Discards all items and reloads the seed data with fresh timestamps.
    /// Returns the number of items after the reset.
    pub fn reset(&self) -> usize {
        let now = self.clock.now();
        let fresh: HashMap<String, ResourceItem> = self
            .seed
            .iter()
            .map(|(id, data)| {
                let mut data = data.clone();
                self.pin_id(&mut data, id);
                (id.clone(), ResourceItem::new(id.clone(), data, now))
            })
            .collect();
        let count = fresh.len();
        *self.items.write() = fresh;
        tracing::debug!(resource = %self.name, count, "resource reset");
        count
    }

    /// Removes every item without reseeding. Returns the prior count.
    pub fn clear(&self) -> usize {
        let prior = std::mem::take(&mut *self.items.write()).len();
        tracing::debug!(resource = %self.name, prior, "resource cleared");
        prior
    }

    /// Puts `item` back exactly as given, bypassing capacity checks.
    /// Used to undo a mutation.
    pub(crate) fn restore(&self, item: ResourceItem) {
        self.items.write().insert(item.id.clone(), item);
    }

    /// Removes an item if present. Used to undo a create.
    pub(crate) fn discard(&self, id: &str) -> Option<ResourceItem> {
        self.items.write().remove(id)
    }

    /// Keeps a custom ID field inside `data` in sync with the item ID.
    fn pin_id(&self, data: &mut Data, id: &str) {
        if self.id_field != mockgrid_core::item::ID_FIELD {
            data.insert(self.id_field.clone(), Value::String(id.to_string()));
        }
    }

    fn missing(&self, id: &str) -> EngineError {
        EngineError::not_found(format!("{} item", self.name), id)
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
