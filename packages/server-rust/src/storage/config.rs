//! Resource definitions consumed from the configuration loader.

use mockgrid_core::item::Data;
use mockgrid_core::ResourceSchema;
use serde::{Deserialize, Serialize};

/// Default name of the field holding an item's identity.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Declarative definition of one stateful resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Unique resource name.
    pub name: String,
    /// Route prefix such as `/api/users` or `/users/:userId/orders`.
    /// Empty means the resource is only reachable through the bridge.
    #[serde(default)]
    pub base_path: String,
    /// Field in incoming payloads that carries the item ID. Defaults to `id`.
    #[serde(default)]
    pub id_field: Option<String>,
    /// Field that scopes items to a parent (nested resources).
    #[serde(default)]
    pub parent_field: Option<String>,
    /// Maximum number of items. 0 = unlimited.
    #[serde(default)]
    pub max_items: usize,
    /// Items loaded at registration and on every reset.
    #[serde(default)]
    pub seed_data: Vec<Data>,
    /// Optional payload rules enforced by the bridge.
    #[serde(default)]
    pub validation: Option<ResourceSchema>,
}

impl ResourceConfig {
    /// Minimal config with a name and base path.
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Vec<Data>) -> Self {
        self.seed_data = seed;
        self
    }

    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    #[must_use]
    pub fn with_parent_field(mut self, field: impl Into<String>) -> Self {
        self.parent_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    /// Effective ID field name.
    #[must_use]
    pub fn id_field(&self) -> &str {
        self.id_field
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_ID_FIELD)
    }
}
