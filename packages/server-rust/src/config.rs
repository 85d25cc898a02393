//! Top-level mock definition loaded from a JSON file.
//!
//! ```json
//! {
//!   "server": { "port": 4280 },
//!   "bridge": { "maxPayloadBytes": 1048576 },
//!   "resources": [ { "name": "users", "basePath": "/api/users", "seedData": [] } ],
//!   "operations": [ { "name": "TransferFunds", "consistency": "atomic", "steps": [] } ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mockgrid_core::SchemaValidator;
use serde::{Deserialize, Serialize};

use crate::bridge::{Bridge, BridgeConfig};
use crate::network::NetworkConfig;
use crate::operation::CustomOperation;
use crate::storage::{ResourceConfig, StateStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockConfig {
    pub server: NetworkConfig,
    pub bridge: BridgeConfig,
    pub resources: Vec<ResourceConfig>,
    pub operations: Vec<CustomOperation>,
}

impl MockConfig {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid config JSON.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// # Errors
    ///
    /// Returns an error if `text` is not valid config JSON.
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("failed to parse mock config")
    }

    /// Builds a bridge with every resource and operation registered.
    /// Resources carrying a `validation` block get schema validation.
    ///
    /// # Errors
    ///
    /// Returns the first registration failure, naming the offending entry.
    pub fn build_bridge(&self) -> anyhow::Result<Bridge> {
        let store = Arc::new(StateStore::new());
        let mut validator = SchemaValidator::new();

        for resource in &self.resources {
            store
                .register(resource)
                .with_context(|| format!("failed to register resource '{}'", resource.name))?;
            if let Some(schema) = &resource.validation {
                validator.insert(resource.name.clone(), schema.clone());
            }
        }

        let mut bridge = Bridge::with_config(store, self.bridge.clone());
        if !validator.is_empty() {
            bridge = bridge.with_validator(Arc::new(validator));
        }

        for operation in &self.operations {
            bridge
                .register_operation(operation.clone())
                .with_context(|| format!("failed to register operation '{}'", operation.name))?;
        }

        tracing::info!(
            resources = self.resources.len(),
            operations = self.operations.len(),
            "mock config loaded"
        );
        Ok(bridge)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use mockgrid_core::RequestContext;
    use serde_json::json;

    use super::*;
    use crate::bridge::{OperationRequest, ResultStatus};

    const BANK: &str = r#"{
        "server": { "port": 9000, "adminPrefix": "/_admin" },
        "resources": [
            {
                "name": "accounts",
                "basePath": "/accounts",
                "seedData": [
                    { "id": "a", "balance": 100 },
                    { "id": "b", "balance": 5 }
                ],
                "validation": { "required": ["balance"] }
            }
        ],
        "operations": [
            {
                "name": "Transfer",
                "consistency": "atomic",
                "steps": [
                    { "type": "read", "resource": "accounts", "id": "input.from", "as": "src" },
                    { "type": "read", "resource": "accounts", "id": "input.to", "as": "dst" },
                    { "type": "update", "resource": "accounts", "id": "input.from",
                      "set": { "balance": "src.balance - input.amount" } },
                    { "type": "update", "resource": "accounts", "id": "input.to",
                      "set": { "balance": "dst.balance + input.amount" } }
                ],
                "response": { "ok": "true" }
            }
        ]
    }"#;

    #[test]
    fn parses_full_config() {
        let config = MockConfig::from_json_str(BANK).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.admin_prefix(), "/_admin");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.bridge, BridgeConfig::default());
        assert_eq!(config.resources[0].seed_data.len(), 2);
        assert_eq!(config.operations[0].steps.len(), 4);
    }

    #[test]
    fn empty_object_is_a_valid_config() {
        let config = MockConfig::from_json_str("{}").unwrap();
        assert!(config.resources.is_empty());
        assert_eq!(config.server, NetworkConfig::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = MockConfig::from_json_str("{ not json").unwrap_err();
        assert!(err.to_string().contains("failed to parse mock config"));
    }

    #[test]
    fn build_bridge_registers_everything() {
        let bridge = MockConfig::from_json_str(BANK).unwrap().build_bridge().unwrap();
        assert_eq!(bridge.store().list(), vec!["accounts"]);
        assert_eq!(bridge.operation_names(), vec!["Transfer"]);

        let result = bridge.run_operation(
            "Transfer",
            json!({"from": "a", "to": "b", "amount": 30})
                .as_object()
                .cloned()
                .unwrap(),
            RequestContext::new(),
        );
        assert!(result.is_success());
        let accounts = bridge.store().require("accounts").unwrap();
        assert_eq!(accounts.get("a").unwrap().data["balance"], json!(70));
        assert_eq!(accounts.get("b").unwrap().data["balance"], json!(35));
    }

    #[test]
    fn validation_blocks_install_a_validator() {
        let bridge = MockConfig::from_json_str(BANK).unwrap().build_bridge().unwrap();
        let result = bridge.execute(&OperationRequest::create(
            "accounts",
            json!({"owner": "x"}).as_object().cloned().unwrap(),
        ));
        assert_eq!(result.status, ResultStatus::ValidationError);
    }

    #[test]
    fn build_bridge_reports_bad_entries() {
        let config = MockConfig::from_json_str(
            r#"{ "resources": [ { "name": "x", "basePath": "/x" }, { "name": "x", "basePath": "/y" } ] }"#,
        )
        .unwrap();
        let err = config.build_bridge().err().unwrap();
        assert!(format!("{err:#}").contains("failed to register resource 'x'"));

        let config = MockConfig::from_json_str(
            r#"{ "operations": [ { "name": "Bad", "consistency": "eventual" } ] }"#,
        )
        .unwrap();
        let err = config.build_bridge().err().unwrap();
        assert!(format!("{err:#}").contains("failed to register operation 'Bad'"));
    }

    #[test]
    fn from_file_reads_and_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BANK.as_bytes()).unwrap();
        let config = MockConfig::from_file(file.path()).unwrap();
        assert_eq!(config.resources.len(), 1);

        let err = MockConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
