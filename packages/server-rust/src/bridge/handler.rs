//! The [`Bridge`]: single entry point for every protocol adapter.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use mockgrid_core::item::Data;
use mockgrid_core::{
    EngineError, EngineResult, ExpressionEngine, RequestContext, RequestValidator,
    ValidationResult, WriteMode,
};
use serde::{Deserialize, Serialize};

use super::request::{Action, OperationRequest, OperationResult};
use crate::operation::{CustomOperation, OperationExecutor};
use crate::storage::{StateStore, StatefulResource};

/// Default request payload limit: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Bridge-level limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Maximum serialized size of `data` in bytes. 0 = unlimited.
    pub max_payload_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Translates [`OperationRequest`]s into store and executor calls.
///
/// The bridge owns the custom operation registry. Operations are looked up
/// and cloned out of the registry before they run, so the registry is never
/// locked while a resource lock is held.
pub struct Bridge {
    store: Arc<StateStore>,
    executor: OperationExecutor,
    operations: DashMap<String, Arc<CustomOperation>>,
    validator: Option<Arc<dyn RequestValidator>>,
    config: BridgeConfig,
}

impl Bridge {
    #[must_use]
    pub fn new(store: Arc<StateStore>) -> Self {
        Self::with_config(store, BridgeConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Arc<StateStore>, config: BridgeConfig) -> Self {
        Self {
            executor: OperationExecutor::new(Arc::clone(&store)),
            store,
            operations: DashMap::new(),
            validator: None,
            config,
        }
    }

    /// Consults `validator` before every create, update and patch.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn RequestValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Replaces the expression engine used by custom operations.
    #[must_use]
    pub fn with_expression_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.executor = OperationExecutor::with_engine(Arc::clone(&self.store), engine);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    #[must_use]
    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Registers a custom operation after validating its definition.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] if the definition is malformed or its
    ///   consistency mode is unknown
    /// - [`EngineError::Conflict`] if the name is already registered
    pub fn register_operation(&self, operation: CustomOperation) -> EngineResult<()> {
        operation.validate()?;
        let name = operation.name.clone();
        match self.operations.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::Conflict {
                resource: "operations".to_string(),
                id: name,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                tracing::info!(
                    operation = %name,
                    steps = operation.steps.len(),
                    "custom operation registered"
                );
                slot.insert(Arc::new(operation));
                Ok(())
            }
        }
    }

    /// Unregisters an operation, returning its definition.
    pub fn remove_operation(&self, name: &str) -> Option<Arc<CustomOperation>> {
        self.operations.remove(name).map(|(_, op)| op)
    }

    #[must_use]
    pub fn operation(&self, name: &str) -> Option<Arc<CustomOperation>> {
        self.operations.get(name).map(|op| Arc::clone(op.value()))
    }

    /// Registered operation names, sorted.
    #[must_use]
    pub fn operation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Runs one request and fires the matching observer hook.
    ///
    /// Never panics on caller input; every failure is reported through the
    /// result's status and attached error.
    pub fn execute(&self, request: &OperationRequest) -> OperationResult {
        let started = Instant::now();
        let outcome = self.dispatch(request);
        let elapsed = started.elapsed();
        let observer = self.store.observer();
        let target = request.target();

        match outcome {
            Ok(result) => {
                let id = result.item.as_ref().map_or("", |item| item.id.as_str());
                match request.action {
                    Action::Get => observer.on_read(target, id, elapsed),
                    Action::List => observer.on_list(
                        target,
                        result.list.as_ref().map_or(0, |page| page.meta.count),
                        elapsed,
                    ),
                    Action::Create => observer.on_create(target, id, elapsed),
                    Action::Update | Action::Patch => observer.on_update(target, id, elapsed),
                    Action::Delete => observer.on_delete(target, id, elapsed),
                    Action::Custom => observer.on_custom(target, elapsed),
                }
                result
            }
            Err(err) => {
                tracing::debug!(
                    target_name = target,
                    action = %request.action,
                    trace_id = %request.context.trace_id,
                    error = %err,
                    "request failed"
                );
                observer.on_error(target, request.action.as_str(), &err, elapsed);
                OperationResult::failure(err)
            }
        }
    }

    /// Shorthand for running a custom operation by name.
    pub fn run_operation(&self, name: &str, input: Data, ctx: RequestContext) -> OperationResult {
        self.execute(&OperationRequest::custom(name, input).with_context(ctx))
    }

    fn dispatch(&self, request: &OperationRequest) -> EngineResult<OperationResult> {
        self.check_payload(request)?;

        if request.action == Action::Custom {
            let name = request
                .operation_name
                .as_deref()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| EngineError::validation("custom request requires operationName"))?;
            let operation = self
                .operation(name)
                .ok_or_else(|| EngineError::not_found("operation", name))?;
            let input = request.data.clone().unwrap_or_default();
            let output = self.executor.execute(&operation, input, &request.context)?;
            return Ok(OperationResult::custom(output));
        }

        let resource = self.store.require(&request.resource)?;
        let id = if request.action.targets_item() {
            request
                .resource_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    EngineError::validation(format!("{} requires a resource ID", request.action))
                })?
        } else {
            ""
        };

        match request.action {
            Action::Get => resource
                .get(id)
                .map(OperationResult::success)
                .ok_or_else(|| EngineError::not_found(format!("{} item", resource.name()), id)),
            Action::List => {
                let mut filter = request.filter.clone().unwrap_or_default();
                if filter.parent_id.is_none() {
                    if let Some(field) = resource.parent_field() {
                        filter.parent_id = request.params.get(field).cloned();
                    }
                }
                Ok(OperationResult::listed(resource.list(&filter)))
            }
            Action::Create => {
                let data = request.data.clone().unwrap_or_default();
                self.validate(&resource, &data, WriteMode::Create)?;
                resource
                    .create(data, &request.params)
                    .map(OperationResult::created)
            }
            Action::Update => {
                let mut data = request.data.clone().unwrap_or_default();
                resource.scope_to_parent(&mut data, &request.params);
                self.validate(&resource, &data, WriteMode::Replace)?;
                resource.update(id, data).map(OperationResult::success)
            }
            Action::Patch => {
                let data = request.data.clone().unwrap_or_default();
                self.validate(&resource, &data, WriteMode::Patch)?;
                resource.patch(id, data).map(OperationResult::success)
            }
            Action::Delete => resource.delete(id).map(OperationResult::success),
            Action::Custom => Err(EngineError::internal("custom action reached resource dispatch")),
        }
    }

    fn check_payload(&self, request: &OperationRequest) -> EngineResult<()> {
        let limit = self.config.max_payload_bytes;
        let Some(data) = request.data.as_ref().filter(|_| limit > 0) else {
            return Ok(());
        };
        let size = serde_json::to_vec(data)
            .map_err(|e| EngineError::internal(format!("payload serialization: {e}")))?
            .len();
        if size > limit {
            return Err(EngineError::PayloadTooLarge { size, limit });
        }
        Ok(())
    }

    fn validate(&self, resource: &StatefulResource, data: &Data, mode: WriteMode) -> EngineResult<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        match validator.validate(resource.name(), data, mode) {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { errors } => Err(EngineError::validation(errors.join("; "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockgrid_core::query::Filter;
    use mockgrid_core::{ResourceSchema, SchemaValidator};
    use serde_json::{json, Value};

    use super::*;
    use crate::bridge::ResultStatus;
    use crate::operation::{Consistency, Step};
    use crate::storage::observer::tests::CountingObserver;
    use crate::storage::{PathParams, ResourceConfig};

    fn data(v: Value) -> Data {
        v.as_object().cloned().unwrap()
    }

    fn bridge() -> (Bridge, Arc<CountingObserver>) {
        let store = Arc::new(StateStore::new());
        store
            .register(&ResourceConfig::new("users", "/users").with_seed(vec![
                data(json!({"id": "u1", "name": "Ada", "role": "admin"})),
                data(json!({"id": "u2", "name": "Linus", "role": "user"})),
            ]))
            .unwrap();
        store
            .register(
                &ResourceConfig::new("orders", "/users/:userId/orders")
                    .with_parent_field("userId")
                    .with_seed(vec![
                        data(json!({"id": "o1", "userId": "u1"})),
                        data(json!({"id": "o2", "userId": "u2"})),
                    ]),
            )
            .unwrap();
        store
            .register(&ResourceConfig::new("tiny", "/tiny").with_max_items(1))
            .unwrap();
        let observer = Arc::new(CountingObserver::default());
        store.set_observer(observer.clone());
        (Bridge::new(store), observer)
    }

    #[test]
    fn crud_round_trip_fires_observer_hooks() {
        let (bridge, observer) = bridge();

        let created = bridge.execute(&OperationRequest::create("users", data(json!({"name": "Grace"}))));
        assert_eq!(created.status, ResultStatus::Created);
        let id = created.item.unwrap().id;

        let got = bridge.execute(&OperationRequest::get("users", &id));
        assert_eq!(got.status, ResultStatus::Success);
        assert_eq!(got.item.unwrap().data["name"], "Grace");

        let patched = bridge.execute(&OperationRequest::patch("users", &id, data(json!({"age": 85}))));
        assert_eq!(patched.item.unwrap().data["name"], "Grace");

        let replaced = bridge.execute(&OperationRequest::update("users", &id, data(json!({"name": "G"}))));
        assert!(!replaced.item.unwrap().data.contains_key("age"));

        let listed = bridge.execute(&OperationRequest::list("users", Filter::default()));
        assert_eq!(listed.list.unwrap().meta.total, 3);

        let deleted = bridge.execute(&OperationRequest::delete("users", &id));
        assert!(deleted.is_success());

        assert_eq!(CountingObserver::get(&observer.create_count), 1);
        assert_eq!(CountingObserver::get(&observer.read_count), 1);
        assert_eq!(CountingObserver::get(&observer.update_count), 2);
        assert_eq!(CountingObserver::get(&observer.list_count), 1);
        assert_eq!(CountingObserver::get(&observer.delete_count), 1);
        assert_eq!(CountingObserver::get(&observer.error_count), 0);
    }

    #[test]
    fn failures_map_to_statuses_and_fire_on_error() {
        let (bridge, observer) = bridge();

        let missing_resource = bridge.execute(&OperationRequest::get("ghosts", "1"));
        assert_eq!(missing_resource.status, ResultStatus::NotFound);

        let missing_item = bridge.execute(&OperationRequest::get("users", "nope"));
        assert_eq!(missing_item.status, ResultStatus::NotFound);

        let conflict = bridge.execute(&OperationRequest::create("users", data(json!({"id": "u1"}))));
        assert_eq!(conflict.status, ResultStatus::Conflict);

        let mut no_id = OperationRequest::get("users", "");
        no_id.resource_id = None;
        assert_eq!(bridge.execute(&no_id).status, ResultStatus::ValidationError);
        assert_eq!(
            bridge.execute(&OperationRequest::delete("users", "")).status,
            ResultStatus::ValidationError
        );

        bridge.execute(&OperationRequest::create("tiny", Data::new()));
        let full = bridge.execute(&OperationRequest::create("tiny", Data::new()));
        assert_eq!(full.status, ResultStatus::CapacityExceeded);

        assert_eq!(CountingObserver::get(&observer.error_count), 6);
    }

    #[test]
    fn list_uses_path_params_for_parent_scope() {
        let (bridge, _) = bridge();
        let mut params = PathParams::new();
        params.insert("userId".into(), "u2".into());
        let result = bridge.execute(&OperationRequest::list("orders", Filter::default()).with_params(params));
        let page = result.list.unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].id, "o2");
    }

    #[test]
    fn update_keeps_parent_key_from_path() {
        let (bridge, _) = bridge();
        let mut params = PathParams::new();
        params.insert("userId".into(), "u1".into());
        let result = bridge.execute(
            &OperationRequest::update("orders", "o1", data(json!({"total": 5}))).with_params(params),
        );
        assert_eq!(result.item.unwrap().data["userId"], "u1");
    }

    #[test]
    fn payload_limit_is_enforced() {
        let store = Arc::new(StateStore::new());
        store.register(&ResourceConfig::new("blobs", "/blobs")).unwrap();
        let bridge = Bridge::with_config(store, BridgeConfig { max_payload_bytes: 16 });

        let result = bridge.execute(&OperationRequest::create(
            "blobs",
            data(json!({"body": "this payload is far too long"})),
        ));
        assert_eq!(result.status, ResultStatus::ValidationError);
        assert!(matches!(result.error, Some(EngineError::PayloadTooLarge { limit: 16, .. })));
        assert_eq!(bridge.store().get("blobs").unwrap().count(), 0);
    }

    #[test]
    fn validator_rejects_before_mutation() {
        let (bridge, _) = bridge();
        let mut validator = SchemaValidator::new();
        validator.insert(
            "users",
            ResourceSchema {
                required: vec!["name".into()],
                fields: Vec::new(),
            },
        );
        let bridge = bridge.with_validator(Arc::new(validator));

        let result = bridge.execute(&OperationRequest::create("users", data(json!({"age": 3}))));
        assert_eq!(result.status, ResultStatus::ValidationError);
        assert_eq!(bridge.store().get("users").unwrap().count(), 2);

        let patched = bridge.execute(&OperationRequest::patch("users", "u1", data(json!({"age": 3}))));
        assert_eq!(patched.status, ResultStatus::Success);
    }

    fn rename_op() -> CustomOperation {
        CustomOperation::new("rename")
            .step(Step::Update {
                resource: "users".into(),
                id: "input.id".into(),
                alias: Some("user".into()),
                set: [("name".to_string(), "input.name".to_string())].into(),
            })
            .respond("name", "user.name")
    }

    #[test]
    fn custom_operations_register_and_run() {
        let (bridge, observer) = bridge();
        bridge.register_operation(rename_op()).unwrap();
        assert_eq!(bridge.operation_names(), vec!["rename".to_string()]);

        let result = bridge.run_operation(
            "rename",
            data(json!({"id": "u2", "name": "Torvalds"})),
            RequestContext::new(),
        );
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(result.data.unwrap()["name"], "Torvalds");
        assert_eq!(CountingObserver::get(&observer.custom_count), 1);

        let missing = bridge.run_operation("nope", Data::new(), RequestContext::default());
        assert_eq!(missing.status, ResultStatus::NotFound);
    }

    #[test]
    fn register_operation_rejects_duplicates_and_bad_modes() {
        let (bridge, _) = bridge();
        bridge.register_operation(rename_op()).unwrap();
        let dup = bridge.register_operation(rename_op()).unwrap_err();
        assert!(matches!(dup, EngineError::Conflict { .. }));

        let mut bad = rename_op();
        bad.name = "other".into();
        bad.consistency = "eventual".into();
        assert!(matches!(
            bridge.register_operation(bad),
            Err(EngineError::Validation { .. })
        ));

        assert!(bridge.remove_operation("rename").is_some());
        assert!(bridge.operation("rename").is_none());
    }

    #[test]
    fn custom_step_failure_keeps_concrete_error() {
        let (bridge, _) = bridge();
        bridge
            .register_operation(rename_op().with_consistency(Consistency::Atomic))
            .unwrap();
        let result = bridge.run_operation(
            "rename",
            data(json!({"id": "ghost", "name": "x"})),
            RequestContext::default(),
        );
        assert_eq!(result.status, ResultStatus::NotFound);
        assert!(matches!(result.error, Some(EngineError::Step { index: 0, .. })));
    }
}
