//! Runs custom operations against a [`StateStore`].
//!
//! The execution context starts as `{"input": <request data>}` and gains one
//! variable per `read`/`set` step (and per `update`/`create` step with an
//! `as` alias). Steps run strictly in order; the first failure stops the
//! run. In atomic mode every mutation is journaled first and the journal is
//! unwound on failure.

use std::sync::Arc;
use std::time::Instant;

use mockgrid_core::item::{stringify, Data};
use mockgrid_core::{EngineError, EngineResult, ExpressionEngine, RequestContext};
use serde_json::Value;
use tracing::{debug_span, info_span};

use super::cache::ProgramCache;
use super::definition::{Assignments, Consistency, CustomOperation, Step};
use super::journal::RollbackJournal;
use crate::storage::{PathParams, StateStore};

/// Name of the context variable holding the request data.
pub const INPUT_VAR: &str = "input";

pub struct OperationExecutor {
    store: Arc<StateStore>,
    cache: ProgramCache,
}

impl OperationExecutor {
    /// Executor using the built-in expression engine.
    #[must_use]
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            cache: ProgramCache::default(),
        }
    }

    /// Executor using a caller-supplied expression engine.
    #[must_use]
    pub fn with_engine(store: Arc<StateStore>, engine: Arc<dyn ExpressionEngine>) -> Self {
        Self {
            store,
            cache: ProgramCache::new(engine),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Runs `operation` with `input` bound to the `input` variable.
    ///
    /// On success returns the evaluated `response` map, or the whole context
    /// without `input` when the operation has no response template.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] if the consistency mode is unknown; no
    ///   step runs in that case
    /// - [`EngineError::Step`] wrapping the first step failure, with any
    ///   rollback failure attached
    pub fn execute(
        &self,
        operation: &CustomOperation,
        input: Data,
        ctx: &RequestContext,
    ) -> EngineResult<Data> {
        let consistency = operation.consistency()?;
        let span = info_span!(
            "custom_operation",
            name = %operation.name,
            consistency = %consistency,
            trace_id = %ctx.trace_id,
        );
        let _guard = span.enter();
        let started = Instant::now();

        let mut context = Data::new();
        context.insert(INPUT_VAR.to_string(), Value::Object(input));
        let mut journal = (consistency == Consistency::Atomic).then(RollbackJournal::new);

        for (index, step) in operation.steps.iter().enumerate() {
            let step_span = debug_span!("step", index, kind = step.kind());
            let outcome = step_span.in_scope(|| self.run_step(step, &mut context, journal.as_mut()));
            if let Err(source) = outcome {
                let rollback = self.unwind(journal.take());
                tracing::warn!(index, step = step.kind(), error = %source, "operation step failed");
                return Err(EngineError::Step {
                    index,
                    step_type: step.kind(),
                    source: Box::new(source),
                    rollback,
                });
            }
        }

        let response = match self.build_response(&operation.response, context) {
            Ok(response) => response,
            Err(err) => {
                let rollback = self.unwind(journal.take());
                return Err(match rollback {
                    Some(r) => EngineError::validation(format!("{err}; rollback failed: {r}")),
                    None => err,
                });
            }
        };

        tracing::info!(
            steps = operation.steps.len(),
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "custom operation completed"
        );
        Ok(response)
    }

    /// Unwinds the journal if there is one. Returns the rollback failure
    /// message, if any.
    fn unwind(&self, journal: Option<RollbackJournal>) -> Option<String> {
        let journal = journal?;
        match journal.rollback(&self.store) {
            Ok(undone) => {
                tracing::warn!(undone, "atomic operation rolled back");
                None
            }
            Err(err) => {
                tracing::error!(error = %err, "rollback incomplete");
                Some(err.to_string())
            }
        }
    }

    fn run_step(
        &self,
        step: &Step,
        context: &mut Data,
        journal: Option<&mut RollbackJournal>,
    ) -> EngineResult<()> {
        step.validate()?;

        match step {
            Step::Read {
                resource,
                id,
                alias,
            } => {
                let id = self.eval_id(id, context)?;
                let item = self
                    .store
                    .require(resource)?
                    .get(&id)
                    .ok_or_else(|| EngineError::not_found(format!("{resource} item"), &id))?;
                context.insert(alias.clone(), item.to_json());
            }
            Step::Update {
                resource,
                id,
                alias,
                set,
            } => {
                let id = self.eval_id(id, context)?;
                let fields = self.eval_assignments(set, context)?;
                let target = self.store.require(resource)?;
                if let Some(journal) = journal {
                    let current = target
                        .get(&id)
                        .ok_or_else(|| EngineError::not_found(format!("{resource} item"), &id))?;
                    journal.record_snapshot(resource, &current);
                }
                let updated = target.patch(&id, fields)?;
                if let Some(alias) = alias {
                    context.insert(alias.clone(), updated.to_json());
                }
            }
            Step::Delete { resource, id } => {
                let id = self.eval_id(id, context)?;
                let target = self.store.require(resource)?;
                if let Some(journal) = journal {
                    let current = target
                        .get(&id)
                        .ok_or_else(|| EngineError::not_found(format!("{resource} item"), &id))?;
                    journal.record_snapshot(resource, &current);
                }
                target.delete(&id)?;
            }
            Step::Create {
                resource,
                alias,
                set,
            } => {
                let fields = self.eval_assignments(set, context)?;
                let target = self.store.require(resource)?;
                let created = target.create(fields, &PathParams::new())?;
                if let Some(journal) = journal {
                    journal.record_absent(resource, &created.id);
                }
                if let Some(alias) = alias {
                    context.insert(alias.clone(), created.to_json());
                }
            }
            Step::Set { var, value } => {
                let value = self.cache.evaluate(value, context)?;
                context.insert(var.clone(), value);
            }
        }

        tracing::debug!("step completed");
        Ok(())
    }

    fn eval_id(&self, expression: &str, context: &Data) -> EngineResult<String> {
        let id = stringify(&self.cache.evaluate(expression, context)?);
        if id.is_empty() {
            return Err(EngineError::validation(format!(
                "id expression '{expression}' resolved to an empty value"
            )));
        }
        Ok(id)
    }

    fn eval_assignments(&self, set: &Assignments, context: &Data) -> EngineResult<Data> {
        set.iter()
            .map(|(field, expression)| {
                let value = self.cache.evaluate(expression, context).map_err(|e| {
                    EngineError::validation(format!("field '{field}': {e}"))
                })?;
                Ok((field.clone(), value))
            })
            .collect()
    }

    fn build_response(&self, response: &Assignments, mut context: Data) -> EngineResult<Data> {
        if response.is_empty() {
            context.remove(INPUT_VAR);
            return Ok(context);
        }
        response
            .iter()
            .map(|(field, expression)| {
                let value = self.cache.evaluate(expression, &context).map_err(|e| {
                    EngineError::validation(format!("response field '{field}': {e}"))
                })?;
                Ok((field.clone(), value))
            })
            .collect()
    }
}
