//! Custom operation definitions as loaded from configuration.

use std::collections::BTreeMap;
use std::fmt;

use mockgrid_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Rollback behavior when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    /// Mutations made before the failing step are kept.
    #[default]
    BestEffort,
    /// Mutations made before the failing step are undone.
    Atomic,
}

impl Consistency {
    /// Parses a configured mode. Empty means [`Consistency::BestEffort`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for any other unknown value.
    pub fn normalize(raw: &str) -> EngineResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "best_effort" | "best-effort" | "besteffort" => Ok(Self::BestEffort),
            "atomic" => Ok(Self::Atomic),
            other => Err(EngineError::validation(format!(
                "unsupported consistency mode '{other}' (expected 'best_effort' or 'atomic')"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::Atomic => "atomic",
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name → expression text.
pub type Assignments = BTreeMap<String, String>;

/// One unit of a custom operation.
///
/// Expression-valued fields (`id`, `value`, every `set` entry) are source
/// text evaluated against the operation context when the step runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    /// Looks up an item and binds its flattened view to `alias`.
    Read {
        #[serde(default)]
        resource: String,
        #[serde(default)]
        id: String,
        #[serde(rename = "as", default)]
        alias: String,
    },
    /// Patches an item with the evaluated `set` fields.
    Update {
        #[serde(default)]
        resource: String,
        #[serde(default)]
        id: String,
        #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default)]
        set: Assignments,
    },
    /// Removes an item.
    Delete {
        #[serde(default)]
        resource: String,
        #[serde(default)]
        id: String,
    },
    /// Creates an item from the evaluated `set` fields.
    Create {
        #[serde(default)]
        resource: String,
        #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default)]
        set: Assignments,
    },
    /// Binds the value of an expression to `var`.
    Set {
        #[serde(default)]
        var: String,
        #[serde(default)]
        value: String,
    },
}

impl Step {
    /// Tag name used in definitions and error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Create { .. } => "create",
            Self::Set { .. } => "set",
        }
    }

    /// Resource the step touches, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Read { resource, .. }
            | Self::Update { resource, .. }
            | Self::Delete { resource, .. }
            | Self::Create { resource, .. } => Some(resource),
            Self::Set { .. } => None,
        }
    }

    /// Checks that every field the step type needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] naming the first missing field.
    pub fn validate(&self) -> EngineResult<()> {
        let required: Vec<(&str, &str)> = match self {
            Self::Read {
                resource,
                id,
                alias,
            } => vec![("resource", resource.as_str()), ("id", id.as_str()), ("as", alias.as_str())],
            Self::Update { resource, id, .. } | Self::Delete { resource, id } => {
                vec![("resource", resource.as_str()), ("id", id.as_str())]
            }
            Self::Create { resource, .. } => vec![("resource", resource.as_str())],
            Self::Set { var, value } => vec![("var", var.as_str()), ("value", value.as_str())],
        };
        match required.iter().find(|(_, v)| v.trim().is_empty()) {
            Some((field, _)) => Err(EngineError::validation(format!(
                "{} step requires '{field}'",
                self.kind()
            ))),
            None => Ok(()),
        }
    }
}

/// Named, ordered pipeline of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOperation {
    pub name: String,
    /// Raw mode text. Checked with [`Consistency::normalize`] before any
    /// step runs.
    #[serde(default)]
    pub consistency: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Output field → expression. Empty returns the whole context.
    #[serde(default)]
    pub response: Assignments,
}

impl CustomOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency.as_str().to_string();
        self
    }

    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn respond(mut self, field: impl Into<String>, expression: impl Into<String>) -> Self {
        self.response.insert(field.into(), expression.into());
        self
    }

    /// Parsed consistency mode.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for unknown modes.
    pub fn consistency(&self) -> EngineResult<Consistency> {
        Consistency::normalize(&self.consistency)
    }

    /// Validates the name, mode and every step.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] describing the first problem.
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("operation name is required"));
        }
        self.consistency()?;
        for (index, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| {
                EngineError::validation(format!("operation '{}' step {index}: {e}", self.name))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn consistency_normalizes() {
        assert_eq!(Consistency::normalize("").unwrap(), Consistency::BestEffort);
        assert_eq!(Consistency::normalize("best_effort").unwrap(), Consistency::BestEffort);
        assert_eq!(Consistency::normalize(" ATOMIC ").unwrap(), Consistency::Atomic);
        assert!(Consistency::normalize("serializable").is_err());
    }

    #[test]
    fn parses_definition_format() {
        let op: CustomOperation = serde_json::from_value(json!({
            "name": "transfer",
            "consistency": "atomic",
            "steps": [
                {"type": "read", "resource": "accounts", "id": "input.from", "as": "source"},
                {"type": "update", "resource": "accounts", "id": "source.id",
                 "set": {"balance": "source.balance - input.amount"}},
                {"type": "create", "resource": "logs", "as": "log", "set": {"amount": "input.amount"}},
                {"type": "delete", "resource": "holds", "id": "input.hold"},
                {"type": "set", "var": "ok", "value": "true"}
            ],
            "response": {"log": "log.id"}
        }))
        .unwrap();
        assert_eq!(op.consistency().unwrap(), Consistency::Atomic);
        assert_eq!(op.steps.len(), 5);
        assert_eq!(op.steps[0].kind(), "read");
        assert_eq!(op.steps[1].resource(), Some("accounts"));
        assert_eq!(op.steps[4].resource(), None);
        assert!(matches!(&op.steps[2], Step::Create { alias: Some(a), .. } if a == "log"));
        op.validate().unwrap();
    }

    #[test]
    fn unknown_step_type_fails_to_parse() {
        let result: Result<Step, _> = serde_json::from_value(json!({"type": "upsert"}));
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let step = Step::Read {
            resource: "a".into(),
            id: "input.id".into(),
            alias: String::new(),
        };
        let err = step.validate().unwrap_err();
        assert!(err.to_string().contains("read step requires 'as'"));

        let op = CustomOperation::new("x").step(Step::Set {
            var: "v".into(),
            value: " ".into(),
        });
        assert!(op.validate().unwrap_err().to_string().contains("step 0"));
    }

    #[test]
    fn missing_consistency_defaults_to_best_effort() {
        let op: CustomOperation = serde_json::from_value(json!({"name": "noop"})).unwrap();
        assert_eq!(op.consistency().unwrap(), Consistency::BestEffort);
    }
}
