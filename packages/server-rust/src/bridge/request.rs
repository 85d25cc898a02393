//! Protocol-agnostic request and result types exchanged at the bridge.

use std::fmt;

use mockgrid_core::item::Data;
use mockgrid_core::query::{Filter, ListPage};
use mockgrid_core::{EngineError, ErrorKind, RequestContext, ResourceItem};
use serde::{Deserialize, Serialize};

use crate::storage::PathParams;

/// What a request asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Get,
    List,
    Create,
    Update,
    Patch,
    Delete,
    Custom,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Custom => "custom",
        }
    }

    /// Whether the action needs a resource ID.
    #[must_use]
    pub fn targets_item(self) -> bool {
        matches!(self, Self::Get | Self::Update | Self::Patch | Self::Delete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single engine call as produced by any protocol adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    #[serde(default)]
    pub resource: String,
    pub action: Action,
    /// Custom operation name; only read when `action` is [`Action::Custom`].
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default, rename = "resourceID", alias = "resourceId")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub data: Option<Data>,
    /// Path parameters bound by the adapter's route match.
    #[serde(default)]
    pub params: PathParams,
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Trace metadata; never serialized.
    #[serde(skip)]
    pub context: RequestContext,
}

impl OperationRequest {
    fn new(resource: impl Into<String>, action: Action) -> Self {
        Self {
            resource: resource.into(),
            action,
            ..Self::default()
        }
    }

    pub fn get(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(resource, Action::Get).with_id(id)
    }

    pub fn list(resource: impl Into<String>, filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::new(resource, Action::List)
        }
    }

    pub fn create(resource: impl Into<String>, data: Data) -> Self {
        Self::new(resource, Action::Create).with_data(data)
    }

    pub fn update(resource: impl Into<String>, id: impl Into<String>, data: Data) -> Self {
        Self::new(resource, Action::Update).with_id(id).with_data(data)
    }

    pub fn patch(resource: impl Into<String>, id: impl Into<String>, data: Data) -> Self {
        Self::new(resource, Action::Patch).with_id(id).with_data(data)
    }

    pub fn delete(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(resource, Action::Delete).with_id(id)
    }

    /// Request to run the named custom operation with `input`.
    pub fn custom(operation: impl Into<String>, input: Data) -> Self {
        Self {
            operation_name: Some(operation.into()),
            ..Self::new(String::new(), Action::Custom)
        }
        .with_data(input)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: PathParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Name reported to observers: the operation name for custom requests,
    /// the resource name otherwise.
    #[must_use]
    pub fn target(&self) -> &str {
        match (self.action, self.operation_name.as_deref()) {
            (Action::Custom, Some(name)) => name,
            _ => &self.resource,
        }
    }
}

/// Outcome classification any protocol layer can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultStatus {
    Success,
    Created,
    NotFound,
    Conflict,
    ValidationError,
    CapacityExceeded,
    Error,
}

impl From<ErrorKind> for ResultStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::Conflict => Self::Conflict,
            ErrorKind::ValidationError | ErrorKind::PayloadTooLarge => Self::ValidationError,
            ErrorKind::CapacityExceeded => Self::CapacityExceeded,
            ErrorKind::Internal => Self::Error,
        }
    }
}

/// Serializable error detail attached to failed results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub hint: &'static str,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            hint: err.hint(),
        }
    }
}

/// Result of [`Bridge::execute`](super::Bridge::execute).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ResourceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ListPage>,
    /// Output of a custom operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    /// The concrete error, kept for detail extraction.
    #[serde(skip)]
    pub error: Option<EngineError>,
}

impl OperationResult {
    fn with_status(status: ResultStatus) -> Self {
        Self {
            status,
            item: None,
            list: None,
            data: None,
            error: None,
        }
    }

    #[must_use]
    pub fn success(item: ResourceItem) -> Self {
        Self {
            item: Some(item),
            ..Self::with_status(ResultStatus::Success)
        }
    }

    #[must_use]
    pub fn created(item: ResourceItem) -> Self {
        Self {
            item: Some(item),
            ..Self::with_status(ResultStatus::Created)
        }
    }

    #[must_use]
    pub fn listed(page: ListPage) -> Self {
        Self {
            list: Some(page),
            ..Self::with_status(ResultStatus::Success)
        }
    }

    #[must_use]
    pub fn custom(data: Data) -> Self {
        Self {
            data: Some(data),
            ..Self::with_status(ResultStatus::Success)
        }
    }

    #[must_use]
    pub fn failure(error: EngineError) -> Self {
        Self {
            error: Some(error.clone()),
            ..Self::with_status(error.kind().into())
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ResultStatus::Success | ResultStatus::Created)
    }

    #[must_use]
    pub fn error_body(&self) -> Option<ErrorBody> {
        self.error.as_ref().map(ErrorBody::from)
    }
}
