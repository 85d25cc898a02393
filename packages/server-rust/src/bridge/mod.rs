//! Protocol-agnostic façade over the state store and the operation executor.

pub mod handler;
pub mod request;

pub use handler::{Bridge, BridgeConfig, DEFAULT_MAX_PAYLOAD_BYTES};
pub use request::{Action, ErrorBody, OperationRequest, OperationResult, ResultStatus};
