//! `mockgrid` server: stateful mock resources, custom multi-step
//! operations, and the HTTP adapter that serves them.

pub mod bridge;
pub mod config;
pub mod network;
pub mod operation;
pub mod storage;

pub use bridge::{Action, Bridge, BridgeConfig, OperationRequest, OperationResult, ResultStatus};
pub use config::MockConfig;
pub use network::{NetworkConfig, NetworkModule};
pub use operation::{Consistency, CustomOperation, OperationExecutor, Step};
pub use storage::{Observer, ResourceConfig, StateStore, StatefulResource};
