//! Scripted multi-step transactions over the state store.
//!
//! - [`CustomOperation`] / [`Step`]: definitions loaded from configuration
//! - [`OperationExecutor`]: runs a definition step by step
//! - [`RollbackJournal`]: undo log used in atomic mode
//! - [`ProgramCache`]: compiled expressions keyed by text and env shape

pub mod cache;
pub mod definition;
pub mod executor;
pub mod journal;

pub use cache::{CacheStats, ProgramCache};
pub use definition::{Assignments, Consistency, CustomOperation, Step};
pub use executor::{OperationExecutor, INPUT_VAR};
pub use journal::{Prior, RollbackJournal};
