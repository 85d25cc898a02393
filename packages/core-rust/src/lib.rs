//! `mockgrid` core: resource items, query primitives, the embedded
//! expression language, and the engine error taxonomy.

pub mod clock;
pub mod context;
pub mod error;
pub mod expr;
pub mod item;
pub mod query;
pub mod schema;

pub use clock::{system_clock, ClockSource, FixedClock, SharedClock, SystemClock};
pub use context::RequestContext;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use expr::{BuiltinEngine, EnvShape, ExprError, ExpressionEngine, Program};
pub use item::{Data, ResourceItem};
pub use query::{Filter, ListMeta, ListPage};
pub use schema::{
    FieldDef, FieldType, RequestValidator, ResourceSchema, SchemaValidator, ValidationResult,
    WriteMode,
};
