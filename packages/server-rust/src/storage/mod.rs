//! In-memory state for mocked resources.
//!
//! - [`StatefulResource`]: one independently locked item collection
//! - [`StateStore`]: registry of resources with path dispatch and bulk
//!   reset/clear
//! - [`Observer`]: hooks fired by the bridge for every operation

pub mod config;
pub mod observer;
pub mod path;
pub mod resource;
pub mod store;

pub use config::{ResourceConfig, DEFAULT_ID_FIELD};
pub use observer::{
    noop_observer, CompositeObserver, MetricsObserver, NoopObserver, Observer, TracingObserver,
};
pub use path::{PathMatch, PathParams, PathPattern};
pub use resource::{ResourceInfo, StatefulResource};
pub use store::{StateStore, StoreOverview};
