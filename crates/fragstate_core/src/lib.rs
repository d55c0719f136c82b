//! Fragment-aware attribute state tracking.
//! Canonical, dirty and in-flight state for records and the fragments they own.

pub(crate) mod behavior;
pub mod cache;
pub mod collection;
pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use cache::AttributeCache;
pub use collection::{CollectionView, ItemInput};
pub use config::{ConfigError, LoggingConfig, OrphanPolicy, StoreConfig, StoreOptions};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::identity::{Identity, IdentityRegistry, UuidIdentityRegistry};
pub use model::lifecycle::{LifecycleEvent, LifecycleState};
pub use model::schema::{
    AttributeDefinition, AttributeKind, SchemaError, SchemaRegistry, SchemaSource, TypeSchema,
};
pub use model::value::{AttrValue, CollectionItem, JsonValue, Payload};
pub use service::save_service::{AdapterError, SaveAdapter, SaveOutcome, SaveRequest, SaveService};
pub use store::{
    ChangeNotify, ChangedAttributes, NoopNotify, OwnershipLink, StateStore, StoreError,
    StoreResult, ValidationError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
