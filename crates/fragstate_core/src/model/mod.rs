//! Value model shared by the state store and its strategies.
//!
//! # Responsibility
//! - Define identities, attribute schema metadata and shaped values.
//! - Define the lifecycle state machine applied to every identity.
//!
//! # Invariants
//! - Every record and fragment is addressed by a stable `Identity`.
//! - Attribute kinds are fixed per (type, key) by the schema.

pub mod identity;
pub mod lifecycle;
pub mod schema;
pub mod value;
