//! State store error types.

use crate::model::identity::Identity;
use crate::model::schema::{AttributeKind, SchemaError};
use crate::store::ownership::OwnershipLink;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Structural shape violation for one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value shape does not match the attribute kind.
    UnexpectedShape {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// Fragment is of a different type than the attribute declares.
    FragmentType {
        key: String,
        expected: String,
        actual: String,
    },
    /// Payload does not resolve to a fragment type.
    MissingFragmentType {
        key: String,
        type_key: Option<String>,
    },
    /// The same fragment appears twice in one value.
    DuplicateFragment { key: String, fragment: Identity },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedShape {
                key,
                expected,
                actual,
            } => write!(f, "attribute `{key}` expects {expected}, got {actual}"),
            Self::FragmentType {
                key,
                expected,
                actual,
            } => write!(
                f,
                "attribute `{key}` expects fragment type `{expected}`, got `{actual}`"
            ),
            Self::MissingFragmentType {
                key,
                type_key: Some(type_key),
            } => write!(
                f,
                "attribute `{key}` payload must name its fragment type in `{type_key}`"
            ),
            Self::MissingFragmentType {
                key,
                type_key: None,
            } => write!(f, "attribute `{key}` declares no fragment type"),
            Self::DuplicateFragment { key, fragment } => {
                write!(f, "attribute `{key}` holds fragment {fragment} more than once")
            }
        }
    }
}

impl Error for ValidationError {}

/// Errors from state store, collection and ownership operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Validation(ValidationError),
    /// Fragment already belongs to a different owner or key.
    OwnershipViolation {
        fragment: Identity,
        existing: OwnershipLink,
        requested: OwnershipLink,
    },
    /// Attaching the fragment would make it its own ancestor.
    OwnershipCycle { fragment: Identity, owner: Identity },
    /// Operation does not apply to the attribute kind.
    InvalidKind {
        key: String,
        expected: &'static str,
        actual: AttributeKind,
    },
    UnknownIdentity(Identity),
    UnknownType(String),
    UnknownAttribute { type_name: String, key: String },
    /// A commit is already pending for the identity.
    CommitInProgress(Identity),
    IndexOutOfBounds { index: usize, len: usize },
    Schema(SchemaError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::OwnershipViolation {
                fragment,
                existing,
                requested,
            } => write!(
                f,
                "fragment {fragment} is owned by {}.{}; copy it before attaching to {}.{}",
                existing.owner, existing.key, requested.owner, requested.key
            ),
            Self::OwnershipCycle { fragment, owner } => write!(
                f,
                "attaching fragment {fragment} under {owner} would create an ownership cycle"
            ),
            Self::InvalidKind {
                key,
                expected,
                actual,
            } => write!(f, "attribute `{key}` is {actual}, operation requires {expected}"),
            Self::UnknownIdentity(id) => write!(f, "identity not loaded: {id}"),
            Self::UnknownType(name) => write!(f, "type not registered: {name}"),
            Self::UnknownAttribute { type_name, key } => {
                write!(f, "type `{type_name}` has no attribute `{key}`")
            }
            Self::CommitInProgress(id) => write!(f, "commit already in flight for {id}"),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SchemaError> for StoreError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}
