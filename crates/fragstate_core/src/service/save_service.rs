//! Save orchestration service.
//!
//! # Responsibility
//! - Drive one save: `will_commit`, adapter call, then acknowledge or reject.
//! - Keep the external transport behind the `SaveAdapter` trait.
//!
//! # Invariants
//! - Every started commit ends in exactly one of `did_commit` or
//!   `commit_rejected`.
//! - Adapter failures are reported as `SaveOutcome::Rejected`, not as errors.

use crate::cache::AttributeCache;
use crate::model::identity::Identity;
use crate::model::value::Payload;
use crate::store::StoreResult;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Snapshot handed to the adapter for one save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub identity: Identity,
    pub type_name: String,
    /// Deep visible state taken right after `will_commit`.
    pub snapshot: Payload,
}

/// Error reported by an adapter when the server refuses or the transport fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterError {
    pub message: String,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "save adapter failed: {}", self.message)
    }
}

impl Error for AdapterError {}

/// External persistence boundary.
pub trait SaveAdapter {
    /// Persists the request. `Ok(Some(payload))` carries server-normalized data.
    fn save(&mut self, request: &SaveRequest) -> Result<Option<Payload>, AdapterError>;
}

impl<F> SaveAdapter for F
where
    F: FnMut(&SaveRequest) -> Result<Option<Payload>, AdapterError>,
{
    fn save(&mut self, request: &SaveRequest) -> Result<Option<Payload>, AdapterError> {
        self(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Committed,
    Rejected(AdapterError),
}

/// Use-case service wrapping a cache and a save adapter.
pub struct SaveService<C: AttributeCache, A: SaveAdapter> {
    cache: C,
    adapter: A,
}

impl<C: AttributeCache, A: SaveAdapter> SaveService<C, A> {
    pub fn new(cache: C, adapter: A) -> Self {
        Self { cache, adapter }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    pub fn into_parts(self) -> (C, A) {
        (self.cache, self.adapter)
    }

    /// Saves one identity end to end.
    ///
    /// # Errors
    /// - `CommitInProgress` when a save for the identity is already pending.
    /// - Store errors raised while applying the server response. The pending
    ///   commit is rejected first, so the identity can be saved again.
    pub fn save(&mut self, id: Identity) -> StoreResult<SaveOutcome> {
        self.cache.will_commit(id)?;
        let request = SaveRequest {
            identity: id,
            type_name: self.cache.type_of(id)?,
            snapshot: self.cache.current_state(id)?,
        };

        match self.adapter.save(&request) {
            Ok(payload) => {
                if let Err(err) = self.cache.did_commit(id, payload.as_ref()) {
                    self.cache.commit_rejected(id)?;
                    warn!(
                        "event=save_rejected module=service status=error identity={} type={} reason=invalid_response",
                        id, request.type_name
                    );
                    return Err(err);
                }
                info!(
                    "event=save_committed module=service status=ok identity={} type={}",
                    id, request.type_name
                );
                Ok(SaveOutcome::Committed)
            }
            Err(err) => {
                self.cache.commit_rejected(id)?;
                warn!(
                    "event=save_rejected module=service status=error identity={} type={}",
                    id, request.type_name
                );
                Ok(SaveOutcome::Rejected(err))
            }
        }
    }
}
