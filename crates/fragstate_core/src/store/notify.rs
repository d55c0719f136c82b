//! Change-notify hook contract.

use crate::model::identity::Identity;

/// Fire-and-forget hook invoked on every externally visible transition.
pub trait ChangeNotify {
    fn notify(&self, identity: Identity, key: &str);
}

impl<F> ChangeNotify for F
where
    F: Fn(Identity, &str),
{
    fn notify(&self, identity: Identity, key: &str) {
        self(identity, key)
    }
}

/// Notifier that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotify;

impl ChangeNotify for NoopNotify {
    fn notify(&self, _identity: Identity, _key: &str) {}
}
