//! Typed resource state.
//!
//! The host stores each resource as an untyped JSON object. Reconcilers work
//! on a typed record instead; conversion happens once, at the boundary, in
//! [`crate::resources::ResourceAdapter`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// A typed mirror of one resource's attributes.
pub trait ResourceState:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// The server-assigned id, empty when the resource does not exist.
    fn id(&self) -> &str;

    /// Record the server-assigned id. An empty id marks the resource as gone.
    fn set_id(&mut self, id: String);

    /// Copy the attribute at `path` from `from` into `self`.
    ///
    /// Returns `false` if the path is not a mutable attribute of this record.
    fn copy_attribute(&mut self, from: &Self, path: &str) -> bool;

    /// Whether the resource exists remotely, as far as the state knows.
    fn exists(&self) -> bool {
        !self.id().is_empty()
    }

    /// Forget the remote object.
    fn clear_id(&mut self) {
        self.set_id(String::new());
    }
}

/// Deserialize `null` as the type's default.
///
/// The host sends unknown or unset attributes as `null`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A partial-commit session over a resource's state.
///
/// Only attributes explicitly [`commit`](Self::commit)ted become durable: when
/// the session ends, on success or on an early error return, each committed
/// path is copied from the declared state into the stored state, and every
/// other attribute keeps its pre-call value.
pub struct PartialCommit<'a, S: ResourceState> {
    state: &'a mut S,
    declared: &'a S,
    committed: Vec<String>,
}

impl<'a, S: ResourceState> PartialCommit<'a, S> {
    /// Start a session. `state` holds the stored mirror, `declared` the target values.
    pub fn begin(state: &'a mut S, declared: &'a S) -> Self {
        Self {
            state,
            declared,
            committed: Vec::new(),
        }
    }

    /// The stored state, as it was when the session started.
    pub fn state(&self) -> &S {
        &*self.state
    }

    /// Mark `path` as durably applied.
    pub fn commit(&mut self, path: impl Into<String>) {
        self.committed.push(path.into());
    }

    /// Paths committed so far.
    pub fn committed(&self) -> &[String] {
        &self.committed
    }

    /// End the session, flushing committed paths into the stored state.
    pub fn finish(self) {}
}

impl<S: ResourceState> Drop for PartialCommit<'_, S> {
    fn drop(&mut self) {
        for path in &self.committed {
            if !self.state.copy_attribute(self.declared, path) {
                warn!(path = %path, "ignoring commit of unknown attribute");
            }
        }
        if !self.committed.is_empty() {
            debug!(paths = ?self.committed, "flushed committed attributes");
        }
    }
}
