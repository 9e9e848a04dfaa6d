//! `ScriptHost` collaborator surface.
//!
//! Script execution semantics are out of scope for the page-lifecycle engine
//! (see the root crate's non-goals); this crate only defines the interface
//! the scheduler consumes and a minimal stand-in implementation for tests
//! and embedding without a real JS engine wired up.

use anyhow::Error;
use std::collections::HashMap;

/// Opaque handle to a page's script context, minted by `ScriptHost::create_context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

/// Result of evaluating a script. Real engines would return a richer value
/// type (objects, promises, ...); the scheduler only ever inspects whether
/// evaluation succeeded, so a string rendering is sufficient here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Value(pub String);

/// An error raised while evaluating script in a context.
#[derive(Debug, thiserror::Error)]
#[error("script runtime error in {context:?}: {message}")]
pub struct RuntimeError {
    pub context: ContextId,
    pub message: String,
}

/// The host surface a page-lifecycle engine needs from a script engine.
///
/// Mirrors spec section 6's `ScriptHost` collaborator exactly:
/// context lifecycle, evaluation, and state (de)serialization for
/// back/forward cache style restores.
pub trait ScriptHost {
    /// Create a new script context for the given page and return its handle.
    fn create_context(&mut self, page_id: u64) -> ContextId;

    /// Tear down a previously created context. Idempotent: destroying an
    /// unknown or already-destroyed context is not an error.
    fn destroy_context(&mut self, context: ContextId);

    /// Evaluate `source` in `context`.
    ///
    /// # Errors
    /// Returns `RuntimeError` if the context is unknown or evaluation fails.
    fn eval(&mut self, context: ContextId, source: &str) -> Result<Value, RuntimeError>;

    /// Serialize a context's live state (closures excluded) for later restore.
    ///
    /// # Errors
    /// Returns an error if the context is unknown.
    fn serialize_state(&self, context: ContextId) -> Result<Vec<u8>, Error>;

    /// Restore a context's state from bytes previously produced by
    /// `serialize_state`.
    ///
    /// # Errors
    /// Returns an error if the context is unknown or the bytes are malformed.
    fn deserialize_state(&mut self, context: ContextId, bytes: &[u8]) -> Result<(), Error>;
}

/// A deterministic `ScriptHost` stand-in used by the scheduler's own test
/// suite and by embedders that have not wired up a real engine yet. It does
/// not execute script; it just tracks context lifetimes and echoes an
/// opaque byte blob through serialize/deserialize so round-trip behavior
/// (spec.md property 8, extended to script state) is exercisable without a
/// real runtime.
#[derive(Debug, Default)]
pub struct StubScriptHost {
    next_id: u64,
    state: HashMap<ContextId, Vec<u8>>,
}

impl StubScriptHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScriptHost for StubScriptHost {
    fn create_context(&mut self, _page_id: u64) -> ContextId {
        let id = ContextId(self.next_id);
        self.next_id += 1;
        self.state.insert(id, Vec::new());
        id
    }

    fn destroy_context(&mut self, context: ContextId) {
        self.state.remove(&context);
    }

    fn eval(&mut self, context: ContextId, source: &str) -> Result<Value, RuntimeError> {
        if self.state.contains_key(&context) {
            Ok(Value(source.to_owned()))
        } else {
            Err(RuntimeError {
                context,
                message: "unknown context".to_owned(),
            })
        }
    }

    fn serialize_state(&self, context: ContextId) -> Result<Vec<u8>, Error> {
        self.state
            .get(&context)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown context {context:?}"))
    }

    fn deserialize_state(&mut self, context: ContextId, bytes: &[u8]) -> Result<(), Error> {
        if self.state.contains_key(&context) {
            self.state.insert(context, bytes.to_vec());
            Ok(())
        } else {
            Err(anyhow::anyhow!("unknown context {context:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fresh context can be created, evaluated against, and destroyed.
    #[test]
    fn context_lifecycle_round_trips() {
        let mut host = StubScriptHost::new();
        let context = host.create_context(1);
        assert!(host.eval(context, "1+1").is_ok());
        host.destroy_context(context);
        assert!(host.eval(context, "1+1").is_err());
    }

    /// Serialized state can be restored into the same context.
    #[test]
    fn state_round_trips() {
        let mut host = StubScriptHost::new();
        let context = host.create_context(1);
        host.deserialize_state(context, b"saved").unwrap_or_default();
        let bytes = host.serialize_state(context).unwrap_or_default();
        assert_eq!(bytes, b"saved");
    }
}
