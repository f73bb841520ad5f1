//! Processing-mode callables addressed by dotted string keys
//!
//! The host can call back into user code with a key such as
//! `"tools.export"`. The first segment is resolved against the
//! processing-mode registry, then the caller's locals, then the caller's
//! globals; remaining segments walk nested namespaces. Keys registered as
//! call-once deregister themselves after their first successful call.

use crate::functions::{Namespace, NamespaceEntry, UserFunction};
use std::collections::HashSet;
use std::sync::Mutex;

/// Why a processing-mode call did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("{segment} not found with key {key}")]
    NotFound { key: String, segment: String },

    #[error("{segment} in key {key} does not map to a namespace that can be inspected")]
    NotInspectable { key: String, segment: String },

    #[error("callable {name} not found with key {key}")]
    CallableNotFound { key: String, name: String },

    #[error("{message}")]
    Invocation { key: String, message: String },
}

#[derive(Debug, Default)]
struct ProcessingState {
    keys: Namespace,
    call_once: HashSet<String>,
}

/// Registry of processing-mode keys owned by one bridge
#[derive(Debug, Default)]
pub struct ProcessingModeRegistry {
    state: Mutex<ProcessingState>,
}

impl ProcessingModeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key; `callback_once` makes it deregister after one successful call
    pub fn register_key(&self, key: &str, entry: impl Into<NamespaceEntry>, callback_once: bool) {
        let mut state = self.lock();
        state.keys.insert(key, entry);
        if callback_once {
            state.call_once.insert(key.to_string());
        }
        log::debug!("Registered processing-mode key {} (once: {})", key, callback_once);
    }

    /// Register a function under `key`
    pub fn register_function(&self, key: &str, function: UserFunction, callback_once: bool) {
        self.register_key(key, NamespaceEntry::Function(function), callback_once);
    }

    /// True if the first segment `key` is registered
    pub fn contains(&self, key: &str) -> bool {
        self.lock().keys.contains(key)
    }

    /// True if `key` is still pending as a call-once key
    pub fn is_call_once(&self, key: &str) -> bool {
        self.lock().call_once.contains(key)
    }

    /// Snapshot of the registered keys
    pub(crate) fn snapshot(&self) -> Namespace {
        self.lock().keys.clone()
    }

    /// Deregister `key` if it was registered as call-once
    ///
    /// Returns true if the key was deregistered.
    pub(crate) fn complete_call(&self, key: &str) -> bool {
        let mut state = self.lock();
        if state.call_once.remove(key) {
            state.keys.remove(key);
            log::debug!("Call-once key {} deregistered", key);
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProcessingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Caller scopes consulted after the processing-mode registry
#[derive(Debug, Clone, Default)]
pub struct CallerScopes {
    /// The caller's local variables
    pub locals: Namespace,
    /// The caller's global variables
    pub globals: Namespace,
}

/// Resolve a dotted key to a callable
///
/// Scopes are tried strictly in order: processing-mode keys, locals,
/// globals. The first scope containing the key's first segment wins.
pub fn resolve_key(
    key: &str,
    processing: &Namespace,
    scopes: &CallerScopes,
) -> Result<UserFunction, CallError> {
    let segments: Vec<&str> = key.split('.').collect();
    let (name, hierarchy) = match segments.split_last() {
        Some((last, rest)) => (*last, rest),
        None => (key, &[][..]),
    };
    let first = segments.first().copied().unwrap_or(key);

    let mut scope = if processing.contains(first) {
        processing
    } else if scopes.locals.contains(first) {
        &scopes.locals
    } else if scopes.globals.contains(first) {
        &scopes.globals
    } else {
        return Err(CallError::CallableNotFound {
            key: key.to_string(),
            name: name.to_string(),
        });
    };

    for segment in hierarchy {
        match scope.get(segment) {
            Some(NamespaceEntry::Module(inner)) => scope = inner,
            Some(_) => {
                return Err(CallError::NotInspectable {
                    key: key.to_string(),
                    segment: segment.to_string(),
                })
            }
            None => {
                return Err(CallError::NotFound {
                    key: key.to_string(),
                    segment: segment.to_string(),
                })
            }
        }
    }

    scope
        .get(name)
        .and_then(NamespaceEntry::as_function)
        .cloned()
        .ok_or_else(|| CallError::CallableNotFound {
            key: key.to_string(),
            name: name.to_string(),
        })
}
