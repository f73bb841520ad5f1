//! Explicit namespaces of user code
//!
//! A namespace is what the bridge scans for callbacks at sketch startup and
//! what the processing-mode path walks with dotted keys. Nested namespaces
//! are registered explicitly; nothing is discovered by reflection.

use super::signature::UserFunction;
use crate::types::Value;
use std::collections::BTreeMap;

/// One entry bound to an identifier in a namespace
#[derive(Debug, Clone)]
pub enum NamespaceEntry {
    /// A callable
    Function(UserFunction),
    /// A nested namespace (module or inspectable object)
    Module(Namespace),
    /// A plain value that cannot be called or walked into
    Value(Value),
}

impl NamespaceEntry {
    /// The callable, if this entry is one
    pub fn as_function(&self) -> Option<&UserFunction> {
        match self {
            NamespaceEntry::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The nested namespace, if this entry is one
    pub fn as_module(&self) -> Option<&Namespace> {
        match self {
            NamespaceEntry::Module(ns) => Some(ns),
            _ => None,
        }
    }
}

impl From<UserFunction> for NamespaceEntry {
    fn from(f: UserFunction) -> Self {
        NamespaceEntry::Function(f)
    }
}

impl From<Namespace> for NamespaceEntry {
    fn from(ns: Namespace) -> Self {
        NamespaceEntry::Module(ns)
    }
}

impl From<Value> for NamespaceEntry {
    fn from(v: Value) -> Self {
        NamespaceEntry::Value(v)
    }
}

/// Identifier -> entry mapping
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: BTreeMap<String, NamespaceEntry>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an entry, replacing any previous binding
    pub fn insert(&mut self, name: impl Into<String>, entry: impl Into<NamespaceEntry>) {
        self.entries.insert(name.into(), entry.into());
    }

    /// Bind a function under its own name
    pub fn insert_function(&mut self, function: UserFunction) {
        self.entries
            .insert(function.name().to_string(), NamespaceEntry::Function(function));
    }

    /// Builder method: bind an entry
    pub fn with(mut self, name: impl Into<String>, entry: impl Into<NamespaceEntry>) -> Self {
        self.insert(name, entry);
        self
    }

    /// Look up an identifier
    pub fn get(&self, name: &str) -> Option<&NamespaceEntry> {
        self.entries.get(name)
    }

    /// Remove a binding
    pub fn remove(&mut self, name: &str) -> Option<NamespaceEntry> {
        self.entries.remove(name)
    }

    /// True if the identifier is bound
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over bindings in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NamespaceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
