//! The closed vocabulary of sketch callbacks and their accepted arities

use std::collections::{BTreeMap, BTreeSet};

/// Callback names recognized by the host runtime with their allowed
/// positional-argument counts
const STANDARD_METHODS: &[(&str, &[usize])] = &[
    ("settings", &[0]),
    ("setup", &[0]),
    ("draw", &[0]),
    ("pre_draw", &[0]),
    ("post_draw", &[0]),
    ("predraw_update", &[0]),
    ("key_pressed", &[0, 1]),
    ("key_typed", &[0, 1]),
    ("key_released", &[0, 1]),
    ("mouse_clicked", &[0, 1]),
    ("mouse_dragged", &[0, 1]),
    ("mouse_moved", &[0, 1]),
    ("mouse_entered", &[0, 1]),
    ("mouse_exited", &[0, 1]),
    ("mouse_pressed", &[0, 1]),
    ("mouse_released", &[0, 1]),
    ("mouse_wheel", &[0, 1]),
    ("exiting", &[0]),
    ("window_moved", &[0]),
    ("window_resized", &[0]),
    ("movie_event", &[1]),
];

/// Per-name sets of accepted positional-argument counts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArityTable {
    methods: BTreeMap<String, BTreeSet<usize>>,
}

impl ArityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard sketch callback vocabulary
    pub fn standard() -> Self {
        let mut table = Self::new();
        for (name, arities) in STANDARD_METHODS {
            table.insert(*name, arities.iter().copied());
        }
        table
    }

    /// Register (or replace) the accepted arities for a name
    pub fn insert(&mut self, name: impl Into<String>, arities: impl IntoIterator<Item = usize>) {
        self.methods.insert(name.into(), arities.into_iter().collect());
    }

    /// Builder method: register the accepted arities for a name
    pub fn with(mut self, name: impl Into<String>, arities: impl IntoIterator<Item = usize>) -> Self {
        self.insert(name, arities);
        self
    }

    /// Accepted arities for a name
    pub fn allowed(&self, name: &str) -> Option<&BTreeSet<usize>> {
        self.methods.get(name)
    }

    /// True if `count` is an accepted arity for `name`
    pub fn accepts(&self, name: &str, count: usize) -> bool {
        self.allowed(name).is_some_and(|set| set.contains(&count))
    }

    /// Iterate over names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|k| k.as_str())
    }

    /// Iterate over (name, accepted arities)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<usize>)> {
        self.methods.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_vocabulary() {
        let table = ArityTable::standard();
        assert!(table.accepts("draw", 0));
        assert!(!table.accepts("draw", 1));
        assert!(table.accepts("key_pressed", 0));
        assert!(table.accepts("key_pressed", 1));
        assert!(table.accepts("movie_event", 1));
        assert!(!table.accepts("movie_event", 0));
        assert!(table.allowed("resized").is_none());
    }

    #[test]
    fn test_custom_table() {
        let table = ArityTable::new().with("tick", [0, 2]);
        assert!(table.accepts("tick", 2));
        assert!(!table.accepts("tick", 1));
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["tick"]);
    }
}
