//! Pre/post hook tables
//!
//! Hooks are auxiliary callables run immediately before or after a named user
//! callback. Within one callback name they run in insertion order; a hook
//! name is unique per (phase, callback name) and re-registering it replaces
//! the old hook in place.

use crate::sketch::Sketch;
use crate::types::{ScriptError, ScriptResult};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether a hook stays registered after an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    /// Keep the hook registered
    Continue,
    /// Remove the hook after this invocation (no termination notification)
    Finished,
}

/// Result of one hook invocation
pub type HookResult = ScriptResult<HookStatus>;

/// Body of a plain hook
pub type HookFn = dyn Fn(&dyn Sketch) -> HookResult + Send + Sync;

/// A hook that wants to know when the sketch terminates
pub trait TerminableHook: Send + Sync {
    /// Run the hook against the owning sketch
    fn call(&self, sketch: &dyn Sketch) -> HookResult;

    /// The sketch terminated while this hook was registered (or the hook was
    /// registered after termination)
    fn sketch_terminated(&self);
}

/// A registered hook
#[derive(Clone)]
pub enum Hook {
    /// A plain callable
    Plain(Arc<HookFn>),
    /// A callable with termination notification
    Terminable(Arc<dyn TerminableHook>),
}

impl Hook {
    /// Create a plain hook
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&dyn Sketch) -> HookResult + Send + Sync + 'static,
    {
        Hook::Plain(Arc::new(f))
    }

    /// Create a hook that runs once and then removes itself
    pub fn once<F>(f: F) -> Self
    where
        F: Fn(&dyn Sketch) -> ScriptResult<()> + Send + Sync + 'static,
    {
        let fired = AtomicBool::new(false);
        Hook::plain(move |sketch| {
            if fired.swap(true, Ordering::SeqCst) {
                return Ok(HookStatus::Finished);
            }
            f(sketch)?;
            Ok(HookStatus::Finished)
        })
    }

    /// Create a hook with termination notification
    pub fn terminable<H: TerminableHook + 'static>(hook: H) -> Self {
        Hook::Terminable(Arc::new(hook))
    }

    /// Invoke the hook; a panic becomes a `Panic` script error
    pub fn invoke(&self, sketch: &dyn Sketch) -> HookResult {
        let result = catch_unwind(AssertUnwindSafe(|| match self {
            Hook::Plain(f) => f(sketch),
            Hook::Terminable(h) => h.call(sketch),
        }));
        result.unwrap_or_else(|payload| Err(ScriptError::from_panic(payload)))
    }

    /// Deliver the termination notification if the hook supports it
    ///
    /// Returns true if a notification was delivered.
    pub fn notify_terminated(&self) -> bool {
        match self {
            Hook::Plain(_) => false,
            Hook::Terminable(h) => {
                h.sketch_terminated();
                true
            }
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Plain(_) => write!(f, "Hook::Plain"),
            Hook::Terminable(_) => write!(f, "Hook::Terminable"),
        }
    }
}

/// Which side of the user callback a hook runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Before the user callback
    Pre,
    /// After the user callback
    Post,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Pre => write!(f, "pre"),
            HookPhase::Post => write!(f, "post"),
        }
    }
}

/// One hook table: callback name -> ordered (hook name, hook)
#[derive(Debug, Clone, Default)]
pub struct HookTable {
    methods: HashMap<String, Vec<(String, Hook)>>,
}

impl HookTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a hook, replacing one with the same name in place
    pub fn insert(&mut self, method_name: &str, hook_name: &str, hook: Hook) {
        let hooks = self.methods.entry(method_name.to_string()).or_default();
        if let Some(slot) = hooks.iter_mut().find(|(name, _)| name == hook_name) {
            slot.1 = hook;
        } else {
            hooks.push((hook_name.to_string(), hook));
        }
    }

    /// Remove a hook; absent hooks are ignored
    pub fn remove(&mut self, method_name: &str, hook_name: &str) -> Option<Hook> {
        let hooks = self.methods.get_mut(method_name)?;
        let index = hooks.iter().position(|(name, _)| name == hook_name)?;
        let (_, hook) = hooks.remove(index);
        if hooks.is_empty() {
            self.methods.remove(method_name);
        }
        Some(hook)
    }

    /// True if the hook is registered
    pub fn contains(&self, method_name: &str, hook_name: &str) -> bool {
        self.methods
            .get(method_name)
            .is_some_and(|hooks| hooks.iter().any(|(name, _)| name == hook_name))
    }

    /// Copy of the hooks for one callback, in execution order
    pub fn snapshot(&self, method_name: &str) -> Vec<(String, Hook)> {
        self.methods.get(method_name).cloned().unwrap_or_default()
    }

    /// Hook names for one callback, in execution order
    pub fn hook_names(&self, method_name: &str) -> Vec<String> {
        self.methods
            .get(method_name)
            .map(|hooks| hooks.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Remove and return every hook as (method name, hook name, hook)
    pub fn drain(&mut self) -> Vec<(String, String, Hook)> {
        let mut drained = Vec::new();
        for (method_name, hooks) in self.methods.drain() {
            for (hook_name, hook) in hooks {
                drained.push((method_name.clone(), hook_name, hook));
            }
        }
        drained
    }

    /// Total number of hooks across all callbacks
    pub fn len(&self) -> usize {
        self.methods.values().map(Vec::len).sum()
    }

    /// True if no hook is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continue_hook() -> Hook {
        Hook::plain(|_| Ok(HookStatus::Continue))
    }

    struct Flag(Arc<AtomicBool>);

    impl TerminableHook for Flag {
        fn call(&self, _sketch: &dyn Sketch) -> HookResult {
            Ok(HookStatus::Continue)
        }

        fn sketch_terminated(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_insertion_order_and_replacement() {
        let mut table = HookTable::new();
        table.insert("draw", "a", continue_hook());
        table.insert("draw", "b", continue_hook());
        table.insert("draw", "a", continue_hook());

        assert_eq!(table.hook_names("draw"), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut table = HookTable::new();
        assert!(table.remove("draw", "missing").is_none());
        table.insert("draw", "a", continue_hook());
        assert!(table.remove("draw", "a").is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_drain_empties_table() {
        let mut table = HookTable::new();
        table.insert("draw", "a", continue_hook());
        table.insert("setup", "b", continue_hook());
        assert_eq!(table.drain().len(), 2);
        assert!(table.is_empty());
        assert!(table.drain().is_empty());
    }

    #[test]
    fn test_notify_only_terminable() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!continue_hook().notify_terminated());
        assert!(Hook::terminable(Flag(Arc::clone(&flag))).notify_terminated());
        assert!(flag.load(Ordering::SeqCst));
    }
}
