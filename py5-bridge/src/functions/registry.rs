//! Callback registry and arity filter
//!
//! Holds the user functions the host runtime may invoke, keyed by callback
//! name, together with the positional-argument count each was accepted with.

use super::namespace::Namespace;
use super::profile::{FunctionStats, Profiler};
use super::signature::UserFunction;
use super::vocabulary::ArityTable;
use crate::types::{BridgeError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Functions and arities selected from a namespace
#[derive(Debug, Clone, Default)]
pub struct ExtractedFunctions {
    /// Callback name -> callable
    pub functions: BTreeMap<String, UserFunction>,
    /// Callback name -> accepted positional-argument count
    pub param_counts: BTreeMap<String, usize>,
}

/// Select the recognized callbacks from a user namespace
///
/// An entry is kept only if the name is in `allowed`, it is bound to a
/// callable, the callable's parameters are all positional, and their count is
/// one of the name's accepted arities. Anything else is skipped silently.
pub fn extract_user_functions(namespace: &Namespace, allowed: &ArityTable) -> ExtractedFunctions {
    let mut extracted = ExtractedFunctions::default();

    for (name, arities) in allowed.iter() {
        let Some(function) = namespace.get(name).and_then(|e| e.as_function()) else {
            continue;
        };

        match function.signature().positional_count() {
            Some(count) if arities.contains(&count) => {
                extracted.functions.insert(name.to_string(), function.clone());
                extracted.param_counts.insert(name.to_string(), count);
            }
            Some(count) => {
                log::debug!(
                    "Skipping {}: {} positional parameters, accepted {:?}",
                    name,
                    count,
                    arities
                );
            }
            None => {
                log::debug!("Skipping {}: signature is not purely positional", name);
            }
        }
    }

    extracted
}

/// Registry of user callbacks
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, UserFunction>,
    param_counts: BTreeMap<String, usize>,
    profiler: Profiler,
    /// Names whose registered callable is already wrapped with timing
    profiled: BTreeSet<String>,
}

/// Records one call's timing when dropped, so unwinding calls are counted too
struct CallTimer<'a> {
    profiler: &'a Profiler,
    label: &'a str,
    start: Instant,
}

impl Drop for CallTimer<'_> {
    fn drop(&mut self) {
        self.profiler.record(self.label, self.start.elapsed());
    }
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents
    ///
    /// On error the previous contents are kept.
    pub fn set_functions(
        &mut self,
        functions: BTreeMap<String, UserFunction>,
        param_counts: &BTreeMap<String, usize>,
    ) -> Result<()> {
        let resolved = self.resolve(functions, param_counts, false)?;
        self.functions.clear();
        self.param_counts.clear();
        self.profiled.clear();
        self.commit(resolved);
        Ok(())
    }

    /// Merge entries into the registry
    ///
    /// `settings` without a supplied arity falls back to the arity of `setup`,
    /// looked up first in `param_counts` and then in the registry itself.
    /// Any other entry without an arity is rejected before anything is merged.
    pub fn add_functions(
        &mut self,
        functions: BTreeMap<String, UserFunction>,
        param_counts: &BTreeMap<String, usize>,
    ) -> Result<()> {
        let resolved = self.resolve(functions, param_counts, true)?;
        self.commit(resolved);
        Ok(())
    }

    /// Pair every entry with its arity, or fail on the first one without
    fn resolve(
        &self,
        functions: BTreeMap<String, UserFunction>,
        param_counts: &BTreeMap<String, usize>,
        use_registered_setup: bool,
    ) -> Result<Vec<(String, UserFunction, usize)>> {
        let registered_setup = if use_registered_setup {
            self.param_counts.get("setup")
        } else {
            None
        };

        let mut resolved = Vec::with_capacity(functions.len());
        for (name, function) in functions {
            let count = if name == "settings" {
                param_counts
                    .get("settings")
                    .or_else(|| param_counts.get("setup"))
                    .or(registered_setup)
                    .copied()
            } else {
                param_counts.get(&name).copied()
            };
            let count = count.ok_or_else(|| BridgeError::MissingArity(name.clone()))?;
            resolved.push((name, function, count));
        }
        Ok(resolved)
    }

    fn commit(&mut self, resolved: Vec<(String, UserFunction, usize)>) {
        for (name, function, count) in resolved {
            log::debug!("Registering function {} with {} parameter(s)", name, count);
            self.profiled.remove(&name);
            self.functions.insert(name.clone(), function);
            self.param_counts.insert(name, count);
        }
    }

    /// True if a callback is registered under `name`
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// The callable registered under `name`
    pub fn get(&self, name: &str) -> Option<&UserFunction> {
        self.functions.get(name)
    }

    /// Accepted arity recorded for `name`
    pub fn param_count(&self, name: &str) -> Option<usize> {
        self.param_counts.get(name).copied()
    }

    /// Every registered callback as `name:count`
    pub fn function_list(&self) -> Vec<String> {
        self.functions
            .keys()
            .filter_map(|name| {
                self.param_counts
                    .get(name)
                    .map(|count| format!("{}:{}", name, count))
            })
            .collect()
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True if no callback is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Wrap the named functions with call timing
    ///
    /// Names that are already profiled are left as they are.
    pub fn profile_functions<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            if self.profiled.contains(name) {
                continue;
            }
            let function = self
                .functions
                .get(name)
                .ok_or_else(|| BridgeError::FunctionNotFound(name.to_string()))?;

            let profiler = self.profiler.clone();
            let label = name.to_string();
            let timed = function.wrapped(move |inner, args| {
                let _timer = CallTimer {
                    profiler: &profiler,
                    label: &label,
                    start: Instant::now(),
                };
                inner(args)
            });

            log::debug!("Profiling function {}", name);
            self.functions.insert(name.to_string(), timed);
            self.profiled.insert(name.to_string());
        }
        Ok(())
    }

    /// Timings recorded for profiled functions
    pub fn profile_stats(&self) -> BTreeMap<String, FunctionStats> {
        self.profiler.snapshot()
    }

    /// Timing table for profiled functions
    pub fn render_stats(&self) -> String {
        self.profiler.render()
    }
}
