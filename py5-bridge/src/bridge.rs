//! The bridge between the host graphics runtime and user code
//!
//! This module provides the primary interface for the library. The host
//! calls `run_method` once per callback (one `draw` per frame, plus input
//! events), `call_function` for string-keyed processing-mode callbacks and
//! `shutdown` once at end of life. Everything else is registration.

use crate::config::BridgeConfig;
use crate::diagnostics::{Diagnostics, ExceptionMsg, LastException};
use crate::functions::{
    extract_user_functions, ArityTable, FunctionRegistry, FunctionStats, Namespace, NamespaceEntry,
    UserFunction,
};
use crate::hooks::{Hook, HookPhase, HookStatus, HookTable};
use crate::marshal::{StandardConverter, ValueConverter};
use crate::processing::{resolve_key, CallError, CallerScopes, ProcessingModeRegistry};
use crate::sketch::Sketch;
use crate::threads::ThreadRegistry;
use crate::types::{HostValue, Result, ScriptError, ScriptResult};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Hooks and the user callable all completed
    Ran,
    /// No callable is registered under the name; nothing was run
    NotRegistered,
    /// Something raised; the error was diagnosed and the sketch asked to terminate
    Faulted,
}

impl DispatchOutcome {
    /// False only for `Faulted`
    pub fn succeeded(self) -> bool {
        !matches!(self, DispatchOutcome::Faulted)
    }
}

/// Hook tables and the terminated flag, guarded together
#[derive(Debug, Default)]
struct HookState {
    pre: HookTable,
    post: HookTable,
    terminated: bool,
}

impl HookState {
    fn table(&self, phase: HookPhase) -> &HookTable {
        match phase {
            HookPhase::Pre => &self.pre,
            HookPhase::Post => &self.post,
        }
    }

    fn table_mut(&mut self, phase: HookPhase) -> &mut HookTable {
        match phase {
            HookPhase::Pre => &mut self.pre,
            HookPhase::Post => &mut self.post,
        }
    }

    fn drain(&mut self) -> Vec<(String, String, Hook)> {
        let mut drained = self.pre.drain();
        drained.extend(self.post.drain());
        drained
    }
}

/// Clears the current-running-method marker when dropped
struct RunningMethod<'a> {
    slot: &'a Mutex<Option<String>>,
}

impl<'a> RunningMethod<'a> {
    fn enter(slot: &'a Mutex<Option<String>>, method_name: &str) -> Self {
        *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(method_name.to_string());
        Self { slot }
    }
}

impl Drop for RunningMethod<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// The callback bridge owned by one sketch
pub struct Bridge {
    sketch: Arc<dyn Sketch>,
    arities: ArityTable,
    functions: Mutex<FunctionRegistry>,
    hooks: Mutex<HookState>,
    current_method: Mutex<Option<String>>,
    processing: ProcessingModeRegistry,
    scopes: Mutex<CallerScopes>,
    diagnostics: Arc<Diagnostics>,
    threads: ThreadRegistry,
    converter: Box<dyn ValueConverter>,
}

impl Bridge {
    /// Create a bridge for `sketch` with the default configuration
    pub fn new(sketch: Arc<dyn Sketch>) -> Self {
        Self::build(sketch, BridgeConfig::default())
    }

    /// Create a bridge with a custom configuration
    ///
    /// # Example
    /// ```no_run
    /// use py5_bridge::{Bridge, BridgeConfig, Sketch};
    /// use std::sync::Arc;
    ///
    /// struct Console;
    ///
    /// impl Sketch for Console {
    ///     fn println(&self, text: &str, stderr: bool) {
    ///         if stderr { eprintln!("{}", text) } else { println!("{}", text) }
    ///     }
    ///     fn terminate_sketch(&self) {}
    /// }
    ///
    /// let config = BridgeConfig::new().with_framework_dir("/usr/lib/python3/site-packages/py5");
    /// let bridge = Bridge::with_config(Arc::new(Console), config).unwrap();
    /// assert!(bridge.get_function_list().is_empty());
    /// ```
    pub fn with_config(sketch: Arc<dyn Sketch>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(sketch, config))
    }

    fn build(sketch: Arc<dyn Sketch>, config: BridgeConfig) -> Self {
        let diagnostics = Arc::new(Diagnostics::new(config));
        let threads = ThreadRegistry::new(Arc::clone(&sketch), Arc::clone(&diagnostics));
        Self {
            sketch,
            arities: ArityTable::standard(),
            functions: Mutex::new(FunctionRegistry::new()),
            hooks: Mutex::new(HookState::default()),
            current_method: Mutex::new(None),
            processing: ProcessingModeRegistry::new(),
            scopes: Mutex::new(CallerScopes::default()),
            diagnostics,
            threads,
            converter: Box::new(StandardConverter),
        }
    }

    /// Use a different value converter
    pub fn with_converter(mut self, converter: impl ValueConverter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    /// Use a different callback vocabulary for `load_namespace`
    pub fn with_arity_table(mut self, arities: ArityTable) -> Self {
        self.arities = arities;
        self
    }

    /// The owning sketch
    pub fn sketch(&self) -> &Arc<dyn Sketch> {
        &self.sketch
    }

    /// The diagnostics context shared with worker threads
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// Worker threads launched on behalf of the sketch
    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    // ------------------------------------------------------------------
    // Callback registry
    // ------------------------------------------------------------------

    /// Scan a user namespace and replace the registry with its callbacks
    ///
    /// Entries that are not recognized callbacks, or whose signature does not
    /// fit, are skipped silently.
    pub fn load_namespace(&self, namespace: &Namespace) -> Result<()> {
        let extracted = extract_user_functions(namespace, &self.arities);
        log::info!(
            "Loaded {} callback(s) from a namespace of {} entries",
            extracted.functions.len(),
            namespace.len()
        );
        self.set_functions(extracted.functions, &extracted.param_counts)
    }

    /// Replace the registry contents; on error the previous contents are kept
    pub fn set_functions(
        &self,
        functions: BTreeMap<String, UserFunction>,
        param_counts: &BTreeMap<String, usize>,
    ) -> Result<()> {
        self.lock_functions().set_functions(functions, param_counts)
    }

    /// Merge entries into the registry
    ///
    /// # Arguments
    /// * `functions` - Callback name to callable
    /// * `param_counts` - Callback name to arity; `settings` may fall back to `setup`
    ///
    /// # Returns
    /// * `Result<()>` - Err(MissingArity) if an entry has no arity; nothing is merged then
    pub fn add_functions(
        &self,
        functions: BTreeMap<String, UserFunction>,
        param_counts: &BTreeMap<String, usize>,
    ) -> Result<()> {
        self.lock_functions().add_functions(functions, param_counts)
    }

    /// True if a callback is registered under `name`
    pub fn has_function(&self, name: &str) -> bool {
        self.lock_functions().has_function(name)
    }

    /// Every registered callback as `name:count`
    pub fn get_function_list(&self) -> Vec<String> {
        self.lock_functions().function_list()
    }

    /// Time the named callbacks from now on
    pub fn profile_functions<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        self.lock_functions().profile_functions(names)
    }

    /// Timings of profiled callbacks
    pub fn profile_stats(&self) -> BTreeMap<String, FunctionStats> {
        self.lock_functions().profile_stats()
    }

    /// Print the profiling table through the sketch
    pub fn dump_stats(&self) {
        let table = self.lock_functions().render_stats();
        self.sketch.println(&table, false);
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    /// Run `hook` before every call of `method_name`
    ///
    /// After termination the hook is not stored; a terminable hook is
    /// notified immediately instead.
    pub fn add_pre_hook(&self, method_name: &str, hook_name: &str, hook: Hook) {
        self.add_hook(HookPhase::Pre, method_name, hook_name, hook);
    }

    /// Run `hook` after every successful call of `method_name`
    pub fn add_post_hook(&self, method_name: &str, hook_name: &str, hook: Hook) {
        self.add_hook(HookPhase::Post, method_name, hook_name, hook);
    }

    /// Add several pre-hooks in order
    pub fn add_pre_hooks(&self, hooks: impl IntoIterator<Item = (String, String, Hook)>) {
        for (method_name, hook_name, hook) in hooks {
            self.add_pre_hook(&method_name, &hook_name, hook);
        }
    }

    /// Add several post-hooks in order
    pub fn add_post_hooks(&self, hooks: impl IntoIterator<Item = (String, String, Hook)>) {
        for (method_name, hook_name, hook) in hooks {
            self.add_post_hook(&method_name, &hook_name, hook);
        }
    }

    /// Remove a pre-hook; absent hooks are ignored and nobody is notified
    pub fn remove_pre_hook(&self, method_name: &str, hook_name: &str) {
        self.remove_hook(HookPhase::Pre, method_name, hook_name);
    }

    /// Remove a post-hook
    pub fn remove_post_hook(&self, method_name: &str, hook_name: &str) {
        self.remove_hook(HookPhase::Post, method_name, hook_name);
    }

    /// Remove several pre-hooks given as (method name, hook name)
    pub fn remove_pre_hooks(&self, hooks: impl IntoIterator<Item = (String, String)>) {
        for (method_name, hook_name) in hooks {
            self.remove_pre_hook(&method_name, &hook_name);
        }
    }

    /// Remove several post-hooks
    pub fn remove_post_hooks(&self, hooks: impl IntoIterator<Item = (String, String)>) {
        for (method_name, hook_name) in hooks {
            self.remove_post_hook(&method_name, &hook_name);
        }
    }

    /// True if the hook is registered
    pub fn has_hook(&self, phase: HookPhase, method_name: &str, hook_name: &str) -> bool {
        self.lock_hooks().table(phase).contains(method_name, hook_name)
    }

    /// Hook names registered for a callback, in execution order
    pub fn hook_names(&self, phase: HookPhase, method_name: &str) -> Vec<String> {
        self.lock_hooks().table(phase).hook_names(method_name)
    }

    /// Number of hooks in both tables
    pub fn hook_count(&self) -> usize {
        let state = self.lock_hooks();
        state.pre.len() + state.post.len()
    }

    /// Remove every hook, notifying the terminable ones
    ///
    /// Notifications run after the tables are emptied and the lock is
    /// released, so a hook may touch the bridge from its notification.
    pub fn terminate_hooks(&self) {
        let drained = self.lock_hooks().drain();
        Self::notify_drained(drained);
    }

    /// True once `shutdown` has run
    pub fn is_terminated(&self) -> bool {
        self.lock_hooks().terminated
    }

    fn add_hook(&self, phase: HookPhase, method_name: &str, hook_name: &str, hook: Hook) {
        let mut state = self.lock_hooks();
        if state.terminated {
            drop(state);
            log::debug!("Sketch already terminated, not adding {} hook {}", phase, hook_name);
            hook.notify_terminated();
            return;
        }
        state.table_mut(phase).insert(method_name, hook_name, hook);
        log::debug!("Added {} hook {} for {}", phase, hook_name, method_name);
    }

    fn remove_hook(&self, phase: HookPhase, method_name: &str, hook_name: &str) {
        if self
            .lock_hooks()
            .table_mut(phase)
            .remove(method_name, hook_name)
            .is_some()
        {
            log::debug!("Removed {} hook {} for {}", phase, hook_name, method_name);
        }
    }

    fn notify_drained(drained: Vec<(String, String, Hook)>) {
        for (method_name, hook_name, hook) in drained {
            if hook.notify_terminated() {
                log::debug!("Notified hook {} for {} of termination", hook_name, method_name);
            }
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Run a callback with its hooks
    ///
    /// Returns false only if something raised; the error has then been
    /// reported and the sketch asked to terminate. Calling a callback that is
    /// not registered does nothing and succeeds.
    pub fn run_method(&self, method_name: &str, params: &[HostValue]) -> bool {
        self.dispatch(method_name, params).succeeded()
    }

    /// Run a callback with its hooks and report how it went
    pub fn dispatch(&self, method_name: &str, params: &[HostValue]) -> DispatchOutcome {
        let Some(function) = self.lock_functions().get(method_name).cloned() else {
            return DispatchOutcome::NotRegistered;
        };

        let _running = RunningMethod::enter(&self.current_method, method_name);
        log::trace!("Dispatching {}", method_name);

        match self.invoke(method_name, &function, params) {
            Ok(()) => DispatchOutcome::Ran,
            Err(error) => {
                log::error!("Callback {} failed: {}", method_name, error);
                self.report_error(&error);
                self.sketch.terminate_sketch();
                DispatchOutcome::Faulted
            }
        }
    }

    /// The callback currently being dispatched, if any
    pub fn current_running_method(&self) -> Option<String> {
        self.current_method
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn invoke(&self, method_name: &str, function: &UserFunction, params: &[HostValue]) -> ScriptResult<()> {
        self.run_hooks(HookPhase::Pre, method_name)?;
        let args = self.converter.to_native(params)?;
        function.call(&args)?;
        self.run_hooks(HookPhase::Post, method_name)
    }

    fn run_hooks(&self, phase: HookPhase, method_name: &str) -> ScriptResult<()> {
        let snapshot = self.lock_hooks().table(phase).snapshot(method_name);
        for (hook_name, hook) in snapshot {
            if hook.invoke(self.sketch.as_ref())? == HookStatus::Finished {
                self.lock_hooks().table_mut(phase).remove(method_name, &hook_name);
                log::debug!("{} hook {} for {} finished", phase, hook_name, method_name);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Processing mode
    // ------------------------------------------------------------------

    /// Register a processing-mode key
    pub fn register_processing_key(&self, key: &str, entry: impl Into<NamespaceEntry>, callback_once: bool) {
        self.processing.register_key(key, entry, callback_once);
    }

    /// The processing-mode registry
    pub fn processing(&self) -> &ProcessingModeRegistry {
        &self.processing
    }

    /// Set the caller scopes searched after the processing-mode registry
    pub fn set_caller_locals_globals(&self, locals: Namespace, globals: Namespace) {
        *self.scopes.lock().unwrap_or_else(|e| e.into_inner()) = CallerScopes { locals, globals };
    }

    /// Call a callable by dotted key
    ///
    /// Lookup and invocation failures are returned to the caller; an
    /// invocation failure is also reported, but never terminates the sketch.
    ///
    /// Lookup, invocation and call-once deregistration are separate steps and
    /// no lock is held across the call. Two threads calling the same call-once
    /// key at the same time may both run it; callers that need exactly-once
    /// delivery must serialize their calls.
    pub fn call_function(&self, key: &str, params: &[HostValue]) -> std::result::Result<HostValue, CallError> {
        let function = {
            let processing = self.processing.snapshot();
            let scopes = self.scopes.lock().unwrap_or_else(|e| e.into_inner());
            resolve_key(key, &processing, &scopes)?
        };

        let result = self
            .converter
            .to_native(params)
            .and_then(|args| function.call(&args))
            .and_then(|value| self.converter.to_host(value));

        match result {
            Ok(value) => {
                self.processing.complete_call(key);
                Ok(value)
            }
            Err(error) => {
                log::warn!("Processing-mode call {} failed: {}", key, error);
                self.report_error(&error);
                Err(CallError::Invocation {
                    key: key.to_string(),
                    message: error.to_string(),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Host contract
    // ------------------------------------------------------------------

    /// Print through the sketch's output routine
    pub fn py5_println(&self, text: &str, stderr: bool) {
        self.sketch.println(text, stderr);
    }

    /// Ask the sketch to stop running
    pub fn terminate_sketch(&self) {
        self.sketch.terminate_sketch();
    }

    /// End-of-life sequence
    ///
    /// Stops worker threads without waiting, runs the sketch's own shutdown,
    /// then marks the bridge terminated and drains every hook. A failing
    /// sketch shutdown is reported and does not stop the hook draining.
    pub fn shutdown(&self) {
        log::info!("Shutting down bridge");
        self.threads.stop_all_threads(false);

        let result = catch_unwind(AssertUnwindSafe(|| self.sketch.shutdown()))
            .unwrap_or_else(|payload| Err(ScriptError::from_panic(payload)));
        if let Err(error) = result {
            log::warn!("Sketch shutdown failed: {}", error);
            self.sketch
                .println(&format!("exception in sketch shutdown sequence: {}", error), true);
        }

        let drained = {
            let mut state = self.lock_hooks();
            state.terminated = true;
            state.drain()
        };
        log::debug!("Draining {} hook(s)", drained.len());
        Self::notify_drained(drained);
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Register a friendly message for an exception type
    pub fn register_exception_msg(&self, type_name: &str, msg: impl Into<ExceptionMsg>) {
        self.diagnostics.register_exception_msg(type_name, msg);
    }

    /// The most recently reported error
    pub fn last_exception(&self) -> Option<LastException> {
        self.diagnostics.last_exception()
    }

    /// Report an error through the sketch's error stream
    pub fn report_error(&self, error: &ScriptError) -> String {
        self.diagnostics
            .handle_exception(&|text: &str, stderr: bool| self.sketch.println(text, stderr), error)
    }

    fn lock_functions(&self) -> MutexGuard<'_, FunctionRegistry> {
        self.functions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_hooks(&self) -> MutexGuard<'_, HookState> {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
