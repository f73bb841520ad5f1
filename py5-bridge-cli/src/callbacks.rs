//! Declarative callbacks and hooks
//!
//! Turns the `[[callbacks]]`, `[[hooks]]` and `[[processing]]` sections of a
//! sketch file into user functions and hooks the bridge can run.

use crate::config::{
    Action, CallbackConfig, ErrorConfig, HookConfig, HookPhaseConfig, ProcessingConfig, Scope,
};
use crate::state::HeadlessSketch;
use anyhow::{Context, Result};
use py5_bridge::{
    Bridge, Hook, HookResult, HookStatus, Namespace, NamespaceEntry, ParamKind, ScriptError,
    Signature, Sketch, TerminableHook, TraceFrame, UserFunction, Value,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Build the error a failing callable or hook raises
pub fn script_error(config: &ErrorConfig) -> ScriptError {
    let frames = config
        .traceback
        .iter()
        .map(|frame| {
            let trace = TraceFrame::new(frame.file.clone(), frame.line, frame.function.clone());
            match &frame.source {
                Some(source) => trace.with_source(source.clone()),
                None => trace,
            }
        })
        .collect();
    ScriptError::new(config.error_type.clone(), config.message.clone()).with_traceback(frames)
}

/// Substitute `{frame}` and `{args}` in a message template
fn render_message(template: &str, frame: u64, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    template
        .replace("{frame}", &frame.to_string())
        .replace("{args}", &args)
}

fn callback_function(config: &CallbackConfig, sketch: &Arc<HeadlessSketch>) -> UserFunction {
    let mut signature = Signature::positional(config.params);
    if config.varargs {
        signature = signature.with_param("args", ParamKind::VarPositional);
    }

    let config = config.clone();
    let sketch = Arc::clone(sketch);
    let name = config.name.clone();
    UserFunction::new(name, signature, move |args| {
        let frame = sketch.frame();
        if config.fail_on_frame == Some(frame) {
            return Err(script_error(&config.error));
        }

        let template = config
            .message
            .clone()
            .unwrap_or_else(|| format!("{} frame {{frame}}", config.name));
        match config.action {
            Action::Print => sketch.println(&render_message(&template, frame, args), false),
            Action::Noop => {}
            Action::Fail => return Err(script_error(&config.error)),
            Action::Panic => panic!("{}", render_message(&template, frame, args)),
        }
        Ok(Value::None)
    })
}

/// Build the user namespace declared by `[[callbacks]]`
pub fn build_namespace(callbacks: &[CallbackConfig], sketch: &Arc<HeadlessSketch>) -> Namespace {
    let mut namespace = Namespace::new();
    for callback in callbacks {
        namespace.insert_function(callback_function(callback, sketch));
    }
    namespace
}

/// A hook declared in the sketch file
struct DeclarativeHook {
    config: HookConfig,
    runs: AtomicU64,
    sketch: Arc<HeadlessSketch>,
}

impl TerminableHook for DeclarativeHook {
    fn call(&self, sketch: &dyn Sketch) -> HookResult {
        if let Some(error) = &self.config.error {
            return Err(script_error(error));
        }

        let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = &self.config.message {
            sketch.println(&render_message(message, self.sketch.frame(), &[]), false);
        }

        match self.config.limit {
            Some(limit) if runs >= limit => Ok(HookStatus::Finished),
            _ => Ok(HookStatus::Continue),
        }
    }

    fn sketch_terminated(&self) {
        self.sketch
            .println(&format!("hook {} notified of termination", self.config.name), false);
    }
}

/// Register every `[[hooks]]` entry with the bridge
pub fn install_hooks(bridge: &Bridge, hooks: &[HookConfig], sketch: &Arc<HeadlessSketch>) {
    for config in hooks {
        let declared = DeclarativeHook {
            config: config.clone(),
            runs: AtomicU64::new(0),
            sketch: Arc::clone(sketch),
        };
        let hook = if config.notify_on_terminate {
            Hook::terminable(declared)
        } else {
            let declared = Arc::new(declared);
            Hook::plain(move |sketch| declared.call(sketch))
        };

        match config.phase {
            HookPhaseConfig::Pre => bridge.add_pre_hook(&config.method, &config.name, hook),
            HookPhaseConfig::Post => bridge.add_post_hook(&config.method, &config.name, hook),
        }
    }
}

/// Insert `function` at a dotted path, creating nested namespaces
fn insert_path(namespace: &mut Namespace, segments: &[&str], function: UserFunction) {
    match segments {
        [] => {}
        [last] => namespace.insert(*last, function),
        [head, rest @ ..] => {
            let mut child = match namespace.remove(head) {
                Some(NamespaceEntry::Module(module)) => module,
                _ => Namespace::new(),
            };
            insert_path(&mut child, rest, function);
            namespace.insert(*head, child);
        }
    }
}

fn processing_function(config: &ProcessingConfig) -> Result<UserFunction> {
    let returns: Value = serde_json::from_value(config.returns.clone())
        .with_context(|| format!("Unsupported return value for processing key {}", config.key))?;
    let error = config.error.clone();
    let name = config.key.rsplit('.').next().unwrap_or(&config.key).to_string();

    Ok(UserFunction::new(
        name,
        Signature::positional(0).with_param("args", ParamKind::VarPositional),
        move |_| match &error {
            Some(error) => Err(script_error(error)),
            None => Ok(returns.clone()),
        },
    ))
}

/// Register `[[processing]]` entries in their scopes
pub fn install_processing(bridge: &Bridge, entries: &[ProcessingConfig]) -> Result<()> {
    let mut processing = Namespace::new();
    let mut locals = Namespace::new();
    let mut globals = Namespace::new();
    let mut once = BTreeSet::new();

    for entry in entries {
        let function = processing_function(entry)?;
        let segments: Vec<&str> = entry.key.split('.').collect();
        let target = match entry.scope {
            Scope::Processing => &mut processing,
            Scope::Locals => &mut locals,
            Scope::Globals => &mut globals,
        };
        insert_path(target, &segments, function);
        if entry.once {
            once.insert(entry.key.clone());
        }
    }

    for (key, entry) in processing.iter() {
        bridge.register_processing_key(key, entry.clone(), once.contains(key));
    }
    bridge.set_caller_locals_globals(locals, globals);
    Ok(())
}
