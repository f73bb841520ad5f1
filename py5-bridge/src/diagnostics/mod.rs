//! Exception diagnostics
//!
//! Turns a `ScriptError` into the report the user sees: framework frames
//! pruned, friendly message substituted, synthetic startup-script regions cut
//! away, banner prepended. The report is emitted on the error stream and kept
//! as the "last exception" for later inspection.
//!
//! Formatting must never fail harder than the error it reports: a broken
//! message handler is reported separately and the raw message is used.

pub mod messages;
pub mod traceback;

pub use messages::{type_error_handler, ExceptionMsg, MsgHandler, SignatureTable};
pub use traceback::{prune, render, strip_static_code, FrameInfo, PrunedTraceback};

use crate::config::BridgeConfig;
use crate::types::ScriptError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, RwLock};

/// Output routine receiving `(text, stderr)`
pub type Emit<'a> = &'a dyn Fn(&str, bool);

/// The most recently diagnosed error
#[derive(Debug, Clone)]
pub struct LastException {
    /// The error as raised
    pub error: ScriptError,
    /// The rendered report that was emitted
    pub report: String,
    /// When the error was diagnosed
    pub raised_at: DateTime<Utc>,
}

/// Per-bridge diagnostics context
#[derive(Debug)]
pub struct Diagnostics {
    config: BridgeConfig,
    messages: RwLock<HashMap<String, ExceptionMsg>>,
    last: Mutex<Option<LastException>>,
}

impl Diagnostics {
    /// Create a diagnostics context with no registered messages
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            messages: RwLock::new(HashMap::new()),
            last: Mutex::new(None),
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register a friendly message for an exception type (last write wins)
    pub fn register_exception_msg(&self, type_name: &str, msg: impl Into<ExceptionMsg>) {
        let mut messages = self.messages.write().unwrap_or_else(|e| e.into_inner());
        messages.insert(type_name.to_string(), msg.into());
    }

    /// The most recently diagnosed error, if any
    pub fn last_exception(&self) -> Option<LastException> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Diagnose an error, emit the report on the error stream and return it
    pub fn handle_exception(&self, emit: Emit<'_>, error: &ScriptError) -> String {
        let config = &self.config;

        let report = if config.prune_tracebacks {
            let pruned = prune(&error.traceback, config);
            let message = self.exception_msg(emit, &error.type_name, &error.message, &pruned.info);
            let rendered = render(&error.type_name, &message, &pruned.frames, &self.hidden_paths());
            let rendered = strip_static_code(&rendered, &config.static_code_markers);
            format!("{}\n\n{}", config.banner, rendered.trim_start_matches('\n'))
        } else {
            render(&error.type_name, &error.message, &error.traceback, &self.hidden_paths())
        };

        emit(&report, true);
        log::debug!("Diagnosed {}: {}", error.type_name, error.message);

        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(LastException {
            error: error.clone(),
            report: report.clone(),
            raised_at: Utc::now(),
        });

        report
    }

    /// Paths whose source lines are hidden: configured fragments plus the
    /// framework install directories
    fn hidden_paths(&self) -> Vec<String> {
        let mut paths = self.config.suppressed_paths.clone();
        paths.extend(self.config.framework_dirs.iter().cloned());
        paths
    }

    /// Friendly message for an error, falling back to the raw message
    fn exception_msg(&self, emit: Emit<'_>, type_name: &str, raw: &str, info: &[FrameInfo]) -> String {
        let registered = {
            let messages = self.messages.read().unwrap_or_else(|e| e.into_inner());
            messages.get(type_name).cloned()
        };

        match registered {
            None => raw.to_string(),
            Some(ExceptionMsg::Text(text)) => text,
            Some(ExceptionMsg::Handler(handler)) => {
                match catch_unwind(AssertUnwindSafe(|| handler(type_name, raw, info))) {
                    Ok(Ok(msg)) => msg,
                    Ok(Err(e)) => {
                        emit(&format!("error generating exception msg for {}: {}", type_name, e), true);
                        raw.to_string()
                    }
                    Err(payload) => {
                        let panic = ScriptError::from_panic(payload);
                        emit(
                            &format!("error generating exception msg for {}: {}", type_name, panic.message),
                            true,
                        );
                        raw.to_string()
                    }
                }
            }
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TraceFrame;
    use std::cell::RefCell;

    fn diagnostics() -> Diagnostics {
        Diagnostics::new(BridgeConfig::new().with_framework_dir("/site/py5"))
    }

    fn user_error() -> ScriptError {
        ScriptError::new("ZeroDivisionError", "division by zero")
            .with_frame(TraceFrame::new("/site/py5/bridge.py", 200, "run_method"))
            .with_frame(TraceFrame::new("sketch.py", 4, "draw").with_source("x = 1 / 0"))
    }

    #[test]
    fn test_report_has_banner_and_user_frames() {
        let diag = diagnostics();
        let out = RefCell::new(Vec::new());
        let emit = |text: &str, stderr: bool| out.borrow_mut().push((text.to_string(), stderr));

        let report = diag.handle_exception(&emit, &user_error());

        assert!(report.starts_with("py5 encountered an error in your code:\n\n"));
        assert!(report.contains("File \"sketch.py\", line 4, in draw"));
        assert!(!report.contains("bridge.py"));
        assert!(report.ends_with("ZeroDivisionError: division by zero"));

        let out = out.borrow();
        assert_eq!(out.len(), 1);
        assert!(out[0].1);
    }

    #[test]
    fn test_unpruned_report_is_raw() {
        let diag = Diagnostics::new(BridgeConfig::new().with_pruning(false).with_framework_dir("/site/py5"));
        let report = diag.handle_exception(&|_: &str, _: bool| {}, &user_error());
        assert!(!report.starts_with("py5 encountered"));
        assert!(report.contains("bridge.py"));
    }

    #[test]
    fn test_registered_text_message() {
        let diag = diagnostics();
        diag.register_exception_msg("ZeroDivisionError", "you divided by zero");
        let report = diag.handle_exception(&|_: &str, _: bool| {}, &user_error());
        assert!(report.ends_with("ZeroDivisionError: you divided by zero"));
    }

    #[test]
    fn test_failing_handler_falls_back() {
        let diag = diagnostics();
        diag.register_exception_msg(
            "ZeroDivisionError",
            ExceptionMsg::handler(|_, _, _| Err(anyhow::anyhow!("handler bug"))),
        );
        let out = RefCell::new(Vec::new());
        let emit = |text: &str, _stderr: bool| out.borrow_mut().push(text.to_string());

        let report = diag.handle_exception(&emit, &user_error());

        assert!(report.ends_with("ZeroDivisionError: division by zero"));
        let out = out.borrow();
        assert_eq!(out.len(), 2);
        assert!(out[0].contains("error generating exception msg for ZeroDivisionError: handler bug"));
    }

    #[test]
    fn test_panicking_handler_falls_back() {
        let diag = diagnostics();
        diag.register_exception_msg(
            "ZeroDivisionError",
            ExceptionMsg::handler(|_, _, _| panic!("handler exploded")),
        );
        let report = diag.handle_exception(&|_: &str, _: bool| {}, &user_error());
        assert!(report.ends_with("division by zero"));
    }

    #[test]
    fn test_last_exception_recorded() {
        let diag = diagnostics();
        assert!(diag.last_exception().is_none());
        let report = diag.handle_exception(&|_: &str, _: bool| {}, &user_error());
        let last = diag.last_exception().unwrap();
        assert_eq!(last.report, report);
        assert_eq!(last.error.type_name, "ZeroDivisionError");
    }

    #[test]
    fn test_static_code_region_removed() {
        let diag = diagnostics();
        let err = ScriptError::new("NameError", "name 'x' is not defined")
            .with_frame(TraceFrame::new("/tmp/_PY5_STATIC_SETUP_CODE_.py", 12, "<module>"))
            .with_frame(TraceFrame::new("sketch.py", 3, "setup"));
        let report = diag.handle_exception(&|_: &str, _: bool| {}, &err);
        assert!(!report.contains("_PY5_STATIC_SETUP_CODE_"));
        assert!(report.starts_with("py5 encountered an error in your code:\n\n"));
        assert!(report.contains("sketch.py"));
    }
}
