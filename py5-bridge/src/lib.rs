//! py5 Callback Bridge Library
//!
//! The layer between a host graphics runtime and user sketch code. The host
//! drives an animation loop and calls named callbacks (`setup`, `draw`,
//! `mouse_pressed`, ...); the bridge finds the user's implementation, runs
//! the registered pre/post hooks around it, marshals values across the
//! boundary and turns any failure into a readable report.
//!
//! # Architecture
//!
//! - Callback registry filtered by a closed vocabulary of names and arities
//! - Pre/post hook tables with termination notification
//! - Fail-fast dispatch: one failing callback terminates the sketch
//! - Processing-mode calls by dotted string key, with call-once keys
//! - Exception diagnostics with framework frames pruned from tracebacks
//! - Worker threads (one-shot, promise, repeating) sharing the diagnostics
//!
//! The library does NOT render anything or own an event loop. The host (or
//! the `py5-bridge` CLI, in headless mode) does.
//!
//! # Example Usage
//!
//! ```no_run
//! use py5_bridge::{Bridge, Hook, HookStatus, Namespace, Sketch, UserFunction, Value};
//! use std::sync::Arc;
//!
//! struct Console;
//!
//! impl Sketch for Console {
//!     fn println(&self, text: &str, stderr: bool) {
//!         if stderr { eprintln!("{}", text) } else { println!("{}", text) }
//!     }
//!     fn terminate_sketch(&self) {
//!         eprintln!("sketch terminated");
//!     }
//! }
//!
//! let namespace = Namespace::new()
//!     .with("setup", UserFunction::positional("setup", 0, |_| Ok(Value::None)))
//!     .with("draw", UserFunction::positional("draw", 0, |_| Ok(Value::None)));
//!
//! let bridge = Bridge::new(Arc::new(Console));
//! bridge.load_namespace(&namespace).unwrap();
//! bridge.add_pre_hook("draw", "clear", Hook::plain(|_| Ok(HookStatus::Continue)));
//!
//! bridge.run_method("setup", &[]);
//! for _ in 0..60 {
//!     if !bridge.run_method("draw", &[]) {
//!         break;
//!     }
//! }
//! bridge.shutdown();
//! ```

// Public modules
pub mod bridge;
pub mod config;
pub mod diagnostics;
pub mod functions;
pub mod hooks;
pub mod marshal;
pub mod processing;
pub mod sketch;
pub mod threads;
pub mod types;

// Re-export main types for convenience
pub use bridge::{Bridge, DispatchOutcome};
pub use config::BridgeConfig;
pub use diagnostics::{
    type_error_handler, Diagnostics, ExceptionMsg, FrameInfo, LastException, SignatureTable,
};
pub use functions::{
    extract_user_functions, ArityTable, ExtractedFunctions, FunctionRegistry, FunctionStats,
    Namespace, NamespaceEntry, ParamKind, Signature, UserFunction,
};
pub use hooks::{Hook, HookPhase, HookResult, HookStatus, TerminableHook};
pub use marshal::{StandardConverter, ValueConverter};
pub use processing::{CallError, CallerScopes, ProcessingModeRegistry};
pub use sketch::Sketch;
pub use threads::{Promise, ThreadRegistry};
pub use types::{BridgeError, HostValue, Result, ScriptError, ScriptResult, TraceFrame, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
