//! Core types for the py5 callback bridge
//!
//! This module defines the values that cross the language boundary, the
//! error raised by user code (`ScriptError`) and the bridge's own error type.
//! User code failures are deliberately kept apart from `BridgeError`: they
//! are diagnosed and reported to the user, never propagated to the host.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Result type returned by user callables and hooks
pub type ScriptResult<T> = std::result::Result<T, ScriptError>;

/// A value on the native (user code) side of the bridge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value
    #[default]
    None,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Text value
    Str(String),
    /// Ordered sequence of values
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's type, used in conversion error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    /// Interpret the value as a float, if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Borrow the value as a string slice, if it is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A value as represented by the host graphics runtime
///
/// The variants mirror the primitive types the host passes through the
/// `run_method` / `call_function` contract.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum HostValue {
    /// Host null reference
    #[default]
    Null,
    /// Host boolean
    Boolean(bool),
    /// 32-bit host integer
    Int(i32),
    /// 64-bit host integer
    Long(i64),
    /// 32-bit host float
    Float(f32),
    /// 64-bit host float
    Double(f64),
    /// Host character
    Char(char),
    /// Host string
    String(String),
    /// Host array
    Array(Vec<HostValue>),
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => HostValue::Int(small),
                        Err(_) => HostValue::Long(i),
                    }
                } else {
                    HostValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from).collect())
            }
            // Objects have no host counterpart in the callback contract
            serde_json::Value::Object(map) => HostValue::String(serde_json::Value::Object(map).to_string()),
        }
    }
}

/// One stack frame of a user-code traceback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Source file path as reported by the scripting runtime
    pub filename: String,
    /// 1-based line number
    pub lineno: u32,
    /// Name of the function executing in this frame
    pub function: String,
    /// Source text of the executing line (if available)
    #[serde(default)]
    pub source: Option<String>,
}

impl TraceFrame {
    /// Create a frame without source text
    pub fn new(filename: impl Into<String>, lineno: u32, function: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            lineno,
            function: function.into(),
            source: None,
        }
    }

    /// Builder method: attach the executing source line
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// An exception raised by user code, a hook or value conversion
///
/// The traceback is ordered outermost call first, innermost (where the
/// exception was raised) last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptError {
    /// Exception type name (e.g. `TypeError`)
    pub type_name: String,
    /// Raw exception message
    pub message: String,
    /// Frames from outermost to innermost
    #[serde(default)]
    pub traceback: Vec<TraceFrame>,
}

impl ScriptError {
    /// Create an error with an empty traceback
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// Builder method: append a frame (innermost so far)
    pub fn with_frame(mut self, frame: TraceFrame) -> Self {
        self.traceback.push(frame);
        self
    }

    /// Builder method: replace the whole traceback
    pub fn with_traceback(mut self, traceback: Vec<TraceFrame>) -> Self {
        self.traceback = traceback;
        self
    }

    /// Convert a caught panic payload into a script error
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self::new("Panic", message)
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Errors produced by the bridge itself (never by user code)
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("No accepted arity recorded for function: {0}")]
    MissingArity(String),

    #[error("Function not registered: {0}")]
    FunctionNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
