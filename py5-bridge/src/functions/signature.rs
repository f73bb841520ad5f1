//! User callables and their declared signatures

use crate::types::{ScriptError, ScriptResult, Value};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// How a declared parameter may be supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Positional only (`def f(a, /)`)
    PositionalOnly,
    /// Positional or keyword (`def f(a)`)
    PositionalOrKeyword,
    /// Variadic positional catch-all (`*args`)
    VarPositional,
    /// Keyword only (`def f(*, a)`)
    KeywordOnly,
    /// Variadic keyword catch-all (`**kwargs`)
    VarKeyword,
}

impl ParamKind {
    /// True for parameters that are filled from positional arguments one by one
    pub fn is_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter kind
    pub kind: ParamKind,
}

impl Param {
    /// Create a parameter
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// The declared parameter list of a user callable
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Create a signature from an ordered parameter list
    pub fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    /// Signature with `count` plain positional parameters (`arg0`, `arg1`, ...)
    pub fn positional(count: usize) -> Self {
        Self {
            params: (0..count)
                .map(|i| Param::new(format!("arg{}", i), ParamKind::PositionalOrKeyword))
                .collect(),
        }
    }

    /// Builder method: append a parameter
    pub fn with_param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param::new(name, kind));
        self
    }

    /// All declared parameters in order
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of positional parameters, or `None` if the signature contains
    /// any variadic or keyword-only parameter
    pub fn positional_count(&self) -> Option<usize> {
        if self.params.iter().all(|p| p.kind.is_positional()) {
            Some(self.params.len())
        } else {
            None
        }
    }
}

/// Body of a user callable
pub type CallableFn = dyn Fn(&[Value]) -> ScriptResult<Value> + Send + Sync;

/// A user-supplied function that can be registered with the bridge
#[derive(Clone)]
pub struct UserFunction {
    name: String,
    signature: Signature,
    body: Arc<CallableFn>,
}

impl UserFunction {
    /// Create a user function with an explicit signature
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Arc::new(body),
        }
    }

    /// Create a user function taking `count` positional parameters
    pub fn positional<F>(name: impl Into<String>, count: usize, body: F) -> Self
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        Self::new(name, Signature::positional(count), body)
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invoke the function; a panic in the body becomes a `Panic` script error
    pub fn call(&self, args: &[Value]) -> ScriptResult<Value> {
        match catch_unwind(AssertUnwindSafe(|| (self.body)(args))) {
            Ok(result) => result,
            Err(payload) => Err(ScriptError::from_panic(payload)),
        }
    }

    /// Wrap the body, keeping name and signature
    pub(crate) fn wrapped<W>(&self, wrapper: W) -> Self
    where
        W: Fn(&CallableFn, &[Value]) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.body);
        Self {
            name: self.name.clone(),
            signature: self.signature.clone(),
            body: Arc::new(move |args: &[Value]| wrapper(inner.as_ref(), args)),
        }
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
