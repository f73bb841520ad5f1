//! Friendly exception messages
//!
//! Extension code registers a replacement message per exception type name.
//! A replacement is either fixed text or a handler that sees the raw message
//! and the framework frames pruned from the traceback.

use super::traceback::FrameInfo;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Handler computing a message from (type name, raw message, pruned frames)
pub type MsgHandler = dyn Fn(&str, &str, &[FrameInfo]) -> anyhow::Result<String> + Send + Sync;

/// A registered replacement message
#[derive(Clone)]
pub enum ExceptionMsg {
    /// Fixed replacement text
    Text(String),
    /// Message computed from the error and where it occurred
    Handler(Arc<MsgHandler>),
}

impl ExceptionMsg {
    /// Create a handler message
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&str, &str, &[FrameInfo]) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        ExceptionMsg::Handler(Arc::new(f))
    }
}

impl From<&str> for ExceptionMsg {
    fn from(text: &str) -> Self {
        ExceptionMsg::Text(text.to_string())
    }
}

impl From<String> for ExceptionMsg {
    fn from(text: String) -> Self {
        ExceptionMsg::Text(text)
    }
}

impl fmt::Debug for ExceptionMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionMsg::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ExceptionMsg::Handler(_) => write!(f, "Handler"),
        }
    }
}

/// Known call signatures of framework methods, keyed by the framework file
/// (relative path) and function name
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    entries: BTreeMap<(String, String), Vec<String>>,
}

impl SignatureTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the signatures of `function` defined in `file`
    pub fn insert(&mut self, file: &str, function: &str, signatures: Vec<String>) {
        self.entries
            .insert((file.to_string(), function.to_string()), signatures);
    }

    /// Builder method: register signatures
    pub fn with(mut self, file: &str, function: &str, signatures: &[&str]) -> Self {
        self.insert(file, function, signatures.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Signatures for the method executing in a pruned frame
    pub fn lookup(&self, frame: &FrameInfo) -> Option<&[String]> {
        self.entries
            .get(&(frame.path(), frame.function.clone()))
            .map(Vec::as_slice)
    }
}

const OVERLOAD_PREFIX: &str = "No matching overloads found for ";

/// Argument list `(a,b)` of a host "no matching overloads" message
fn overload_args(message: &str) -> Option<&str> {
    let start = message.find(OVERLOAD_PREFIX)? + OVERLOAD_PREFIX.len();
    let rest = &message[start..];
    let name_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(rest.len());
    let args = &rest[name_len..];
    if !args.starts_with('(') {
        return None;
    }
    let close = args.find(')')?;
    Some(&args[..=close])
}

/// Handler that explains host overload mismatches using known signatures
///
/// The innermost pruned frame names the framework method the user called.
/// If the table knows that method, the message lists the accepted
/// signatures; otherwise the raw message is kept.
pub fn type_error_handler(table: SignatureTable) -> ExceptionMsg {
    ExceptionMsg::handler(move |_type_name, raw, info| {
        let Some(frame) = info.last() else {
            return Ok(raw.to_string());
        };
        let Some(signatures) = table.lookup(frame) else {
            return Ok(raw.to_string());
        };

        let fname = &frame.function;
        let passed = overload_args(raw)
            .map(|args| format!("{} ", args.replace(',', ", ")))
            .unwrap_or_default();

        let mut msg = format!(
            "The parameter types {}are invalid for method {}.\n",
            passed, fname
        );
        if signatures.len() == 1 {
            msg.push_str("Your parameters must match the following signature:\n");
            msg.push_str(&format!(" * {}{}", fname, signatures[0]));
        } else {
            msg.push_str("Your parameters must match one of the following signatures:\n");
            let lines: Vec<String> = signatures
                .iter()
                .map(|sig| format!(" * {}{}", fname, sig))
                .collect();
            msg.push_str(&lines.join("\n"));
        }
        Ok(msg)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(msg: &ExceptionMsg, raw: &str, info: &[FrameInfo]) -> String {
        match msg {
            ExceptionMsg::Handler(h) => h("TypeError", raw, info).unwrap(),
            ExceptionMsg::Text(t) => t.clone(),
        }
    }

    fn rect_frame() -> FrameInfo {
        FrameInfo {
            path_parts: vec!["sketch.py".to_string()],
            function: "rect".to_string(),
        }
    }

    #[test]
    fn test_overload_args() {
        assert_eq!(
            overload_args("No matching overloads found for processing.core.PApplet.rect(str,int)"),
            Some("(str,int)")
        );
        assert_eq!(overload_args("something else"), None);
    }

    #[test]
    fn test_type_error_single_signature() {
        let table = SignatureTable::new().with("sketch.py", "rect", &["(a: float, b: float)"]);
        let handler = type_error_handler(table);
        let msg = call(
            &handler,
            "No matching overloads found for processing.core.PApplet.rect(str,int), options are: ...",
            &[rect_frame()],
        );
        assert!(msg.starts_with("The parameter types (str, int) are invalid for method rect."));
        assert!(msg.ends_with(" * rect(a: float, b: float)"));
    }

    #[test]
    fn test_type_error_multiple_signatures() {
        let table = SignatureTable::new().with("sketch.py", "rect", &["(a)", "(a, b)"]);
        let msg = call(&type_error_handler(table), "bad call", &[rect_frame()]);
        assert!(msg.starts_with("The parameter types are invalid for method rect."));
        assert!(msg.contains("one of the following signatures:\n * rect(a)\n * rect(a, b)"));
    }

    #[test]
    fn test_type_error_unknown_method_keeps_raw() {
        let msg = call(&type_error_handler(SignatureTable::new()), "raw text", &[rect_frame()]);
        assert_eq!(msg, "raw text");
        let msg = call(&type_error_handler(SignatureTable::new()), "raw text", &[]);
        assert_eq!(msg, "raw text");
    }
}
