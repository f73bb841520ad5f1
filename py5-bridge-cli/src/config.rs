//! Sketch description loading and validation
//!
//! A headless sketch is described in TOML: the callbacks it defines, the
//! hooks attached to them, input events and processing-mode calls scheduled
//! on particular frames, and the diagnostics configuration of the bridge.

use anyhow::{Context, Result};
use py5_bridge::BridgeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Main sketch description (loaded from sketch.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SketchConfig {
    #[serde(default)]
    pub sketch: SketchSection,
    #[serde(default)]
    pub diagnostics: BridgeConfig,
    #[serde(default)]
    pub callbacks: Vec<CallbackConfig>,
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
    #[serde(default)]
    pub events: Vec<EventConfig>,
    #[serde(default)]
    pub processing: Vec<ProcessingConfig>,
    #[serde(default)]
    pub calls: Vec<CallConfig>,
    /// Exception type name -> friendly message
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SketchSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Callbacks to time while the sketch runs
    #[serde(default)]
    pub profile: Vec<String>,
}

impl Default for SketchSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            frames: default_frames(),
            profile: Vec::new(),
        }
    }
}

fn default_name() -> String {
    "sketch".to_string()
}

fn default_frames() -> u64 {
    60
}

/// What a declarative callable does when invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Print `message` through the sketch
    #[default]
    Print,
    /// Do nothing
    Noop,
    /// Raise the configured error
    Fail,
    /// Panic with `message`
    Panic,
}

/// One traceback frame of a configured error
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrameConfig {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub source: Option<String>,
}

/// Error raised by a callable with `action = "fail"` (or on `fail_on_frame`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorConfig {
    #[serde(default = "default_error_type")]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub traceback: Vec<FrameConfig>,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            error_type: default_error_type(),
            message: String::new(),
            traceback: Vec::new(),
        }
    }
}

fn default_error_type() -> String {
    "RuntimeError".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    pub name: String,
    /// Number of positional parameters
    #[serde(default)]
    pub params: usize,
    /// Declare a catch-all `*args` parameter (the callback is then skipped)
    #[serde(default)]
    pub varargs: bool,
    #[serde(default)]
    pub action: Action,
    /// Text for `print`/`panic`; `{frame}` and `{args}` are substituted
    pub message: Option<String>,
    /// Raise `error` on this frame only
    pub fail_on_frame: Option<u64>,
    #[serde(default)]
    pub error: ErrorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhaseConfig {
    Pre,
    Post,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HookConfig {
    pub name: String,
    pub method: String,
    pub phase: HookPhaseConfig,
    pub message: Option<String>,
    /// Remove the hook after this many runs
    pub limit: Option<u64>,
    /// Raise this error instead of running
    pub error: Option<ErrorConfig>,
    /// Report when the sketch terminates while the hook is registered
    #[serde(default)]
    pub notify_on_terminate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventConfig {
    pub frame: u64,
    pub method: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The bridge's processing-mode registry
    #[default]
    Processing,
    /// The caller's local variables
    Locals,
    /// The caller's global variables
    Globals,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Dotted key, e.g. `tools.export`
    pub key: String,
    #[serde(default)]
    pub scope: Scope,
    /// Deregister after the first successful call (flat processing keys only)
    #[serde(default)]
    pub once: bool,
    /// Value returned to the host
    #[serde(default)]
    pub returns: serde_json::Value,
    /// Raise this error instead of returning
    pub error: Option<ErrorConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallConfig {
    pub frame: u64,
    pub key: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

/// Semantic problems in a sketch description
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("callback #{0} has an empty name")]
    EmptyCallbackName(usize),

    #[error("hook {0} has an empty method name")]
    EmptyHookMethod(String),

    #[error("{kind} scheduled on frame 0; frames are numbered from 1")]
    FrameZero { kind: &'static str },

    #[error("processing key {0:?} is not a valid dotted name")]
    InvalidKey(String),

    #[error("processing key {0} is dotted or not in the processing scope and cannot be call-once")]
    OnceNotFlat(String),

    #[error("invalid diagnostics configuration: {0}")]
    Diagnostics(#[from] py5_bridge::BridgeError),
}

impl SketchConfig {
    /// Check the description for problems TOML parsing cannot catch
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (index, callback) in self.callbacks.iter().enumerate() {
            if callback.name.trim().is_empty() {
                return Err(ConfigError::EmptyCallbackName(index));
            }
        }
        for hook in &self.hooks {
            if hook.method.trim().is_empty() {
                return Err(ConfigError::EmptyHookMethod(hook.name.clone()));
            }
        }
        if self.events.iter().any(|e| e.frame == 0) {
            return Err(ConfigError::FrameZero { kind: "event" });
        }
        if self.calls.iter().any(|c| c.frame == 0) {
            return Err(ConfigError::FrameZero { kind: "call" });
        }
        for entry in &self.processing {
            if entry.key.split('.').any(|segment| segment.trim().is_empty()) {
                return Err(ConfigError::InvalidKey(entry.key.clone()));
            }
            if entry.once && (entry.key.contains('.') || entry.scope != Scope::Processing) {
                return Err(ConfigError::OnceNotFlat(entry.key.clone()));
            }
        }
        self.diagnostics.validate()?;
        Ok(())
    }
}

/// Load a sketch description from a TOML file
pub fn load_config(path: &Path) -> Result<SketchConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sketch file: {:?}", path))?;

    let config: SketchConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse sketch file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid sketch file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SKETCH: &str = r#"
        [sketch]
        name = "bouncing"
        frames = 10
        profile = ["draw"]

        [diagnostics]
        framework_dirs = ["/site-packages/py5"]

        [[callbacks]]
        name = "setup"

        [[callbacks]]
        name = "draw"
        action = "print"
        message = "frame {frame}"
        fail_on_frame = 4
        error = { error_type = "ZeroDivisionError", message = "division by zero" }

        [[hooks]]
        name = "grab"
        method = "draw"
        phase = "post"
        limit = 1

        [[events]]
        frame = 2
        method = "mouse_pressed"
        params = [1, "left"]

        [[processing]]
        key = "on_saved"
        once = true
        returns = 42

        [[calls]]
        frame = 3
        key = "on_saved"

        [messages]
        ZeroDivisionError = "you divided by zero"
    "#;

    #[test]
    fn test_config_deserialization() {
        let config: SketchConfig = toml::from_str(SKETCH).unwrap();
        assert_eq!(config.sketch.frames, 10);
        assert_eq!(config.callbacks.len(), 2);
        assert_eq!(config.callbacks[0].action, Action::Print);
        assert_eq!(config.callbacks[1].error.error_type, "ZeroDivisionError");
        assert_eq!(config.hooks[0].phase, HookPhaseConfig::Post);
        assert_eq!(config.events[0].params.len(), 2);
        assert_eq!(config.processing[0].returns, serde_json::json!(42));
        assert_eq!(config.diagnostics.framework_dirs.len(), 1);
        assert!(config.diagnostics.prune_tracebacks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_for_empty_file() {
        let config: SketchConfig = toml::from_str("").unwrap();
        assert_eq!(config.sketch.name, "sketch");
        assert_eq!(config.sketch.frames, 60);
        assert!(config.callbacks.is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let config: SketchConfig = toml::from_str(
            r#"
            [[events]]
            frame = 0
            method = "key_pressed"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::FrameZero { .. })));

        let config: SketchConfig = toml::from_str(
            r#"
            [[processing]]
            key = "tools.export"
            once = true
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::OnceNotFlat(_))));

        let config: SketchConfig = toml::from_str(
            r#"
            [[processing]]
            key = "tools..export"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKey(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SKETCH.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.sketch.name, "bouncing");
        assert_eq!(config.messages["ZeroDivisionError"], "you divided by zero");
    }

    #[test]
    fn test_bundled_demo_sketch_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("sketches/demo.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.sketch.name, "demo");
        assert_eq!(config.processing.len(), 2);
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[sketch\nname = 1").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse sketch file"));
    }
}
