//! Bridge configuration types
//!
//! Controls how exceptions raised in user code are rendered: which frames are
//! pruned, which paths have their source lines hidden, and how synthetic
//! startup-script regions are cut out of the final report.

use serde::{Deserialize, Serialize};

/// Configuration for the callback bridge's diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Prune framework frames and substitute friendly exception messages
    #[serde(default = "default_true")]
    pub prune_tracebacks: bool,

    /// Install-directory prefixes of the bridge and its tooling package
    #[serde(default)]
    pub framework_dirs: Vec<String>,

    /// Framework functions whose name ends with this suffix are never pruned
    #[serde(default = "default_no_prune_suffix")]
    pub no_prune_suffix: String,

    /// Path fragments whose source lines are not shown in reports
    #[serde(default = "default_suppressed_paths")]
    pub suppressed_paths: Vec<String>,

    /// File names of the synthetic startup-script regions
    #[serde(default = "default_static_code_markers")]
    pub static_code_markers: Vec<String>,

    /// Banner prepended to every pruned report
    #[serde(default = "default_banner")]
    pub banner: String,
}

fn default_true() -> bool {
    true
}

fn default_no_prune_suffix() -> String {
    "py5_no_prune".to_string()
}

fn default_suppressed_paths() -> Vec<String> {
    vec![
        "site-packages/numpy/".to_string(),
        "site-packages/py5/".to_string(),
        "site-packages/py5_tools/".to_string(),
    ]
}

fn default_static_code_markers() -> Vec<String> {
    vec![
        "_PY5_STATIC_SETUP_CODE_.py".to_string(),
        "_PY5_STATIC_SETTINGS_CODE_.py".to_string(),
        "_PY5_STATIC_FRAMEWORK_CODE_.py".to_string(),
    ]
}

fn default_banner() -> String {
    "py5 encountered an error in your code:".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            prune_tracebacks: default_true(),
            framework_dirs: Vec::new(),
            no_prune_suffix: default_no_prune_suffix(),
            suppressed_paths: default_suppressed_paths(),
            static_code_markers: default_static_code_markers(),
            banner: default_banner(),
        }
    }
}

impl BridgeConfig {
    /// Create a new bridge configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable traceback pruning
    pub fn with_pruning(mut self, enabled: bool) -> Self {
        self.prune_tracebacks = enabled;
        self
    }

    /// Builder method: add a framework install directory
    pub fn with_framework_dir(mut self, dir: impl Into<String>) -> Self {
        self.framework_dirs.push(dir.into());
        self
    }

    /// Builder method: add a path fragment whose source lines are hidden
    pub fn with_suppressed_path(mut self, fragment: impl Into<String>) -> Self {
        self.suppressed_paths.push(fragment.into());
        self
    }

    /// Builder method: add a synthetic startup-script marker
    pub fn with_static_code_marker(mut self, marker: impl Into<String>) -> Self {
        self.static_code_markers.push(marker.into());
        self
    }

    /// Builder method: replace the report banner
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Check the configuration for values that would make pruning misbehave
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.framework_dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(crate::types::BridgeError::InvalidConfig(
                "framework_dirs must not contain empty entries".to_string(),
            ));
        }
        if self.static_code_markers.iter().any(|m| m.is_empty()) {
            return Err(crate::types::BridgeError::InvalidConfig(
                "static_code_markers must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}
