//! Traceback pruning and rendering
//!
//! Frames whose source file lives under one of the framework install
//! directories are bridge internals. Leading internal frames (the host
//! calling into user code) are dropped, and the traceback is cut at the first
//! internal frame after user code starts, so the report ends at the user's
//! own call into the framework.

use crate::config::BridgeConfig;
use crate::types::TraceFrame;

/// Location of a pruned framework frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Path components relative to the framework install directory
    pub path_parts: Vec<String>,
    /// Function executing in the frame
    pub function: String,
}

impl FrameInfo {
    /// Relative path joined with `/`
    pub fn path(&self) -> String {
        self.path_parts.join("/")
    }
}

/// A traceback with framework frames removed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrunedTraceback {
    /// Frames left for display, outermost first
    pub frames: Vec<TraceFrame>,
    /// Framework frames cut from the tail, outermost first
    pub info: Vec<FrameInfo>,
}

/// Path of `filename` relative to the framework directory it lives in
fn framework_relative<'a>(filename: &'a str, framework_dirs: &[String]) -> Option<&'a str> {
    framework_dirs.iter().find_map(|dir| {
        let dir = dir.trim_end_matches(['/', '\\']);
        let rest = filename.strip_prefix(dir)?;
        // `/site/py5` must not claim `/site/py5_tools/...`
        if rest.starts_with(['/', '\\']) {
            Some(rest.trim_start_matches(['/', '\\']))
        } else {
            None
        }
    })
}

/// Split a relative path into its components
fn path_parts(relative: &str) -> Vec<String> {
    relative
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove framework frames from a traceback
///
/// If the traceback contains no user frame at all it is returned unchanged,
/// so that errors inside the framework itself stay debuggable.
pub fn prune(frames: &[TraceFrame], config: &BridgeConfig) -> PrunedTraceback {
    let internal = |frame: &TraceFrame| -> Option<String> {
        if frame.function.ends_with(config.no_prune_suffix.as_str()) {
            return None;
        }
        framework_relative(&frame.filename, &config.framework_dirs).map(str::to_string)
    };

    let Some(start) = frames.iter().position(|f| internal(f).is_none()) else {
        return PrunedTraceback {
            frames: frames.to_vec(),
            info: Vec::new(),
        };
    };

    let mut pruned = PrunedTraceback::default();
    let mut cut = false;
    for frame in &frames[start..] {
        if let Some(relative) = internal(frame) {
            pruned.info.push(FrameInfo {
                path_parts: path_parts(&relative),
                function: frame.function.clone(),
            });
            cut = true;
        } else if !cut {
            pruned.frames.push(frame.clone());
        }
    }
    pruned
}

/// True if the frame's source line should not be displayed
fn is_suppressed(filename: &str, suppressed: &[String]) -> bool {
    let normalized = filename.replace('\\', "/");
    suppressed
        .iter()
        .any(|fragment| normalized.contains(fragment.as_str()))
}

/// Render frames and the final exception line as plain text
pub fn render(type_name: &str, message: &str, frames: &[TraceFrame], suppressed: &[String]) -> String {
    let mut out = String::new();
    for frame in frames {
        out.push_str(&format!(
            "File \"{}\", line {}, in {}\n",
            frame.filename, frame.lineno, frame.function
        ));
        if let Some(source) = &frame.source {
            if !is_suppressed(&frame.filename, suppressed) {
                out.push_str(&format!("    {}\n", source.trim()));
            }
        }
        out.push('\n');
    }
    out.push_str(&format!("{}: {}", type_name, message));
    out
}

/// Drop everything up to and including the last frame line that points into
/// a synthetic startup-script region
pub fn strip_static_code(text: &str, markers: &[String]) -> String {
    let mut cut_at = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let end = offset + line.len();
        let trimmed = line.trim_start();
        if trimmed.starts_with("File \"")
            && markers
                .iter()
                .any(|marker| trimmed.contains(&format!("{}\", line ", marker)))
        {
            cut_at = Some(end);
        }
        offset = end;
    }

    match cut_at {
        Some(index) => text[index..].to_string(),
        None => text.to_string(),
    }
}
