//! Run report generation
//!
//! Summarizes a headless run as plain text or JSON.

use crate::state::OutputLine;
use py5_bridge::FunctionStats;
use serde::Serialize;
use std::collections::BTreeMap;

/// How the frame loop ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every requested frame ran
    Completed,
    /// A callback faulted and the sketch asked to terminate
    Faulted { method: String, frame: u64 },
}

/// Result of one processing-mode call
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub frame: u64,
    pub key: String,
    pub ok: bool,
    /// Returned value (debug form) or error message
    pub result: String,
}

/// Timing row for one profiled callback
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRow {
    pub name: String,
    pub calls: u64,
    pub total_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
}

impl ProfileRow {
    fn from_stats(name: &str, stats: &FunctionStats) -> Self {
        Self {
            name: name.to_string(),
            calls: stats.calls,
            total_ms: stats.total.as_secs_f64() * 1000.0,
            mean_ms: stats.mean().as_secs_f64() * 1000.0,
            max_ms: stats.max.as_secs_f64() * 1000.0,
        }
    }
}

/// Everything the CLI knows about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub sketch: String,
    pub started_at: String,
    pub finished_at: String,
    pub frames_run: u64,
    pub outcome: RunOutcome,
    pub functions: Vec<String>,
    /// Hooks still registered when the frame loop ended
    pub hooks_remaining: usize,
    /// Scheduled events and calls that never ran
    pub skipped_entries: usize,
    pub calls: Vec<CallRecord>,
    pub last_error: Option<String>,
    pub last_error_at: Option<String>,
    pub profile: Vec<ProfileRow>,
    pub output: Vec<OutputLine>,
}

impl RunReport {
    /// Fill the profile section from bridge timings
    pub fn set_profile(&mut self, stats: &BTreeMap<String, FunctionStats>) {
        self.profile = stats
            .iter()
            .map(|(name, s)| ProfileRow::from_stats(name, s))
            .collect();
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render as plain text
    pub fn render_txt(&self) -> String {
        let mut out = String::new();
        out.push_str("═══════════════════════════════════════════════\n");
        out.push_str(&format!("  Sketch run report: {}\n", self.sketch));
        out.push_str("═══════════════════════════════════════════════\n\n");

        out.push_str(&format!("Started:   {}\n", self.started_at));
        out.push_str(&format!("Finished:  {}\n", self.finished_at));
        out.push_str(&format!("Frames run: {}\n", self.frames_run));
        match &self.outcome {
            RunOutcome::Completed => out.push_str("Outcome:   completed\n"),
            RunOutcome::Faulted { method, frame } => {
                out.push_str(&format!("Outcome:   faulted in {} on frame {}\n", method, frame))
            }
        }
        out.push_str(&format!("Hooks remaining at end of loop: {}\n", self.hooks_remaining));
        if self.skipped_entries > 0 {
            out.push_str(&format!("Scheduled entries not run: {}\n", self.skipped_entries));
        }

        out.push_str("\nRegistered functions:\n");
        if self.functions.is_empty() {
            out.push_str("  (none)\n");
        }
        for function in &self.functions {
            out.push_str(&format!("  {}\n", function));
        }

        if !self.calls.is_empty() {
            out.push_str("\nProcessing-mode calls:\n");
            for call in &self.calls {
                let status = if call.ok { "ok" } else { "error" };
                out.push_str(&format!(
                    "  frame {:>4}  {:<24} {:<5} {}\n",
                    call.frame, call.key, status, call.result
                ));
            }
        }

        if !self.profile.is_empty() {
            out.push_str("\nProfile:\n");
            out.push_str("  Function             Calls    Total (ms)    Mean (ms)     Max (ms)\n");
            for row in &self.profile {
                out.push_str(&format!(
                    "  {:<20} {:>5} {:>13.3} {:>12.3} {:>12.3}\n",
                    row.name, row.calls, row.total_ms, row.mean_ms, row.max_ms
                ));
            }
        }

        if let Some(error) = &self.last_error {
            out.push_str("\nLast error");
            if let Some(at) = &self.last_error_at {
                out.push_str(&format!(" ({})", at));
            }
            out.push_str(":\n");
            out.push_str(error);
            out.push('\n');
        }
        out
    }
}
