//! Call timing for registered user functions

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Accumulated timing for one profiled function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionStats {
    /// Number of completed calls (successful or not)
    pub calls: u64,
    /// Total time spent in the function
    pub total: Duration,
    /// Longest single call
    pub max: Duration,
}

impl FunctionStats {
    /// Mean time per call
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / u32::try_from(self.calls).unwrap_or(u32::MAX)
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }
}

/// Shared store of per-function timings
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    stats: Arc<Mutex<BTreeMap<String, FunctionStats>>>,
}

impl Profiler {
    /// Create an empty profiler
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call of `name`
    pub fn record(&self, name: &str, elapsed: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.entry(name.to_string()).or_default().record(elapsed);
    }

    /// Snapshot of all recorded timings
    pub fn snapshot(&self) -> BTreeMap<String, FunctionStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Render the timings as a text table
    pub fn render(&self) -> String {
        let stats = self.snapshot();
        let mut out = String::from("Function             Calls    Total (ms)    Mean (ms)     Max (ms)\n");
        for (name, s) in &stats {
            out.push_str(&format!(
                "{:<20} {:>5} {:>13.3} {:>12.3} {:>12.3}\n",
                name,
                s.calls,
                s.total.as_secs_f64() * 1000.0,
                s.mean().as_secs_f64() * 1000.0,
                s.max.as_secs_f64() * 1000.0,
            ));
        }
        out
    }
}
