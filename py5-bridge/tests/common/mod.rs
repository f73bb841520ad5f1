// Shared test sketch for the integration tests
#![allow(dead_code)]

use py5_bridge::{Sketch, UserFunction, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Sketch that records everything the bridge asks of it
#[derive(Default)]
pub struct RecordingSketch {
    pub output: Mutex<Vec<(String, bool)>>,
    pub terminations: AtomicUsize,
}

impl RecordingSketch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn stderr_text(&self) -> String {
        self.output
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, stderr)| *stderr)
            .map(|(text, _)| text.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Sketch for RecordingSketch {
    fn println(&self, text: &str, stderr: bool) {
        self.output.lock().unwrap().push((text.to_string(), stderr));
    }

    fn terminate_sketch(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Ordered log of events shared between hooks and callables
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Zero-argument callable that appends `label` to the log
pub fn logging_function(name: &str, label: &str, log: &EventLog) -> UserFunction {
    let log = Arc::clone(log);
    let label = label.to_string();
    UserFunction::positional(name, 0, move |_| {
        log.lock().unwrap().push(label.clone());
        Ok(Value::None)
    })
}

/// Single-entry function and arity maps
pub fn single(name: &str, function: UserFunction, count: usize) -> (BTreeMap<String, UserFunction>, BTreeMap<String, usize>) {
    let mut functions = BTreeMap::new();
    functions.insert(name.to_string(), function);
    let mut counts = BTreeMap::new();
    counts.insert(name.to_string(), count);
    (functions, counts)
}
