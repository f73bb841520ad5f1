//! Headless sketch state
//!
//! Stands in for the graphics runtime's sketch object: keeps the frame
//! counter, remembers whether termination was requested and records all
//! output so it can be replayed into the run report.

use py5_bridge::{ScriptResult, Sketch};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// One line printed through the sketch
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutputLine {
    pub text: String,
    pub stderr: bool,
}

/// Sketch implementation driven by the CLI frame loop
#[derive(Debug, Default)]
pub struct HeadlessSketch {
    frame: AtomicU64,
    terminate_requests: AtomicUsize,
    shut_down: AtomicBool,
    echo: bool,
    output: Mutex<Vec<OutputLine>>,
}

impl HeadlessSketch {
    /// Create a sketch; with `echo` output is also written to stdout/stderr
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            ..Default::default()
        }
    }

    /// Current frame number (0 before the first frame)
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }

    pub fn set_frame(&self, frame: u64) {
        self.frame.store(frame, Ordering::SeqCst);
    }

    /// True once a termination request was made
    pub fn is_terminated(&self) -> bool {
        self.terminate_requests.load(Ordering::SeqCst) > 0
    }

    pub fn terminate_requests(&self) -> usize {
        self.terminate_requests.load(Ordering::SeqCst)
    }

    /// True once the bridge ran the sketch's shutdown sequence
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Everything printed so far
    pub fn output(&self) -> Vec<OutputLine> {
        self.output.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Sketch for HeadlessSketch {
    fn println(&self, text: &str, stderr: bool) {
        if self.echo {
            if stderr {
                eprintln!("{}", text);
            } else {
                println!("{}", text);
            }
        }
        self.output
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(OutputLine {
                text: text.to_string(),
                stderr,
            });
    }

    fn terminate_sketch(&self) {
        let previous = self.terminate_requests.fetch_add(1, Ordering::SeqCst);
        log::debug!("Termination requested on frame {} (request #{})", self.frame(), previous + 1);
    }

    fn shutdown(&self) -> ScriptResult<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        log::debug!("Sketch shutdown after {} frame(s)", self.frame());
        Ok(())
    }
}
