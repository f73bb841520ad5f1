//! Drive a bridge the way a host runtime would, without any graphics
//!
//! Registers a small sketch, a frame-counting hook and a repeating worker
//! thread, runs a few frames and shuts down. The fifth frame raises, which
//! shows the pruned error report and the fail-fast termination.
//!
//! Usage:
//!   cargo run -p py5-bridge --example headless_sketch

use py5_bridge::{
    Bridge, BridgeConfig, Hook, HookStatus, Namespace, ScriptError, Sketch, TraceFrame,
    UserFunction, Value,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct ConsoleSketch {
    stopped: AtomicBool,
}

impl Sketch for ConsoleSketch {
    fn println(&self, text: &str, stderr: bool) {
        if stderr {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
    }

    fn terminate_sketch(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn main() {
    env_logger::init();

    let sketch = Arc::new(ConsoleSketch::default());
    let config = BridgeConfig::new().with_framework_dir("/site-packages/py5");
    let bridge = match Bridge::with_config(sketch.clone(), config) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    let frame = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&frame);
    let namespace = Namespace::new()
        .with(
            "setup",
            UserFunction::positional("setup", 0, |_| {
                println!("setup");
                Ok(Value::None)
            }),
        )
        .with(
            "draw",
            UserFunction::positional("draw", 0, move |_| {
                let n = counter.load(Ordering::SeqCst);
                if n == 4 {
                    return Err(ScriptError::new("ValueError", "frame 4 is cursed")
                        .with_frame(TraceFrame::new("/site-packages/py5/bridge.py", 120, "run_method"))
                        .with_frame(TraceFrame::new("sketch.py", 12, "draw").with_source("check(frame_count)")));
                }
                println!("draw {}", n);
                Ok(Value::None)
            }),
        );

    if let Err(e) = bridge.load_namespace(&namespace) {
        eprintln!("Failed to load sketch: {}", e);
        return;
    }
    println!("Registered: {:?}", bridge.get_function_list());

    let ticks = Arc::clone(&frame);
    bridge.add_post_hook(
        "draw",
        "frame_counter",
        Hook::plain(move |_| {
            ticks.fetch_add(1, Ordering::SeqCst);
            Ok(HookStatus::Continue)
        }),
    );

    let heartbeat = bridge
        .threads()
        .launch_repeating_thread(Some("heartbeat"), Duration::from_millis(5), || Ok(()));
    if let Err(e) = heartbeat {
        eprintln!("Could not start heartbeat thread: {}", e);
    }

    bridge.run_method("setup", &[]);
    while !sketch.stopped.load(Ordering::SeqCst) {
        if !bridge.run_method("draw", &[]) {
            println!("draw faulted; sketch stopping");
        }
    }

    bridge.shutdown();
    println!("Threads still running: {:?}", bridge.threads().list_threads());
}
