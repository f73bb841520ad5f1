//! py5 Bridge Headless Runner
//!
//! This is the command-line interface for the py5 callback bridge.
//! It plays the part of the host graphics runtime without rendering:
//! - Loads a sketch description (TOML) with declarative callbacks and hooks
//! - Drives settings, setup and the per-frame draw cycle through the bridge
//! - Delivers scheduled input events and processing-mode calls
//! - Reports the outcome, remaining hooks, errors and timings (TXT/JSON)

use anyhow::{Context, Result};
use clap::Parser;
use py5_bridge::Bridge;
use std::path::PathBuf;
use std::sync::Arc;

mod callbacks;
mod config;
mod events;
mod report;
mod state;

use config::SketchConfig;
use events::Schedule;
use report::{CallRecord, RunOutcome, RunReport};
use state::HeadlessSketch;

/// Callbacks run once per frame, in order
const FRAME_METHODS: [&str; 3] = ["pre_draw", "draw", "post_draw"];

/// py5 Bridge - Run a sketch description headlessly through the callback bridge
#[derive(Parser, Debug)]
#[command(name = "py5-bridge")]
#[command(about = "Run a headless sketch through the py5 callback bridge", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the sketch description (sketch.toml)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Number of frames to run (overrides [sketch] frames)
    #[arg(short, long, value_name = "COUNT")]
    frames: Option<u64>,

    /// Print the registered callbacks and exit without running
    #[arg(long)]
    list_functions: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("py5 Bridge CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using bridge library v{}", py5_bridge::VERSION);

    log::info!("Loading sketch description from: {:?}", args.config);
    let config = config::load_config(&args.config)?;
    log::debug!("Sketch description loaded successfully");

    // Sketch output is echoed live in text mode and kept for the JSON report
    let sketch = Arc::new(HeadlessSketch::new(!args.json && !args.quiet));
    let bridge = build_bridge(&config, &sketch)?;

    if args.list_functions {
        for function in bridge.get_function_list() {
            println!("{}", function);
        }
        return Ok(());
    }

    let frames = args.frames.unwrap_or(config.sketch.frames);
    let report = run_sketch(&config, &bridge, &sketch, frames);

    if args.json {
        println!("{}", report.to_json().context("Failed to serialize report")?);
    } else if !args.quiet {
        print!("{}", report.render_txt());
    }

    Ok(())
}

/// Create the bridge and register everything the sketch file declares
fn build_bridge(config: &SketchConfig, sketch: &Arc<HeadlessSketch>) -> Result<Bridge> {
    let bridge = Bridge::with_config(sketch.clone(), config.diagnostics.clone())
        .context("Failed to create bridge")?;

    let namespace = callbacks::build_namespace(&config.callbacks, sketch);
    bridge
        .load_namespace(&namespace)
        .context("Failed to register callbacks")?;
    log::info!("Registered callbacks: {:?}", bridge.get_function_list());

    for (type_name, message) in &config.messages {
        bridge.register_exception_msg(type_name, message.as_str());
    }
    callbacks::install_hooks(&bridge, &config.hooks, sketch);
    callbacks::install_processing(&bridge, &config.processing)?;

    if !config.sketch.profile.is_empty() {
        bridge
            .profile_functions(&config.sketch.profile)
            .context("Failed to enable profiling")?;
    }
    Ok(bridge)
}

/// Run the frame loop and always finish with the bridge shutdown
fn run_sketch(config: &SketchConfig, bridge: &Bridge, sketch: &HeadlessSketch, frames: u64) -> RunReport {
    let started_at = chrono::Utc::now();
    let schedule = Schedule::new(&config.events, &config.calls);
    let mut calls = Vec::new();
    let mut frames_run = 0;

    let mut outcome = run_startup(bridge);
    if outcome == RunOutcome::Completed {
        'frames: for frame in 1..=frames {
            sketch.set_frame(frame);
            frames_run = frame;

            for method in FRAME_METHODS {
                if !bridge.run_method(method, &[]) {
                    outcome = faulted(method, frame);
                    break 'frames;
                }
            }

            for event in schedule.events_on(frame) {
                let params = events::host_params(&event.params);
                if !bridge.run_method(&event.method, &params) {
                    outcome = faulted(&event.method, frame);
                    break 'frames;
                }
            }

            for call in schedule.calls_on(frame) {
                let params = events::host_params(&call.params);
                let record = match bridge.call_function(&call.key, &params) {
                    Ok(value) => CallRecord {
                        frame,
                        key: call.key.clone(),
                        ok: true,
                        result: format!("{:?}", value),
                    },
                    Err(e) => CallRecord {
                        frame,
                        key: call.key.clone(),
                        ok: false,
                        result: e.to_string(),
                    },
                };
                calls.push(record);
            }

            if sketch.is_terminated() {
                log::info!("Sketch terminated on frame {}", frame);
                break;
            }
        }
    }

    let hooks_remaining = bridge.hook_count();
    let profile = bridge.profile_stats();
    bridge.shutdown();
    if !config.sketch.profile.is_empty() {
        bridge.dump_stats();
    }

    let last = bridge.last_exception();
    let mut report = RunReport {
        sketch: config.sketch.name.clone(),
        started_at: started_at.to_rfc3339(),
        finished_at: chrono::Utc::now().to_rfc3339(),
        frames_run,
        outcome,
        functions: bridge.get_function_list(),
        hooks_remaining,
        skipped_entries: schedule.pending_after(frames_run),
        calls,
        last_error: last.as_ref().map(|l| l.report.clone()),
        last_error_at: last.as_ref().map(|l| l.raised_at.to_rfc3339()),
        profile: Vec::new(),
        output: sketch.output(),
    };
    report.set_profile(&profile);
    report
}

/// Run `settings` and `setup`
fn run_startup(bridge: &Bridge) -> RunOutcome {
    for method in ["settings", "setup"] {
        if !bridge.run_method(method, &[]) {
            return faulted(method, 0);
        }
    }
    RunOutcome::Completed
}

fn faulted(method: &str, frame: u64) -> RunOutcome {
    log::warn!("{} faulted on frame {}", method, frame);
    RunOutcome::Faulted {
        method: method.to_string(),
        frame,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(toml_text: &str, frames: u64) -> (RunReport, Arc<HeadlessSketch>) {
        let config: SketchConfig = toml::from_str(toml_text).unwrap();
        config.validate().unwrap();
        let sketch = Arc::new(HeadlessSketch::new(false));
        let bridge = build_bridge(&config, &sketch).unwrap();
        (run_sketch(&config, &bridge, &sketch, frames), sketch)
    }

    #[test]
    fn test_completed_run() {
        let (report, sketch) = run(
            r#"
            [[callbacks]]
            name = "setup"
            message = "setup"

            [[callbacks]]
            name = "draw"
            message = "draw {frame}"

            [[callbacks]]
            name = "mouse_pressed"
            params = 1
            message = "pressed {args}"

            [[events]]
            frame = 2
            method = "mouse_pressed"
            params = ["left"]
            "#,
            3,
        );

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.frames_run, 3);
        let texts: Vec<String> = report.output.iter().map(|l| l.text.clone()).collect();
        assert_eq!(texts, vec!["setup", "draw 1", "draw 2", "pressed left", "draw 3"]);
        assert!(sketch.is_shut_down());
        assert!(report.last_error.is_none());
    }

    #[test]
    fn test_fault_stops_loop() {
        let (report, sketch) = run(
            r#"
            [diagnostics]
            framework_dirs = ["/site-packages/py5"]

            [[callbacks]]
            name = "draw"
            action = "noop"
            fail_on_frame = 2

            [callbacks.error]
            error_type = "ZeroDivisionError"
            message = "division by zero"
            traceback = [
                { file = "/site-packages/py5/bridge.py", line = 10, function = "run_method" },
                { file = "sketch.py", line = 4, function = "draw", source = "x = 1 / 0" },
            ]

            [[hooks]]
            name = "after"
            method = "draw"
            phase = "post"

            [messages]
            ZeroDivisionError = "you divided by zero"
            "#,
            10,
        );

        assert_eq!(
            report.outcome,
            RunOutcome::Faulted {
                method: "draw".to_string(),
                frame: 2
            }
        );
        assert_eq!(report.frames_run, 2);
        assert_eq!(report.hooks_remaining, 1);
        assert_eq!(sketch.terminate_requests(), 1);
        let error = report.last_error.unwrap();
        assert!(error.contains("File \"sketch.py\", line 4, in draw"));
        assert!(!error.contains("bridge.py"));
        assert!(error.ends_with("ZeroDivisionError: you divided by zero"));
    }

    #[test]
    fn test_processing_calls_recorded() {
        let (report, _sketch) = run(
            r#"
            [[processing]]
            key = "saved"
            once = true
            returns = 1

            [[calls]]
            frame = 1
            key = "saved"

            [[calls]]
            frame = 2
            key = "saved"
            "#,
            2,
        );

        assert_eq!(report.calls.len(), 2);
        assert!(report.calls[0].ok);
        assert!(!report.calls[1].ok);
        assert!(report.calls[1].result.contains("not found"));
        assert_eq!(report.outcome, RunOutcome::Completed);
    }

    #[test]
    fn test_setup_fault_skips_frames() {
        let (report, _sketch) = run(
            r#"
            [[callbacks]]
            name = "setup"
            action = "panic"
            message = "no display"

            [[callbacks]]
            name = "draw"
            "#,
            5,
        );

        assert_eq!(report.frames_run, 0);
        assert!(matches!(report.outcome, RunOutcome::Faulted { ref method, frame: 0 } if method == "setup"));
        assert!(report.last_error.unwrap().contains("Panic: no display"));
    }
}
