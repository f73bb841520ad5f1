// End-to-end exception reports

mod common;

use common::{single, RecordingSketch};
use py5_bridge::{
    type_error_handler, Bridge, BridgeConfig, ExceptionMsg, ScriptError, SignatureTable,
    TraceFrame, UserFunction,
};

const FRAMEWORK: &str = "/opt/python/site-packages/py5";

fn config() -> BridgeConfig {
    BridgeConfig::new().with_framework_dir(FRAMEWORK)
}

fn framework_frame(file: &str, line: u32, function: &str) -> TraceFrame {
    TraceFrame::new(format!("{}/{}", FRAMEWORK, file), line, function)
}

fn failing_draw(error: ScriptError) -> UserFunction {
    UserFunction::positional("draw", 0, move |_| Err(error.clone()))
}

#[test]
fn test_three_user_frames_under_two_bridge_frames() {
    let error = ScriptError::new("ValueError", "negative radius")
        .with_frame(framework_frame("bridge.py", 120, "run_method"))
        .with_frame(framework_frame("bridge.py", 88, "_invoke"))
        .with_frame(TraceFrame::new("my_sketch.py", 30, "draw").with_source("draw_scene()"))
        .with_frame(TraceFrame::new("my_sketch.py", 22, "draw_scene").with_source("draw_ball(-1)"))
        .with_frame(TraceFrame::new("my_sketch.py", 11, "draw_ball").with_source("raise ValueError('negative radius')"));

    let sketch = RecordingSketch::new();
    let bridge = Bridge::with_config(sketch.clone(), config()).unwrap();
    let (functions, counts) = single("draw", failing_draw(error), 0);
    bridge.set_functions(functions, &counts).unwrap();

    assert!(!bridge.run_method("draw", &[]));

    let text = sketch.stderr_text();
    assert!(text.starts_with("py5 encountered an error in your code:"));
    assert!(!text.contains("bridge.py"));
    assert!(!text.contains(FRAMEWORK));
    for function in ["in draw\n", "in draw_scene\n", "in draw_ball\n"] {
        assert!(text.contains(function), "missing frame {:?}", function);
    }
    assert!(text.ends_with("ValueError: negative radius"));
}

#[test]
fn test_friendly_message_sees_pruned_frames() {
    let error = ScriptError::new("TypeError", "No matching overloads found for processing.core.PApplet.rect(str,int)")
        .with_frame(framework_frame("bridge.py", 120, "run_method"))
        .with_frame(TraceFrame::new("my_sketch.py", 8, "draw"))
        .with_frame(framework_frame("mixins/shapes.py", 40, "rect"));

    let sketch = RecordingSketch::new();
    let bridge = Bridge::with_config(sketch.clone(), config()).unwrap();
    bridge.register_exception_msg(
        "TypeError",
        type_error_handler(
            SignatureTable::new().with("mixins/shapes.py", "rect", &["(a: float, b: float, c: float, d: float)"]),
        ),
    );
    let (functions, counts) = single("draw", failing_draw(error), 0);
    bridge.set_functions(functions, &counts).unwrap();

    assert!(!bridge.run_method("draw", &[]));

    let text = sketch.stderr_text();
    assert!(text.contains("TypeError: The parameter types (str, int) are invalid for method rect."));
    assert!(text.contains(" * rect(a: float, b: float, c: float, d: float)"));
    assert!(!text.contains("mixins/shapes.py"));
}

#[test]
fn test_last_write_wins_for_messages() {
    let error = ScriptError::new("NameError", "name 'sizee' is not defined")
        .with_frame(TraceFrame::new("my_sketch.py", 3, "setup"));

    let sketch = RecordingSketch::new();
    let bridge = Bridge::with_config(sketch.clone(), config()).unwrap();
    bridge.register_exception_msg("NameError", "first");
    bridge.register_exception_msg(
        "NameError",
        ExceptionMsg::handler(|_, raw, _| Ok(format!("{} (check your spelling)", raw))),
    );

    let report = bridge.report_error(&error);
    assert!(report.ends_with("NameError: name 'sizee' is not defined (check your spelling)"));
}

#[test]
fn test_pruning_disabled_shows_everything() {
    let error = ScriptError::new("ValueError", "bad")
        .with_frame(framework_frame("bridge.py", 120, "run_method"))
        .with_frame(TraceFrame::new("my_sketch.py", 30, "draw"));

    let sketch = RecordingSketch::new();
    let bridge = Bridge::with_config(sketch.clone(), config().with_pruning(false)).unwrap();
    let report = bridge.report_error(&error);

    assert!(report.contains("bridge.py"));
    assert!(!report.contains("py5 encountered"));
}

#[test]
fn test_invalid_config_rejected() {
    let result = Bridge::with_config(RecordingSketch::new(), BridgeConfig::new().with_framework_dir("  "));
    assert!(result.is_err());
}
