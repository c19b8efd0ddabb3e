//! Trace output and `debug function`

use super::helpers::*;
use crate::engine::{
    CommandFunction, ExecutionControl, SharedTracer, Stage, StageAction, TraceSink, TraceWriter,
    TracerFactory,
};
use std::cell::RefCell;
use std::rc::Rc;

type Buffer = Rc<RefCell<TraceWriter<Vec<u8>>>>;

fn buffer() -> Buffer {
    TraceWriter::shared(Vec::new())
}

fn text(buffer: &Buffer) -> String {
    String::from_utf8_lossy(buffer.borrow().get_ref()).into_owned()
}

fn debug(functions: &[Rc<dyn CommandFunction>], tracer: SharedTracer) -> Stage {
    let factory: TracerFactory = Rc::new(move || tracer.clone());
    Stage::new(
        "debug function",
        StageAction::TraceFunctions {
            functions: functions.to_vec(),
            tracer: factory,
        },
    )
}

/* ===================== Writer ===================== */

#[test]
fn test_writer_formats_events() {
    let mut writer = TraceWriter::new(Vec::new());
    writer.on_call(0, "demo:main", 2);
    writer.on_command(1, "say hi");
    writer.on_return(1, "say hi", 1);
    writer.on_command(1, "fail x");
    writer.on_error("x");

    let out = String::from_utf8(writer.into_inner()).expect("utf8");
    assert_eq!(
        out,
        "[F] demo:main size=2\n    [C] say hi -> 1\n    [C] fail x\n        [E] x\n"
    );
}

#[test]
fn test_writer_terminates_pending_command_on_finish() {
    let mut writer = TraceWriter::new(Vec::new());
    writer.on_command(0, "say hi");
    writer.finish().expect("flush");

    assert_eq!(String::from_utf8_lossy(writer.get_ref()), "[C] say hi\n");
}

/* ===================== Indentation ===================== */

#[test]
fn test_indent_follows_call_depth() {
    let out = Recorder::new();
    let trace = buffer();
    let mut ctl = ExecutionControl::default().with_tracer(trace.clone());

    let inner = function("demo:inner", vec![chain(vec![value(3)])]);
    let outer = function(
        "demo:outer",
        vec![chain(vec![value(1)]), chain(vec![call(&[inner])])],
    );
    execute(&mut ctl, chain(vec![call(&[outer])]), source(&out));

    assert_eq!(
        text(&trace),
        "[F] demo:outer size=2\n\
         \x20   [C] value 1 -> 1\n\
         \x20   [F] demo:inner size=1\n\
         \x20       [C] value 3 -> 3\n"
    );
}

#[test]
fn test_indent_tracks_interleaved_sibling_calls() {
    let out = Recorder::new();
    let trace = buffer();
    let mut ctl = ExecutionControl::default().with_tracer(trace.clone());

    let inner = function("demo:inner", vec![chain(vec![value(3)])]);
    let outer = function(
        "demo:outer",
        vec![chain(vec![call(&[inner])]), chain(vec![value(1)])],
    );
    let flat = function("demo:flat", vec![chain(vec![value(7)])]);
    execute(&mut ctl, chain(vec![call(&[outer, flat])]), source(&out));

    // Lines from both siblings share the queue; each keeps its own depth
    assert_eq!(
        text(&trace),
        "[F] demo:outer size=2\n\
         [F] demo:flat size=1\n\
         \x20   [F] demo:inner size=1\n\
         \x20   [C] value 7 -> 7\n\
         \x20       [C] value 3 -> 3\n\
         \x20   [C] value 1 -> 1\n"
    );
}

#[test]
fn test_failed_command_traced_as_error() {
    let out = Recorder::new();
    let trace = buffer();
    let mut ctl = ExecutionControl::default().with_tracer(trace.clone());

    let f = function("demo:f", vec![chain(vec![fail("boom")])]);
    execute(&mut ctl, chain(vec![call(&[f])]), source(&out));

    assert_eq!(
        text(&trace),
        "[F] demo:f size=1\n    [C] fail boom\n        [E] boom\n"
    );
}

/* ===================== Debug Function ===================== */

#[test]
fn test_debug_function_traces_and_redirects_messages() {
    let log = new_log();
    let out = Recorder::new();
    let trace = buffer();
    let mut ctl = ExecutionControl::default();

    let f = function("demo:f", vec![chain(vec![say(&log, "hi")])]);
    let tracer: SharedTracer = trace.clone();
    execute(&mut ctl, chain(vec![debug(&[f], tracer)]), source(&out));

    assert_eq!(
        text(&trace),
        "[F] demo:f size=1\n    [C] say hi\n        [M] hi\n    [R = 1] say hi\n"
    );
    // Messages went to the trace; the caller only hears the summary
    assert_eq!(out.successes(), vec!["Traced 1 function"]);
    assert_eq!(logged(&log), vec!["hi"]);
}

#[test]
fn test_debug_multiple_functions_reports_count() {
    let out = Recorder::new();
    let trace = buffer();
    let mut ctl = ExecutionControl::default();

    let functions = vec![
        function("demo:a", vec![chain(vec![value(1)])]),
        function("demo:b", vec![chain(vec![value(2)])]),
    ];
    let tracer: SharedTracer = trace.clone();
    execute(&mut ctl, chain(vec![debug(&functions, tracer)]), source(&out));

    assert_eq!(out.successes(), vec!["Traced 2 functions"]);
    assert!(text(&trace).starts_with("[F] demo:a size=1\n[F] demo:b size=1\n"));
}

#[test]
fn test_nested_trace_is_rejected() {
    let out = Recorder::new();
    let outer_trace = buffer();
    let inner_trace = buffer();
    let mut ctl = ExecutionControl::default().with_tracer(outer_trace.clone());

    let f = function("demo:f", vec![chain(vec![value(1)])]);
    let tracer: SharedTracer = inner_trace.clone();
    execute(&mut ctl, chain(vec![debug(&[f], tracer)]), source(&out));

    assert_eq!(
        out.failures(),
        vec!["Can't start a trace from inside a traced execution"]
    );
    assert!(text(&inner_trace).is_empty());
    assert!(text(&outer_trace).contains("[E] Can't start a trace from inside a traced execution"));
}

#[test]
fn test_trace_attached_mid_run_is_dropped_afterwards() {
    let out = Recorder::new();
    let first = buffer();
    let second = buffer();
    let mut ctl = ExecutionControl::default();

    let f = function("demo:f", vec![chain(vec![value(1)])]);
    let tracer: SharedTracer = first.clone();
    execute(&mut ctl, chain(vec![debug(&[f.clone()], tracer)]), source(&out));

    // A later execution may start its own trace
    let tracer: SharedTracer = second.clone();
    execute(&mut ctl, chain(vec![debug(&[f], tracer)]), source(&out));

    assert!(!text(&second).is_empty());
    assert_eq!(
        out.successes(),
        vec!["Traced 1 function", "Traced 1 function"]
    );
}
