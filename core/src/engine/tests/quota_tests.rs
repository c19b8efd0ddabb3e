//! Command quota per execution

use super::helpers::*;
use crate::engine::{run_until_done, step, ExecutionControl, Limits, Step, Task};

fn limited(max: usize) -> ExecutionControl {
    ExecutionControl::new(Limits {
        max_command_chain_length: max,
        ..Limits::default()
    })
}

#[test]
fn test_quota_drops_remaining_work() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = limited(5);

    let lines = (0..10)
        .map(|i| chain(vec![say(&log, &format!("line {}", i))]))
        .collect();
    let f = function("demo:long", lines);
    let outcome = execute(&mut ctl, chain(vec![call(&[f])]), source(&out));

    // One charge for the call, four for commands
    assert!(outcome.quota_exhausted);
    assert_eq!(outcome.commands_executed, 5);
    assert_eq!(
        logged(&log),
        vec!["line 0", "line 1", "line 2", "line 3"]
    );
}

#[test]
fn test_quota_counts_modifier_applications() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = limited(3);

    let outcome = execute(
        &mut ctl,
        chain(vec![fork(&["a", "b", "c"]), run(), say(&log, "x")]),
        source(&out),
    );

    // The fork charges once for its single incoming source
    assert_eq!(logged(&log), vec!["a:x", "b:x"]);
    assert!(outcome.quota_exhausted);
    assert_eq!(outcome.commands_executed, 3);
}

#[test]
fn test_wide_fork_stops_at_quota() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = limited(2);

    let outcome = execute(
        &mut ctl,
        chain(vec![fork(&["a", "b", "c"]), fork(&["x"]), run(), say(&log, "hi")]),
        source(&out),
    );

    // One application for the first fork, then only one of three for the second
    assert!(outcome.quota_exhausted);
    assert_eq!(outcome.commands_executed, 2);
    assert!(logged(&log).is_empty());
}

#[test]
fn test_quota_resets_between_executions() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = limited(2);

    for i in 0..3 {
        let outcome = execute(
            &mut ctl,
            chain(vec![say(&log, &format!("run {}", i))]),
            source(&out),
        );
        assert!(!outcome.quota_exhausted);
        assert_eq!(outcome.commands_executed, 1);
    }
    assert_eq!(logged(&log).len(), 3);
}

#[test]
fn test_step_drives_queue_one_task_at_a_time() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::default();

    ctl.queue_next(Task::line(chain(vec![say(&log, "a")]), source(&out)));
    ctl.queue_next(Task::line(chain(vec![say(&log, "b")]), source(&out)));

    // Two continuations, then their two commands
    assert_eq!(step(&mut ctl), Step::Continue);
    assert_eq!(step(&mut ctl), Step::Continue);
    assert!(logged(&log).is_empty());

    assert_eq!(step(&mut ctl), Step::Continue);
    assert_eq!(logged(&log), vec!["a"]);

    run_until_done(&mut ctl);
    assert_eq!(logged(&log), vec!["a", "b"]);
    assert_eq!(step(&mut ctl), Step::Done);
}
