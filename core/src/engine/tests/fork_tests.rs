//! Forking redirects, modifier failures and the fork limit

use super::helpers::*;
use crate::engine::{ExecutionControl, Limits};

/* ===================== Forked Branches ===================== */

#[test]
fn test_failing_branch_does_not_stop_siblings() {
    // Three forks, the second fails: two results, one failure
    let log = new_log();
    let out = Recorder::new();
    let (callback, seen) = results();
    let mut ctl = ExecutionControl::default();

    let line = chain(vec![
        fork(&["a", "b", "c"]),
        run(),
        say_unless_entity(&log, "hi", "b"),
    ]);
    execute(&mut ctl, line, source(&out).with_callback(callback));

    assert_eq!(logged(&log), vec!["a:hi", "c:hi"]);
    assert_eq!(*seen.borrow(), vec![(true, 1), (false, 0), (true, 1)]);
    assert_eq!(out.failures(), vec!["b refused"]);

    let successes = seen.borrow().iter().filter(|(ok, _)| *ok).count();
    assert_eq!(successes, 2);
}

#[test]
fn test_each_forked_source_keeps_its_own_context() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::default();

    let line = chain(vec![fork(&["a", "b"]), run(), say(&log, "x")]);
    execute(&mut ctl, line, source(&out));

    assert_eq!(logged(&log), vec!["a:x", "b:x"]);
    assert_eq!(out.successes(), vec!["x", "x"]);
}

/* ===================== Modifier Errors ===================== */

#[test]
fn test_modifier_error_in_forked_chain_skips_only_that_source() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::default();

    // The broken redirect errors for every source; the chain is forked, so
    // each error is reported and nothing survives to the terminal
    let line = chain(vec![
        fork(&["a", "b"]),
        broken_redirect(false),
        run(),
        say(&log, "x"),
    ]);
    execute(&mut ctl, line, source(&out));

    assert!(logged(&log).is_empty());
    assert_eq!(out.failures(), vec!["No position for a", "No position for b"]);
}

#[test]
fn test_modifier_error_in_unforked_chain_aborts() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::default();

    let line = chain(vec![broken_redirect(false), run(), say(&log, "x")]);
    execute(&mut ctl, line, source(&out));

    assert!(logged(&log).is_empty());
    assert_eq!(out.failures(), vec!["No position for "]);
}

#[test]
fn test_redirect_to_no_sources_runs_nothing() {
    let log = new_log();
    let out = Recorder::new();
    let (callback, seen) = results();
    let mut ctl = ExecutionControl::default();

    let line = chain(vec![fork(&[]), run(), say(&log, "x")]);
    execute(&mut ctl, line, source(&out).with_callback(callback));

    assert!(logged(&log).is_empty());
    assert!(seen.borrow().is_empty());
    assert!(out.messages().is_empty());
}

/* ===================== Fork Limit ===================== */

#[test]
fn test_fork_limit_aborts_line() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::new(Limits {
        max_command_fork_count: 2,
        ..Limits::default()
    });

    let line = chain(vec![fork(&["a", "b", "c"]), run(), say(&log, "x")]);
    execute(&mut ctl, line, source(&out));

    assert!(logged(&log).is_empty());
    assert_eq!(out.failures(), vec!["Maximum number of contexts (2) reached"]);
}

#[test]
fn test_fork_limit_counts_across_sources() {
    // 2 x 2 derived sources exceed a limit of 3 at the second stage
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::new(Limits {
        max_command_fork_count: 3,
        ..Limits::default()
    });

    let line = chain(vec![fork(&["a", "b"]), fork(&["x", "y"]), run(), say(&log, "x")]);
    execute(&mut ctl, line, source(&out));

    assert!(logged(&log).is_empty());
    assert_eq!(out.failures(), vec!["Maximum number of contexts (3) reached"]);
}
