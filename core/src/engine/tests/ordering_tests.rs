//! Queue ordering: work runs breadth-first in the order it was queued

use super::helpers::*;
use crate::engine::{CommandFunction, ExecutionControl};
use proptest::prelude::*;
use std::rc::Rc;

/* ===================== Forks ===================== */

#[test]
fn test_nested_forks_run_in_source_order() {
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::default();

    let line = chain(vec![fork(&["a", "b"]), fork(&["x", "y"]), run(), say(&log, "hit")]);
    execute(&mut ctl, line, source(&out));

    assert_eq!(logged(&log), vec!["ax:hit", "ay:hit", "bx:hit", "by:hit"]);
}

#[test]
fn test_sibling_forks_interleave_function_lines() {
    // Both entities run the same two-line function; line 1 of every
    // branch runs before any branch starts line 2
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::default();

    let f = function(
        "f",
        vec![chain(vec![say(&log, "one")]), chain(vec![say(&log, "two")])],
    );
    let line = chain(vec![fork(&["a", "b", "c"]), run(), call(&[f])]);
    execute(&mut ctl, line, source(&out));

    assert_eq!(
        logged(&log),
        vec!["a:one", "b:one", "c:one", "a:two", "b:two", "c:two"]
    );
}

#[test]
fn test_function_line_waits_for_everything_previous_line_spawned() {
    // Line 1 forks and calls a nested function; line 2 must not start
    // until every nested body has drained
    let log = new_log();
    let out = Recorder::new();
    let mut ctl = ExecutionControl::default();

    let inner = function(
        "inner",
        vec![chain(vec![say(&log, "in1")]), chain(vec![say(&log, "in2")])],
    );
    let outer = function(
        "outer",
        vec![
            chain(vec![fork(&["a", "b"]), run(), call(&[inner])]),
            chain(vec![say(&log, "after")]),
        ],
    );
    execute(&mut ctl, chain(vec![call(&[outer])]), source(&out));

    assert_eq!(
        logged(&log),
        vec!["a:in1", "b:in1", "a:in2", "b:in2", "after"]
    );
}

/* ===================== Properties ===================== */

/// Expected round-robin order for functions with the given line counts
fn round_robin(lengths: &[usize]) -> Vec<String> {
    let longest = lengths.iter().copied().max().unwrap_or(0);
    let mut expected = Vec::new();
    for line in 0..longest {
        for (f, len) in lengths.iter().enumerate() {
            if line < *len {
                expected.push(format!("f{}:{}", f, line));
            }
        }
    }
    expected
}

proptest! {
    #[test]
    fn forks_run_in_product_order(outer in 1usize..5, inner in 1usize..5) {
        let log = new_log();
        let out = Recorder::new();
        let mut ctl = ExecutionControl::default();

        let outer_names: Vec<String> = (0..outer).map(|i| format!("o{}", i)).collect();
        let inner_names: Vec<String> = (0..inner).map(|i| format!("i{}", i)).collect();
        let outer_refs: Vec<&str> = outer_names.iter().map(String::as_str).collect();
        let inner_refs: Vec<&str> = inner_names.iter().map(String::as_str).collect();

        let line = chain(vec![fork(&outer_refs), fork(&inner_refs), run(), say(&log, "x")]);
        execute(&mut ctl, line, source(&out));

        let expected: Vec<String> = outer_names
            .iter()
            .flat_map(|o| inner_names.iter().map(move |i| format!("{}{}:x", o, i)))
            .collect();
        prop_assert_eq!(logged(&log), expected);
    }

    #[test]
    fn multi_function_calls_interleave_round_robin(
        lengths in prop::collection::vec(1usize..4, 1..5)
    ) {
        let log = new_log();
        let out = Recorder::new();
        let mut ctl = ExecutionControl::default();

        let functions: Vec<Rc<dyn CommandFunction>> = lengths
            .iter()
            .enumerate()
            .map(|(f, len)| {
                let lines = (0..*len)
                    .map(|line| chain(vec![say(&log, &format!("f{}:{}", f, line))]))
                    .collect();
                function(&format!("f{}", f), lines)
            })
            .collect();

        execute(&mut ctl, chain(vec![call(&functions)]), source(&out));

        prop_assert_eq!(logged(&log), round_robin(&lengths));
    }
}
