//! Core execution loop
//!
//! `step()` pops one task off the queue, skips it if its frame was discarded,
//! runs it, and then settles the task's join group.
//!
//! ## Function Organization
//! 1. run_until_done() - Top-level driver (calls step repeatedly)
//! 2. step() - One queue entry (dispatches to task handlers)

use super::control::{ExecutionControl, Step};
use super::tasks::run_task;

/* ===================== Public API ===================== */

/// Drain the queue
pub fn run_until_done(ctl: &mut ExecutionControl) {
    loop {
        match step(ctl) {
            Step::Continue => continue,
            Step::Done => break,
        }
    }
}

/// Execute one queued task
pub fn step(ctl: &mut ExecutionControl) -> Step {
    // Quota spent: drop everything still queued
    if ctl.has_pending() && ctl.quota_reached() {
        ctl.exhaust_quota();
        return Step::Done;
    }

    let Some(queued) = ctl.pop_front() else {
        return Step::Done;
    };

    if ctl.is_frame_live(queued.frame) {
        ctl.set_cursor(queued.frame, queued.group);
        tracing::trace!(
            task = queued.task.name(),
            depth = ctl.depth(),
            "Running task"
        );
        run_task(ctl, queued.task);
    } else {
        tracing::trace!(task = queued.task.name(), "Skipping task of discarded frame");
    }

    // Whatever the task spawned is already counted in the group
    ctl.complete_in_group(queued.group);

    Step::Continue
}
