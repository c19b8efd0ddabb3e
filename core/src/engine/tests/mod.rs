//! Tests for the execution engine
//!
//! Organized by feature area

mod helpers;

mod fork_tests;
mod ordering_tests;
mod quota_tests;
mod tracer_tests;
