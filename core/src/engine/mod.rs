//! # Command Execution Engine
//!
//! Runs resolved command lines (`ContextChain`s) to completion on a single
//! FIFO continuation queue.
//!
//! ## Core Principles
//!
//! 1. **Queue-driven execution**: every unit of work is a `Task` on one queue;
//!    function calls enqueue their bodies instead of recursing
//! 2. **Frames as a table**: call depth lives in `ExecutionControl`, never on
//!    the native stack
//! 3. **Join groups**: a function line starts only after everything the
//!    previous line spawned has drained
//! 4. **Branch-local failure**: errors abort one branch and are reported to
//!    its source; queued siblings keep running

pub mod control;
pub mod errors;
pub mod exec_loop;
mod functions;
mod tasks;
pub mod tracer;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use control::{ExecutionControl, ExecutionOutcome, Limits, Step};
pub use errors::{CommandError, EngineError, InstantiationError};
pub use exec_loop::{run_until_done, step};
pub use tracer::{SharedTracer, TraceOutput, TraceSink, TraceWriter, TracerFactory};
pub use types::{
    Arguments, ChainModifiers, CommandFunction, CommandOutput, CommandSource, Condition,
    ContextChain, Executable, Frame, FrameId, InstantiatedFunction, NullOutput, PlainFunction,
    RedirectModifier, ResultCallback, SourceContext, Sources, Stage, StageAction, Task,
};
