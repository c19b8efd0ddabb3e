//! Queue entries
//!
//! The variant set is closed; `tasks::run_task` dispatches on it.

use super::callback::{AccumulatorId, FilterId, ResultCallback};
use super::chain::{ChainModifiers, ContextChain};
use super::function::InstantiatedFunction;
use super::source::CommandSource;

/// Sources a continuation resumes with
#[derive(Debug, Clone)]
pub enum Sources {
    Direct(Vec<CommandSource>),
    /// Survivors of a conditional function test, collected by the engine
    Filtered(FilterId),
}

#[derive(Debug, Clone)]
pub enum Task {
    /// Walk the chain's non-terminal stages for `sources`, then schedule the terminal stage
    Continuation {
        chain: ContextChain,
        modifiers: ChainModifiers,
        original: CommandSource,
        sources: Sources,
    },

    /// Run the terminal stage of `chain` for one source
    RunStage {
        chain: ContextChain,
        modifiers: ChainModifiers,
        source: CommandSource,
    },

    /// Open a frame and run `function`'s body in it
    CallFunction {
        function: InstantiatedFunction,
        callback: ResultCallback,
        returns_to_caller: bool,
        source: CommandSource,
    },

    /// Start body line `index`; the next line is queued once this one drains
    FunctionEntry {
        function: InstantiatedFunction,
        index: usize,
        source: CommandSource,
    },

    /// Run `functions` in a private frame whose result goes to `callback` only
    IsolatedCall {
        functions: Vec<InstantiatedFunction>,
        source: CommandSource,
        callback: ResultCallback,
    },

    /// Report an accumulated no-return sum, if any function produced a result
    ReportAccumulated {
        accumulator: AccumulatorId,
        callback: ResultCallback,
    },

    /// Announce the end of a `debug function` run
    TraceFinished { source: CommandSource, count: usize },

    /// End of a return-mode branch: fail the frame unless it already returned
    Fallthrough,
}

impl Task {
    /// Top-level dispatch of one line for `source`
    pub fn line(chain: ContextChain, source: CommandSource) -> Self {
        Task::Continuation {
            chain,
            modifiers: ChainModifiers::default(),
            original: source.clone(),
            sources: Sources::Direct(vec![source]),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Task::Continuation { .. } => "Continuation",
            Task::RunStage { .. } => "RunStage",
            Task::CallFunction { .. } => "CallFunction",
            Task::FunctionEntry { .. } => "FunctionEntry",
            Task::IsolatedCall { .. } => "IsolatedCall",
            Task::ReportAccumulated { .. } => "ReportAccumulated",
            Task::TraceFinished { .. } => "TraceFinished",
            Task::Fallthrough => "Fallthrough",
        }
    }
}
