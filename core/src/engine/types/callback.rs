//! Result callbacks
//!
//! A callback observes `(success, result)` once per completed command or
//! function return. Composition builds a new value and never mutates an
//! existing one. Variants that target engine state (frames, accumulators,
//! source filters) are resolved by `ExecutionControl::fire`, which walks
//! chains with an explicit work list instead of recursing.

use super::chain::Condition;
use super::frame::FrameId;
use super::source::CommandSource;
use std::fmt;
use std::rc::Rc;

/// Handle to a no-return multi-function accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccumulatorId(pub(crate) u64);

/// Handle to the source set collected by a conditional function test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(pub(crate) u64);

#[derive(Clone, Default)]
pub enum ResultCallback {
    /// The no-op default
    #[default]
    Empty,

    /// External observer (store-result sinks, test recorders)
    Sink(Rc<dyn Fn(bool, i32)>),

    /// Both sides observe the same outcome, left first
    Chain(Rc<ResultCallback>, Rc<ResultCallback>),

    /// Feeds the return-value consumer of a live frame
    FrameReturn(FrameId),

    /// Adds successful results to an accumulator
    Accumulate(AccumulatorId),

    /// Keeps `source` for the continuation when `condition` holds
    Filter {
        filter: FilterId,
        index: usize,
        condition: Condition,
        source: Rc<CommandSource>,
    },

    /// Announces the function result to `source`, then forwards
    FunctionResult {
        id: Rc<str>,
        source: Rc<CommandSource>,
        then: Rc<ResultCallback>,
    },
}

impl ResultCallback {
    pub fn sink(f: impl Fn(bool, i32) + 'static) -> Self {
        ResultCallback::Sink(Rc::new(f))
    }

    /// Compose two callbacks; EMPTY sides are dropped
    pub fn chain(first: ResultCallback, second: ResultCallback) -> Self {
        match (first.is_empty(), second.is_empty()) {
            (true, _) => second,
            (_, true) => first,
            _ => ResultCallback::Chain(Rc::new(first), Rc::new(second)),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResultCallback::Empty)
    }
}

impl fmt::Debug for ResultCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCallback::Empty => write!(f, "Empty"),
            ResultCallback::Sink(_) => write!(f, "Sink"),
            ResultCallback::Chain(a, b) => f.debug_tuple("Chain").field(a).field(b).finish(),
            ResultCallback::FrameReturn(id) => f.debug_tuple("FrameReturn").field(id).finish(),
            ResultCallback::Accumulate(id) => f.debug_tuple("Accumulate").field(id).finish(),
            ResultCallback::Filter {
                filter,
                index,
                condition,
                ..
            } => f
                .debug_struct("Filter")
                .field("filter", filter)
                .field("index", index)
                .field("condition", condition)
                .finish_non_exhaustive(),
            ResultCallback::FunctionResult { id, then, .. } => f
                .debug_struct("FunctionResult")
                .field("id", id)
                .field("then", then)
                .finish_non_exhaustive(),
        }
    }
}
