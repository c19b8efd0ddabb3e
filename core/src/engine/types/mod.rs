//! Type definitions for the engine
//!
//! - Command sources and their output sinks
//! - Context chains, stages and chain modifiers
//! - Result callbacks
//! - Frames and queue tasks
//! - Function definitions

pub mod callback;
pub mod chain;
pub mod frame;
pub mod function;
pub mod source;
pub mod task;

pub use callback::{AccumulatorId, FilterId, ResultCallback};
pub use chain::{
    Arguments, ChainModifiers, Condition, ContextChain, Executable, RedirectModifier, Stage,
    StageAction,
};
pub use frame::{Frame, FrameId};
pub use function::{CommandFunction, InstantiatedFunction, PlainFunction};
pub use source::{CommandOutput, CommandSource, NullOutput, SourceContext};
pub use task::{Sources, Task};
