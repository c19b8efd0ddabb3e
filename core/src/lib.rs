pub mod cli;
pub mod config;
pub mod engine;
pub mod logging;
pub mod pack;

// Re-export main types
pub use config::EngineConfig;
pub use engine::{
    CommandSource, ContextChain, ExecutionControl, ExecutionOutcome, Limits, ResultCallback, Task,
};
pub use pack::Pack;
