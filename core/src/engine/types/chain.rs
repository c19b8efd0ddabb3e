//! Resolved command lines
//!
//! A `ContextChain` is what the syntax front end hands the engine: the
//! ordered stages of one command line, each carrying its action and the
//! arguments already bound to it.

use super::super::errors::CommandError;
use super::function::CommandFunction;
use super::source::CommandSource;
use crate::engine::tracer::TracerFactory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Arguments bound to a stage by the front end
pub type Arguments = BTreeMap<String, Value>;

/* ===================== External Collaborators ===================== */

/// The concrete effect of a terminal command
pub trait Executable {
    fn run(&self, source: &CommandSource, stage: &Stage) -> Result<i32, CommandError>;
}

impl<F> Executable for F
where
    F: Fn(&CommandSource, &Stage) -> Result<i32, CommandError>,
{
    fn run(&self, source: &CommandSource, stage: &Stage) -> Result<i32, CommandError> {
        self(source, stage)
    }
}

/// Maps one incoming source to zero or more derived sources
pub trait RedirectModifier {
    fn apply(&self, source: &CommandSource, stage: &Stage)
        -> Result<Vec<CommandSource>, CommandError>;
}

impl<F> RedirectModifier for F
where
    F: Fn(&CommandSource, &Stage) -> Result<Vec<CommandSource>, CommandError>,
{
    fn apply(
        &self,
        source: &CommandSource,
        stage: &Stage,
    ) -> Result<Vec<CommandSource>, CommandError> {
        self(source, stage)
    }
}

/* ===================== Stage Actions ===================== */

/// Predicate applied to a function result by `execute if|unless function`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    If,
    Unless,
}

impl Condition {
    pub fn test(self, result: i32) -> bool {
        match self {
            Condition::If => result != 0,
            Condition::Unless => result == 0,
        }
    }
}

/// What a stage does when the engine reaches it
#[derive(Clone)]
pub enum StageAction {
    /// Terminal command with an opaque effect
    Execute(Rc<dyn Executable>),

    /// Source-rewriting stage; `modifier: None` is a plain `run` redirect
    Redirect {
        modifier: Option<Rc<dyn RedirectModifier>>,
        fork: bool,
    },

    /// Terminal `function <targets>`
    CallFunctions {
        functions: Vec<Rc<dyn CommandFunction>>,
        arguments: Option<Arguments>,
    },

    /// `execute if|unless function <targets>`
    TestFunctions {
        functions: Vec<Rc<dyn CommandFunction>>,
        condition: Condition,
    },

    /// Terminal `return <value>`
    ReturnValue(i32),

    /// Terminal `return fail`
    ReturnFail,

    /// `return run ...`
    ReturnRun,

    /// Terminal `debug function <targets>`; every run gets a fresh tracer
    TraceFunctions {
        functions: Vec<Rc<dyn CommandFunction>>,
        tracer: TracerFactory,
    },
}

impl StageAction {
    /// Terminal actions end a chain; everything else hands over to the next stage
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            StageAction::Redirect { .. } | StageAction::TestFunctions { .. } | StageAction::ReturnRun
        )
    }

    fn name(&self) -> &'static str {
        match self {
            StageAction::Execute(_) => "Execute",
            StageAction::Redirect { .. } => "Redirect",
            StageAction::CallFunctions { .. } => "CallFunctions",
            StageAction::TestFunctions { .. } => "TestFunctions",
            StageAction::ReturnValue(_) => "ReturnValue",
            StageAction::ReturnFail => "ReturnFail",
            StageAction::ReturnRun => "ReturnRun",
            StageAction::TraceFunctions { .. } => "TraceFunctions",
        }
    }
}

impl fmt::Debug for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageAction::Redirect { modifier, fork } => f
                .debug_struct("Redirect")
                .field("identity", &modifier.is_none())
                .field("fork", fork)
                .finish(),
            StageAction::ReturnValue(v) => f.debug_tuple("ReturnValue").field(v).finish(),
            StageAction::TestFunctions { functions, condition } => f
                .debug_struct("TestFunctions")
                .field("functions", &functions.len())
                .field("condition", condition)
                .finish(),
            other => write!(f, "{}", other.name()),
        }
    }
}

/* ===================== Stage ===================== */

/// One resolved node plus its bound arguments
#[derive(Debug, Clone)]
pub struct Stage {
    /// Source text of this stage
    pub input: String,
    pub arguments: Arguments,
    pub action: StageAction,
}

impl Stage {
    pub fn new(input: impl Into<String>, action: StageAction) -> Self {
        Self {
            input: input.into(),
            arguments: Arguments::new(),
            action,
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub fn string_argument(&self, name: &str) -> Result<&str, CommandError> {
        self.argument(name)
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::new(format!("Missing string argument '{}'", name)))
    }

    pub fn integer_argument(&self, name: &str) -> Result<i32, CommandError> {
        self.argument(name)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| CommandError::new(format!("Missing integer argument '{}'", name)))
    }
}

/* ===================== Context Chain ===================== */

/// The ordered stages of one command line, consumed strictly in order
#[derive(Debug, Clone)]
pub struct ContextChain {
    command: Rc<str>,
    stages: Rc<[Stage]>,
    position: usize,
}

impl ContextChain {
    /// Build a chain; returns `None` unless exactly the last stage is terminal
    pub fn new(command: impl Into<Rc<str>>, stages: Vec<Stage>) -> Option<Self> {
        let (last, rest) = stages.split_last()?;
        if !last.action.is_terminal() || rest.iter().any(|s| s.action.is_terminal()) {
            return None;
        }
        Some(Self {
            command: command.into(),
            stages: stages.into(),
            position: 0,
        })
    }

    /// Single-stage chain around a terminal action
    pub fn single(command: impl Into<Rc<str>>, action: StageAction) -> Option<Self> {
        let command = command.into();
        let stage = Stage::new(command.to_string(), action);
        Self::new(command, vec![stage])
    }

    /// Full text of the command line this chain was resolved from
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The stage about to run
    pub fn top_context(&self) -> &Stage {
        &self.stages[self.position]
    }

    /// The chain without its head; `None` once the terminal stage is reached
    pub fn next_stage(&self) -> Option<Self> {
        if self.position + 1 >= self.stages.len() {
            return None;
        }
        Some(Self {
            command: self.command.clone(),
            stages: self.stages.clone(),
            position: self.position + 1,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.top_context().action.is_terminal()
    }

    /// Remaining stages, head first
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages[self.position..].iter()
    }
}

/* ===================== Chain Modifiers ===================== */

/// Per-line execution flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainModifiers {
    pub is_forked: bool,
    pub is_return: bool,
}

impl ChainModifiers {
    pub fn set_forked(self) -> Self {
        Self {
            is_forked: true,
            ..self
        }
    }

    pub fn set_return(self) -> Self {
        Self {
            is_return: true,
            ..self
        }
    }
}
