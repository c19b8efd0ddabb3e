//! Test helpers for engine tests
//!
//! Builders for hand-resolved context chains, plus recording outputs and
//! callbacks to observe what ran and what was reported.

use crate::engine::{
    CommandError, CommandFunction, CommandOutput, CommandSource, Condition, ContextChain,
    Executable, ExecutionControl, ExecutionOutcome, PlainFunction, RedirectModifier,
    ResultCallback, Stage, StageAction, Task,
};
use std::cell::RefCell;
use std::rc::Rc;

/* ===================== Recorders ===================== */

/// Ordered log of executed commands, shared by every stage of a test
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Success(String),
    Failure(String),
}

/// Output that keeps every message it receives
#[derive(Default)]
pub struct Recorder {
    messages: RefCell<Vec<Message>>,
}

impl Recorder {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter_map(|m| match m {
                Message::Success(text) => Some(text.clone()),
                Message::Failure(_) => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter_map(|m| match m {
                Message::Failure(text) => Some(text.clone()),
                Message::Success(_) => None,
            })
            .collect()
    }
}

impl CommandOutput for Recorder {
    fn send_success(&self, message: &str) {
        self.messages
            .borrow_mut()
            .push(Message::Success(message.to_string()));
    }

    fn send_failure(&self, message: &str) {
        self.messages
            .borrow_mut()
            .push(Message::Failure(message.to_string()));
    }
}

/// Source named "test" writing to `output`
pub fn source(output: &Rc<Recorder>) -> CommandSource {
    CommandSource::new("test", output.clone())
}

/// Callback that records every `(success, result)` it observes
pub fn results() -> (ResultCallback, Rc<RefCell<Vec<(bool, i32)>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let callback = ResultCallback::sink(move |success, result| {
        sink.borrow_mut().push((success, result));
    });
    (callback, seen)
}

/* ===================== Stages ===================== */

/// Terminal that logs `text` (prefixed with the source's entity, if any),
/// sends it as a message and succeeds with 1
pub fn say(log: &Log, text: &str) -> Stage {
    let log = log.clone();
    let owned = text.to_string();
    let executable: Rc<dyn Executable> = Rc::new(
        move |source: &CommandSource, _stage: &Stage| -> Result<i32, CommandError> {
            let line = match &source.context.entity {
                Some(entity) => format!("{}:{}", entity, owned),
                None => owned.clone(),
            };
            log.borrow_mut().push(line);
            source.send_success(&owned);
            Ok(1)
        },
    );
    Stage::new(format!("say {}", text), StageAction::Execute(executable))
}

/// Terminal that succeeds with `value` and does nothing else
pub fn value(value: i32) -> Stage {
    let executable: Rc<dyn Executable> =
        Rc::new(move |_: &CommandSource, _: &Stage| -> Result<i32, CommandError> { Ok(value) });
    Stage::new(format!("value {}", value), StageAction::Execute(executable))
}

/// Terminal that always fails with `message`
pub fn fail(message: &str) -> Stage {
    let owned = message.to_string();
    let executable: Rc<dyn Executable> = Rc::new(
        move |_: &CommandSource, _: &Stage| -> Result<i32, CommandError> {
            Err(CommandError::new(owned.clone()))
        },
    );
    Stage::new(format!("fail {}", message), StageAction::Execute(executable))
}

/// Like `say`, but fails for the source whose entity is `bad`
pub fn say_unless_entity(log: &Log, text: &str, bad: &str) -> Stage {
    let log = log.clone();
    let owned = text.to_string();
    let bad = bad.to_string();
    let executable: Rc<dyn Executable> = Rc::new(
        move |source: &CommandSource, _: &Stage| -> Result<i32, CommandError> {
            let entity = source.context.entity.clone().unwrap_or_default();
            if entity == bad {
                return Err(CommandError::new(format!("{} refused", entity)));
            }
            log.borrow_mut().push(format!("{}:{}", entity, owned));
            Ok(1)
        },
    );
    Stage::new(format!("say {}", text), StageAction::Execute(executable))
}

/// Forking redirect: one derived source per name, entity appended to the
/// incoming entity
pub fn fork(names: &[&str]) -> Stage {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let input = format!("as {}", names.join(","));
    let modifier: Rc<dyn RedirectModifier> = Rc::new(
        move |source: &CommandSource, _: &Stage| -> Result<Vec<CommandSource>, CommandError> {
            let prefix = source.context.entity.clone().unwrap_or_default();
            Ok(names
                .iter()
                .map(|name| source.with_entity(format!("{}{}", prefix, name)))
                .collect())
        },
    );
    Stage::new(
        input,
        StageAction::Redirect {
            modifier: Some(modifier),
            fork: true,
        },
    )
}

/// Redirect that errors for every source
pub fn broken_redirect(fork: bool) -> Stage {
    let modifier: Rc<dyn RedirectModifier> = Rc::new(
        |source: &CommandSource, _: &Stage| -> Result<Vec<CommandSource>, CommandError> {
            Err(CommandError::new(format!(
                "No position for {}",
                source.context.entity.clone().unwrap_or_default()
            )))
        },
    );
    Stage::new(
        "positioned broken",
        StageAction::Redirect {
            modifier: Some(modifier),
            fork,
        },
    )
}

/// `run`
pub fn run() -> Stage {
    Stage::new(
        "run",
        StageAction::Redirect {
            modifier: None,
            fork: false,
        },
    )
}

pub fn call(functions: &[Rc<dyn CommandFunction>]) -> Stage {
    let ids: Vec<&str> = functions.iter().map(|f| f.id()).collect();
    Stage::new(
        format!("function {}", ids.join(",")),
        StageAction::CallFunctions {
            functions: functions.to_vec(),
            arguments: None,
        },
    )
}

pub fn test_functions(functions: &[Rc<dyn CommandFunction>], condition: Condition) -> Stage {
    let ids: Vec<&str> = functions.iter().map(|f| f.id()).collect();
    let keyword = match condition {
        Condition::If => "if",
        Condition::Unless => "unless",
    };
    Stage::new(
        format!("{} function {}", keyword, ids.join(",")),
        StageAction::TestFunctions {
            functions: functions.to_vec(),
            condition,
        },
    )
}

pub fn return_value(value: i32) -> Stage {
    Stage::new(format!("return {}", value), StageAction::ReturnValue(value))
}

pub fn return_fail() -> Stage {
    Stage::new("return fail", StageAction::ReturnFail)
}

pub fn return_run() -> Stage {
    Stage::new("return run", StageAction::ReturnRun)
}

/* ===================== Chains & Functions ===================== */

/// Chain whose command text is the stage inputs joined by spaces
///
/// Panics if the stages don't form a valid chain.
pub fn chain(stages: Vec<Stage>) -> ContextChain {
    let command = stages
        .iter()
        .map(|s| s.input.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    ContextChain::new(command, stages).expect("Invalid test chain")
}

pub fn function(id: &str, lines: Vec<ContextChain>) -> Rc<dyn CommandFunction> {
    Rc::new(PlainFunction::new(id, lines))
}

/// Dispatch `chain` for `source` on a fresh queue run
pub fn execute(
    ctl: &mut ExecutionControl,
    chain: ContextChain,
    source: CommandSource,
) -> ExecutionOutcome {
    ctl.execute(Task::line(chain, source))
}

pub fn logged(log: &Log) -> Vec<String> {
    log.borrow().clone()
}
