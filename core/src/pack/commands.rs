//! Command effects and redirect modifiers for pack lines
//!
//! Effects read their operands from the stage's bound arguments.

use super::parser::{Comparison, StoreKind};
use super::scoreboard::Scoreboard;
use crate::engine::{
    CommandError, CommandSource, Condition, Executable, RedirectModifier, ResultCallback, Stage,
};
use std::rc::Rc;

/* ===================== Messages ===================== */

/// `say <text>`: succeeds with 1
pub struct Say;

impl Executable for Say {
    fn run(&self, source: &CommandSource, stage: &Stage) -> Result<i32, CommandError> {
        source.send_success(stage.string_argument("text")?);
        Ok(1)
    }
}

/// `fail <text>`: always fails with `text`
pub struct Fail;

impl Executable for Fail {
    fn run(&self, _source: &CommandSource, stage: &Stage) -> Result<i32, CommandError> {
        Err(CommandError::new(stage.string_argument("text")?))
    }
}

/* ===================== Scores ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOp {
    Set,
    Add,
    Get,
}

/// `score set|add|get`; results are the resulting score
pub struct ScoreCommand {
    pub scoreboard: Scoreboard,
    pub op: ScoreOp,
}

impl Executable for ScoreCommand {
    fn run(&self, source: &CommandSource, stage: &Stage) -> Result<i32, CommandError> {
        let holder = Scoreboard::holder(source);
        let objective = stage.string_argument("objective")?;

        match self.op {
            ScoreOp::Set => {
                let value = stage.integer_argument("value")?;
                self.scoreboard.set(&holder, objective, value);
                Ok(value)
            }
            ScoreOp::Add => {
                let delta = stage.integer_argument("value")?;
                Ok(self.scoreboard.add(&holder, objective, delta))
            }
            ScoreOp::Get => match self.scoreboard.get(&holder, objective) {
                Some(value) => {
                    source.send_success(&format!("{} has {} [{}]", holder, value, objective));
                    Ok(value)
                }
                None => Err(CommandError::new(format!(
                    "Can't get value of {} for {}; none is set",
                    objective, holder
                ))),
            },
        }
    }
}

/* ===================== Modifiers ===================== */

/// `as <names>` / `as @all`: one derived source per entity
pub struct AsEntities {
    pub entities: Rc<[String]>,
}

impl RedirectModifier for AsEntities {
    fn apply(
        &self,
        source: &CommandSource,
        stage: &Stage,
    ) -> Result<Vec<CommandSource>, CommandError> {
        let named: Vec<String> = match stage.argument("targets") {
            Some(targets) => serde_json::from_value(targets.clone())
                .map_err(|e| CommandError::new(format!("Invalid targets: {}", e)))?,
            None => self.entities.to_vec(),
        };

        if named.is_empty() {
            return Err(CommandError::new("No entity was found"));
        }
        Ok(named.into_iter().map(|name| source.with_entity(name)).collect())
    }
}

/// `if|unless score <objective> <op> <n>`: keeps or drops the source
pub struct ScoreTest {
    pub scoreboard: Scoreboard,
    pub condition: Condition,
    pub comparison: Comparison,
}

impl RedirectModifier for ScoreTest {
    fn apply(
        &self,
        source: &CommandSource,
        stage: &Stage,
    ) -> Result<Vec<CommandSource>, CommandError> {
        let objective = stage.string_argument("objective")?;
        let value = stage.integer_argument("value")?;
        let holder = Scoreboard::holder(source);

        let matched = self
            .scoreboard
            .get(&holder, objective)
            .is_some_and(|score| self.comparison.test(score, value));
        let passes = match self.condition {
            Condition::If => matched,
            Condition::Unless => !matched,
        };

        Ok(if passes { vec![source.clone()] } else { Vec::new() })
    }
}

/// `store result|success <objective>`: records the line's outcome
pub struct StoreOutcome {
    pub scoreboard: Scoreboard,
    pub kind: StoreKind,
}

impl RedirectModifier for StoreOutcome {
    fn apply(
        &self,
        source: &CommandSource,
        stage: &Stage,
    ) -> Result<Vec<CommandSource>, CommandError> {
        let objective = stage.string_argument("objective")?.to_string();
        let holder = Scoreboard::holder(source);
        let scoreboard = self.scoreboard.clone();
        let kind = self.kind;

        let store = ResultCallback::sink(move |success, result| {
            let value = match kind {
                StoreKind::Result => result,
                StoreKind::Success => i32::from(success),
            };
            scoreboard.set(&holder, &objective, value);
        });

        Ok(vec![source.with_callback(ResultCallback::chain(
            source.callback().clone(),
            store,
        ))])
    }
}
