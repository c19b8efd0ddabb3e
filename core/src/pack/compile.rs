//! Syntax tree to context chain
//!
//! Each `execute` clause becomes one stage, `run` an identity redirect and
//! `return run` a return modifier, followed by the stages of the command
//! they run.

use super::commands::{AsEntities, Fail, Say, ScoreCommand, ScoreOp, ScoreTest, StoreOutcome};
use super::parser::{ClauseKind, Command, ParseError, ParseResult};
use super::trace_file::TraceFile;
use super::Registry;
use crate::engine::{Arguments, ContextChain, SharedTracer, Stage, StageAction, TracerFactory};
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) fn compile(
    registry: &Registry,
    line: &str,
    command: &Command,
) -> ParseResult<ContextChain> {
    let mut stages = Vec::new();
    push_stages(registry, command, &mut stages)?;
    ContextChain::new(line, stages)
        .ok_or_else(|| ParseError::BuildError(format!("Incomplete command: {}", line)))
}

fn push_stages(
    registry: &Registry,
    command: &Command,
    stages: &mut Vec<Stage>,
) -> ParseResult<()> {
    match command {
        Command::Say { text } => {
            stages.push(
                Stage::new(format!("say {}", text), StageAction::Execute(Rc::new(Say)))
                    .with_argument("text", text.as_str()),
            );
        }

        Command::Fail { text } => {
            stages.push(
                Stage::new(format!("fail {}", text), StageAction::Execute(Rc::new(Fail)))
                    .with_argument("text", text.as_str()),
            );
        }

        Command::ScoreSet { objective, value } => {
            stages.push(score_stage(registry, ScoreOp::Set, objective, Some(*value)));
        }

        Command::ScoreAdd { objective, value } => {
            stages.push(score_stage(registry, ScoreOp::Add, objective, Some(*value)));
        }

        Command::ScoreGet { objective } => {
            stages.push(score_stage(registry, ScoreOp::Get, objective, None));
        }

        Command::Function { target, arguments } => {
            let functions = registry.resolve(target)?;
            let arguments = arguments
                .as_ref()
                .map(|map| map.clone().into_iter().collect::<Arguments>());
            stages.push(Stage::new(
                format!("function {}", target),
                StageAction::CallFunctions {
                    functions,
                    arguments,
                },
            ));
        }

        Command::DebugFunction { target } => {
            let functions = registry.resolve(target)?;
            let dir = registry.trace_dir().to_path_buf();
            let tracer: TracerFactory = Rc::new(move || -> SharedTracer {
                Rc::new(RefCell::new(TraceFile::new(dir.clone())))
            });
            stages.push(Stage::new(
                format!("debug function {}", target),
                StageAction::TraceFunctions { functions, tracer },
            ));
        }

        Command::ReturnValue { value } => {
            stages.push(Stage::new(
                format!("return {}", value),
                StageAction::ReturnValue(*value),
            ));
        }

        Command::ReturnFail => {
            stages.push(Stage::new("return fail", StageAction::ReturnFail));
        }

        Command::ReturnRun { command } => {
            stages.push(Stage::new("return run", StageAction::ReturnRun));
            push_stages(registry, command, stages)?;
        }

        Command::Execute { clauses, run } => {
            for clause in clauses {
                let stage = match &clause.kind {
                    ClauseKind::As { targets } => {
                        let stage = Stage::new(
                            clause.text.as_str(),
                            StageAction::Redirect {
                                modifier: Some(Rc::new(AsEntities {
                                    entities: registry.entities(),
                                })),
                                fork: true,
                            },
                        );
                        match targets {
                            Some(names) => stage.with_argument("targets", names.clone()),
                            None => stage,
                        }
                    }

                    ClauseKind::IfFunction { condition, target } => Stage::new(
                        clause.text.as_str(),
                        StageAction::TestFunctions {
                            functions: registry.resolve(target)?,
                            condition: *condition,
                        },
                    ),

                    ClauseKind::IfScore {
                        condition,
                        objective,
                        comparison,
                        value,
                    } => Stage::new(
                        clause.text.as_str(),
                        StageAction::Redirect {
                            modifier: Some(Rc::new(ScoreTest {
                                scoreboard: registry.scoreboard().clone(),
                                condition: *condition,
                                comparison: *comparison,
                            })),
                            fork: false,
                        },
                    )
                    .with_argument("objective", objective.as_str())
                    .with_argument("value", *value),

                    ClauseKind::Store { kind, objective } => Stage::new(
                        clause.text.as_str(),
                        StageAction::Redirect {
                            modifier: Some(Rc::new(StoreOutcome {
                                scoreboard: registry.scoreboard().clone(),
                                kind: *kind,
                            })),
                            fork: false,
                        },
                    )
                    .with_argument("objective", objective.as_str()),
                };
                stages.push(stage);
            }

            stages.push(Stage::new(
                "run",
                StageAction::Redirect {
                    modifier: None,
                    fork: false,
                },
            ));
            push_stages(registry, run, stages)?;
        }
    }

    Ok(())
}

fn score_stage(registry: &Registry, op: ScoreOp, objective: &str, value: Option<i32>) -> Stage {
    let verb = match op {
        ScoreOp::Set => "set",
        ScoreOp::Add => "add",
        ScoreOp::Get => "get",
    };
    let text = match value {
        Some(v) => format!("score {} {} {}", verb, objective, v),
        None => format!("score {} {}", verb, objective),
    };

    let stage = Stage::new(
        text,
        StageAction::Execute(Rc::new(ScoreCommand {
            scoreboard: registry.scoreboard().clone(),
            op,
        })),
    )
    .with_argument("objective", objective);

    match value {
        Some(v) => stage.with_argument("value", v),
        None => stage,
    }
}
