//! Command line parser - PEST-based
//!
//! Produces the syntax tree the pack compiler turns into `ContextChain`s.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::Condition;

/* ===================== Syntax Tree ===================== */

/// One parsed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    Say {
        text: String,
    },
    Fail {
        text: String,
    },
    ScoreSet {
        objective: String,
        value: i32,
    },
    ScoreAdd {
        objective: String,
        value: i32,
    },
    ScoreGet {
        objective: String,
    },
    Function {
        target: String,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    },
    DebugFunction {
        target: String,
    },
    ReturnValue {
        value: i32,
    },
    ReturnFail,
    ReturnRun {
        command: Box<Command>,
    },
    Execute {
        clauses: Vec<Clause>,
        run: Box<Command>,
    },
}

/// One `execute` sub-command, with its source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub text: String,
    pub kind: ClauseKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClauseKind {
    /// `as <names>`; `None` means every known entity
    As {
        targets: Option<Vec<String>>,
    },
    IfFunction {
        condition: Condition,
        target: String,
    },
    IfScore {
        condition: Condition,
        objective: String,
        comparison: Comparison,
        value: i32,
    },
    Store {
        kind: StoreKind,
        objective: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
}

impl Comparison {
    pub fn test(self, left: i32, right: i32) -> bool {
        match self {
            Comparison::Less => left < right,
            Comparison::LessOrEqual => left <= right,
            Comparison::Equal => left == right,
            Comparison::GreaterOrEqual => left >= right,
            Comparison::Greater => left > right,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "=",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Greater => ">",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Result,
    Success,
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "pack/commands.pest"]
struct CommandParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{0}")]
    PestError(String),

    #[error("{0}")]
    BuildError(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::PestError(err.to_string())
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Public API ===================== */

/// Parse one command line
pub fn parse(source: &str) -> ParseResult<Command> {
    let mut pairs = CommandParser::parse(Rule::line, source.trim())?;
    let line = next_pair(&mut pairs, "line")?;

    // line = { SOI ~ command ~ EOI }
    let mut inner = line.into_inner();
    build_command(next_pair(&mut inner, "command")?)
}

/* ===================== Tree Builder ===================== */

fn next_pair<'i>(
    pairs: &mut impl Iterator<Item = Pair<'i, Rule>>,
    expected: &str,
) -> ParseResult<Pair<'i, Rule>> {
    pairs
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Expected {}", expected)))
}

fn build_command(pair: Pair<Rule>) -> ParseResult<Command> {
    match pair.as_rule() {
        Rule::say => Ok(Command::Say {
            text: single_text(pair)?,
        }),
        Rule::fail => Ok(Command::Fail {
            text: single_text(pair)?,
        }),
        Rule::score => build_score(pair),
        Rule::function_call => build_function_call(pair),
        Rule::debug_function => {
            let mut inner = pair.into_inner();
            let target = next_pair(&mut inner, "function reference")?;
            Ok(Command::DebugFunction {
                target: target.as_str().to_string(),
            })
        }
        Rule::return_cmd => build_return(pair),
        Rule::execute => build_execute(pair),
        other => Err(ParseError::BuildError(format!(
            "Unexpected command: {:?}",
            other
        ))),
    }
}

fn single_text(pair: Pair<Rule>) -> ParseResult<String> {
    let mut inner = pair.into_inner();
    Ok(next_pair(&mut inner, "text")?.as_str().to_string())
}

fn build_integer(pair: Pair<Rule>) -> ParseResult<i32> {
    pair.as_str()
        .parse()
        .map_err(|_| ParseError::BuildError(format!("Invalid integer: {}", pair.as_str())))
}

fn build_score(pair: Pair<Rule>) -> ParseResult<Command> {
    // score = { "score" ~ sp ~ (score_set | score_add | score_get) }
    let op = next_pair(&mut pair.into_inner(), "score operation")?;
    let rule = op.as_rule();
    let mut inner = op.into_inner();
    let objective = next_pair(&mut inner, "objective")?.as_str().to_string();

    match rule {
        Rule::score_set => Ok(Command::ScoreSet {
            objective,
            value: build_integer(next_pair(&mut inner, "value")?)?,
        }),
        Rule::score_add => Ok(Command::ScoreAdd {
            objective,
            value: build_integer(next_pair(&mut inner, "value")?)?,
        }),
        Rule::score_get => Ok(Command::ScoreGet { objective }),
        other => Err(ParseError::BuildError(format!(
            "Unexpected score operation: {:?}",
            other
        ))),
    }
}

fn build_function_call(pair: Pair<Rule>) -> ParseResult<Command> {
    // function_call = { "function" ~ sp ~ function_ref ~ (sp ~ arguments)? }
    let mut inner = pair.into_inner();
    let target = next_pair(&mut inner, "function reference")?.as_str().to_string();

    let arguments = match inner.next() {
        Some(args) => match serde_json::from_str(args.as_str()) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            Ok(_) => {
                return Err(ParseError::BuildError(
                    "Function arguments must be a JSON object".to_string(),
                ))
            }
            Err(e) => {
                return Err(ParseError::BuildError(format!(
                    "Invalid function arguments: {}",
                    e
                )))
            }
        },
        None => None,
    };

    Ok(Command::Function { target, arguments })
}

fn build_return(pair: Pair<Rule>) -> ParseResult<Command> {
    // return_cmd = { "return" ~ sp ~ (return_run | return_fail | integer) }
    let body = next_pair(&mut pair.into_inner(), "return value")?;
    match body.as_rule() {
        Rule::return_run => {
            let command = next_pair(&mut body.into_inner(), "command")?;
            Ok(Command::ReturnRun {
                command: Box::new(build_command(command)?),
            })
        }
        Rule::return_fail => Ok(Command::ReturnFail),
        Rule::integer => Ok(Command::ReturnValue {
            value: build_integer(body)?,
        }),
        other => Err(ParseError::BuildError(format!(
            "Unexpected return form: {:?}",
            other
        ))),
    }
}

fn build_execute(pair: Pair<Rule>) -> ParseResult<Command> {
    // execute = { "execute" ~ (sp ~ clause)* ~ sp ~ "run" ~ sp ~ command }
    let mut clauses = Vec::new();
    let mut run = None;

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::as_clause | Rule::function_test | Rule::score_test | Rule::store_clause => {
                clauses.push(build_clause(child)?);
            }
            _ => run = Some(build_command(child)?),
        }
    }

    let run = run.ok_or_else(|| ParseError::BuildError("execute without run".to_string()))?;
    Ok(Command::Execute {
        clauses,
        run: Box::new(run),
    })
}

fn build_clause(pair: Pair<Rule>) -> ParseResult<Clause> {
    let text = pair.as_str().to_string();
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();

    let kind = match rule {
        Rule::as_clause => {
            let targets = next_pair(&mut inner, "targets")?;
            let names: Vec<Pair<Rule>> = targets.into_inner().collect();
            match names.first().map(|p| p.as_rule()) {
                Some(Rule::all_entities) => ClauseKind::As { targets: None },
                _ => ClauseKind::As {
                    targets: Some(names.iter().map(|p| p.as_str().to_string()).collect()),
                },
            }
        }
        Rule::function_test => {
            let condition = build_condition(next_pair(&mut inner, "condition")?)?;
            let target = next_pair(&mut inner, "function reference")?;
            ClauseKind::IfFunction {
                condition,
                target: target.as_str().to_string(),
            }
        }
        Rule::score_test => {
            let condition = build_condition(next_pair(&mut inner, "condition")?)?;
            let objective = next_pair(&mut inner, "objective")?.as_str().to_string();
            let comparison = build_comparison(next_pair(&mut inner, "comparison")?)?;
            let value = build_integer(next_pair(&mut inner, "value")?)?;
            ClauseKind::IfScore {
                condition,
                objective,
                comparison,
                value,
            }
        }
        Rule::store_clause => {
            let kind = match next_pair(&mut inner, "store kind")?.as_str() {
                "result" => StoreKind::Result,
                _ => StoreKind::Success,
            };
            let objective = next_pair(&mut inner, "objective")?.as_str().to_string();
            ClauseKind::Store { kind, objective }
        }
        other => {
            return Err(ParseError::BuildError(format!(
                "Unexpected clause: {:?}",
                other
            )))
        }
    };

    Ok(Clause { text, kind })
}

fn build_condition(pair: Pair<Rule>) -> ParseResult<Condition> {
    match pair.as_str() {
        "if" => Ok(Condition::If),
        "unless" => Ok(Condition::Unless),
        other => Err(ParseError::BuildError(format!("Unknown condition: {}", other))),
    }
}

fn build_comparison(pair: Pair<Rule>) -> ParseResult<Comparison> {
    match pair.as_str() {
        "<" => Ok(Comparison::Less),
        "<=" => Ok(Comparison::LessOrEqual),
        "=" => Ok(Comparison::Equal),
        ">=" => Ok(Comparison::GreaterOrEqual),
        ">" => Ok(Comparison::Greater),
        other => Err(ParseError::BuildError(format!("Unknown comparison: {}", other))),
    }
}
