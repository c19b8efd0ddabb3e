//! # Function Packs
//!
//! A small command language front end for the engine. A pack is a TOML file:
//!
//! ```toml
//! entities = ["alice", "bob"]
//!
//! [functions]
//! "demo:main" = ["say hello", "function demo:count"]
//! "demo:count" = ["score add calls 1", "return 1"]
//! "demo:greet" = ["$say hello $(name)"]
//!
//! [tags]
//! "demo:all" = ["demo:main", "demo:count"]
//! ```
//!
//! Function bodies are compiled on first use and cached. Lines starting
//! with `$` are macro lines: `$(key)` is replaced by the call's argument
//! before the line is parsed, so such functions are compiled per call.
//! Blank lines and lines starting with `#` are skipped.

use crate::engine::{
    Arguments, CommandFunction, CommandSource, ContextChain, ExecutionControl, ExecutionOutcome,
    InstantiatedFunction, InstantiationError, Task,
};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use thiserror::Error;

pub mod commands;
mod compile;
pub mod parser;
pub mod scoreboard;
pub mod trace_file;


pub use parser::{ParseError, ParseResult};
pub use scoreboard::Scoreboard;
pub use trace_file::TraceFile;

/* ===================== Definition ===================== */

/// Pack file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackDefinition {
    /// Names `as @all` expands to
    #[serde(default)]
    pub entities: Vec<String>,

    /// Function id to body lines
    #[serde(default)]
    pub functions: BTreeMap<String, Vec<String>>,

    /// Tag name to function ids
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

/* ===================== Error Types ===================== */

#[derive(Debug, Error)]
pub enum PackError {
    #[error("Failed to read pack {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pack file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Tag #{tag} refers to unknown function {id}")]
    UnknownTagMember { tag: String, id: String },
}

/// A body line that does not compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub function: String,
    /// 1-based line number within the function body
    pub line: usize,
    pub message: String,
}

/* ===================== Registry ===================== */

struct PackFunction {
    id: Rc<str>,
    lines: Vec<String>,
    compiled: OnceCell<Result<InstantiatedFunction, InstantiationError>>,
}

impl PackFunction {
    /// Body lines with their 1-based numbers, skipping blanks and comments
    fn body(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
    }

    fn is_macro(&self) -> bool {
        self.body().any(|(_, line)| line.starts_with('$'))
    }
}

/// Function table shared by every compiled line of a pack
pub(crate) struct Registry {
    this: Weak<Registry>,
    functions: BTreeMap<String, PackFunction>,
    tags: BTreeMap<String, Vec<String>>,
    entities: Rc<[String]>,
    scoreboard: Scoreboard,
    trace_dir: PathBuf,
}

impl Registry {
    pub(crate) fn entities(&self) -> Rc<[String]> {
        self.entities.clone()
    }

    pub(crate) fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub(crate) fn trace_dir(&self) -> &Path {
        &self.trace_dir
    }

    /// Resolve `id` or `#tag` to function handles
    pub(crate) fn resolve(&self, target: &str) -> ParseResult<Vec<Rc<dyn CommandFunction>>> {
        let ids: Vec<&str> = match target.strip_prefix('#') {
            Some(tag) => self
                .tags
                .get(tag)
                .ok_or_else(|| ParseError::BuildError(format!("Unknown function tag #{}", tag)))?
                .iter()
                .map(String::as_str)
                .collect(),
            None if self.functions.contains_key(target) => vec![target],
            None => {
                return Err(ParseError::BuildError(format!(
                    "Unknown function {}",
                    target
                )))
            }
        };

        Ok(ids
            .into_iter()
            .map(|id| {
                Rc::new(FunctionRef {
                    id: id.to_string(),
                    registry: self.this.clone(),
                }) as Rc<dyn CommandFunction>
            })
            .collect())
    }

    fn compile_line(&self, line: &str) -> ParseResult<ContextChain> {
        let command = parser::parse(line)?;
        compile::compile(self, line.trim(), &command)
    }

    fn instantiate(
        &self,
        id: &str,
        arguments: Option<&Arguments>,
    ) -> Result<InstantiatedFunction, InstantiationError> {
        let function = self
            .functions
            .get(id)
            .ok_or_else(|| InstantiationError::new(format!("Unknown function {}", id)))?;

        if function.is_macro() {
            let arguments = arguments.ok_or_else(|| {
                InstantiationError::new(format!("Function {} requires arguments", id))
            })?;
            return self.compile_body(function, Some(arguments));
        }

        function
            .compiled
            .get_or_init(|| self.compile_body(function, None))
            .clone()
    }

    fn compile_body(
        &self,
        function: &PackFunction,
        arguments: Option<&Arguments>,
    ) -> Result<InstantiatedFunction, InstantiationError> {
        let mut entries = Vec::new();
        for (number, line) in function.body() {
            let text = match line.strip_prefix('$') {
                Some(template) => substitute(template, arguments)?,
                None => line.to_string(),
            };
            let chain = self.compile_line(&text).map_err(|e| {
                InstantiationError::new(format!("Line {}: {}", number, e))
            })?;
            entries.push(chain);
        }

        tracing::debug!(function = %function.id, entries = entries.len(), "Function compiled");
        Ok(InstantiatedFunction::new(function.id.clone(), entries))
    }
}

/// Replace every `$(key)` with the argument's value
fn substitute(
    template: &str,
    arguments: Option<&Arguments>,
) -> Result<String, InstantiationError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find(')')
            .ok_or_else(|| InstantiationError::new("Unterminated macro variable"))?;
        let key = &after[..end];

        let value = arguments
            .and_then(|args| args.get(key))
            .ok_or_else(|| InstantiationError::new(format!("Missing argument '{}'", key)))?;
        match value {
            serde_json::Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Late-bound handle to a pack function
///
/// Holds the registry weakly, so recursive functions don't keep their
/// own pack alive.
struct FunctionRef {
    id: String,
    registry: Weak<Registry>,
}

impl CommandFunction for FunctionRef {
    fn id(&self) -> &str {
        &self.id
    }

    fn instantiate(
        &self,
        arguments: Option<&Arguments>,
    ) -> Result<InstantiatedFunction, InstantiationError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| InstantiationError::new("Function pack was unloaded"))?;
        registry.instantiate(&self.id, arguments)
    }
}

/* ===================== Pack ===================== */

pub struct Pack {
    registry: Rc<Registry>,
}

impl Pack {
    /// Load a pack file; `debug function` traces go to `trace_dir`
    pub fn load(path: &Path, trace_dir: impl Into<PathBuf>) -> Result<Self, PackError> {
        let text = std::fs::read_to_string(path).map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, trace_dir)
    }

    pub fn from_toml(text: &str, trace_dir: impl Into<PathBuf>) -> Result<Self, PackError> {
        let definition: PackDefinition = toml::from_str(text)?;
        Self::new(definition, trace_dir)
    }

    pub fn new(
        definition: PackDefinition,
        trace_dir: impl Into<PathBuf>,
    ) -> Result<Self, PackError> {
        for (tag, ids) in &definition.tags {
            if let Some(id) = ids.iter().find(|id| !definition.functions.contains_key(*id)) {
                return Err(PackError::UnknownTagMember {
                    tag: tag.clone(),
                    id: id.clone(),
                });
            }
        }

        let trace_dir = trace_dir.into();
        let registry = Rc::new_cyclic(|this| Registry {
            this: this.clone(),
            functions: definition
                .functions
                .into_iter()
                .map(|(id, lines)| {
                    let function = PackFunction {
                        id: Rc::from(id.as_str()),
                        lines,
                        compiled: OnceCell::new(),
                    };
                    (id, function)
                })
                .collect(),
            tags: definition.tags,
            entities: definition.entities.into(),
            scoreboard: Scoreboard::new(),
            trace_dir,
        });

        tracing::debug!(
            functions = registry.functions.len(),
            tags = registry.tags.len(),
            "Pack loaded"
        );
        Ok(Self { registry })
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.registry.scoreboard
    }

    pub fn entities(&self) -> &[String] {
        &self.registry.entities
    }

    pub fn function_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.registry.functions.keys().map(String::as_str)
    }

    /// Handle to a single function by id; `#tag` references are not ids
    pub fn function(&self, id: &str) -> Option<Rc<dyn CommandFunction>> {
        if id.starts_with('#') {
            return None;
        }
        self.registry.resolve(id).ok()?.into_iter().next()
    }

    /// Handles for a function id or every member of a `#tag`
    pub fn functions(&self, target: &str) -> Option<Vec<Rc<dyn CommandFunction>>> {
        self.registry.resolve(target).ok()
    }

    /// Parse and resolve one command line
    pub fn compile(&self, line: &str) -> ParseResult<ContextChain> {
        self.registry.compile_line(line)
    }

    /// Every non-macro body line that fails to compile
    pub fn check(&self) -> Vec<LineError> {
        let mut errors = Vec::new();
        for (id, function) in &self.registry.functions {
            for (number, line) in function.body() {
                if line.starts_with('$') {
                    continue;
                }
                if let Err(e) = self.registry.compile_line(line) {
                    errors.push(LineError {
                        function: id.clone(),
                        line: number,
                        message: e.to_string(),
                    });
                }
            }
        }
        errors
    }

    /// Compile `line` and run it to completion for `source`
    ///
    /// A line that does not compile is reported to the source's failure
    /// channel and nothing runs.
    pub fn dispatch(
        &self,
        ctl: &mut ExecutionControl,
        source: &CommandSource,
        line: &str,
    ) -> ParseResult<ExecutionOutcome> {
        let chain = match self.compile(line) {
            Ok(chain) => chain,
            Err(e) => {
                tracing::debug!(line, error = %e, "Rejected command line");
                source.send_failure(&e.to_string());
                return Err(e);
            }
        };
        Ok(ctl.execute(Task::line(chain, source.clone())))
    }
}
