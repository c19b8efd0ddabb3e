//! Command source - the immutable context carried through execution

use super::callback::ResultCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/* ===================== Output ===================== */

/// Receiver of the success/failure side-channel messages
pub trait CommandOutput {
    fn send_success(&self, message: &str);
    fn send_failure(&self, message: &str);
}

/// Output that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl CommandOutput for NullOutput {
    fn send_success(&self, _message: &str) {}
    fn send_failure(&self, _message: &str) {}
}

/* ===================== Positional Context ===================== */

/// Where and as whom a command runs
///
/// The engine never reads this; it is carried for the benefit of command
/// effects and redirect modifiers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceContext {
    pub entity: Option<String>,
    pub position: [f64; 3],
    pub dimension: String,
}

/* ===================== Command Source ===================== */

/// Immutable execution context; every "mutation" returns a new value
#[derive(Clone)]
pub struct CommandSource {
    pub name: String,
    pub permission_level: u8,
    pub context: SourceContext,
    callback: ResultCallback,
    silent: bool,
    output: Rc<dyn CommandOutput>,
}

impl CommandSource {
    pub fn new(name: impl Into<String>, output: Rc<dyn CommandOutput>) -> Self {
        Self {
            name: name.into(),
            permission_level: 0,
            context: SourceContext::default(),
            callback: ResultCallback::Empty,
            silent: false,
            output,
        }
    }

    pub fn callback(&self) -> &ResultCallback {
        &self.callback
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn output(&self) -> &Rc<dyn CommandOutput> {
        &self.output
    }

    pub fn with_callback(&self, callback: ResultCallback) -> Self {
        Self {
            callback,
            ..self.clone()
        }
    }

    pub fn clear_callback(&self) -> Self {
        self.with_callback(ResultCallback::Empty)
    }

    pub fn with_context(&self, context: SourceContext) -> Self {
        Self {
            context,
            ..self.clone()
        }
    }

    pub fn with_entity(&self, entity: impl Into<String>) -> Self {
        let mut context = self.context.clone();
        context.entity = Some(entity.into());
        self.with_context(context)
    }

    pub fn with_output(&self, output: Rc<dyn CommandOutput>) -> Self {
        Self {
            output,
            ..self.clone()
        }
    }

    pub fn with_permission_level(&self, permission_level: u8) -> Self {
        Self {
            permission_level,
            ..self.clone()
        }
    }

    pub fn silenced(&self) -> Self {
        Self {
            silent: true,
            ..self.clone()
        }
    }

    pub fn send_success(&self, message: &str) {
        if !self.silent {
            self.output.send_success(message);
        }
    }

    pub fn send_failure(&self, message: &str) {
        if !self.silent {
            self.output.send_failure(message);
        }
    }
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSource")
            .field("name", &self.name)
            .field("permission_level", &self.permission_level)
            .field("context", &self.context)
            .field("callback", &self.callback)
            .field("silent", &self.silent)
            .finish_non_exhaustive()
    }
}
