//! Function definitions and their instantiated bodies

use super::super::errors::InstantiationError;
use super::chain::{Arguments, ContextChain};
use std::rc::Rc;

/// A reusable sequence of command lines
///
/// Instantiation binds call arguments into the body. It may fail, in which
/// case no entry of the function runs.
pub trait CommandFunction {
    fn id(&self) -> &str;

    fn instantiate(
        &self,
        arguments: Option<&Arguments>,
    ) -> Result<InstantiatedFunction, InstantiationError>;
}

/// A function body ready to run
#[derive(Debug, Clone)]
pub struct InstantiatedFunction {
    id: Rc<str>,
    entries: Rc<[ContextChain]>,
}

impl InstantiatedFunction {
    pub fn new(id: impl Into<Rc<str>>, entries: impl Into<Rc<[ContextChain]>>) -> Self {
        Self {
            id: id.into(),
            entries: entries.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn shared_id(&self) -> Rc<str> {
        self.id.clone()
    }

    pub fn entries(&self) -> &[ContextChain] {
        &self.entries
    }
}

/// A function whose body does not depend on call arguments
#[derive(Debug, Clone)]
pub struct PlainFunction {
    body: InstantiatedFunction,
}

impl PlainFunction {
    pub fn new(id: impl Into<Rc<str>>, entries: Vec<ContextChain>) -> Self {
        Self {
            body: InstantiatedFunction::new(id, entries),
        }
    }
}

impl CommandFunction for PlainFunction {
    fn id(&self) -> &str {
        self.body.id()
    }

    fn instantiate(
        &self,
        _arguments: Option<&Arguments>,
    ) -> Result<InstantiatedFunction, InstantiationError> {
        Ok(self.body.clone())
    }
}
