//! Execution tracer
//!
//! Emits an indented, human-readable log of what ran at which call depth:
//!
//! ```text
//! [F] demo:main size=2
//!     [C] say hi -> 1
//!     [F] demo:inner size=1
//!         [C] return 3 -> 3
//! ```
//!
//! Indentation is 4 spaces per depth level.

use super::types::CommandOutput;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

const INDENT: &str = "    ";

/// Receiver of trace events; `depth` is the depth of the emitting frame
pub trait TraceSink {
    fn on_command(&mut self, depth: usize, command: &str);
    fn on_return(&mut self, depth: usize, command: &str, result: i32);
    fn on_call(&mut self, depth: usize, function: &str, entries: usize);
    fn on_error(&mut self, message: &str);
    fn on_message(&mut self, message: &str);
}

pub type SharedTracer = Rc<RefCell<dyn TraceSink>>;

/// Builds the tracer for one `debug function` run
pub type TracerFactory = Rc<dyn Fn() -> SharedTracer>;

/* ===================== Text Writer ===================== */

/// Writes trace events as text
pub struct TraceWriter<W: Write> {
    out: W,
    last_indent: usize,
    waiting_for_result: bool,
    write_failed: bool,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_indent: 0,
            waiting_for_result: false,
            write_failed: false,
        }
    }

    pub fn shared(out: W) -> Rc<RefCell<Self>>
    where
        W: 'static,
    {
        Rc::new(RefCell::new(Self::new(out)))
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Terminate a pending command line and flush
    pub fn finish(&mut self) -> std::io::Result<()> {
        self.new_line();
        self.out.flush()
    }

    pub fn into_inner(mut self) -> W {
        self.new_line();
        self.out
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()) {
            if !self.write_failed {
                tracing::warn!(error = %e, "Trace output write failed");
            }
            self.write_failed = true;
        }
    }

    fn new_line(&mut self) {
        if self.waiting_for_result {
            self.write("\n");
            self.waiting_for_result = false;
        }
    }

    fn print_indent(&mut self, indent: usize) {
        for _ in 0..indent {
            self.write(INDENT);
        }
    }

    fn indent_and_save(&mut self, indent: usize) {
        self.print_indent(indent);
        self.last_indent = indent;
    }
}

impl<W: Write> TraceSink for TraceWriter<W> {
    fn on_command(&mut self, depth: usize, command: &str) {
        self.new_line();
        self.indent_and_save(depth);
        self.write(&format!("[C] {}", command));
        self.waiting_for_result = true;
    }

    fn on_return(&mut self, depth: usize, command: &str, result: i32) {
        if self.waiting_for_result {
            self.write(&format!(" -> {}\n", result));
            self.waiting_for_result = false;
        } else {
            self.indent_and_save(depth);
            self.write(&format!("[R = {}] {}\n", result, command));
        }
    }

    fn on_call(&mut self, depth: usize, function: &str, entries: usize) {
        self.new_line();
        self.indent_and_save(depth);
        self.write(&format!("[F] {} size={}\n", function, entries));
    }

    fn on_error(&mut self, message: &str) {
        self.new_line();
        self.indent_and_save(self.last_indent + 1);
        self.write(&format!("[E] {}\n", message));
    }

    fn on_message(&mut self, message: &str) {
        self.new_line();
        self.print_indent(self.last_indent + 1);
        self.write(&format!("[M] {}\n", message));
    }
}

/* ===================== Output Adapter ===================== */

/// Routes a source's messages into the trace as `[M]` lines
pub struct TraceOutput(pub SharedTracer);

impl TraceOutput {
    fn message(&self, message: &str) {
        match self.0.try_borrow_mut() {
            Ok(mut tracer) => tracer.on_message(message),
            Err(_) => tracing::warn!(message, "Tracer busy, message dropped"),
        }
    }
}

impl CommandOutput for TraceOutput {
    fn send_success(&self, message: &str) {
        self.message(message);
    }

    fn send_failure(&self, message: &str) {
        self.message(message);
    }
}
