//! Function invocation
//!
//! Turns `function`, `execute if|unless function` and `debug function`
//! stages into queue tasks. Results flow back through callbacks:
//!
//! - return mode: every result reaches the caller's frame individually
//! - no-return mode: one target reports directly, several targets report
//!   independently or through an accumulator
//! - conditions: each source runs the targets in an isolated frame and the
//!   next stage continues with the sources whose test held

use super::control::ExecutionControl;
use super::errors::EngineError;
use super::tracer::{SharedTracer, TraceOutput};
use super::types::{
    Arguments, ChainModifiers, CommandFunction, CommandSource, Condition, ContextChain,
    InstantiatedFunction, ResultCallback, Sources, Task,
};
use std::rc::Rc;

/* ===================== Plain Calls ===================== */

/// Queue `functions` for one source
pub(crate) fn queue_functions(
    ctl: &mut ExecutionControl,
    functions: &[Rc<dyn CommandFunction>],
    arguments: Option<&Arguments>,
    source: CommandSource,
    modifiers: ChainModifiers,
) {
    let mut targets = Vec::with_capacity(functions.len());
    for function in functions {
        match function.instantiate(arguments) {
            Ok(target) => targets.push(target),
            Err(e) => ctl.report_error(
                &source,
                &EngineError::Instantiation {
                    id: function.id().to_string(),
                    source: e,
                },
            ),
        }
    }

    announce(&source, &targets);

    if modifiers.is_return {
        queue_returning(ctl, targets, source);
    } else {
        queue_detached(ctl, targets, source);
    }
}

/// Return mode: each result goes straight to the current frame
fn queue_returning(
    ctl: &mut ExecutionControl,
    targets: Vec<InstantiatedFunction>,
    source: CommandSource,
) {
    let callback = ResultCallback::chain(
        source.callback().clone(),
        ResultCallback::FrameReturn(ctl.current_frame_id()),
    );
    let calls = targets
        .into_iter()
        .map(|function| Task::CallFunction {
            callback: decorate(&function, &source, callback.clone()),
            function,
            returns_to_caller: true,
            source: source.clone(),
        })
        .collect();
    ctl.queue_joined(calls, Task::Fallthrough);
}

fn queue_detached(
    ctl: &mut ExecutionControl,
    targets: Vec<InstantiatedFunction>,
    source: CommandSource,
) {
    let callback = source.callback().clone();

    match targets.len() {
        0 => {}

        1 => {
            for function in targets {
                ctl.queue_next(Task::CallFunction {
                    callback: decorate(&function, &source, callback.clone()),
                    function,
                    returns_to_caller: false,
                    source: source.clone(),
                });
            }
        }

        _ if callback.is_empty() => {
            for function in targets {
                ctl.queue_next(Task::CallFunction {
                    callback: decorate(&function, &source, ResultCallback::Empty),
                    function,
                    returns_to_caller: false,
                    source: source.clone(),
                });
            }
        }

        _ => {
            let accumulator = ctl.new_accumulator();
            let calls = targets
                .into_iter()
                .map(|function| Task::CallFunction {
                    callback: decorate(
                        &function,
                        &source,
                        ResultCallback::Accumulate(accumulator),
                    ),
                    function,
                    returns_to_caller: false,
                    source: source.clone(),
                })
                .collect();
            ctl.queue_joined(
                calls,
                Task::ReportAccumulated {
                    accumulator,
                    callback,
                },
            );
        }
    }
}

/// Show "Function <id> returned <n>" to the caller before forwarding
fn decorate(
    function: &InstantiatedFunction,
    source: &CommandSource,
    callback: ResultCallback,
) -> ResultCallback {
    if source.is_silent() {
        return callback;
    }
    ResultCallback::FunctionResult {
        id: function.shared_id(),
        source: Rc::new(source.clear_callback()),
        then: Rc::new(callback),
    }
}

fn announce(source: &CommandSource, targets: &[InstantiatedFunction]) {
    match targets {
        [] => {}
        [single] => source.send_success(&format!("Running function {}", single.id())),
        many => source.send_success(&format!("Running {} functions", many.len())),
    }
}

/* ===================== Conditions ===================== */

/// `execute if|unless function`: test every source in isolation, then
/// continue `next` with the sources that passed
#[allow(clippy::too_many_arguments)]
pub(crate) fn queue_function_conditions(
    ctl: &mut ExecutionControl,
    functions: &[Rc<dyn CommandFunction>],
    condition: Condition,
    sources: Vec<CommandSource>,
    next: ContextChain,
    modifiers: ChainModifiers,
    original: CommandSource,
) {
    let mut targets = Vec::with_capacity(functions.len());
    for function in functions {
        match function.instantiate(None) {
            Ok(target) => targets.push(target),
            Err(e) => {
                ctl.report_error(
                    &original,
                    &EngineError::Instantiation {
                        id: function.id().to_string(),
                        source: e,
                    },
                );
                return;
            }
        }
    }

    if targets.is_empty() {
        if modifiers.is_return {
            ctl.queue_next(Task::Fallthrough);
        }
        return;
    }

    let filter = ctl.new_filter();
    let calls = sources
        .into_iter()
        .enumerate()
        .map(|(index, source)| Task::IsolatedCall {
            functions: targets.clone(),
            source: source.clear_callback(),
            callback: ResultCallback::Filter {
                filter,
                index,
                condition,
                source: Rc::new(source),
            },
        })
        .collect();

    ctl.queue_joined(
        calls,
        Task::Continuation {
            chain: next,
            modifiers,
            original,
            sources: Sources::Filtered(filter),
        },
    );
}

/* ===================== Tracing ===================== */

/// `debug function`: run `functions` with `tracer` attached
pub(crate) fn trace_functions(
    ctl: &mut ExecutionControl,
    functions: &[Rc<dyn CommandFunction>],
    tracer: SharedTracer,
    source: CommandSource,
) {
    if let Err(e) = ctl.attach_tracer(tracer.clone()) {
        ctl.report_error(&source, &e);
        return;
    }

    let traced = source
        .clear_callback()
        .with_output(Rc::new(TraceOutput(tracer)));

    let mut calls = Vec::with_capacity(functions.len());
    for function in functions {
        match function.instantiate(None) {
            Ok(target) => calls.push(Task::CallFunction {
                function: target,
                callback: ResultCallback::Empty,
                returns_to_caller: false,
                source: traced.clone(),
            }),
            Err(e) => ctl.report_error(
                &traced,
                &EngineError::Instantiation {
                    id: function.id().to_string(),
                    source: e,
                },
            ),
        }
    }

    let count = calls.len();
    ctl.queue_joined(calls, Task::TraceFinished { source, count });
}
