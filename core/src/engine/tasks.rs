//! Task handlers
//!
//! Each `Task` variant has its own handler. Handlers never run another task
//! directly: follow-up work is put back on the queue, either plainly or
//! behind a join group.

use super::control::ExecutionControl;
use super::errors::EngineError;
use super::functions::{queue_function_conditions, queue_functions, trace_functions};
use super::types::{
    AccumulatorId, ChainModifiers, CommandSource, ContextChain, InstantiatedFunction,
    RedirectModifier, ResultCallback, Sources, Stage, StageAction, Task,
};

/// Dispatch one task to its handler
pub(crate) fn run_task(ctl: &mut ExecutionControl, task: Task) {
    match task {
        Task::Continuation {
            chain,
            modifiers,
            original,
            sources,
        } => continue_chain(ctl, chain, modifiers, original, sources),

        Task::RunStage {
            chain,
            modifiers,
            source,
        } => run_stage(ctl, chain, modifiers, source),

        Task::CallFunction {
            function,
            callback,
            returns_to_caller,
            source,
        } => call_function(ctl, function, callback, returns_to_caller, source),

        Task::FunctionEntry {
            function,
            index,
            source,
        } => function_entry(ctl, function, index, source),

        Task::IsolatedCall {
            functions,
            source,
            callback,
        } => isolated_call(ctl, functions, source, callback),

        Task::ReportAccumulated {
            accumulator,
            callback,
        } => report_accumulated(ctl, accumulator, callback),

        Task::TraceFinished { source, count } => trace_finished(source, count),

        Task::Fallthrough => fallthrough(ctl),
    }
}

/* ===================== Continuation ===================== */

/// Walk the non-terminal stages of `chain`, then schedule its terminal stage
fn continue_chain(
    ctl: &mut ExecutionControl,
    mut chain: ContextChain,
    mut modifiers: ChainModifiers,
    original: CommandSource,
    sources: Sources,
) {
    let mut sources = match sources {
        Sources::Direct(sources) => sources,
        Sources::Filtered(filter) => ctl.take_filter(filter),
    };

    while !chain.is_terminal() {
        if sources.is_empty() {
            break;
        }
        let Some(next) = chain.next_stage() else {
            tracing::warn!(command = chain.command(), "Chain ends without a terminal stage");
            return;
        };
        let stage = chain.top_context();

        match &stage.action {
            StageAction::Redirect { modifier, fork } => {
                if *fork {
                    modifiers = modifiers.set_forked();
                }
                if let Some(modifier) = modifier {
                    match redirect(ctl, &**modifier, stage, sources, modifiers, &original) {
                        Some(derived) => sources = derived,
                        None => return,
                    }
                }
            }

            StageAction::ReturnRun => {
                // The rest of the line now produces this frame's result
                ctl.finish_frame(ctl.current_frame_id(), false);
                ctl.queue_next(Task::Continuation {
                    chain: next,
                    modifiers: modifiers.set_return(),
                    original,
                    sources: Sources::Direct(sources),
                });
                return;
            }

            StageAction::TestFunctions {
                functions,
                condition,
            } => {
                queue_function_conditions(
                    ctl, functions, *condition, sources, next, modifiers, original,
                );
                return;
            }

            terminal => {
                tracing::warn!(action = ?terminal, "Terminal stage in the middle of a chain");
                return;
            }
        }

        chain = next;
    }

    if sources.is_empty() {
        if modifiers.is_return {
            ctl.queue_next(Task::Fallthrough);
        }
        return;
    }

    run_terminal(ctl, chain, modifiers, sources);
}

/// Apply a redirect modifier to every source
///
/// Returns `None` when the stage aborts. Each application is charged, so a
/// wide fork stops as soon as the quota is spent.
fn redirect(
    ctl: &mut ExecutionControl,
    modifier: &dyn RedirectModifier,
    stage: &Stage,
    sources: Vec<CommandSource>,
    modifiers: ChainModifiers,
    original: &CommandSource,
) -> Option<Vec<CommandSource>> {
    let limit = ctl.limits().max_command_fork_count;
    let mut derived = Vec::new();

    for source in sources {
        if ctl.quota_reached() {
            ctl.exhaust_quota();
            return None;
        }
        ctl.charge();
        match modifier.apply(&source, stage) {
            Ok(produced) => {
                if derived.len() + produced.len() > limit {
                    ctl.report_error(original, &EngineError::ForkLimit(limit));
                    return None;
                }
                derived.extend(produced);
            }
            Err(e) => {
                ctl.report_error(&source, &EngineError::from(e));
                if !modifiers.is_forked {
                    return None;
                }
            }
        }
    }

    Some(derived)
}

/// Schedule the terminal stage for the surviving sources
fn run_terminal(
    ctl: &mut ExecutionControl,
    chain: ContextChain,
    modifiers: ChainModifiers,
    mut sources: Vec<CommandSource>,
) {
    match &chain.top_context().action {
        StageAction::Execute(_) => {
            if modifiers.is_return {
                // Only one result can be returned
                sources.truncate(1);
                let frame = ctl.current_frame_id();
                sources = sources
                    .into_iter()
                    .map(|source| {
                        let callback = ResultCallback::chain(
                            source.callback().clone(),
                            ResultCallback::FrameReturn(frame),
                        );
                        source.with_callback(callback)
                    })
                    .collect();
            }
            for source in sources {
                ctl.queue_next(Task::RunStage {
                    chain: chain.clone(),
                    modifiers,
                    source,
                });
            }
        }

        StageAction::CallFunctions {
            functions,
            arguments,
        } => {
            for source in sources {
                queue_functions(ctl, functions, arguments.as_ref(), source, modifiers);
            }
        }

        StageAction::ReturnValue(value) => {
            if let Some(source) = sources.first() {
                return_from_frame(ctl, &chain, source, Some(*value));
            }
        }

        StageAction::ReturnFail => {
            if let Some(source) = sources.first() {
                return_from_frame(ctl, &chain, source, None);
            }
        }

        StageAction::TraceFunctions { functions, tracer } => {
            if let Some(source) = sources.into_iter().next() {
                trace_functions(ctl, functions, tracer(), source);
            }
        }

        other => {
            tracing::warn!(action = ?other, "Non-terminal stage at the end of a chain");
        }
    }
}

/* ===================== Commands ===================== */

/// Run a terminal command for one source
fn run_stage(
    ctl: &mut ExecutionControl,
    chain: ContextChain,
    modifiers: ChainModifiers,
    source: CommandSource,
) {
    let depth = ctl.depth();
    let stage = chain.top_context();
    let StageAction::Execute(executable) = &stage.action else {
        tracing::warn!(command = chain.command(), "RunStage on a non-executable stage");
        return;
    };

    ctl.trace(|t| t.on_command(depth, chain.command()));
    ctl.charge();
    tracing::trace!(
        command = chain.command(),
        forked = modifiers.is_forked,
        "Executing command"
    );

    match executable.run(&source, stage) {
        Ok(result) => {
            ctl.trace(|t| t.on_return(depth, chain.command(), result));
            ctl.fire(source.callback(), true, result);
        }
        Err(e) => {
            ctl.fire(source.callback(), false, 0);
            ctl.report_error(&source, &EngineError::from(e));
        }
    }
}

/// `return <value>` / `return fail`
fn return_from_frame(
    ctl: &mut ExecutionControl,
    chain: &ContextChain,
    source: &CommandSource,
    value: Option<i32>,
) {
    let depth = ctl.depth();
    let frame = ctl.current_frame_id();
    ctl.trace(|t| t.on_command(depth, chain.command()));
    ctl.charge();

    let (success, result) = match value {
        Some(v) => (true, v),
        None => (false, 0),
    };
    if success {
        ctl.trace(|t| t.on_return(depth, chain.command(), result));
    }

    ctl.fire(source.callback(), success, result);
    let consumer = ctl.frame_consumer(frame);
    ctl.fire(&consumer, success, result);
    ctl.discard_frame(frame);
}

/* ===================== Functions ===================== */

/// Open a frame for `function` and start its first line
fn call_function(
    ctl: &mut ExecutionControl,
    function: InstantiatedFunction,
    callback: ResultCallback,
    returns_to_caller: bool,
    source: CommandSource,
) {
    ctl.charge();
    let depth = ctl.depth();
    ctl.trace(|t| t.on_call(depth, function.id(), function.entries().len()));

    let frame = ctl.open_frame(callback, returns_to_caller);
    let body = ctl.open_group(ctl.current_group(), None, Some(frame));
    ctl.enqueue(
        Task::FunctionEntry {
            function,
            index: 0,
            source: source.clear_callback(),
        },
        frame,
        body,
    );
}

/// Start body line `index`; the following line waits on a join group
fn function_entry(
    ctl: &mut ExecutionControl,
    function: InstantiatedFunction,
    index: usize,
    source: CommandSource,
) {
    let frame = ctl.current_frame_id();
    if ctl.is_finished(frame) {
        return;
    }
    let Some(chain) = function.entries().get(index).cloned() else {
        return;
    };

    let group = if index + 1 < function.entries().len() {
        let next = Task::FunctionEntry {
            function,
            index: index + 1,
            source: source.clone(),
        };
        ctl.open_group(ctl.current_group(), Some((next, frame)), None)
    } else {
        ctl.current_group()
    };

    ctl.enqueue(
        Task::Continuation {
            chain,
            modifiers: ChainModifiers::default(),
            original: source.clone(),
            sources: Sources::Direct(vec![source]),
        },
        frame,
        group,
    );
}

/// Run `functions` in a private frame whose consumer is `callback`
fn isolated_call(
    ctl: &mut ExecutionControl,
    functions: Vec<InstantiatedFunction>,
    source: CommandSource,
    callback: ResultCallback,
) {
    let frame = ctl.open_frame(callback, false);
    let body = ctl.open_group(ctl.current_group(), None, Some(frame));

    let calls = functions
        .into_iter()
        .map(|function| Task::CallFunction {
            function,
            callback: ResultCallback::FrameReturn(frame),
            returns_to_caller: true,
            source: source.clone(),
        })
        .collect();
    ctl.enqueue_joined(calls, Task::Fallthrough, frame, body);
}

fn report_accumulated(
    ctl: &mut ExecutionControl,
    accumulator: AccumulatorId,
    callback: ResultCallback,
) {
    let acc = ctl.take_accumulator(accumulator);
    if acc.any_result {
        ctl.fire(&callback, true, acc.sum);
    }
}

fn trace_finished(source: CommandSource, count: usize) {
    if count == 1 {
        source.send_success("Traced 1 function");
    } else {
        source.send_success(&format!("Traced {} functions", count));
    }
}

/// End of a return-mode branch
///
/// A frame that reaches this point without returning fails.
fn fallthrough(ctl: &mut ExecutionControl) {
    let frame = ctl.current_frame_id();
    if !ctl.has_returned(frame) {
        let consumer = ctl.frame_consumer(frame);
        ctl.fire(&consumer, false, 0);
    }
    ctl.discard_frame(frame);
}
