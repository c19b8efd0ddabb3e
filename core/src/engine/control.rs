//! Execution control
//!
//! Holds everything one top-level dispatch needs:
//! - queue: FIFO of tasks, each tagged with its frame and join group
//! - frames: the call tree (depth, return consumer, return/discard flags)
//! - groups: join barriers; when a group drains, its completion task is queued
//! - tracer: optional trace sink
//!
//! Nested function calls share this queue and frame table, so call depth
//! never grows the native stack.

use super::errors::EngineError;
use super::exec_loop::run_until_done;
use super::tracer::{SharedTracer, TraceSink};
use super::types::{
    AccumulatorId, CommandSource, FilterId, Frame, FrameId, ResultCallback, Task,
};
use crate::config::EngineConfig;
use std::collections::{BTreeMap, HashMap, VecDeque};
use uuid::Uuid;

/* ===================== Limits & Outcome ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Commands, calls and modifier applications allowed per dispatch
    pub max_command_chain_length: usize,
    /// Derived sources allowed per redirect stage
    pub max_command_fork_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_command_chain_length: 65536,
            max_command_fork_count: 65536,
        }
    }
}

impl From<&EngineConfig> for Limits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_command_chain_length: config.max_command_chain_length,
            max_command_fork_count: config.max_command_fork_count,
        }
    }
}

/// Summary of one `execute` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub commands_executed: usize,
    pub quota_exhausted: bool,
}

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue to next step
    Continue,
    /// Queue drained
    Done,
}

/* ===================== Internal Bookkeeping ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GroupId(u64);

impl GroupId {
    const ROOT: GroupId = GroupId(0);
}

/// Join barrier over a set of queued tasks and child groups
#[derive(Debug)]
struct Group {
    outstanding: usize,
    parent: Option<GroupId>,
    /// Queued into `parent` once this group drains
    on_complete: Option<(Task, FrameId)>,
    /// Frame whose body this group is
    exits_frame: Option<FrameId>,
}

impl Group {
    fn root() -> Self {
        Self {
            outstanding: 0,
            parent: None,
            on_complete: None,
            exits_frame: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Queued {
    pub task: Task,
    pub frame: FrameId,
    pub group: GroupId,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Accumulator {
    pub any_result: bool,
    pub sum: i32,
}

/* ===================== Execution Control ===================== */

pub struct ExecutionControl {
    queue: VecDeque<Queued>,
    frames: HashMap<FrameId, Frame>,
    groups: HashMap<GroupId, Group>,
    accumulators: HashMap<AccumulatorId, Accumulator>,
    filters: HashMap<FilterId, BTreeMap<usize, CommandSource>>,
    next_id: u64,

    current_frame: FrameId,
    current_group: GroupId,

    root_consumer: ResultCallback,
    initial_tracer: Option<SharedTracer>,
    tracer: Option<SharedTracer>,

    limits: Limits,
    commands_executed: usize,
    quota_exhausted: bool,
}

impl ExecutionControl {
    pub fn new(limits: Limits) -> Self {
        let mut ctl = Self {
            queue: VecDeque::new(),
            frames: HashMap::new(),
            groups: HashMap::new(),
            accumulators: HashMap::new(),
            filters: HashMap::new(),
            next_id: 1,
            current_frame: FrameId::ROOT,
            current_group: GroupId::ROOT,
            root_consumer: ResultCallback::Empty,
            initial_tracer: None,
            tracer: None,
            limits,
            commands_executed: 0,
            quota_exhausted: false,
        };
        ctl.reset();
        ctl
    }

    /// Attach a tracer for every execution run by this control
    pub fn with_tracer(mut self, tracer: SharedTracer) -> Self {
        self.initial_tracer = Some(tracer.clone());
        self.tracer = Some(tracer);
        self
    }

    /// Consumer for values returned at depth 0
    pub fn with_return_consumer(mut self, consumer: ResultCallback) -> Self {
        self.root_consumer = consumer;
        self.reset();
        self
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn tracer(&self) -> Option<&SharedTracer> {
        self.tracer.as_ref()
    }

    /// Attach a tracer mid-execution; tracing is never nested
    pub fn attach_tracer(&mut self, tracer: SharedTracer) -> Result<(), EngineError> {
        if self.tracer.is_some() {
            return Err(EngineError::RecursiveTrace);
        }
        self.tracer = Some(tracer);
        Ok(())
    }

    /// Append a task in the current frame and join group
    pub fn queue_next(&mut self, task: Task) {
        self.enqueue(task, self.current_frame, self.current_group);
    }

    /// Queue `tasks`, then queue `then` once all of them (and everything
    /// they spawn) have finished
    pub fn queue_joined(&mut self, tasks: Vec<Task>, then: Task) {
        let frame = self.current_frame;
        let group = self.current_group;
        self.enqueue_joined(tasks, then, frame, group);
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.get(&self.current_frame)
    }

    pub fn current_frame_id(&self) -> FrameId {
        self.current_frame
    }

    /// Depth of the frame owning the running task
    pub fn depth(&self) -> usize {
        self.current_frame().map(|f| f.depth).unwrap_or(0)
    }

    /// Drain the queue starting from `initial`
    pub fn execute(&mut self, initial: Task) -> ExecutionOutcome {
        let span = tracing::debug_span!("execute", execution_id = %Uuid::new_v4());
        let _guard = span.enter();

        self.current_frame = FrameId::ROOT;
        self.current_group = GroupId::ROOT;
        self.queue_next(initial);

        run_until_done(self);

        let outcome = ExecutionOutcome {
            commands_executed: self.commands_executed,
            quota_exhausted: self.quota_exhausted,
        };
        tracing::debug!(
            commands = outcome.commands_executed,
            quota_exhausted = outcome.quota_exhausted,
            "Execution finished"
        );
        self.reset();
        outcome
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.frames.clear();
        self.frames
            .insert(FrameId::ROOT, Frame::root(self.root_consumer.clone()));
        self.groups.clear();
        self.groups.insert(GroupId::ROOT, Group::root());
        self.accumulators.clear();
        self.filters.clear();
        self.current_frame = FrameId::ROOT;
        self.current_group = GroupId::ROOT;
        self.tracer = self.initial_tracer.clone();
        self.commands_executed = 0;
        self.quota_exhausted = false;
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /* ===================== Queue ===================== */

    pub(crate) fn pop_front(&mut self) -> Option<Queued> {
        self.queue.pop_front()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub(crate) fn set_cursor(&mut self, frame: FrameId, group: GroupId) {
        self.current_frame = frame;
        self.current_group = group;
    }

    pub(crate) fn current_group(&self) -> GroupId {
        self.current_group
    }

    pub(crate) fn enqueue(&mut self, task: Task, frame: FrameId, group: GroupId) {
        if let Some(g) = self.groups.get_mut(&group) {
            g.outstanding += 1;
        }
        self.queue.push_back(Queued { task, frame, group });
    }

    pub(crate) fn enqueue_joined(
        &mut self,
        tasks: Vec<Task>,
        then: Task,
        frame: FrameId,
        group: GroupId,
    ) {
        if tasks.is_empty() {
            self.enqueue(then, frame, group);
            return;
        }
        let join = self.open_group(group, Some((then, frame)), None);
        for task in tasks {
            self.enqueue(task, frame, join);
        }
    }

    /* ===================== Groups ===================== */

    pub(crate) fn open_group(
        &mut self,
        parent: GroupId,
        on_complete: Option<(Task, FrameId)>,
        exits_frame: Option<FrameId>,
    ) -> GroupId {
        let id = GroupId(self.next_id());
        if let Some(p) = self.groups.get_mut(&parent) {
            p.outstanding += 1;
        }
        self.groups.insert(
            id,
            Group {
                outstanding: 0,
                parent: Some(parent),
                on_complete,
                exits_frame,
            },
        );
        id
    }

    /// Mark one task of `group` done and cascade completed groups upward
    pub(crate) fn complete_in_group(&mut self, group: GroupId) {
        let mut next = Some(group);
        while let Some(id) = next.take() {
            let Some(g) = self.groups.get_mut(&id) else {
                tracing::warn!(group = id.0, "Completion for unknown group");
                return;
            };
            g.outstanding = g.outstanding.saturating_sub(1);
            if g.outstanding > 0 || id == GroupId::ROOT {
                return;
            }
            let Some(done) = self.groups.remove(&id) else {
                return;
            };
            if let Some(frame) = done.exits_frame {
                self.close_frame(frame);
            }
            if let Some(parent) = done.parent {
                if let Some((task, frame)) = done.on_complete {
                    self.enqueue(task, frame, parent);
                }
                next = Some(parent);
            }
        }
    }

    /* ===================== Frames ===================== */

    /// Open a child of the current frame
    ///
    /// With `returns_to_caller`, returning from the new frame also returns
    /// from the current one.
    pub(crate) fn open_frame(
        &mut self,
        return_value_consumer: ResultCallback,
        returns_to_caller: bool,
    ) -> FrameId {
        let id = FrameId(self.next_id());
        let parent = self.current_frame;
        let frame = Frame {
            depth: self.depth() + 1,
            return_value_consumer,
            parent: Some(parent),
            return_to: returns_to_caller.then_some(parent),
            finished: false,
            returned: false,
            discarded: false,
            children: Vec::new(),
        };
        tracing::debug!(frame = id.0, depth = frame.depth, "Frame opened");
        self.frames.insert(id, frame);
        if let Some(p) = self.frames.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    fn close_frame(&mut self, id: FrameId) {
        if id == FrameId::ROOT {
            return;
        }
        let Some(frame) = self.frames.remove(&id) else {
            return;
        };
        if let Some(parent) = frame.parent.and_then(|p| self.frames.get_mut(&p)) {
            if let Some(pos) = parent.children.iter().position(|c| *c == id) {
                parent.children.swap_remove(pos);
            }
        }
        tracing::debug!(frame = id.0, "Frame closed");
    }

    /// Longest child list of any open frame
    #[cfg(test)]
    pub(crate) fn widest_frame(&self) -> usize {
        self.frames
            .values()
            .map(|f| f.children.len())
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn frame_consumer(&self, id: FrameId) -> ResultCallback {
        self.frames
            .get(&id)
            .map(|f| f.return_value_consumer.clone())
            .unwrap_or_default()
    }

    pub(crate) fn is_finished(&self, id: FrameId) -> bool {
        self.frames.get(&id).map_or(true, |f| f.finished)
    }

    pub(crate) fn has_returned(&self, id: FrameId) -> bool {
        self.frames.get(&id).map_or(true, |f| f.returned)
    }

    /// Stop starting body lines in `id` and every frame it returns into
    pub(crate) fn finish_frame(&mut self, id: FrameId, returned: bool) {
        let mut cursor = Some(id);
        while let Some(fid) = cursor {
            let Some(frame) = self.frames.get_mut(&fid) else {
                break;
            };
            if frame.finished && (frame.returned || !returned) {
                break;
            }
            frame.finished = true;
            frame.returned |= returned;
            cursor = frame.return_to;
        }
    }

    /// Finish `id` as returned and skip the queued work of it and every
    /// frame below it
    pub(crate) fn discard_frame(&mut self, id: FrameId) {
        self.finish_frame(id, true);

        let mut pending = vec![id];
        while let Some(fid) = pending.pop() {
            let Some(frame) = self.frames.get_mut(&fid) else {
                continue;
            };
            if frame.discarded {
                continue;
            }
            frame.discarded = true;
            pending.extend(frame.children.drain(..));
        }
        tracing::debug!(frame = id.0, "Frame discarded");
    }

    pub(crate) fn is_frame_live(&self, id: FrameId) -> bool {
        self.frames.get(&id).is_some_and(|f| !f.discarded)
    }

    /* ===================== Callbacks ===================== */

    /// Deliver `(success, result)` to a callback and everything it chains to
    pub fn fire(&mut self, callback: &ResultCallback, success: bool, result: i32) {
        let mut pending = vec![callback.clone()];
        while let Some(callback) = pending.pop() {
            match callback {
                ResultCallback::Empty => {}
                ResultCallback::Sink(sink) => sink(success, result),
                ResultCallback::Chain(first, second) => {
                    pending.push((*second).clone());
                    pending.push((*first).clone());
                }
                ResultCallback::FrameReturn(id) => {
                    let Some(frame) = self.frames.get(&id) else {
                        tracing::warn!(frame = id.0, "Result for closed frame dropped");
                        continue;
                    };
                    pending.push(frame.return_value_consumer.clone());
                    // A delivered result counts as the frame's return
                    self.finish_frame(id, true);
                }
                ResultCallback::Accumulate(id) => {
                    if let Some(acc) = self.accumulators.get_mut(&id) {
                        acc.any_result = true;
                        if success {
                            acc.sum = acc.sum.saturating_add(result);
                        }
                    }
                }
                ResultCallback::Filter {
                    filter,
                    index,
                    condition,
                    source,
                } => {
                    if condition.test(result) {
                        if let Some(passed) = self.filters.get_mut(&filter) {
                            passed
                                .entry(index)
                                .or_insert_with(|| source.as_ref().clone());
                        }
                    }
                }
                ResultCallback::FunctionResult { id, source, then } => {
                    source.send_success(&format!("Function {} returned {}", id, result));
                    pending.push((*then).clone());
                }
            }
        }
    }

    pub(crate) fn new_accumulator(&mut self) -> AccumulatorId {
        let id = AccumulatorId(self.next_id());
        self.accumulators.insert(id, Accumulator::default());
        id
    }

    pub(crate) fn take_accumulator(&mut self, id: AccumulatorId) -> Accumulator {
        self.accumulators.remove(&id).unwrap_or_default()
    }

    pub(crate) fn new_filter(&mut self) -> FilterId {
        let id = FilterId(self.next_id());
        self.filters.insert(id, BTreeMap::new());
        id
    }

    /// Sources that passed, in their original order
    pub(crate) fn take_filter(&mut self, id: FilterId) -> Vec<CommandSource> {
        self.filters
            .remove(&id)
            .map(|passed| passed.into_values().collect())
            .unwrap_or_default()
    }

    /* ===================== Cost & Errors ===================== */

    pub(crate) fn charge(&mut self) {
        self.commands_executed += 1;
    }

    pub(crate) fn quota_reached(&self) -> bool {
        self.commands_executed >= self.limits.max_command_chain_length
    }

    pub(crate) fn exhaust_quota(&mut self) {
        tracing::info!(
            limit = self.limits.max_command_chain_length,
            dropped = self.queue.len(),
            "Command execution stopped due to limit"
        );
        self.quota_exhausted = true;
        self.queue.clear();
    }

    pub(crate) fn trace(&self, f: impl FnOnce(&mut dyn TraceSink)) {
        if let Some(tracer) = &self.tracer {
            match tracer.try_borrow_mut() {
                Ok(mut sink) => f(&mut *sink),
                Err(_) => tracing::warn!("Tracer busy, event dropped"),
            }
        }
    }

    /// Surface a branch failure to the trace and the source's failure channel
    pub fn report_error(&mut self, source: &CommandSource, error: &EngineError) {
        let message = error.to_string();
        tracing::debug!(source = %source.name, error = %message, "Command failed");
        self.trace(|t| t.on_error(&message));
        source.send_failure(&message);
    }
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
