//! Frames - entries of the explicit call stack

use super::callback::ResultCallback;

/// Handle to a frame in the execution control's frame table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub(crate) u64);

impl FrameId {
    pub(crate) const ROOT: FrameId = FrameId(0);
}

/// One function (or isolated) invocation
///
/// Frames form a tree rather than a strict stack: forked continuations
/// interleave on the queue, so each task carries the frame it runs in.
#[derive(Debug, Clone)]
pub struct Frame {
    pub depth: usize,
    pub return_value_consumer: ResultCallback,

    pub(crate) parent: Option<FrameId>,

    /// Caller whose result channel this frame feeds (return mode)
    pub(crate) return_to: Option<FrameId>,

    /// No further body lines start
    pub(crate) finished: bool,

    /// A result has been delivered to the consumer
    pub(crate) returned: bool,

    /// Queued work of this frame is skipped
    pub(crate) discarded: bool,

    /// Frames opened while this one was current; may include closed ones
    pub(crate) children: Vec<FrameId>,
}

impl Frame {
    pub(crate) fn root(return_value_consumer: ResultCallback) -> Self {
        Self {
            depth: 0,
            return_value_consumer,
            parent: None,
            return_to: None,
            finished: false,
            returned: false,
            discarded: false,
            children: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn has_returned(&self) -> bool {
        self.returned
    }
}
