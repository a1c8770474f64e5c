//! Stream state shared between the event bridge, the watchdog and iteration
//! handles.

use crate::buffer::FlowBuffer;
use crate::error::StreamError;
#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_discarded_on_error, debug_assert_error_implies_done};
use serde::Serialize;

/// Mutable state of one adapter. Lives behind the core's mutex.
#[derive(Debug)]
pub(crate) struct State<T> {
    pub(crate) buffer: FlowBuffer<T>,
    pub(crate) done: bool,
    pub(crate) error: Option<StreamError>,
    /// Heartbeat, set by every data event and cleared by each watchdog tick.
    pub(crate) active: bool,
    pub(crate) live_iterators: usize,
    pub(crate) total_filtered: u64,
}

impl<T> State<T> {
    pub(crate) fn new(buffer: FlowBuffer<T>) -> Self {
        Self {
            buffer,
            done: false,
            error: None,
            active: false,
            live_iterators: 0,
            total_filtered: 0,
        }
    }

    /// Whether a handle may still obtain items: no error, and either more
    /// data can arrive or residual items remain to be drained.
    #[inline]
    pub(crate) fn is_producing(&self) -> bool {
        self.error.is_none() && (!self.done || !self.buffer.is_empty())
    }

    /// Records `error` and discards the buffer. Returns `false` if the stream
    /// was already terminal, in which case nothing changes.
    pub(crate) fn fail(&mut self, error: StreamError) -> bool {
        if self.done {
            return false;
        }
        self.record(error);
        true
    }

    /// Records a protocol violation on a cleanly completed stream, turning it
    /// into a failed one. Returns `false` if an error was already recorded.
    pub(crate) fn fail_after_completion(&mut self, error: StreamError) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.record(error);
        true
    }

    fn record(&mut self, error: StreamError) {
        self.error = Some(error);
        self.buffer.clear();
        self.done = true;

        #[cfg(debug_assertions)]
        debug_assert_discarded_on_error!(self.error.is_some(), self.buffer.len());
        #[cfg(debug_assertions)]
        debug_assert_error_implies_done!(self.error.is_some(), self.done);
    }

    /// Marks clean completion. Returns `false` if already terminal.
    pub(crate) fn complete(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.done = true;
        true
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            done: self.done,
            error: self.error.clone(),
            length: self.buffer.len(),
            paused: self.buffer.is_paused(),
            active: self.active,
            total_ingested: self.buffer.total_ingested(),
            total_returned: self.buffer.total_returned(),
            total_filtered: self.total_filtered,
            live_iterators: self.live_iterators,
        }
    }
}

/// Point-in-time snapshot of an adapter's counters and flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub done: bool,
    pub error: Option<StreamError>,
    /// Items currently buffered.
    pub length: usize,
    pub paused: bool,
    pub active: bool,
    /// Items pushed onto the buffer.
    pub total_ingested: u64,
    /// Items handed to iteration handles.
    pub total_returned: u64,
    /// Data events rejected by the pre-filter.
    pub total_filtered: u64,
    pub live_iterators: usize,
}

impl Stats {
    /// Data events accepted by the bridge, whether buffered or filtered.
    #[inline]
    pub fn total_emitted(&self) -> u64 {
        self.total_ingested + self.total_filtered
    }
}
