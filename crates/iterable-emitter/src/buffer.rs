//! Watermark-driven FIFO buffer.

#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_counters_balanced, debug_assert_pause_edge};
use std::collections::VecDeque;

/// Flow-control transition requested by the buffer.
///
/// The buffer only records the new paused state. Invoking the upstream
/// control is left to the caller so it can happen outside the state lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlowSignal {
    Pause,
    Resume,
}

/// Bounded FIFO with high/low watermark backpressure.
#[derive(Debug)]
pub(crate) struct FlowBuffer<T> {
    items: VecDeque<T>,
    high_water_mark: usize,
    low_water_mark: usize,
    paused: bool,
    total_ingested: u64,
    total_returned: u64,
    total_discarded: u64,
}

impl<T> FlowBuffer<T> {
    pub(crate) fn new(high_water_mark: usize, low_water_mark: usize, preallocate: bool) -> Self {
        let items = if preallocate {
            VecDeque::with_capacity(high_water_mark)
        } else {
            VecDeque::new()
        };
        Self {
            items,
            high_water_mark,
            low_water_mark,
            paused: false,
            total_ingested: 0,
            total_returned: 0,
            total_discarded: 0,
        }
    }

    /// Appends `item` and returns the new length, plus `Pause` the first time
    /// the length reaches the high watermark.
    pub(crate) fn push(&mut self, item: T) -> (usize, Option<FlowSignal>) {
        self.items.push_back(item);
        self.total_ingested += 1;
        let len = self.items.len();

        let signal = if len >= self.high_water_mark && !self.paused {
            self.paused = true;
            Some(FlowSignal::Pause)
        } else {
            None
        };

        #[cfg(debug_assertions)]
        debug_assert_pause_edge!(signal.is_some(), len, self.high_water_mark);
        #[cfg(debug_assertions)]
        debug_assert_counters_balanced!(
            self.total_ingested,
            self.total_returned + self.total_discarded,
            len
        );

        (len, signal)
    }

    /// Removes the head item.
    ///
    /// The resume check runs against the length *before* removal, so resume
    /// fires while the head is still buffered.
    pub(crate) fn shift(&mut self) -> (Option<T>, Option<FlowSignal>) {
        let signal = if self.paused && self.items.len() <= self.low_water_mark {
            self.paused = false;
            Some(FlowSignal::Resume)
        } else {
            None
        };

        let item = self.items.pop_front();
        if item.is_some() {
            self.total_returned += 1;
        }

        #[cfg(debug_assertions)]
        debug_assert_counters_balanced!(
            self.total_ingested,
            self.total_returned + self.total_discarded,
            self.items.len()
        );

        (item, signal)
    }

    /// Discards every buffered item. Ingested/returned counters are left
    /// untouched.
    pub(crate) fn clear(&mut self) {
        self.total_discarded += self.items.len() as u64;
        self.items.clear();
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub(crate) fn total_ingested(&self) -> u64 {
        self.total_ingested
    }

    #[inline]
    pub(crate) fn total_returned(&self) -> u64 {
        self.total_returned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fifo_order() {
        let mut buf = FlowBuffer::new(10, 5, true);
        for i in 0..4 {
            buf.push(i);
        }
        let drained: Vec<_> = std::iter::from_fn(|| buf.shift().0).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert_eq!(buf.total_returned(), 4);
    }

    #[test]
    fn pause_fires_once_at_high_water_mark() {
        let mut buf = FlowBuffer::new(3, 1, false);
        assert_eq!(buf.push(1), (1, None));
        assert_eq!(buf.push(2), (2, None));
        assert_eq!(buf.push(3), (3, Some(FlowSignal::Pause)));
        assert_eq!(buf.push(4), (4, None));
        assert!(buf.is_paused());
    }

    #[test]
    fn resume_checked_before_removal() {
        let mut buf = FlowBuffer::new(4, 2, false);
        for i in 0..4 {
            buf.push(i);
        }
        assert!(buf.is_paused());

        // 4 then 3 buffered: above the low watermark
        assert_eq!(buf.shift(), (Some(0), None));
        assert_eq!(buf.shift(), (Some(1), None));
        // 2 buffered before removal: equals the low watermark
        assert_eq!(buf.shift(), (Some(2), Some(FlowSignal::Resume)));
        assert!(!buf.is_paused());
        assert_eq!(buf.shift(), (Some(3), None));
    }

    #[test]
    fn shift_on_empty_has_no_side_effects() {
        let mut buf: FlowBuffer<u8> = FlowBuffer::new(2, 1, true);
        assert_eq!(buf.shift(), (None, None));
        assert_eq!(buf.total_returned(), 0);
        assert!(!buf.is_paused());
    }

    #[test]
    fn clear_keeps_counters() {
        let mut buf = FlowBuffer::new(10, 5, true);
        buf.push("a");
        buf.push("b");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.total_ingested(), 2);
        assert_eq!(buf.total_returned(), 0);
        assert_eq!(buf.shift(), (None, None));
    }

    proptest! {
        #[test]
        fn prop_counters_balance(ops in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut buf = FlowBuffer::new(16, 4, false);
            for (n, push) in ops.into_iter().enumerate() {
                if push {
                    buf.push(n);
                } else {
                    buf.shift();
                }
                prop_assert_eq!(
                    buf.total_ingested(),
                    buf.total_returned() + buf.len() as u64
                );
            }
        }

        #[test]
        fn prop_pause_resume_alternate(ops in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut buf = FlowBuffer::new(8, 3, false);
            let mut last = FlowSignal::Resume;
            for (n, push) in ops.into_iter().enumerate() {
                let signal = if push { buf.push(n).1 } else { buf.shift().1 };
                if let Some(signal) = signal {
                    prop_assert_ne!(signal, last);
                    last = signal;
                }
                prop_assert_eq!(buf.is_paused(), last == FlowSignal::Pause);
            }
        }
    }
}
