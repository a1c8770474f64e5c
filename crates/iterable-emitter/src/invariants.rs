//! Debug assertion macros for adapter invariants.
//!
//! These macros are only active in debug builds (`#[cfg(debug_assertions)]`),
//! so there is zero overhead in release builds.

// =============================================================================
// Buffer accounting
// =============================================================================

/// Assert that every ingested item is either returned, discarded or still
/// buffered.
///
/// **Invariant**: `total_ingested == total_returned + total_discarded + len`
///
/// Used in: `FlowBuffer::push()`, `FlowBuffer::shift()`
macro_rules! debug_assert_counters_balanced {
    ($ingested:expr, $accounted:expr, $len:expr) => {
        debug_assert!(
            $ingested == $accounted + $len as u64,
            "buffer accounting violated: ingested {} != accounted {} + buffered {}",
            $ingested,
            $accounted,
            $len
        )
    };
}

// =============================================================================
// Pause edge
// =============================================================================

/// Assert that pause is only requested at or above the high watermark.
///
/// **Invariant**: `pause_signaled → len >= high_water_mark`
///
/// Used in: `FlowBuffer::push()`
macro_rules! debug_assert_pause_edge {
    ($signaled:expr, $len:expr, $high:expr) => {
        debug_assert!(
            !$signaled || $len >= $high,
            "pause requested below the high watermark: len {} < {}",
            $len,
            $high
        )
    };
}

// =============================================================================
// Terminal state
// =============================================================================

/// Assert that the buffer is empty once an error is recorded.
///
/// **Invariant**: `error.is_some() → buffer.is_empty()`
///
/// Used in: `Bridge::reject()`, `Iter::next()`
macro_rules! debug_assert_discarded_on_error {
    ($errored:expr, $len:expr) => {
        debug_assert!(
            !$errored || $len == 0,
            "error recorded but {} items still buffered",
            $len
        )
    };
}

/// Assert that an error implies completion.
///
/// **Invariant**: `error.is_some() → done`
macro_rules! debug_assert_error_implies_done {
    ($errored:expr, $done:expr) => {
        debug_assert!(!$errored || $done, "error recorded on a stream not marked done")
    };
}

pub(crate) use debug_assert_counters_balanced;
pub(crate) use debug_assert_discarded_on_error;
pub(crate) use debug_assert_error_implies_done;
pub(crate) use debug_assert_pause_edge;
