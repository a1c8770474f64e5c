//! Pull-iteration handles.

use crate::bridge::{Bridge, Step};
use crate::error::StreamError;
use futures_core::Stream;
use std::fmt;
use std::sync::Arc;

/// One traversal over an adapter's buffer.
///
/// Handles created from the same adapter compete for items: each buffered
/// item is delivered to exactly one of them, in emission order.
///
/// Dropping a handle before it finishes counts as abandonment. It does not
/// unsubscribe the adapter from its source; other handles keep draining.
pub struct Iter<A, T> {
    bridge: Arc<Bridge<A, T>>,
    finished: bool,
}

impl<A, T> Iter<A, T> {
    pub(crate) fn new(bridge: Arc<Bridge<A, T>>) -> Self {
        bridge.register_iterator();
        Self {
            bridge,
            finished: false,
        }
    }

    /// Waits for the next item.
    ///
    /// Returns `Some(Ok(item))` while items are available, suspending while
    /// the buffer is empty and the stream is still producing. Once the stream
    /// ends the handle returns `None`, or `Some(Err(_))` exactly once first if
    /// the stream ended with an error.
    ///
    /// Cancel safe: dropping the returned future never loses an item.
    pub async fn next(&mut self) -> Option<Result<T, StreamError>> {
        if self.finished {
            return None;
        }
        let bridge = Arc::clone(&self.bridge);
        loop {
            let notified = bridge.continuation().notified();
            tokio::pin!(notified);
            // Register before inspecting state so a wake-up between the
            // check and the await is not lost.
            notified.as_mut().enable();

            match bridge.step() {
                Step::Item(item) => return Some(Ok(item)),
                Step::Wait => notified.await,
                Step::End(error) => {
                    self.finish();
                    return error.map(Err);
                }
            }
        }
    }

    /// Returns `true` once this handle has ended its traversal.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Converts the handle into a [`Stream`] of results.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, StreamError>>
    where
        A: 'static,
        T: Send + 'static,
    {
        futures_util::stream::unfold(self, |mut iter| async move {
            let item = iter.next().await?;
            Some((item, iter))
        })
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.bridge.release_iterator(false);
        }
    }
}

impl<A, T> Drop for Iter<A, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            self.bridge.release_iterator(true);
        }
    }
}

impl<A, T> fmt::Debug for Iter<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("instance", &self.bridge.id())
            .field("finished", &self.finished)
            .finish()
    }
}
