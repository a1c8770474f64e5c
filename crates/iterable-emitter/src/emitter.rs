//! The public adapter type.

use crate::bridge::Bridge;
use crate::config::{Config, Options};
use crate::emission::Emission;
use crate::error::StreamError;
use crate::iter::Iter;
use crate::source::EventSource;
use crate::state::Stats;
use futures_core::Stream;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pull-based, backpressure-aware view of a push-based [`EventSource`].
///
/// On construction the adapter subscribes to the source's data, resolution
/// and rejection events. Data is buffered until pulled through an [`Iter`];
/// when the buffer reaches the high watermark the source is paused, and it
/// is resumed once a pull finds the buffer at or below the low watermark.
///
/// # Example
///
/// ```ignore
/// use iterable_emitter::{EventEmitter, IterableEmitter, Options};
/// use std::sync::Arc;
///
/// let source = Arc::new(EventEmitter::<u32>::new());
/// source.register_control("pause", || {});
/// source.register_control("resume", || {});
///
/// let options = Options::new("data", "end")
///     .pause_by_name("pause")
///     .resume_by_name("resume")
///     .with_transform(|args: &[u32]| args[0] * 2);
/// let adapter = IterableEmitter::new(Arc::clone(&source), options)?;
///
/// source.emit("data", &[21]);
/// source.emit("end", &[]);
///
/// let mut iter = adapter.iter();
/// assert_eq!(iter.next().await, Some(Ok(42)));
/// assert_eq!(iter.next().await, None);
/// ```
pub struct IterableEmitter<A, T = Emission<A>> {
    bridge: Arc<Bridge<A, T>>,
}

impl<A, T> IterableEmitter<A, T>
where
    A: fmt::Debug + 'static,
    T: Send + 'static,
{
    /// Validates `options` and attaches to `source`.
    ///
    /// Fails with [`StreamError::Configuration`] if the options are invalid,
    /// a named control is missing on the source, or a timeout is configured
    /// outside a Tokio runtime.
    pub fn new<S>(source: Arc<S>, options: Options<A, T>) -> Result<Self, StreamError>
    where
        S: EventSource<A> + 'static,
    {
        Self::with_config(source, options.validate()?)
    }

    /// Attaches to `source` with an already validated configuration.
    pub fn with_config<S>(source: Arc<S>, config: Config<A, T>) -> Result<Self, StreamError>
    where
        S: EventSource<A> + 'static,
    {
        let source: Arc<dyn EventSource<A>> = source;
        let bridge = Bridge::attach(source, config)?;
        Ok(Self { bridge })
    }
}

impl<A, T> IterableEmitter<A, T> {
    /// Creates a new iteration handle.
    pub fn iter(&self) -> Iter<A, T> {
        Iter::new(Arc::clone(&self.bridge))
    }

    /// Creates a new iteration handle as a [`Stream`].
    pub fn stream(&self) -> impl Stream<Item = Result<T, StreamError>>
    where
        A: 'static,
        T: Send + 'static,
    {
        self.iter().into_stream()
    }

    /// Subscribes to the error broadcast, for observers that do not iterate.
    ///
    /// Only errors recorded after subscribing are delivered.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<StreamError> {
        self.bridge.subscribe_errors()
    }

    /// Returns `true` once a resolution or rejection has been received.
    pub fn is_done(&self) -> bool {
        self.bridge.lock().done
    }

    /// The recorded error, if the stream failed.
    pub fn error(&self) -> Option<StreamError> {
        self.bridge.lock().error.clone()
    }

    pub fn is_errored(&self) -> bool {
        self.bridge.lock().error.is_some()
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.bridge.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridge.lock().buffer.is_empty()
    }

    pub fn total_ingested(&self) -> u64 {
        self.bridge.lock().buffer.total_ingested()
    }

    pub fn total_returned(&self) -> u64 {
        self.bridge.lock().buffer.total_returned()
    }

    pub fn total_filtered(&self) -> u64 {
        self.bridge.lock().total_filtered
    }

    /// Data events accepted so far, whether buffered or filtered.
    pub fn total_emitted(&self) -> u64 {
        self.stats().total_emitted()
    }

    /// Returns `true` while the source is paused for backpressure.
    pub fn is_paused(&self) -> bool {
        self.bridge.lock().buffer.is_paused()
    }

    /// Returns `true` if data arrived since the last watchdog tick.
    pub fn is_active(&self) -> bool {
        self.bridge.lock().active
    }

    /// Number of iteration handles that have not finished.
    pub fn live_iterators(&self) -> usize {
        self.bridge.lock().live_iterators
    }

    pub fn stats(&self) -> Stats {
        self.bridge.stats()
    }

    /// Unique id carried by every log record of this adapter.
    pub fn id(&self) -> Uuid {
        self.bridge.id()
    }

    pub fn config(&self) -> &Config<A, T> {
        self.bridge.config()
    }
}

impl<A, T> fmt::Debug for IterableEmitter<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterableEmitter")
            .field("id", &self.id())
            .field("stats", &self.stats())
            .finish()
    }
}
