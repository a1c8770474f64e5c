//! Pull-Based Iteration over Push-Based Event Sources
//!
//! This crate adapts any notification-style source (one that emits named
//! data events plus a terminal "done" or "error" event) into an ordered,
//! backpressure-aware sequence that consumers pull one item at a time.
//!
//! # Features
//!
//! - **Watermark backpressure**: the source is paused when the buffer reaches
//!   the high watermark and resumed when a pull finds it at or below the low
//!   watermark
//! - **Competing handles**: any number of [`Iter`] handles drain the same
//!   buffer; each item is delivered exactly once
//! - **Lazy error surfacing**: upstream rejections, stalls and protocol
//!   violations are recorded once and surfaced to every handle, plus a
//!   broadcast for passive observers
//! - **Inactivity watchdog**: optional re-armed heartbeat on a Tokio task
//! - **Structured logging**: `tracing` events and an optional injected sink
//!
//! # Example
//!
//! ```ignore
//! use iterable_emitter::{EventEmitter, IterableEmitter, Options, StreamExt};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(EventEmitter::<u64>::new());
//!     source.register_control("pause", || {});
//!     source.register_control("resume", || {});
//!
//!     let adapter = IterableEmitter::new(
//!         Arc::clone(&source),
//!         Options::new("data", "end")
//!             .pause_by_name("pause")
//!             .resume_by_name("resume"),
//!     )?;
//!
//!     source.emit("data", &[1]);
//!     source.emit("end", &[]);
//!
//!     let mut stream = Box::pin(adapter.stream());
//!     while let Some(item) = stream.next().await {
//!         println!("Received: {:?}", item?);
//!     }
//!     Ok(())
//! }
//! ```

mod bridge;
mod buffer;
mod config;
mod emission;
mod emitter;
mod error;
mod invariants;
mod iter;
mod log;
mod source;
mod state;
mod watchdog;

pub use config::{
    Config, ControlSource, IntoEventNames, Options, PreFilter, RejectionReason, Transform,
    DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK, DEFAULT_REJECTION_EVENT,
};
pub use emission::Emission;
pub use emitter::IterableEmitter;
pub use error::{RejectionPayload, StreamError};
pub use iter::Iter;
pub use log::{LogLevel, LogRecord, LogSink};
pub use source::{Control, EventEmitter, EventSource, Listener, ListenerId};
pub use state::Stats;

// Re-export useful stream combinators
pub use tokio_stream::StreamExt;
