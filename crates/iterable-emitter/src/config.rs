//! Adapter options and their validation.
//!
//! [`Options`] is the user-facing record with defaults and chained `with_*`
//! setters. [`Options::validate`] checks it once and produces the immutable
//! [`Config`] an adapter owns for its whole lifetime.

use crate::emission::Emission;
use crate::error::{RejectionPayload, StreamError};
use crate::log::{LogLevel, LogRecord, LogSink};
use crate::source::Control;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of buffered items at which the source is paused.
pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;
/// Default number of buffered items at or below which the source is resumed.
pub const DEFAULT_LOW_WATER_MARK: usize = 500;
/// Rejection event subscribed to unless overridden.
pub const DEFAULT_REJECTION_EVENT: &str = "error";

/// Shapes the arguments of a data event into a buffered item.
pub type Transform<A, T> = Arc<dyn Fn(&[A]) -> T + Send + Sync>;
/// Decides whether a data event is buffered at all.
pub type PreFilter<A> = Arc<dyn Fn(&[A]) -> bool + Send + Sync>;
/// Renders the payload of a rejection event.
pub type RejectionReason<A> = Arc<dyn Fn(&[A]) -> String + Send + Sync>;
/// Keeps a copy of rejection arguments for [`StreamError::rejection_args`].
pub(crate) type PayloadCapture<A> = Arc<dyn Fn(&[A]) -> RejectionPayload + Send + Sync>;

/// One or more event names.
///
/// Lets `Options` accept `"end"`, `["end", "close"]`, or a `Vec<String>`.
pub trait IntoEventNames {
    fn into_event_names(self) -> Vec<String>;
}

impl IntoEventNames for &str {
    fn into_event_names(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl IntoEventNames for String {
    fn into_event_names(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoEventNames for Vec<String> {
    fn into_event_names(self) -> Vec<String> {
        self
    }
}

impl IntoEventNames for Vec<&str> {
    fn into_event_names(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

impl IntoEventNames for &[&str] {
    fn into_event_names(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_owned()).collect()
    }
}

impl<const N: usize> IntoEventNames for [&str; N] {
    fn into_event_names(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_owned()).collect()
    }
}

/// Where a pause or resume capability comes from.
#[derive(Clone)]
pub enum ControlSource {
    /// A control looked up on the source via [`EventSource::control`].
    ///
    /// [`EventSource::control`]: crate::EventSource::control
    Named(String),
    /// A caller-supplied closure.
    Function(Control),
}

impl fmt::Debug for ControlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Options for building an [`IterableEmitter`].
///
/// `T` is the buffered item type. It stays [`Emission<A>`] until a transform
/// is installed with [`Options::with_transform`].
///
/// [`IterableEmitter`]: crate::IterableEmitter
pub struct Options<A, T = Emission<A>> {
    /// Buffer length at which the source is paused.
    ///
    /// Default: 1000
    pub high_water_mark: usize,

    /// Buffer length at or below which a paused source is resumed.
    ///
    /// Default: 500
    pub low_water_mark: usize,

    pub data_event: String,
    pub resolution_events: Vec<String>,

    /// Default: `["error"]`
    pub rejection_events: Vec<String>,

    pub pause_by_name: Option<String>,
    pub pause_by_function: Option<Control>,
    pub resume_by_name: Option<String>,
    pub resume_by_function: Option<Control>,

    /// Inactivity window for the watchdog. `None` or zero disables it.
    pub timeout: Option<Duration>,

    /// Reserve `high_water_mark` slots up front.
    ///
    /// Default: true
    pub preallocate: bool,

    pub logger: Option<(LogSink, LogLevel)>,
    pub pre_filter: Option<PreFilter<A>>,
    pub rejection_reason: Option<RejectionReason<A>>,
    shape: Transform<A, T>,
    capture: Option<PayloadCapture<A>>,
}

impl<A> Options<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Creates options with defaults for everything but the event names.
    ///
    /// Items are buffered as [`Emission`]s and rejection arguments are kept
    /// on the error. A pause and a resume source must still be configured
    /// before validation succeeds.
    pub fn new(data_event: impl Into<String>, resolution_events: impl IntoEventNames) -> Self {
        let mut options = Self::with_shape(
            data_event.into(),
            resolution_events.into_event_names(),
            Arc::new(Emission::from_args),
        );
        options.capture = Some(Arc::new(|args: &[A]| RejectionPayload::new(args.to_vec())));
        options
    }
}

impl<A, T> Options<A, T> {
    /// Creates options that shape every data event with `transform`.
    ///
    /// Unlike [`Options::new`] this places no bound on `A`, so rejection
    /// arguments are only available through their rendered reason.
    pub fn mapped(
        data_event: impl Into<String>,
        resolution_events: impl IntoEventNames,
        transform: impl Fn(&[A]) -> T + Send + Sync + 'static,
    ) -> Self {
        Self::with_shape(
            data_event.into(),
            resolution_events.into_event_names(),
            Arc::new(transform),
        )
    }

    fn with_shape(
        data_event: String,
        resolution_events: Vec<String>,
        shape: Transform<A, T>,
    ) -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            data_event,
            resolution_events,
            rejection_events: vec![DEFAULT_REJECTION_EVENT.to_owned()],
            pause_by_name: None,
            pause_by_function: None,
            resume_by_name: None,
            resume_by_function: None,
            timeout: None,
            preallocate: true,
            logger: None,
            pre_filter: None,
            rejection_reason: None,
            shape,
            capture: None,
        }
    }

    /// Replaces the item shape with `transform(args)`.
    pub fn with_transform<U>(
        self,
        transform: impl Fn(&[A]) -> U + Send + Sync + 'static,
    ) -> Options<A, U> {
        Options {
            high_water_mark: self.high_water_mark,
            low_water_mark: self.low_water_mark,
            data_event: self.data_event,
            resolution_events: self.resolution_events,
            rejection_events: self.rejection_events,
            pause_by_name: self.pause_by_name,
            pause_by_function: self.pause_by_function,
            resume_by_name: self.resume_by_name,
            resume_by_function: self.resume_by_function,
            timeout: self.timeout,
            preallocate: self.preallocate,
            logger: self.logger,
            pre_filter: self.pre_filter,
            rejection_reason: self.rejection_reason,
            shape: Arc::new(transform),
            capture: self.capture,
        }
    }

    pub fn with_high_water_mark(mut self, mark: usize) -> Self {
        self.high_water_mark = mark;
        self
    }

    pub fn with_low_water_mark(mut self, mark: usize) -> Self {
        self.low_water_mark = mark;
        self
    }

    pub fn with_rejection_events(mut self, events: impl IntoEventNames) -> Self {
        self.rejection_events = events.into_event_names();
        self
    }

    /// Data events for which `filter` returns `false` are counted and dropped.
    pub fn with_pre_filter(
        mut self,
        filter: impl Fn(&[A]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.pre_filter = Some(Arc::new(filter));
        self
    }

    /// Pause via the source control registered under `name`.
    pub fn pause_by_name(mut self, name: impl Into<String>) -> Self {
        self.pause_by_name = Some(name.into());
        self
    }

    pub fn pause_with(mut self, pause: impl Fn() + Send + Sync + 'static) -> Self {
        self.pause_by_function = Some(Arc::new(pause));
        self
    }

    /// Resume via the source control registered under `name`.
    pub fn resume_by_name(mut self, name: impl Into<String>) -> Self {
        self.resume_by_name = Some(name.into());
        self
    }

    pub fn resume_with(mut self, resume: impl Fn() + Send + Sync + 'static) -> Self {
        self.resume_by_function = Some(Arc::new(resume));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_preallocate(mut self, preallocate: bool) -> Self {
        self.preallocate = preallocate;
        self
    }

    /// Sends records at or above `level` to `sink`.
    pub fn with_logger(
        mut self,
        sink: impl Fn(LogRecord) + Send + Sync + 'static,
        level: LogLevel,
    ) -> Self {
        self.logger = Some((Arc::new(sink), level));
        self
    }

    pub fn with_rejection_reason(
        mut self,
        reason: impl Fn(&[A]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.rejection_reason = Some(Arc::new(reason));
        self
    }

    /// Checks the options and freezes them into a [`Config`].
    pub fn validate(self) -> Result<Config<A, T>, StreamError> {
        if self.high_water_mark == 0 {
            return Err(StreamError::config("`high_water_mark` must be greater than 0"));
        }
        if self.low_water_mark == 0 {
            return Err(StreamError::config("`low_water_mark` must be greater than 0"));
        }
        if self.low_water_mark > self.high_water_mark {
            return Err(StreamError::config(format!(
                "`low_water_mark` ({}) must not exceed `high_water_mark` ({})",
                self.low_water_mark, self.high_water_mark
            )));
        }
        if self.data_event.is_empty() {
            return Err(StreamError::config("`data_event` must name an event"));
        }

        let resolution_events = event_set("resolution_events", self.resolution_events)?;
        if resolution_events.is_empty() {
            return Err(StreamError::config("at least one resolution event is required"));
        }
        let rejection_events = event_set("rejection_events", self.rejection_events)?;

        if resolution_events.contains(&self.data_event)
            || rejection_events.contains(&self.data_event)
        {
            return Err(StreamError::config(format!(
                "`{}` cannot be both the data event and a terminal event",
                self.data_event
            )));
        }
        if let Some(shared) = resolution_events.iter().find(|e| rejection_events.contains(e)) {
            return Err(StreamError::config(format!(
                "`{shared}` cannot be both a resolution and a rejection event"
            )));
        }

        let pause = control_source("pause", self.pause_by_name, self.pause_by_function)?;
        let resume = control_source("resume", self.resume_by_name, self.resume_by_function)?;

        Ok(Config {
            high_water_mark: self.high_water_mark,
            low_water_mark: self.low_water_mark,
            data_event: self.data_event,
            resolution_events,
            rejection_events,
            pause,
            resume,
            timeout: self.timeout.filter(|t| !t.is_zero()),
            preallocate: self.preallocate,
            logger: self.logger,
            pre_filter: self.pre_filter,
            rejection_reason: self.rejection_reason,
            shape: self.shape,
            capture: self.capture,
        })
    }
}

impl<A, T> fmt::Debug for Options<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("high_water_mark", &self.high_water_mark)
            .field("low_water_mark", &self.low_water_mark)
            .field("data_event", &self.data_event)
            .field("resolution_events", &self.resolution_events)
            .field("rejection_events", &self.rejection_events)
            .field("pause_by_name", &self.pause_by_name)
            .field("resume_by_name", &self.resume_by_name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Deduplicates `names`, keeping first occurrences, and rejects empty names.
fn event_set(option: &str, names: Vec<String>) -> Result<Vec<String>, StreamError> {
    let mut set: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(StreamError::config(format!("`{option}` contains an empty event name")));
        }
        if !set.contains(&name) {
            set.push(name);
        }
    }
    Ok(set)
}

fn control_source(
    kind: &str,
    by_name: Option<String>,
    by_function: Option<Control>,
) -> Result<ControlSource, StreamError> {
    match (by_name, by_function) {
        (Some(name), None) if name.is_empty() => {
            Err(StreamError::config(format!("`{kind}_by_name` must not be empty")))
        }
        (Some(name), None) => Ok(ControlSource::Named(name)),
        (None, Some(function)) => Ok(ControlSource::Function(function)),
        _ => Err(StreamError::config(format!(
            "exactly one of `{kind}_by_name` or `{kind}_by_function` must be specified"
        ))),
    }
}

/// Validated, immutable adapter configuration.
pub struct Config<A, T> {
    high_water_mark: usize,
    low_water_mark: usize,
    data_event: String,
    resolution_events: Vec<String>,
    rejection_events: Vec<String>,
    pause: ControlSource,
    resume: ControlSource,
    timeout: Option<Duration>,
    preallocate: bool,
    pub(crate) logger: Option<(LogSink, LogLevel)>,
    pub(crate) pre_filter: Option<PreFilter<A>>,
    pub(crate) rejection_reason: Option<RejectionReason<A>>,
    pub(crate) shape: Transform<A, T>,
    pub(crate) capture: Option<PayloadCapture<A>>,
}

impl<A, T> Config<A, T> {
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    pub fn low_water_mark(&self) -> usize {
        self.low_water_mark
    }

    pub fn data_event(&self) -> &str {
        &self.data_event
    }

    pub fn resolution_events(&self) -> &[String] {
        &self.resolution_events
    }

    pub fn rejection_events(&self) -> &[String] {
        &self.rejection_events
    }

    pub fn pause(&self) -> &ControlSource {
        &self.pause
    }

    pub fn resume(&self) -> &ControlSource {
        &self.resume
    }

    /// The watchdog window, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn preallocate(&self) -> bool {
        self.preallocate
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.logger.as_ref().map(|(_, level)| *level)
    }
}

impl<A, T> fmt::Debug for Config<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("high_water_mark", &self.high_water_mark)
            .field("low_water_mark", &self.low_water_mark)
            .field("data_event", &self.data_event)
            .field("resolution_events", &self.resolution_events)
            .field("rejection_events", &self.rejection_events)
            .field("pause", &self.pause)
            .field("resume", &self.resume)
            .field("timeout", &self.timeout)
            .field("preallocate", &self.preallocate)
            .field("log_level", &self.log_level())
            .field("pre_filter", &self.pre_filter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Options<u32> {
        Options::new("data", "end").pause_by_name("pause").resume_by_name("resume")
    }

    #[test]
    fn defaults() {
        let config = base().validate().expect("valid");
        assert_eq!(config.high_water_mark(), DEFAULT_HIGH_WATER_MARK);
        assert_eq!(config.low_water_mark(), DEFAULT_LOW_WATER_MARK);
        assert_eq!(config.rejection_events(), ["error".to_owned()]);
        assert_eq!(config.resolution_events(), ["end".to_owned()]);
        assert!(config.timeout().is_none());
        assert!(config.preallocate());
        assert!(config.log_level().is_none());
    }

    #[test]
    fn watermarks_must_be_positive() {
        let err = base().with_high_water_mark(0).validate().unwrap_err();
        assert!(err.is_configuration());
        let err = base().with_low_water_mark(0).validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn low_water_mark_above_high_is_rejected() {
        let err = base()
            .with_high_water_mark(10)
            .with_low_water_mark(11)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("must not exceed"));

        base().with_high_water_mark(10).with_low_water_mark(10).validate().expect("equal marks");
    }

    #[test]
    fn exactly_one_pause_source() {
        let neither = Options::<u32>::new("data", "end").resume_by_name("resume");
        assert!(neither.validate().is_err());

        let both = base().pause_with(|| {});
        assert!(both.validate().is_err());

        let function = Options::<u32>::new("data", "end").pause_with(|| {}).resume_with(|| {});
        let config = function.validate().expect("closures");
        assert!(matches!(config.pause(), ControlSource::Function(_)));
        assert!(matches!(config.resume(), ControlSource::Function(_)));
    }

    #[test]
    fn mapped_options_accept_non_clone_arguments() {
        struct Frame(u8);

        let config = Options::mapped("data", "end", |args: &[Frame]| {
            args.iter().map(|frame| usize::from(frame.0)).sum::<usize>()
        })
        .pause_with(|| {})
        .resume_with(|| {})
        .validate()
        .expect("valid");
        assert_eq!((config.shape)(&[Frame(1), Frame(2)]), 3);
        assert!(config.capture.is_none());
        assert!(base().validate().expect("valid").capture.is_some());
    }

    #[test]
    fn exactly_one_resume_source() {
        let both = base().resume_with(|| {});
        let err = both.validate().unwrap_err();
        assert!(err.to_string().contains("resume_by_name"));
    }

    #[test]
    fn event_names_accept_several_forms() {
        let config = Options::<u32>::new("data", ["end", "close", "end"])
            .with_rejection_events(vec!["error", "abort"])
            .pause_by_name("pause")
            .resume_by_name("resume")
            .validate()
            .expect("valid");
        assert_eq!(config.resolution_events(), ["end".to_owned(), "close".to_owned()]);
        assert_eq!(config.rejection_events().len(), 2);
    }

    #[test]
    fn empty_or_overlapping_event_names_are_rejected() {
        assert!(Options::<u32>::new("", "end")
            .pause_by_name("p")
            .resume_by_name("r")
            .validate()
            .is_err());
        assert!(Options::<u32>::new("data", Vec::<String>::new())
            .pause_by_name("p")
            .resume_by_name("r")
            .validate()
            .is_err());
        assert!(base().with_rejection_events("end").validate().is_err());
        assert!(Options::<u32>::new("data", "data")
            .pause_by_name("p")
            .resume_by_name("r")
            .validate()
            .is_err());
    }

    #[test]
    fn zero_timeout_disables_watchdog() {
        let config = base().with_timeout(Duration::ZERO).validate().expect("valid");
        assert!(config.timeout().is_none());

        let config = base().with_timeout(Duration::from_millis(50)).validate().expect("valid");
        assert_eq!(config.timeout(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn transform_changes_item_type() {
        let config = base()
            .with_transform(|args: &[u32]| args[0].to_string())
            .validate()
            .expect("valid");
        assert_eq!((config.shape)(&[7]), "7");
    }
}
