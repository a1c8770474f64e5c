//! Event bridge: routes upstream notifications into buffer and state
//! transitions, and owns everything the adapter shares with its iteration
//! handles and watchdog.

use crate::buffer::FlowBuffer;
use crate::config::{Config, ControlSource};
use crate::error::StreamError;
use crate::log::{Diagnostics, LogLevel};
use crate::source::{Control, EventSource, ListenerId};
use crate::state::{State, Stats};
use crate::watchdog;
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, Notify};
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Outcome of one attempt to take an item for an iteration handle.
pub(crate) enum Step<T> {
    Item(T),
    /// Nothing buffered yet but more may arrive.
    Wait,
    /// Traversal is over, with the recorded error if any.
    End(Option<StreamError>),
}

/// Upstream flow state as last driven through the pause/resume controls.
#[derive(Debug, Default)]
struct Flow {
    /// `true` if the last control invoked was `pause`.
    applied: bool,
    /// Set while one caller is invoking controls.
    driving: bool,
}

/// Shared core of one adapter.
///
/// Listeners registered on the source hold only a `Weak` reference, so the
/// source never keeps the core alive.
///
/// Lock order is `flow` before `state`.
pub(crate) struct Bridge<A, T> {
    config: Config<A, T>,
    diag: Diagnostics,
    state: Mutex<State<T>>,
    flow: Mutex<Flow>,
    /// Continuation signal: fired on push, resolution and rejection.
    continuation: Notify,
    errors: broadcast::Sender<StreamError>,
    pause: Control,
    resume: Control,
    source: Arc<dyn EventSource<A>>,
    subscriptions: Mutex<Vec<(String, ListenerId)>>,
    watchdog: Mutex<Option<AbortHandle>>,
}

impl<A, T> Bridge<A, T>
where
    A: fmt::Debug + 'static,
    T: Send + 'static,
{
    /// Builds the core and subscribes it to `source`.
    pub(crate) fn attach(
        source: Arc<dyn EventSource<A>>,
        config: Config<A, T>,
    ) -> Result<Arc<Self>, StreamError> {
        let diag = Diagnostics::new(Uuid::new_v4(), config.logger.clone());
        if diag.enabled(LogLevel::Info) {
            diag.emit(LogLevel::Info, "options validated", Some(format!("{config:?}")), None, None);
        }

        let pause = resolve_control(source.as_ref(), config.pause(), "pause")?;
        let resume = resolve_control(source.as_ref(), config.resume(), "resume")?;
        let runtime = match config.timeout() {
            Some(_) => Some(tokio::runtime::Handle::try_current().map_err(|_| {
                StreamError::config("an inactivity timeout requires a running Tokio runtime")
            })?),
            None => None,
        };

        let buffer = FlowBuffer::new(
            config.high_water_mark(),
            config.low_water_mark(),
            config.preallocate(),
        );
        let (errors, _) = broadcast::channel(1);
        let timeout = config.timeout();

        let bridge = Arc::new(Self {
            config,
            diag,
            state: Mutex::new(State::new(buffer)),
            flow: Mutex::new(Flow::default()),
            continuation: Notify::new(),
            errors,
            pause,
            resume,
            source,
            subscriptions: Mutex::new(Vec::new()),
            watchdog: Mutex::new(None),
        });
        bridge.log(LogLevel::Debug, "buffer initialized", || None);

        bridge.subscribe();

        if let (Some(runtime), Some(period)) = (runtime, timeout) {
            let handle = watchdog::spawn(&runtime, Arc::downgrade(&bridge), period);
            *bridge.watchdog.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            bridge.log(LogLevel::Debug, "watchdog armed", || Some(format!("{period:?}")));
        }

        Ok(bridge)
    }

    fn subscribe(self: &Arc<Self>) {
        let mut registered = Vec::new();

        let weak = Arc::downgrade(self);
        let data_event = self.config.data_event().to_owned();
        let id = self.source.add_listener(
            &data_event,
            Arc::new(move |args: &[A]| {
                if let Some(bridge) = weak.upgrade() {
                    bridge.on_data(args);
                }
            }),
        );
        registered.push((data_event, id));
        self.log(LogLevel::Debug, "data listener registered", || None);

        for event in self.config.resolution_events() {
            let weak: Weak<Self> = Arc::downgrade(self);
            let name = event.clone();
            let id = self.source.add_listener(
                event,
                Arc::new(move |args: &[A]| {
                    if let Some(bridge) = weak.upgrade() {
                        bridge.on_resolved(&name, args);
                    }
                }),
            );
            registered.push((event.clone(), id));
        }
        self.log(LogLevel::Debug, "resolution listeners registered", || None);

        for event in self.config.rejection_events() {
            let weak: Weak<Self> = Arc::downgrade(self);
            let name = event.clone();
            let id = self.source.add_listener(
                event,
                Arc::new(move |args: &[A]| {
                    if let Some(bridge) = weak.upgrade() {
                        bridge.on_rejected(&name, args);
                    }
                }),
            );
            registered.push((event.clone(), id));
        }
        self.log(LogLevel::Debug, "rejection listeners registered", || None);

        *self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner) = registered;

        // A terminal event may have raced the registration above.
        if self.lock().done {
            self.teardown();
        }
    }

    pub(crate) fn on_data(&self, args: &[A]) {
        self.log(LogLevel::Debug, "data event", || Some(format!("{args:?}")));

        let (done, errored, paused) = {
            let mut st = self.lock();
            st.active = true;
            (st.done, st.error.is_some(), st.buffer.is_paused())
        };

        if done {
            if errored {
                self.log(LogLevel::Warn, "data event ignored after rejection", || {
                    Some(format!("{args:?}"))
                });
            } else {
                let error = StreamError::DataAfterCompletion {
                    event: self.config.data_event().to_owned(),
                };
                let recorded = self.lock().fail_after_completion(error.clone());
                self.finish_rejection(recorded, error);
            }
            return;
        }
        if paused {
            self.log(LogLevel::Warn, "data event while source is paused", || None);
        }

        if let Some(filter) = &self.config.pre_filter {
            if !filter(args) {
                self.lock().total_filtered += 1;
                self.log(LogLevel::Debug, "data filtered", || None);
                return;
            }
        }

        let item = (self.config.shape)(args);
        let pushed = {
            let mut st = self.lock();
            if st.done {
                None
            } else {
                Some(st.buffer.push(item))
            }
        };
        let Some((len, signal)) = pushed else {
            self.log(LogLevel::Warn, "item discarded, stream completed during shaping", || None);
            return;
        };

        self.log(LogLevel::Debug, "data pushed on buffer", || Some(format!("length {len}")));
        if signal.is_some() {
            self.reconcile();
        }
        self.continuation.notify_waiters();
    }

    pub(crate) fn on_resolved(&self, event: &str, args: &[A]) {
        self.log(LogLevel::Info, "resolution event received", || {
            Some(format!("{event}: {args:?}"))
        });
        if !self.lock().complete() {
            return;
        }
        self.teardown();
        self.continuation.notify_waiters();
    }

    pub(crate) fn on_rejected(&self, event: &str, args: &[A]) {
        let reason = match &self.config.rejection_reason {
            Some(render) => render(args),
            None => match args {
                [] => format!("`{event}` emitted without a payload"),
                [single] => format!("{single:?}"),
                _ => format!("{args:?}"),
            },
        };
        self.reject(StreamError::Rejected {
            event: event.to_owned(),
            reason,
            payload: self.config.capture.as_ref().map(|capture| capture(args)),
        });
    }
}

impl<A, T> Bridge<A, T> {
    /// Records `error`, discards the buffer, tears down upstream listeners,
    /// wakes suspended handles and broadcasts the error.
    pub(crate) fn reject(&self, error: StreamError) {
        let recorded = self.lock().fail(error.clone());
        self.finish_rejection(recorded, error);
    }

    fn finish_rejection(&self, recorded: bool, error: StreamError) {
        if !recorded {
            self.log(LogLevel::Debug, "error ignored, stream already terminal", || {
                Some(error.to_string())
            });
            return;
        }
        if self.diag.enabled(LogLevel::Error) {
            self.diag.emit(LogLevel::Error, "stream rejected", None, None, Some(&error));
        }
        self.teardown();
        self.continuation.notify_waiters();
        // No subscribers is not an error.
        let _ = self.errors.send(error);
    }

    /// One watchdog tick. Returns `false` once the watchdog should stop.
    pub(crate) fn watchdog_tick(&self) -> bool {
        let stalled = {
            let mut st = self.lock();
            if st.done {
                return false;
            }
            !mem::replace(&mut st.active, false)
        };
        match (stalled, self.config.timeout()) {
            (true, Some(timeout)) => {
                self.reject(StreamError::Stalled { timeout });
                false
            }
            _ => {
                self.log(LogLevel::Debug, "watchdog re-armed", || None);
                true
            }
        }
    }

    /// Takes the next buffered item, if the stream still produces.
    pub(crate) fn step(&self) -> Step<T> {
        let (step, signal) = {
            let mut st = self.lock();
            if !st.is_producing() {
                (Step::End(st.error.clone()), None)
            } else if st.buffer.is_empty() {
                (Step::Wait, None)
            } else {
                match st.buffer.shift() {
                    (Some(item), signal) => (Step::Item(item), signal),
                    (None, signal) => (Step::Wait, signal),
                }
            }
        };
        if signal.is_some() {
            self.reconcile();
        }
        if matches!(step, Step::Item(_)) {
            self.log(LogLevel::Debug, "item shifted", || None);
        }
        step
    }

    pub(crate) fn continuation(&self) -> &Notify {
        &self.continuation
    }

    pub(crate) fn register_iterator(&self) {
        self.lock().live_iterators += 1;
        self.log(LogLevel::Info, "iteration started", || None);
    }

    pub(crate) fn release_iterator(&self, abandoned: bool) {
        {
            let mut st = self.lock();
            st.live_iterators = st.live_iterators.saturating_sub(1);
        }
        let message = if abandoned {
            "iteration abandoned"
        } else {
            "iteration complete"
        };
        self.log(LogLevel::Info, message, || None);
    }

    pub(crate) fn subscribe_errors(&self) -> broadcast::Receiver<StreamError> {
        self.errors.subscribe()
    }

    pub(crate) fn stats(&self) -> Stats {
        self.lock().stats()
    }

    pub(crate) fn config(&self) -> &Config<A, T> {
        &self.config
    }

    pub(crate) fn id(&self) -> Uuid {
        self.diag.id()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flow(&self) -> MutexGuard<'_, Flow> {
        self.flow.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drives the upstream controls until the source matches the buffer's
    /// paused flag.
    ///
    /// One caller drives at a time. Others return at once and leave the
    /// driver to pick up their flip, since it re-reads the flag after every
    /// control. Controls run with no lock held, so they may re-enter the
    /// adapter.
    fn reconcile(&self) {
        {
            let mut flow = self.flow();
            if flow.driving {
                return;
            }
            flow.driving = true;
        }
        loop {
            let pause = {
                let mut flow = self.flow();
                let wanted = self.lock().buffer.is_paused();
                if wanted == flow.applied {
                    flow.driving = false;
                    return;
                }
                wanted
            };
            if pause {
                (self.pause)();
            } else {
                (self.resume)();
            }
            self.flow().applied = pause;
            let message = if pause { "source paused" } else { "source resumed" };
            self.log(LogLevel::Debug, message, || None);
        }
    }

    /// Removes every upstream listener and stops the watchdog. Idempotent.
    fn teardown(&self) {
        let registered = mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let watchdog = self.watchdog.lock().unwrap_or_else(PoisonError::into_inner).take();
        detach(self.source.as_ref(), registered, watchdog, |event| {
            self.log(LogLevel::Debug, "listener dropped", || Some(event.to_owned()));
        });
    }

    /// Emits a record, attaching a stats snapshot to debug records. Must not
    /// be called with the state lock held.
    fn log(
        &self,
        level: LogLevel,
        message: &'static str,
        payload: impl FnOnce() -> Option<String>,
    ) {
        if !self.diag.enabled(level) {
            return;
        }
        let stats =
            (level == LogLevel::Debug && self.diag.sink_enabled(level)).then(|| self.stats());
        self.diag.emit(level, message, payload(), stats, None);
    }
}

impl<A, T> Drop for Bridge<A, T> {
    fn drop(&mut self) {
        let registered = mem::take(
            self.subscriptions
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let watchdog = self.watchdog.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        detach(self.source.as_ref(), registered, watchdog, |_| {});
    }
}

/// Removes `registered` from `source` and aborts the watchdog, if any.
/// Called with no lock held.
fn detach<A>(
    source: &dyn EventSource<A>,
    registered: Vec<(String, ListenerId)>,
    watchdog: Option<AbortHandle>,
    mut on_removed: impl FnMut(&str),
) {
    for (event, id) in registered {
        source.remove_listener(&event, id);
        on_removed(&event);
    }
    if let Some(handle) = watchdog {
        handle.abort();
    }
}

fn resolve_control<A>(
    source: &dyn EventSource<A>,
    spec: &ControlSource,
    kind: &str,
) -> Result<Control, StreamError> {
    match spec {
        ControlSource::Function(control) => Ok(Arc::clone(control)),
        ControlSource::Named(name) => source.control(name).ok_or_else(|| {
            StreamError::config(format!("source exposes no `{name}` control to {kind} with"))
        }),
    }
}
