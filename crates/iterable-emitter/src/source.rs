//! Upstream event source abstraction.
//!
//! The adapter only needs to subscribe and unsubscribe listeners by event
//! name, and optionally to look up named pause/resume controls. Any
//! notification-style API can be wrapped by implementing [`EventSource`];
//! [`EventEmitter`] is a ready-made implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Callback invoked with the arguments of an emitted event.
pub type Listener<A> = Arc<dyn Fn(&[A]) + Send + Sync>;

/// Zero-argument control such as `pause` or `resume`.
pub type Control = Arc<dyn Fn() + Send + Sync>;

/// Identifies one listener registration on a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A push-based source of named events carrying arguments of type `A`.
pub trait EventSource<A>: Send + Sync {
    /// Registers `listener` for `event`.
    fn add_listener(&self, event: &str, listener: Listener<A>) -> ListenerId;

    /// Removes a registration. Returns `false` if it was not present.
    ///
    /// Must be callable from inside a listener while the source is
    /// dispatching.
    fn remove_listener(&self, event: &str, id: ListenerId) -> bool;

    /// Looks up a named control, e.g. `"pause"`.
    fn control(&self, _name: &str) -> Option<Control> {
        None
    }
}

/// Thread-safe, synchronous event emitter.
///
/// Listeners are snapshotted before dispatch, so they may add or remove
/// listeners (including themselves) while an event is being emitted.
pub struct EventEmitter<A> {
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Listener<A>)>>>,
    controls: Mutex<HashMap<String, Control>>,
    next_id: AtomicU64,
}

impl<A> EventEmitter<A> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            controls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Exposes `control` under `name` for [`EventSource::control`] lookups.
    pub fn register_control(
        &self,
        name: impl Into<String>,
        control: impl Fn() + Send + Sync + 'static,
    ) {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(control));
    }

    /// Calls every listener registered for `event` with `args`.
    ///
    /// Returns `true` if the event had listeners.
    pub fn emit(&self, event: &str, args: &[A]) -> bool {
        let snapshot: Vec<Listener<A>> = {
            let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            match listeners.get(event) {
                Some(registered) => registered.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return false,
            }
        };
        for listener in &snapshot {
            listener(args);
        }
        !snapshot.is_empty()
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl<A> Default for EventEmitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventEmitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<String> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("EventEmitter").field("events", &events).finish_non_exhaustive()
    }
}

impl<A> EventSource<A> for EventEmitter<A> {
    fn add_listener(&self, event: &str, listener: Listener<A>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_owned())
            .or_default()
            .push((id, listener));
        id
    }

    fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(registered) = listeners.get_mut(event) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(existing, _)| *existing != id);
        let removed = registered.len() != before;
        if registered.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    fn control(&self, name: &str) -> Option<Control> {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_listeners_with_args() {
        let emitter = EventEmitter::<u32>::new();
        let sum = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&sum);
        emitter.add_listener(
            "data",
            Arc::new(move |args: &[u32]| {
                seen.fetch_add(args.iter().sum::<u32>() as usize, Ordering::SeqCst);
            }),
        );

        assert!(emitter.emit("data", &[1, 2, 3]));
        assert!(!emitter.emit("other", &[]));
        assert_eq!(sum.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn remove_listener_from_inside_dispatch() {
        let emitter = Arc::new(EventEmitter::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(None));

        let (em, c, s) = (Arc::clone(&emitter), Arc::clone(&calls), Arc::clone(&slot));
        let id = emitter.add_listener(
            "once",
            Arc::new(move |_: &[()]| {
                c.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *s.lock().unwrap() {
                    em.remove_listener("once", id);
                }
            }),
        );
        *slot.lock().unwrap() = Some(id);

        emitter.emit("once", &[]);
        emitter.emit("once", &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count("once"), 0);
    }

    #[test]
    fn controls_lookup() {
        let emitter = EventEmitter::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        emitter.register_control("pause", move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let pause = emitter.control("pause").expect("pause registered");
        pause();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(emitter.control("resume").is_none());
    }
}
