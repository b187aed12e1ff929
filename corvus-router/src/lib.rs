//! Type-indexed, cancellable event fan-out (component I of this design).
//!
//! The teacher's own gateway listener mechanism (`gateway/src/listener.rs`)
//! is an unordered `DashMap<u64, Listener<T>>` per shard, handing each
//! listener an unbounded `mpsc` channel — adequate for "give me a stream of
//! this event type" but not for this design's stronger contract: listeners
//! must run in attach order, a listener must be able to cancel a dispatch
//! for listeners after it, and any type of event (not just one shard's
//! stream) must be routable through the same structure. This crate keeps
//! the teacher's atomic-handle-counter idea but swaps the per-listener
//! channel for an ordered map of callbacks invoked in-line, and adds the
//! per-dispatch cancellation flag.

use std::{
    any::{Any, TypeId},
    cell::Cell,
    collections::{BTreeMap, HashMap},
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

/// Per-dispatch state handed to every listener invoked for that dispatch.
///
/// Calling [`EventContext::cancel`] stops any *subsequent* listener (in
/// attach order) from being invoked for this one dispatch; it has no
/// effect on listeners that already ran, and the flag does not persist to
/// the next dispatch of the same event type.
pub struct EventContext {
    cancelled: Cell<bool>,
}

impl EventContext {
    fn new() -> Self {
        Self {
            cancelled: Cell::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// A previously-attached listener, typed to the event it was attached for
/// so it can't be passed to [`EventRouter::detach`] for the wrong type.
pub struct Handle<T> {
    id: u64,
    _marker: PhantomData<fn(T)>,
}

impl<T> Handle<T> {
    pub const fn raw(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

type Callback<T> = Arc<dyn Fn(&T, &EventContext) + Send + Sync>;
type WarningCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct TypedListeners<T> {
    next_handle: AtomicU64,
    listeners: RwLock<BTreeMap<u64, Callback<T>>>,
    warning: RwLock<Option<WarningCallback<T>>>,
}

impl<T> Default for TypedListeners<T> {
    fn default() -> Self {
        Self {
            next_handle: AtomicU64::new(0),
            listeners: RwLock::new(BTreeMap::new()),
            warning: RwLock::new(None),
        }
    }
}

/// The router itself: one [`TypedListeners<T>`] lazily created per event
/// type `T` that's ever attached to or dispatched.
#[derive(Default)]
pub struct EventRouter {
    typed: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Debug for EventRouter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("event_types", &self.typed.read().expect("poisoned").len())
            .finish()
    }
}

impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_typed<T, R>(&self, f: impl FnOnce(&TypedListeners<T>) -> R) -> R
    where
        T: 'static + Send + Sync,
    {
        let type_id = TypeId::of::<T>();

        {
            let map = self.typed.read().expect("router poisoned");
            if let Some(entry) = map.get(&type_id) {
                return f(entry
                    .downcast_ref::<TypedListeners<T>>()
                    .expect("type-indexed entry has wrong concrete type"));
            }
        }

        {
            let mut map = self.typed.write().expect("router poisoned");
            map.entry(type_id)
                .or_insert_with(|| Box::new(TypedListeners::<T>::default()));
        }

        let map = self.typed.read().expect("router poisoned");
        f(map
            .get(&type_id)
            .expect("just inserted")
            .downcast_ref::<TypedListeners<T>>()
            .expect("type-indexed entry has wrong concrete type"))
    }

    /// Attach a listener for event type `T`. Returns a handle that
    /// uniquely identifies this listener among all `T` listeners;
    /// handles are dispensed in attach order and listeners are invoked in
    /// that same order on every subsequent dispatch.
    pub fn attach<T, F>(&self, listener: F) -> Handle<T>
    where
        T: 'static + Send + Sync,
        F: Fn(&T, &EventContext) + Send + Sync + 'static,
    {
        self.with_typed::<T, _>(|typed| {
            let id = typed.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
            typed
                .listeners
                .write()
                .expect("listeners poisoned")
                .insert(id, Arc::new(listener));

            Handle {
                id,
                _marker: PhantomData,
            }
        })
    }

    /// Detach a previously-attached listener. Returns whether it was still
    /// attached (it may have already been removed).
    pub fn detach<T>(&self, handle: Handle<T>) -> bool
    where
        T: 'static + Send + Sync,
    {
        self.with_typed::<T, _>(|typed| {
            typed
                .listeners
                .write()
                .expect("listeners poisoned")
                .remove(&handle.id)
                .is_some()
        })
    }

    /// Register the single optional warning callback for event type `T`,
    /// replacing any previous one. Unlike ordinary listeners this runs
    /// outside of the cancellation flow and isn't ordered relative to
    /// them — it exists purely for one-shot advisories like this design's
    /// "message_create warns if `MESSAGE_CONTENT` is absent" example,
    /// where the closure itself tracks whether it has already warned.
    pub fn set_warning<T, F>(&self, warning: F)
    where
        T: 'static + Send + Sync,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.with_typed::<T, _>(|typed| {
            *typed.warning.write().expect("warning poisoned") = Some(Arc::new(warning));
        });
    }

    /// Dispatch an event to every attached `T` listener, in attach order,
    /// stopping early if a listener cancels the dispatch.
    ///
    /// Listeners may attach or detach other listeners for `T` from within
    /// their own invocation: the snapshot of callbacks to run is taken
    /// under a read lock and released before any callback runs, so a
    /// callback that calls [`EventRouter::attach`]/[`EventRouter::detach`]
    /// on the same router does not deadlock. Such changes take effect
    /// starting with the *next* dispatch, not the one in progress.
    pub fn dispatch<T>(&self, event: &T)
    where
        T: 'static + Send + Sync,
    {
        self.with_typed::<T, _>(|typed| {
            if let Some(warning) = typed.warning.read().expect("warning poisoned").as_ref() {
                warning(event);
            }

            let snapshot: Vec<Callback<T>> = typed
                .listeners
                .read()
                .expect("listeners poisoned")
                .values()
                .cloned()
                .collect();

            let context = EventContext::new();

            for callback in snapshot {
                if context.is_cancelled() {
                    break;
                }

                callback(event, &context);
            }
        });
    }

    /// Number of currently-attached listeners for `T`, for tests and
    /// diagnostics.
    pub fn listener_count<T>(&self) -> usize
    where
        T: 'static + Send + Sync,
    {
        self.with_typed::<T, _>(|typed| typed.listeners.read().expect("listeners poisoned").len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Mutex;

    struct Ping;

    #[test]
    fn listeners_invoked_in_attach_order() {
        let router = EventRouter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        router.attach::<Ping, _>(move |_, _| o1.lock().unwrap().push(1));
        let o2 = Arc::clone(&order);
        router.attach::<Ping, _>(move |_, _| o2.lock().unwrap().push(2));
        let o3 = Arc::clone(&order);
        router.attach::<Ping, _>(move |_, _| o3.lock().unwrap().push(3));

        router.dispatch(&Ping);

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn cancellation_stops_later_listeners_but_not_the_next_dispatch() {
        let router = EventRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));

        router.attach::<Ping, _>(|_, ctx| ctx.cancel());
        let c = Arc::clone(&calls);
        router.attach::<Ping, _>(move |_, _| {
            c.fetch_add(1, AtomicOrdering::SeqCst);
        });

        router.dispatch(&Ping);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);

        // Cancellation must not persist beyond the dispatch that set it.
        router.dispatch(&Ping);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0, "cancelfires again each dispatch");
    }

    #[test]
    fn detach_removes_listener_and_reports_prior_presence() {
        let router = EventRouter::new();
        let handle = router.attach::<Ping, _>(|_, _| {});

        assert_eq!(router.listener_count::<Ping>(), 1);
        assert!(router.detach(handle));
        assert_eq!(router.listener_count::<Ping>(), 0);
        assert!(!router.detach(handle));
    }

    #[test]
    fn listener_can_attach_another_listener_without_deadlock() {
        let router = Arc::new(EventRouter::new());
        let inner_ran = Arc::new(AtomicUsize::new(0));

        let router_clone = Arc::clone(&router);
        let inner_ran_clone = Arc::clone(&inner_ran);
        router.attach::<Ping, _>(move |_, _| {
            let inner_ran = Arc::clone(&inner_ran_clone);
            router_clone.attach::<Ping, _>(move |_, _| {
                inner_ran.fetch_add(1, AtomicOrdering::SeqCst);
            });
        });

        router.dispatch(&Ping);
        assert_eq!(inner_ran.load(AtomicOrdering::SeqCst), 0);

        router.dispatch(&Ping);
        assert_eq!(inner_ran.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn warning_callback_runs_independent_of_cancellation() {
        let router = EventRouter::new();
        let warned = Arc::new(AtomicUsize::new(0));

        let w = Arc::clone(&warned);
        router.set_warning::<Ping, _>(move |_| {
            w.fetch_add(1, AtomicOrdering::SeqCst);
        });
        router.attach::<Ping, _>(|_, ctx| ctx.cancel());

        router.dispatch(&Ping);
        assert_eq!(warned.load(AtomicOrdering::SeqCst), 1);
    }
}
