// ============================================================================
// tether - Subscriptions
// Listener lists and the disposable handles that detach from them
// ============================================================================
//
// Every emitter in the crate (observables, dependency properties, observable
// collections) owns a `ListenerList<A>`, where `A` is the payload handed to
// listeners. Registering returns a `Subscription`, which knows how to detach
// itself without knowing `A`.
//
// Dispatch works on a snapshot of the list (collect-then-call), so listeners
// may subscribe, dispose or write back into the emitter while it notifies.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::disposer::Dispose;

/// A registered callback.
pub(crate) type Listener<A> = Rc<dyn Fn(&A)>;

// =============================================================================
// SUBSCRIPTION STATE
// =============================================================================

/// Type-erased removal from a listener list
trait Detach {
    fn detach(&self, key: u64);
}

struct SubscriptionState {
    /// Event label, for diagnostics
    event: &'static str,

    /// Key of the entry inside the emitter's list
    key: u64,

    /// The emitter; taken on dispose so nothing is retained afterwards
    emitter: RefCell<Option<Weak<dyn Detach>>>,

    disposed: Cell<bool>,
}

impl SubscriptionState {
    /// Detach exactly once. Returns false when already disposed.
    fn release(&self) -> bool {
        if self.disposed.replace(true) {
            return false;
        }
        let emitter = self.emitter.borrow_mut().take();
        if let Some(emitter) = emitter.and_then(|weak| weak.upgrade()) {
            emitter.detach(self.key);
        }
        true
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle for one registered listener.
///
/// Disposing detaches the listener and drops its closure. Disposal is
/// idempotent, and dropping the handle disposes it.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tether::{Dispose, Observable};
///
/// let value = Observable::new(0);
/// let seen = Rc::new(Cell::new(0));
///
/// let sub = value.subscribe({
///     let seen = seen.clone();
///     move |v| seen.set(*v)
/// });
///
/// value.set(3);
/// sub.dispose();
/// sub.dispose();
/// value.set(4);
/// assert_eq!(seen.get(), 3);
/// ```
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    state: Rc<SubscriptionState>,
}

impl Subscription {
    /// The event this subscription listens to.
    pub fn event(&self) -> &'static str {
        self.state.event
    }

    /// Whether the listener has been detached, either explicitly or because a
    /// one-shot listener already fired.
    pub fn is_disposed(&self) -> bool {
        self.state.disposed.get()
    }
}

impl Dispose for Subscription {
    fn dispose(&self) {
        self.state.release();
    }

    fn is_disposed(&self) -> bool {
        Subscription::is_disposed(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.state.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.state.event)
            .field("disposed", &self.state.disposed.get())
            .finish()
    }
}

// =============================================================================
// LISTENER LIST
// =============================================================================

struct Entry<A> {
    state: Rc<SubscriptionState>,
    once: bool,
    listener: Listener<A>,
}

struct ListenerListInner<A> {
    next_key: Cell<u64>,
    entries: RefCell<Vec<Rc<Entry<A>>>>,
}

impl<A> Detach for ListenerListInner<A> {
    fn detach(&self, key: u64) {
        self.entries
            .borrow_mut()
            .retain(|entry| entry.state.key != key);
    }
}

/// Ordered subscriber list owned by an emitter.
pub(crate) struct ListenerList<A> {
    inner: Rc<ListenerListInner<A>>,
}

impl<A: 'static> ListenerList<A> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(ListenerListInner {
                next_key: Cell::new(0),
                entries: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register `listener`; one-shot listeners detach before their first call.
    pub(crate) fn subscribe(
        &self,
        event: &'static str,
        listener: Listener<A>,
        once: bool,
    ) -> Subscription {
        let key = self.inner.next_key.get();
        self.inner.next_key.set(key + 1);

        let emitter: Weak<dyn Detach> = Rc::downgrade(&self.inner) as Weak<dyn Detach>;
        let state = Rc::new(SubscriptionState {
            event,
            key,
            emitter: RefCell::new(Some(emitter)),
            disposed: Cell::new(false),
        });

        self.inner.entries.borrow_mut().push(Rc::new(Entry {
            state: state.clone(),
            once,
            listener,
        }));

        Subscription { state }
    }

    /// Call every live listener in registration order. Returns how many ran.
    pub(crate) fn notify(&self, payload: &A) -> usize {
        let snapshot: Vec<Rc<Entry<A>>> = self.inner.entries.borrow().clone();

        let mut delivered = 0;
        for entry in snapshot {
            // Disposed by an earlier listener in this same dispatch
            if entry.state.disposed.get() {
                continue;
            }
            if entry.once {
                entry.state.release();
            }
            (entry.listener)(payload);
            delivered += 1;
        }
        delivered
    }

    /// Detach every listener, marking their subscriptions disposed.
    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut *self.inner.entries.borrow_mut());
        for entry in entries {
            entry.state.disposed.set(true);
            entry.state.emitter.borrow_mut().take();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }
}

impl<A: 'static> Default for ListenerList<A> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
