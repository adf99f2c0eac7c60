// ============================================================================
// tether - Observable Value
// A mutable cell with synchronous change notification
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::core::tracker::DependencyTracker;
use crate::core::types::{AnyObservable, EqualsFn, ObservableId, default_equals};
use crate::reactivity::disposer::Dispose;
use crate::reactivity::equality::never_equals;
use crate::reactivity::subscription::{ListenerList, Subscription};

// =============================================================================
// OPTIONS
// =============================================================================

/// Construction options for an observable.
pub struct ObservableOptions<T> {
    /// Writes for which `equals(old, new)` holds are dropped silently
    pub equals: EqualsFn<T>,

    /// Diagnostic label reported in logs
    pub label: Option<&'static str>,
}

impl<T> ObservableOptions<T> {
    /// Options under which every write notifies.
    pub fn always_notify() -> Self {
        Self {
            equals: never_equals,
            label: None,
        }
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}

impl<T: PartialEq> Default for ObservableOptions<T> {
    fn default() -> Self {
        Self {
            equals: default_equals,
            label: None,
        }
    }
}

// =============================================================================
// OBSERVABLE INNER
// =============================================================================

pub(crate) struct ObservableInner<T> {
    id: ObservableId,
    label: Option<&'static str>,
    value: RefCell<T>,
    equals: EqualsFn<T>,
    listeners: ListenerList<T>,
    tracker: DependencyTracker,
    disposed: Cell<bool>,
}

impl<T: 'static> AnyObservable for ObservableInner<T> {
    fn id(&self) -> ObservableId {
        self.id
    }

    fn label(&self) -> Option<&'static str> {
        self.label
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Subscription {
        self.listeners
            .subscribe("change", Rc::new(move |_: &T| listener()), false)
    }
}

// =============================================================================
// OBSERVABLE<T>
// =============================================================================

/// A mutable value whose writes notify subscribers synchronously.
///
/// Reads through `get`/`with` are recorded by the attached tracker, which is
/// how dependency properties discover what they depend on. Cloning yields a
/// second handle to the same cell.
///
/// # Example
///
/// ```
/// use tether::Observable;
///
/// let count = Observable::new(0);
/// assert_eq!(count.get(), 0);
///
/// assert!(count.set(5));
/// assert!(!count.set(5));
/// assert_eq!(count.get(), 5);
/// ```
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable on the thread's default tracker.
    pub fn new(value: T) -> Self {
        Self::with_options(value, ObservableOptions::default())
    }

    /// Create an observable attached to `tracker`.
    pub fn new_in(tracker: &DependencyTracker, value: T) -> Self {
        Self::with_options_in(tracker, value, ObservableOptions::default())
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create an observable with custom options on the default tracker.
    pub fn with_options(value: T, options: ObservableOptions<T>) -> Self {
        Self::with_options_in(&DependencyTracker::current(), value, options)
    }

    /// Create an observable with custom options attached to `tracker`.
    pub fn with_options_in(
        tracker: &DependencyTracker,
        value: T,
        options: ObservableOptions<T>,
    ) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                id: ObservableId::next(),
                label: options.label,
                value: RefCell::new(value),
                equals: options.equals,
                listeners: ListenerList::new(),
                tracker: tracker.clone(),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Get the current value (cloning), recording the read.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Get the current value without recording the read.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, recording the read.
    ///
    /// `f` must not write to this same observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Replace the value and notify subscribers.
    ///
    /// Returns false, and notifies nobody, when the options' equality
    /// considers the new value equal to the current one.
    pub fn set(&self, value: T) -> bool {
        let changed = !(self.inner.equals)(&self.inner.value.borrow(), &value);
        if !changed {
            return false;
        }

        let snapshot = {
            let mut slot = self.inner.value.borrow_mut();
            *slot = value;
            slot.clone()
        };
        self.inner.listeners.notify(&snapshot);
        true
    }

    /// Mutate the value in place. Always notifies.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut slot = self.inner.value.borrow_mut();
            f(&mut slot);
            slot.clone()
        };
        self.inner.listeners.notify(&snapshot);
    }

    /// Call `listener` with the new value after every change.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.inner
            .listeners
            .subscribe("change", Rc::new(listener), false)
    }

    /// Call `listener` on the next change only.
    pub fn subscribe_once(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.inner
            .listeners
            .subscribe("change", Rc::new(listener), true)
    }

    /// Number of attached listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn id(&self) -> ObservableId {
        self.inner.id
    }

    pub fn label(&self) -> Option<&'static str> {
        self.inner.label
    }

    /// The tracker this observable reports reads to.
    pub fn tracker(&self) -> &DependencyTracker {
        &self.inner.tracker
    }

    /// Get the observable as a type-erased dependency.
    pub fn as_any_observable(&self) -> Rc<dyn AnyObservable> {
        self.inner.clone()
    }

    fn track(&self) {
        self.inner.tracker.read(self.as_any_observable());
    }
}

impl<T: Clone + 'static> Dispose for Observable<T> {
    /// Detach every subscriber. The value stays readable.
    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.listeners.clear();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
