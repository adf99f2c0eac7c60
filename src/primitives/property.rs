// ============================================================================
// tether - Dependency Properties
// Lazily recomputed values whose inputs are discovered while computing
// ============================================================================
//
// A DependencyProperty is both a consumer and a producer. As a consumer it
// opens a tracking frame, runs its compute function, and subscribes to every
// observable the function read. As a producer it is itself observable: when
// any input changes it marks itself invalid and tells its own subscribers
// right away, without knowing the new value yet. The recomputation waits for
// the next `get`.
//
// Invalidation only ever flips a flag and fans out notifications, so a change
// pushed into a deep chain of properties costs nothing until something reads.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::core::error::BindingError;
use crate::core::tracker::DependencyTracker;
use crate::core::types::{AnyObservable, ObservableId, ReentrancyGuard};
use crate::reactivity::disposer::Dispose;
use crate::reactivity::subscription::{ListenerList, Subscription};

type ComputeFn<T, E> = Rc<dyn Fn() -> Result<T, E>>;
type SetterFn<T> = Rc<dyn Fn(T)>;

// =============================================================================
// PROPERTY INNER
// =============================================================================

pub(crate) struct PropertyInner<T, E> {
    id: ObservableId,
    tracker: DependencyTracker,

    /// Cleared on dispose
    compute: RefCell<Option<ComputeFn<T, E>>>,

    /// Write redirection; without one the property is read-only
    setter: RefCell<Option<SetterFn<T>>>,

    /// Last successfully computed value
    cached: RefCell<Option<T>>,

    /// True until the first successful evaluation and after every invalidation
    invalid: Cell<bool>,

    /// Raised while the compute function runs
    computing: Cell<bool>,

    /// Raised while invalidation listeners run
    notifying: Cell<bool>,

    /// Set when the property was recomputed and invalidated again mid-dispatch
    renotify: Cell<bool>,

    evaluations: Cell<u64>,
    disposed: Cell<bool>,

    /// One subscription per dependency read during the last evaluation
    dependencies: RefCell<Vec<Subscription>>,

    listeners: ListenerList<()>,
    self_weak: Weak<PropertyInner<T, E>>,
}

impl<T: Clone + 'static, E: 'static> PropertyInner<T, E> {
    fn as_any_observable(&self) -> Option<Rc<dyn AnyObservable>> {
        self.self_weak
            .upgrade()
            .map(|rc| rc as Rc<dyn AnyObservable>)
    }

    fn record_read(&self) {
        if let Some(me) = self.as_any_observable() {
            self.tracker.read(me);
        }
    }

    /// Mark stale and tell subscribers.
    ///
    /// An invalidation arriving while this property is still notifying is
    /// dropped if the property is still stale from that dispatch, which is
    /// what terminates cyclic graphs. If a listener recomputed the property in
    /// the meantime the invalidation is real, and another round of
    /// notifications runs once the current one finishes.
    fn invalidate(&self) {
        let was_valid = !self.invalid.replace(true);

        let Some(_notifying) = ReentrancyGuard::enter(&self.notifying) else {
            if was_valid {
                trace!(property = %self.id, "invalidated during dispatch; notifying again");
                self.renotify.set(true);
            } else {
                trace!(property = %self.id, "reentrant invalidation ignored");
            }
            return;
        };

        loop {
            self.renotify.set(false);
            self.listeners.notify(&());
            if !self.renotify.get() {
                break;
            }
        }
    }

    fn evaluate(&self) -> Result<T, E> {
        if !self.invalid.get() {
            self.record_read();
            return Ok(self.cached_or_panic("a valid property has no cached value"));
        }

        let compute = self.compute.borrow().clone();
        let Some(compute) = compute else {
            self.record_read();
            return Ok(self.cached_or_panic("property was disposed before its first evaluation"));
        };

        let Some(_computing) = ReentrancyGuard::enter(&self.computing) else {
            warn!(property = %self.id, "property read itself while computing; using cached value");
            return Ok(self.cached_or_panic("cyclic dependency property definition"));
        };

        let Some(me) = self.as_any_observable() else {
            return compute();
        };

        let frame = self.tracker.enter(me);
        let result = compute();
        let deps = frame.finish();

        // A failed evaluation keeps the old value, the old subscriptions, and
        // the invalid flag, so the next read retries.
        let value = result?;

        self.resubscribe(deps);
        *self.cached.borrow_mut() = Some(value.clone());
        self.invalid.set(false);
        self.evaluations.set(self.evaluations.get() + 1);
        trace!(
            property = %self.id,
            evaluations = self.evaluations.get(),
            dependencies = self.dependencies.borrow().len(),
            "property recomputed"
        );

        Ok(value)
    }

    fn resubscribe(&self, deps: Vec<Rc<dyn AnyObservable>>) {
        let previous = std::mem::take(&mut *self.dependencies.borrow_mut());
        for sub in &previous {
            sub.dispose();
        }

        let subs: Vec<Subscription> = deps
            .iter()
            .filter(|dep| dep.id() != self.id)
            .map(|dep| {
                let weak = self.self_weak.clone();
                dep.watch(Rc::new(move || {
                    if let Some(property) = weak.upgrade() {
                        property.invalidate();
                    }
                }))
            })
            .collect();

        *self.dependencies.borrow_mut() = subs;
    }

    /// # Panics
    ///
    /// Panics with `context` when nothing has been cached yet.
    fn cached_or_panic(&self, context: &str) -> T {
        match self.cached.borrow().as_ref() {
            Some(value) => value.clone(),
            None => panic!("{context} (property {})", self.id),
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.compute.borrow_mut().take();
        self.setter.borrow_mut().take();
        let deps = std::mem::take(&mut *self.dependencies.borrow_mut());
        for sub in &deps {
            sub.dispose();
        }
        self.listeners.clear();
        trace!(property = %self.id, "property disposed");
    }
}

impl<T: Clone + 'static, E: 'static> AnyObservable for PropertyInner<T, E> {
    fn id(&self) -> ObservableId {
        self.id
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Subscription {
        self.listeners
            .subscribe("invalidate", Rc::new(move |_: &()| listener()), false)
    }
}

// =============================================================================
// DEPENDENCY PROPERTY
// =============================================================================

/// A read-only (optionally write-redirected) value recomputed on demand from
/// whatever observables its compute function reads.
///
/// `E` is the compute function's error type. Properties built with `new`
/// cannot fail and offer `get`; fallible ones built with `try_new` offer
/// `try_get`, which returns the error without caching it.
///
/// Cloning yields another handle to the same property.
///
/// # Example
///
/// ```
/// use tether::{DependencyProperty, Observable};
///
/// let width = Observable::new(4);
/// let height = Observable::new(3);
/// let area = DependencyProperty::new({
///     let (width, height) = (width.clone(), height.clone());
///     move || width.get() * height.get()
/// });
///
/// assert_eq!(area.get(), 12);
/// width.set(10);
/// assert!(!area.is_valid());
/// assert_eq!(area.get(), 30);
/// ```
pub struct DependencyProperty<T, E = Infallible> {
    inner: Rc<PropertyInner<T, E>>,
}

impl<T, E> Clone for DependencyProperty<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> DependencyProperty<T> {
    /// Create a property on the thread's default tracker.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::new_in(&DependencyTracker::current(), compute)
    }

    /// Create a property on `tracker`.
    pub fn new_in(tracker: &DependencyTracker, compute: impl Fn() -> T + 'static) -> Self {
        Self::build(tracker, Rc::new(move || Ok::<T, Infallible>(compute())), None)
    }

    /// Create a property whose writes are forwarded to `setter`.
    ///
    /// The setter is expected to update the observables `compute` reads.
    pub fn with_setter(
        compute: impl Fn() -> T + 'static,
        setter: impl Fn(T) + 'static,
    ) -> Self {
        Self::build(
            &DependencyTracker::current(),
            Rc::new(move || Ok::<T, Infallible>(compute())),
            Some(Rc::new(setter)),
        )
    }

    /// Get the current value, recomputing if invalid.
    ///
    /// # Panics
    ///
    /// Panics if the property was disposed before it ever computed a value,
    /// or if its definition reads itself before producing a first value.
    pub fn get(&self) -> T {
        match self.inner.evaluate() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<T: Clone + 'static, E: 'static> DependencyProperty<T, E> {
    /// Create a property with a fallible compute function.
    pub fn try_new(compute: impl Fn() -> Result<T, E> + 'static) -> Self {
        Self::try_new_in(&DependencyTracker::current(), compute)
    }

    /// Create a property with a fallible compute function on `tracker`.
    pub fn try_new_in(
        tracker: &DependencyTracker,
        compute: impl Fn() -> Result<T, E> + 'static,
    ) -> Self {
        Self::build(tracker, Rc::new(compute), None)
    }

    fn build(
        tracker: &DependencyTracker,
        compute: ComputeFn<T, E>,
        setter: Option<SetterFn<T>>,
    ) -> Self {
        let inner = Rc::new_cyclic(|self_weak| PropertyInner {
            id: ObservableId::next(),
            tracker: tracker.clone(),
            compute: RefCell::new(Some(compute)),
            setter: RefCell::new(setter),
            cached: RefCell::new(None),
            invalid: Cell::new(true),
            computing: Cell::new(false),
            notifying: Cell::new(false),
            renotify: Cell::new(false),
            evaluations: Cell::new(0),
            disposed: Cell::new(false),
            dependencies: RefCell::new(Vec::new()),
            listeners: ListenerList::new(),
            self_weak: self_weak.clone(),
        });
        Self { inner }
    }

    /// Get the current value, recomputing if invalid.
    ///
    /// A compute error is returned as-is; the property stays invalid and
    /// keeps its previous value and dependencies.
    ///
    /// # Panics
    ///
    /// See [`DependencyProperty::get`].
    pub fn try_get(&self) -> Result<T, E> {
        self.inner.evaluate()
    }

    /// Forward `value` to the write delegate.
    pub fn set(&self, value: T) -> Result<(), BindingError> {
        let setter = self.inner.setter.borrow().clone();
        match setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None if self.inner.disposed.get() => Err(BindingError::Disposed(self.inner.id)),
            None => Err(BindingError::ReadOnly(self.inner.id)),
        }
    }

    /// Mark the property stale and notify subscribers immediately.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    /// Call `listener` whenever the property becomes invalid.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
        self.inner
            .listeners
            .subscribe("invalidate", Rc::new(move |_: &()| listener()), false)
    }

    /// Call `listener` on the next invalidation only.
    pub fn subscribe_once(&self, listener: impl Fn() + 'static) -> Subscription {
        self.inner
            .listeners
            .subscribe("invalidate", Rc::new(move |_: &()| listener()), true)
    }

    /// Whether the cached value is current.
    pub fn is_valid(&self) -> bool {
        !self.inner.invalid.get()
    }

    /// Whether a write delegate is installed.
    pub fn is_writable(&self) -> bool {
        self.inner.setter.borrow().is_some()
    }

    /// Number of dependencies found by the last successful evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Number of successful evaluations so far.
    pub fn evaluation_count(&self) -> u64 {
        self.inner.evaluations.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn id(&self) -> ObservableId {
        self.inner.id
    }

    pub fn tracker(&self) -> &DependencyTracker {
        &self.inner.tracker
    }

    /// Get the property as a type-erased dependency.
    pub fn as_any_observable(&self) -> Rc<dyn AnyObservable> {
        self.inner.clone()
    }
}

impl<T: Clone + 'static, E: 'static> Dispose for DependencyProperty<T, E> {
    /// Drop the compute function and detach from every dependency.
    fn dispose(&self) {
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T: fmt::Debug, E> fmt::Debug for DependencyProperty<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyProperty")
            .field("id", &self.inner.id)
            .field("cached", &*self.inner.cached.borrow())
            .field("invalid", &self.inner.invalid.get())
            .finish()
    }
}

/// Create a dependency property on the thread's default tracker.
///
/// # Example
///
/// ```
/// use tether::{Observable, property};
///
/// let count = Observable::new(2);
/// let doubled = property({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 4);
/// ```
pub fn property<T: Clone + 'static>(compute: impl Fn() -> T + 'static) -> DependencyProperty<T> {
    DependencyProperty::new(compute)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::observable::Observable;

    fn counting<T: 'static>(
        calls: &Rc<Cell<u32>>,
        f: impl Fn() -> T + 'static,
    ) -> impl Fn() -> T + 'static {
        let calls = calls.clone();
        move || {
            calls.set(calls.get() + 1);
            f()
        }
    }

    #[test]
    fn starts_invalid_and_computes_on_first_get() {
        let a = Observable::new(2);
        let calls = Rc::new(Cell::new(0));
        let p = DependencyProperty::new(counting(&calls, {
            let a = a.clone();
            move || a.get() + 1
        }));

        assert!(!p.is_valid());
        assert_eq!(calls.get(), 0);
        assert_eq!(p.get(), 3);
        assert!(p.is_valid());
        assert_eq!(p.get(), 3);
        assert_eq!(calls.get(), 1);
        assert_eq!(p.dependency_count(), 1);
    }

    #[test]
    fn recomputes_once_after_many_changes() {
        let a = Observable::new(0);
        let calls = Rc::new(Cell::new(0));
        let p = DependencyProperty::new(counting(&calls, {
            let a = a.clone();
            move || a.get() * 10
        }));
        assert_eq!(p.get(), 0);

        a.set(1);
        a.set(2);
        a.set(3);
        assert_eq!(calls.get(), 1);
        assert_eq!(p.get(), 30);
        assert_eq!(calls.get(), 2);
        assert_eq!(p.evaluation_count(), 2);
    }

    #[test]
    fn invalidation_notifies_before_recompute() {
        let a = Observable::new(1);
        let p = property({
            let a = a.clone();
            move || a.get()
        });
        p.get();

        let notified = Rc::new(Cell::new(0));
        let _sub = p.subscribe({
            let notified = notified.clone();
            move || notified.set(notified.get() + 1)
        });

        a.set(2);
        assert_eq!(notified.get(), 1);
        assert!(!p.is_valid());
        assert_eq!(p.get(), 2);
    }

    #[test]
    fn nested_properties_propagate_through_fresh_cache() {
        let a = Observable::new(1);
        let inner = property({
            let a = a.clone();
            move || a.get() * 2
        });
        let outer = property({
            let inner = inner.clone();
            move || inner.get() + 1
        });

        // Inner is computed, and cached, before outer ever reads it.
        assert_eq!(inner.get(), 2);
        assert_eq!(outer.get(), 3);
        assert_eq!(outer.dependency_count(), 1);

        a.set(5);
        assert!(!inner.is_valid());
        assert!(!outer.is_valid());
        assert_eq!(outer.get(), 11);
    }

    #[test]
    fn diamond_reads_consistent_values() {
        let a = Observable::new(1);
        let b = property({
            let a = a.clone();
            move || a.get() + 10
        });
        let c = property({
            let a = a.clone();
            move || a.get() * 10
        });
        let d = property({
            let (b, c) = (b.clone(), c.clone());
            move || b.get() + c.get()
        });

        assert_eq!(d.get(), 21);
        a.set(2);
        assert_eq!(d.get(), 32);
    }

    #[test]
    fn conditional_dependencies_are_resubscribed() {
        let flag = Observable::new(true);
        let a = Observable::new(1);
        let b = Observable::new(100);
        let p = property({
            let (flag, a, b) = (flag.clone(), a.clone(), b.clone());
            move || if flag.get() { a.get() } else { b.get() }
        });

        assert_eq!(p.get(), 1);
        assert_eq!(b.subscriber_count(), 0);

        flag.set(false);
        assert_eq!(p.get(), 100);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        a.set(2);
        assert!(p.is_valid());
        b.set(200);
        assert!(!p.is_valid());
    }

    #[test]
    fn failed_compute_stays_invalid_and_retries() {
        let input = Observable::new(String::from("4"));
        let calls = Rc::new(Cell::new(0));
        let parsed: DependencyProperty<i32, std::num::ParseIntError> =
            DependencyProperty::try_new(counting(&calls, {
                let input = input.clone();
                move || input.get().parse::<i32>()
            }));

        assert_eq!(parsed.try_get(), Ok(4));

        input.set(String::from("four"));
        assert!(parsed.try_get().is_err());
        assert!(!parsed.is_valid());
        // The previous subscription still reports changes.
        assert_eq!(input.subscriber_count(), 1);

        input.set(String::from("5"));
        assert_eq!(parsed.try_get(), Ok(5));
        assert!(parsed.is_valid());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn panicking_compute_leaves_tracker_balanced() {
        let tracker = DependencyTracker::new();
        let a = Observable::new_in(&tracker, 0);
        let p = DependencyProperty::new_in(&tracker, {
            let a = a.clone();
            move || {
                let v = a.get();
                assert!(v >= 0, "negative input");
                v
            }
        });
        assert_eq!(p.get(), 0);

        a.set(-1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| p.get()));
        assert!(result.is_err());
        assert_eq!(tracker.depth(), 0);
        assert!(!p.is_valid());

        a.set(7);
        assert_eq!(p.get(), 7);
    }

    #[test]
    fn set_without_setter_is_read_only() {
        let p = property(|| 1);
        assert_eq!(p.set(2), Err(BindingError::ReadOnly(p.id())));
        assert!(!p.is_writable());
    }

    #[test]
    fn setter_redirects_writes() {
        let celsius = Observable::new(0.0_f64);
        let fahrenheit = DependencyProperty::with_setter(
            {
                let celsius = celsius.clone();
                move || celsius.get() * 9.0 / 5.0 + 32.0
            },
            {
                let celsius = celsius.clone();
                move |f: f64| {
                    celsius.set((f - 32.0) * 5.0 / 9.0);
                }
            },
        );

        assert_eq!(fahrenheit.get(), 32.0);
        assert_eq!(fahrenheit.set(212.0), Ok(()));
        assert_eq!(celsius.get(), 100.0);
        assert_eq!(fahrenheit.get(), 212.0);
    }

    #[test]
    fn dispose_detaches_dependencies() {
        let a = Observable::new(1);
        let p = property({
            let a = a.clone();
            move || a.get()
        });
        p.get();
        assert_eq!(a.subscriber_count(), 1);

        p.dispose();
        p.dispose();
        assert!(p.is_disposed());
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(p.set(3), Err(BindingError::Disposed(p.id())));
    }

    #[test]
    fn dropping_last_handle_detaches_dependencies() {
        let a = Observable::new(1);
        {
            let p = property({
                let a = a.clone();
                move || a.get()
            });
            p.get();
            assert_eq!(a.subscriber_count(), 1);
        }
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn invalidation_cycle_terminates() {
        let first = property(|| 1);
        let second = property(|| 2);

        let _forward = first.subscribe({
            let second = second.clone();
            move || second.invalidate()
        });
        let _back = second.subscribe({
            let first = first.clone();
            move || first.invalidate()
        });

        first.invalidate();
        assert!(!first.is_valid());
        assert!(!second.is_valid());

        // Same cycle with both caches fresh
        assert_eq!(first.get() + second.get(), 3);
        first.invalidate();
        assert!(!first.is_valid());
        assert!(!second.is_valid());
    }

    #[test]
    fn recompute_then_change_during_dispatch_notifies_again() {
        let a = Observable::new(1);
        let p = property({
            let a = a.clone();
            move || a.get() * 10
        });
        assert_eq!(p.get(), 10);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let _record = p.subscribe({
            let (p, seen) = (p.clone(), seen.clone());
            move || seen.borrow_mut().push(p.get())
        });
        let _clamp = p.subscribe({
            let (p, a) = (p.clone(), a.clone());
            move || {
                if p.get() > 50 {
                    a.set(5);
                }
            }
        });

        a.set(9);

        assert_eq!(*seen.borrow(), vec![90, 50]);
        assert_eq!(p.get(), 50);
    }

    #[test]
    fn explicit_invalidate_forces_recompute() {
        let calls = Rc::new(Cell::new(0));
        let p = property(counting(&calls, || 5));
        p.get();
        p.invalidate();
        p.get();
        assert_eq!(calls.get(), 2);
    }
}
