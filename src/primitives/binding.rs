// ============================================================================
// tether - Bindings
// Standing synchronization between two observables
// ============================================================================
//
// A binding subscribes to its source (and, when two-way, to its target) and
// copies values across through a converter. Every copy runs under a single
// `updating` flag shared by both directions: while a forward copy is in
// flight, the change notification it causes on the target is ignored instead
// of being copied back, and vice versa. That one flag is the whole of the
// feedback-loop protection.
//
// Propagation reads are untracked, so a binding fired from inside a
// dependency property's computation never becomes one of its dependencies.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::core::error::BindingError;
use crate::core::types::ReentrancyGuard;
use crate::primitives::converter::Converter;
use crate::primitives::observable::Observable;
use crate::primitives::property::DependencyProperty;
use crate::reactivity::disposer::Dispose;
use crate::reactivity::subscription::Subscription;

// =============================================================================
// BINDABLE
// =============================================================================

/// What a binding needs from each end.
pub trait Bindable<T>: Clone + 'static {
    /// Current value, read without recording a dependency.
    fn current(&self) -> T;

    /// Write a value.
    fn assign(&self, value: T) -> Result<(), BindingError>;

    /// Listen for changes.
    fn watch_changes(&self, listener: Rc<dyn Fn()>) -> Subscription;
}

impl<T: Clone + 'static> Bindable<T> for Observable<T> {
    fn current(&self) -> T {
        self.peek()
    }

    fn assign(&self, value: T) -> Result<(), BindingError> {
        self.set(value);
        Ok(())
    }

    fn watch_changes(&self, listener: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(move |_| listener())
    }
}

impl<T: Clone + 'static> Bindable<T> for DependencyProperty<T> {
    fn current(&self) -> T {
        self.tracker().untrack(|| self.get())
    }

    fn assign(&self, value: T) -> Result<(), BindingError> {
        self.set(value)
    }

    fn watch_changes(&self, listener: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(move || listener())
    }
}

// =============================================================================
// BINDING MODE
// =============================================================================

/// Direction of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingMode {
    /// Source changes flow to the target.
    #[default]
    OneWay,
    /// Changes on either side flow to the other.
    TwoWay,
}

// =============================================================================
// BINDING
// =============================================================================

struct BindingInner {
    mode: BindingMode,
    updating: Cell<bool>,
    propagations: Cell<u64>,
    subscriptions: RefCell<Vec<Subscription>>,
    disposed: Cell<bool>,
}

impl BindingInner {
    /// Run one propagation step unless another one is already in flight.
    fn propagate(&self, direction: &'static str, step: impl FnOnce() -> Result<(), BindingError>) {
        if self.disposed.get() {
            return;
        }
        let Some(_updating) = ReentrancyGuard::enter(&self.updating) else {
            trace!(direction, "binding feedback ignored");
            return;
        };

        self.propagations.set(self.propagations.get() + 1);
        if let Err(err) = step() {
            warn!(direction, error = %err, "binding propagation dropped");
        }
    }
}

/// A live synchronization between a source and a target.
///
/// The target is synchronized from the source as soon as the binding is
/// built. Dropping or disposing the binding disconnects both directions.
///
/// # Example
///
/// ```
/// use tether::{Binding, BindingMode, Converter, Observable};
///
/// let celsius = Observable::new(100.0_f64);
/// let fahrenheit = Observable::new(0.0_f64);
///
/// let binding = Binding::new(
///     &celsius,
///     &fahrenheit,
///     BindingMode::TwoWay,
///     Converter::two_way(|c: &f64| c * 9.0 / 5.0 + 32.0, |f: &f64| (f - 32.0) * 5.0 / 9.0),
/// )
/// .unwrap();
///
/// assert_eq!(fahrenheit.get(), 212.0);
/// fahrenheit.set(32.0);
/// assert_eq!(celsius.get(), 0.0);
/// # drop(binding);
/// ```
#[must_use = "dropping a Binding disconnects it"]
pub struct Binding {
    inner: Rc<BindingInner>,
}

impl Binding {
    /// Connect `source` to `target`.
    ///
    /// Fails with [`BindingError::IrreversibleConverter`] when `mode` is
    /// two-way and `converter` has no reverse conversion, and with the
    /// target's write error when the initial synchronization is refused.
    pub fn new<A, B, S, D>(
        source: &S,
        target: &D,
        mode: BindingMode,
        converter: Converter<A, B>,
    ) -> Result<Self, BindingError>
    where
        A: 'static,
        B: 'static,
        S: Bindable<A>,
        D: Bindable<B>,
    {
        if mode == BindingMode::TwoWay && !converter.is_reversible() {
            return Err(BindingError::IrreversibleConverter);
        }

        let inner = Rc::new(BindingInner {
            mode,
            updating: Cell::new(false),
            propagations: Cell::new(0),
            subscriptions: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        });

        // Initial synchronization: target takes the source's value.
        {
            let _updating = ReentrancyGuard::enter(&inner.updating);
            inner.propagations.set(1);
            target.assign(converter.convert_to(&source.current()))?;
        }

        let weak = Rc::downgrade(&inner);
        let forward = {
            let (weak, source, target, converter) =
                (weak.clone(), source.clone(), target.clone(), converter.clone());
            source_listener(weak, "forward", move || {
                target.assign(converter.convert_to(&source.current()))
            })
        };
        let mut subscriptions = vec![source.watch_changes(forward)];

        if mode == BindingMode::TwoWay {
            let backward = {
                let (weak, source, target) = (weak.clone(), source.clone(), target.clone());
                source_listener(weak, "backward", move || {
                    let value = converter
                        .convert_from(&target.current())
                        .ok_or(BindingError::IrreversibleConverter)?;
                    source.assign(value)
                })
            };
            subscriptions.push(target.watch_changes(backward));
        }

        *inner.subscriptions.borrow_mut() = subscriptions;
        debug!(?mode, "binding connected");

        Ok(Self { inner })
    }

    pub fn mode(&self) -> BindingMode {
        self.inner.mode
    }

    /// Number of propagations performed, counting the initial synchronization.
    pub fn propagation_count(&self) -> u64 {
        self.inner.propagations.get()
    }

    /// Whether a propagation is in flight right now.
    pub fn is_updating(&self) -> bool {
        self.inner.updating.get()
    }
}

fn source_listener(
    binding: Weak<BindingInner>,
    direction: &'static str,
    step: impl Fn() -> Result<(), BindingError> + 'static,
) -> Rc<dyn Fn()> {
    Rc::new(move || {
        if let Some(binding) = binding.upgrade() {
            binding.propagate(direction, &step);
        }
    })
}

impl Dispose for Binding {
    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        for sub in &subscriptions {
            sub.dispose();
        }
        debug!(mode = ?self.inner.mode, "binding disconnected");
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("mode", &self.inner.mode)
            .field("propagations", &self.inner.propagations.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

// =============================================================================
// CONVENIENCE CONSTRUCTORS
// =============================================================================

/// Bind `target` to follow `source` unchanged.
pub fn bind_one_way<T, S, D>(source: &S, target: &D) -> Result<Binding, BindingError>
where
    T: Clone + 'static,
    S: Bindable<T>,
    D: Bindable<T>,
{
    Binding::new(source, target, BindingMode::OneWay, Converter::identity())
}

/// Keep `a` and `b` equal, starting from `a`'s value.
pub fn bind_two_way<T, S, D>(a: &S, b: &D) -> Result<Binding, BindingError>
where
    T: Clone + 'static,
    S: Bindable<T>,
    D: Bindable<T>,
{
    Binding::new(a, b, BindingMode::TwoWay, Converter::identity())
}

// =============================================================================
// TESTS
// =============================================================================
