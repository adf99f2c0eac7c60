// ============================================================================
// tether - Type Definitions
// Identity and type-erased handles for the dependency graph
// ============================================================================

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::reactivity::subscription::Subscription;

// =============================================================================
// OBSERVABLE IDENTITY
// =============================================================================

/// Identity of an observable, property or collection, unique on its thread.
///
/// Used by the tracker to deduplicate reads and by properties to avoid
/// subscribing to themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        thread_local! {
            static NEXT: Cell<u64> = const { Cell::new(1) };
        }
        NEXT.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Self(id)
        })
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// TYPE-ERASED OBSERVABLE
// =============================================================================
//
// The tracker and dependency properties only need two things from a
// dependency: who it is, and a way to hear that it changed. Neither needs
// the value type, so dependencies are stored as Rc<dyn AnyObservable>.
// =============================================================================

/// Type-erased view of anything that can be read inside a computation.
///
/// Implemented by the inner state of `Observable<T>`, `DependencyProperty<T, E>`
/// and `ObservableVec<T>`.
pub trait AnyObservable {
    /// Identity used for deduplication.
    fn id(&self) -> ObservableId;

    /// Optional diagnostic label.
    fn label(&self) -> Option<&'static str> {
        None
    }

    /// Register a value-agnostic change listener.
    fn watch(&self, listener: Rc<dyn Fn()>) -> Subscription;
}

impl fmt::Debug for dyn AnyObservable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyObservable")
            .field("id", &self.id())
            .field("label", &self.label())
            .finish()
    }
}

// =============================================================================
// EQUALITY
// =============================================================================

/// Equality function type for suppressing no-op writes
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using PartialEq
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

// =============================================================================
// REENTRANCY GUARD
// =============================================================================

/// Holds a boolean flag raised for the guard's lifetime.
///
/// `enter` refuses when the flag is already raised, which is how bindings and
/// properties ignore notifications that loop back into themselves. The flag is
/// lowered on drop, including during unwinding.
pub(crate) struct ReentrancyGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> ReentrancyGuard<'a> {
    pub(crate) fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ordered() {
        let a = ObservableId::next();
        let b = ObservableId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
        assert_eq!(a.to_string(), format!("#{}", a.get()));
    }

    #[test]
    fn reentrancy_guard_refuses_nested_entry() {
        let flag = Cell::new(false);
        {
            let outer = ReentrancyGuard::enter(&flag);
            assert!(outer.is_some());
            assert!(flag.get());
            assert!(ReentrancyGuard::enter(&flag).is_none());
        }
        assert!(!flag.get());
        assert!(ReentrancyGuard::enter(&flag).is_some());
    }

    #[test]
    fn default_equals_uses_partial_eq() {
        assert!(default_equals(&1, &1));
        assert!(!default_equals(&"a", &"b"));
    }
}
