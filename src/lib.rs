// ============================================================================
// tether - Reactive values and bindings for widget toolkits
// ============================================================================
//
// Observable values notify synchronously on write. Dependency properties
// compute lazily from whatever observables they read, discovered through a
// dependency tracker. Bindings keep pairs of observables in sync, and
// observable collections publish their mutations as change sets. Everything
// runs on one thread and to completion; there is no scheduler.
// ============================================================================

#[macro_use]
mod macros;

pub mod collections;
pub mod core;
pub mod primitives;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access
pub use core::error::{BindingError, CollectionError};
pub use core::tracker::{DependencyTracker, untrack};
pub use core::types::{AnyObservable, EqualsFn, ObservableId, default_equals};

// Re-export primitives at crate root
pub use primitives::binding::{Bindable, Binding, BindingMode, bind_one_way, bind_two_way};
pub use primitives::converter::Converter;
pub use primitives::observable::{Observable, ObservableOptions};
pub use primitives::property::{DependencyProperty, property};

// Re-export reactivity plumbing
pub use reactivity::disposer::{CleanupFn, Dispose, Disposer};
pub use reactivity::equality::{equals, never_equals, safe_equals_f32, safe_equals_f64};
pub use reactivity::subscription::Subscription;

// Re-export collections
pub use collections::{
    ChangeEnumerator, ChangeKind, ChangeSet, CollectionChange, Enumerator, EnumeratorState,
    ObservableVec, SliceEnumerator,
};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn heterogeneous_dependencies() {
        let count = Observable::new(2);
        let label = Observable::new(String::from("items"));
        let list = ObservableVec::from_vec(vec![1.5, 2.5]);

        let summary = property(cloned!(count, label, list => move || {
            format!("{} {} ({})", count.get(), label.get(), list.with(|l| l.iter().sum::<f64>()))
        }));

        assert_eq!(summary.get(), "2 items (4)");
        assert_eq!(summary.dependency_count(), 3);

        list.push(1.0);
        assert_eq!(summary.get(), "2 items (5)");
    }

    #[test]
    fn isolated_trackers_do_not_interfere() {
        let isolated = DependencyTracker::new();
        let a = Observable::new_in(&isolated, 1);
        let doubled = DependencyProperty::new_in(&isolated, cloned!(a => move || a.get() * 2));

        assert_eq!(doubled.get(), 2);
        assert!(!DependencyTracker::current().is_tracking());
        assert_eq!(isolated.depth(), 0);

        a.set(4);
        assert_eq!(doubled.get(), 8);
    }

    #[test]
    fn property_on_isolated_tracker_sees_default_tracker_inputs() {
        let isolated = DependencyTracker::new();
        let a = Observable::new(1);
        let doubled = DependencyProperty::new_in(&isolated, cloned!(a => move || a.get() * 2));

        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.dependency_count(), 1);

        a.set(5);
        assert!(!doubled.is_valid());
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn control_teardown_idiom() {
        let text = Observable::new(String::from("hello"));
        let shown = Observable::new(String::new());
        let renders = Rc::new(Cell::new(0));

        let disposer = Disposer::new();
        disposer
            .add(bind_one_way(&text, &shown).unwrap())
            .add(shown.subscribe(cloned!(renders => move |_: &String| {
                renders.set(renders.get() + 1)
            })));

        text.set(String::from("world"));
        assert_eq!(shown.get(), "world");
        assert_eq!(renders.get(), 1);

        disposer.dispose();
        text.set(String::from("ignored"));
        assert_eq!(shown.get(), "world");
        assert_eq!(renders.get(), 1);
        assert_eq!(text.subscriber_count(), 0);
        assert_eq!(shown.subscriber_count(), 0);
    }
}
