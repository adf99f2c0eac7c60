// ============================================================================
// tether - Disposer
// Batch teardown for everything a control creates
// ============================================================================
//
// A control collects its subscriptions, bindings and properties into one
// Disposer and releases them all from its own teardown. Items are released
// in reverse registration order, later items first, since they may depend
// on earlier ones.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;

use tracing::debug;

// =============================================================================
// DISPOSE
// =============================================================================

/// Something that holds resources until explicitly released.
///
/// `dispose` must be idempotent: teardown paths routinely overlap, so a
/// second call is a no-op rather than an error.
pub trait Dispose {
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

impl<D: Dispose + ?Sized> Dispose for Box<D> {
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

/// Cleanup function type for `Disposer::add_fn`
pub type CleanupFn = Box<dyn FnOnce()>;

/// Adapts a one-shot closure to `Dispose`.
struct OnDispose {
    cleanup: RefCell<Option<CleanupFn>>,
}

impl Dispose for OnDispose {
    fn dispose(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    fn is_disposed(&self) -> bool {
        self.cleanup.borrow().is_none()
    }
}

// =============================================================================
// DISPOSER
// =============================================================================

/// Aggregates disposables so they can be released with one call.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tether::{Dispose, Disposer, Observable, bind_one_way};
///
/// let name = Observable::new(String::from("ada"));
/// let label = Observable::new(String::new());
/// let renders = Rc::new(Cell::new(0));
///
/// let teardown = Disposer::new();
/// teardown
///     .add(bind_one_way(&name, &label).unwrap())
///     .add(label.subscribe({
///         let renders = renders.clone();
///         move |_| renders.set(renders.get() + 1)
///     }));
///
/// name.set(String::from("grace"));
/// assert_eq!(renders.get(), 1);
///
/// teardown.dispose();
/// name.set(String::from("linus"));
/// assert_eq!(label.get(), "grace");
/// assert_eq!(renders.get(), 1);
/// ```
pub struct Disposer {
    items: RefCell<Vec<Box<dyn Dispose>>>,
    disposed: Cell<bool>,
}

impl Disposer {
    /// Create an empty disposer.
    pub fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        }
    }

    /// Take ownership of `item` until this disposer is disposed.
    ///
    /// Adding to an already disposed disposer releases the item immediately.
    pub fn add<D: Dispose + 'static>(&self, item: D) -> &Self {
        if self.disposed.get() {
            item.dispose();
        } else {
            self.items.borrow_mut().push(Box::new(item));
        }
        self
    }

    /// Run `cleanup` when this disposer is disposed.
    pub fn add_fn(&self, cleanup: impl FnOnce() + 'static) -> &Self {
        self.add(OnDispose {
            cleanup: RefCell::new(Some(Box::new(cleanup))),
        })
    }

    /// Number of held items.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Release the held items but stay usable for new ones.
    pub fn clear(&self) {
        let items = std::mem::take(&mut *self.items.borrow_mut());
        Self::release(items);
    }

    fn release(items: Vec<Box<dyn Dispose>>) {
        let count = items.len();
        for item in items.into_iter().rev() {
            item.dispose();
        }
        if count > 0 {
            debug!(count, "disposer released items");
        }
    }
}

impl Dispose for Disposer {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.clear();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("len", &self.len())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl FnOnce() + 'static {
        let log = log.clone();
        move || log.borrow_mut().push(name)
    }

    #[test]
    fn releases_in_reverse_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let disposer = Disposer::new();
        disposer
            .add_fn(recorder(&log, "first"))
            .add_fn(recorder(&log, "second"))
            .add_fn(recorder(&log, "third"));
        assert_eq!(disposer.len(), 3);

        disposer.dispose();
        assert_eq!(*log.borrow(), vec!["third", "second", "first"]);
        assert!(disposer.is_empty());
        assert!(disposer.is_disposed());
    }

    #[test]
    fn dispose_twice_is_a_no_op() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let disposer = Disposer::new();
        disposer.add_fn(recorder(&log, "only"));

        disposer.dispose();
        disposer.dispose();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn add_after_dispose_releases_immediately() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let disposer = Disposer::new();
        disposer.dispose();

        disposer.add_fn(recorder(&log, "late"));
        assert_eq!(*log.borrow(), vec!["late"]);
        assert!(disposer.is_empty());
    }

    #[test]
    fn clear_keeps_the_disposer_usable() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let disposer = Disposer::new();
        disposer.add_fn(recorder(&log, "a"));
        disposer.clear();
        assert!(!disposer.is_disposed());

        disposer.add_fn(recorder(&log, "b"));
        assert_eq!(disposer.len(), 1);
        drop(disposer);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn nested_disposers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let child = Disposer::new();
        child.add_fn(recorder(&log, "child"));

        let parent = Disposer::new();
        parent.add(child).add_fn(recorder(&log, "parent"));
        parent.dispose();

        assert_eq!(*log.borrow(), vec!["parent", "child"]);
    }
}
