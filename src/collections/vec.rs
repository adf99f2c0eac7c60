// ============================================================================
// tether - ObservableVec
// A Vec that reports every mutation as a change set
// ============================================================================
//
// Each mutating call records the CollectionChange records describing its net
// effect and, unless a batch is open, emits them immediately as one ChangeSet.
// Inside `batch` the records accumulate and go out as a single ChangeSet when
// the outermost batch closes.
//
// Removals of several elements are recorded from the highest index down so
// that every record's index is still valid when the records are replayed in
// order.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use tracing::trace;

use crate::core::error::CollectionError;
use crate::core::tracker::DependencyTracker;
use crate::core::types::{AnyObservable, ObservableId};
use crate::reactivity::disposer::Dispose;
use crate::reactivity::subscription::{ListenerList, Subscription};

use super::change::{ChangeSet, CollectionChange};

// =============================================================================
// INNER
// =============================================================================

pub(crate) struct VecInner<T> {
    id: ObservableId,
    items: RefCell<Vec<T>>,
    listeners: ListenerList<ChangeSet<T>>,
    tracker: DependencyTracker,

    /// Open `batch` calls
    batch_depth: Cell<u32>,

    /// Records waiting for the outermost batch to close
    pending: RefCell<Vec<CollectionChange<T>>>,

    disposed: Cell<bool>,
}

impl<T: 'static> AnyObservable for VecInner<T> {
    fn id(&self) -> ObservableId {
        self.id
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Subscription {
        self.listeners.subscribe(
            "collection",
            Rc::new(move |_: &ChangeSet<T>| listener()),
            false,
        )
    }
}

impl<T: 'static> VecInner<T> {
    fn record(&self, changes: impl IntoIterator<Item = CollectionChange<T>>) {
        self.pending.borrow_mut().extend(changes);
        if self.batch_depth.get() == 0 {
            self.flush();
        }
    }

    fn flush(&self) {
        let changes = std::mem::take(&mut *self.pending.borrow_mut());
        if changes.is_empty() {
            return;
        }
        let set = ChangeSet::new(changes);
        trace!(id = %self.id, changes = set.len(), "collection changed");
        self.listeners.notify(&set);
    }
}

/// Closes a batch level even if the batch body panics.
struct BatchLevel<'a> {
    depth: &'a Cell<u32>,
}

impl Drop for BatchLevel<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

// =============================================================================
// OBSERVABLE VEC
// =============================================================================

/// A vector whose mutations are published as [`ChangeSet`]s.
///
/// Reads (`len`, `get`, `with`, `to_vec`) are recorded by the attached
/// tracker, so a dependency property that reads the vector is invalidated
/// whenever it changes. Cloning yields a second handle to the same vector.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use tether::{ChangeSet, ObservableVec};
///
/// let items = ObservableVec::from_vec(vec!["a", "b"]);
/// let mirror = Rc::new(RefCell::new(items.to_vec()));
///
/// let _sub = items.subscribe({
///     let mirror = mirror.clone();
///     move |changes: &ChangeSet<_>| changes.apply_to(&mut mirror.borrow_mut()).unwrap()
/// });
///
/// items.push("c");
/// items.remove(0).unwrap();
/// assert_eq!(*mirror.borrow(), items.to_vec());
/// ```
pub struct ObservableVec<T> {
    inner: Rc<VecInner<T>>,
}

impl<T> Clone for ObservableVec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> ObservableVec<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self::from_vec_in(&DependencyTracker::current(), items)
    }

    /// Create a vector attached to `tracker`.
    pub fn from_vec_in(tracker: &DependencyTracker, items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(VecInner {
                id: ObservableId::next(),
                items: RefCell::new(items),
                listeners: ListenerList::new(),
                tracker: tracker.clone(),
                batch_depth: Cell::new(0),
                pending: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn len(&self) -> usize {
        self.track();
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.track();
        self.inner.items.borrow().get(index).cloned()
    }

    /// Borrow the contents. `f` must not mutate this vector.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.track();
        f(&self.inner.items.borrow())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.track();
        self.inner.items.borrow().clone()
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    pub fn push(&self, value: T) {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            items.push(value.clone());
            items.len() - 1
        };
        self.inner.record([CollectionChange::insert(index, value)]);
    }

    pub fn pop(&self) -> Option<T> {
        let (index, value) = {
            let mut items = self.inner.items.borrow_mut();
            let value = items.pop()?;
            (items.len(), value)
        };
        self.inner
            .record([CollectionChange::delete(index, value.clone())]);
        Some(value)
    }

    pub fn insert(&self, index: usize, value: T) -> Result<(), CollectionError> {
        {
            let mut items = self.inner.items.borrow_mut();
            if index > items.len() {
                return Err(CollectionError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value.clone());
        }
        self.inner.record([CollectionChange::insert(index, value)]);
        Ok(())
    }

    pub fn remove(&self, index: usize) -> Result<T, CollectionError> {
        let value = {
            let mut items = self.inner.items.borrow_mut();
            CollectionError::check(index, items.len())?;
            items.remove(index)
        };
        self.inner
            .record([CollectionChange::delete(index, value.clone())]);
        Ok(value)
    }

    /// Overwrite the element at `index`, returning the old one. Always
    /// reported as an update, even when the values compare equal.
    pub fn replace(&self, index: usize, value: T) -> Result<T, CollectionError> {
        let old = {
            let mut items = self.inner.items.borrow_mut();
            CollectionError::check(index, items.len())?;
            std::mem::replace(&mut items[index], value.clone())
        };
        self.inner
            .record([CollectionChange::update(index, old.clone(), value)]);
        Ok(old)
    }

    /// Swap two elements. Swapping an index with itself changes nothing.
    pub fn swap(&self, a: usize, b: usize) -> Result<(), CollectionError> {
        let changes = {
            let mut items = self.inner.items.borrow_mut();
            CollectionError::check(a, items.len())?;
            CollectionError::check(b, items.len())?;
            if a == b {
                return Ok(());
            }
            items.swap(a, b);
            [
                CollectionChange::update(a, items[b].clone(), items[a].clone()),
                CollectionChange::update(b, items[a].clone(), items[b].clone()),
            ]
        };
        self.inner.record(changes);
        Ok(())
    }

    /// Replace `range` with `replacement`, returning the removed elements.
    pub fn splice(
        &self,
        range: Range<usize>,
        replacement: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, CollectionError> {
        // The replacement may read this vector, so drain it before borrowing.
        let inserted: Vec<T> = replacement.into_iter().collect();
        let (removed, inserted) = {
            let mut items = self.inner.items.borrow_mut();
            let len = items.len();
            if range.start > range.end || range.end > len {
                return Err(CollectionError::IndexOutOfRange {
                    index: range.end.max(range.start),
                    len,
                });
            }
            let removed: Vec<T> = items.splice(range.clone(), inserted.clone()).collect();
            (removed, inserted)
        };

        let deletes = removed
            .iter()
            .enumerate()
            .rev()
            .map(|(offset, old)| CollectionChange::delete(range.start + offset, old.clone()));
        let inserts = inserted
            .into_iter()
            .enumerate()
            .map(|(offset, new)| CollectionChange::insert(range.start + offset, new));
        self.inner.record(deletes.chain(inserts));
        Ok(removed)
    }

    /// Keep only the elements for which `keep` returns true.
    ///
    /// `keep` sees every element before anything is removed. It may read this
    /// vector but must not mutate it.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) {
        let verdicts: Vec<bool> = self.inner.items.borrow().iter().map(&mut keep).collect();

        let removed = {
            let mut items = self.inner.items.borrow_mut();
            let old = std::mem::take(&mut *items);
            let mut removed = Vec::new();
            for (position, (value, kept)) in old.into_iter().zip(verdicts).enumerate() {
                if kept {
                    items.push(value);
                } else {
                    removed.push(CollectionChange::delete(position, value));
                }
            }
            removed
        };
        self.inner.record(removed.into_iter().rev());
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.items.borrow_mut());
        self.inner.record(
            removed
                .into_iter()
                .enumerate()
                .rev()
                .map(|(index, old)| CollectionChange::delete(index, old)),
        );
    }

    pub fn extend(&self, values: impl IntoIterator<Item = T>) {
        let values: Vec<T> = values.into_iter().collect();
        let inserted = {
            let mut items = self.inner.items.borrow_mut();
            let start = items.len();
            items.extend(values.iter().cloned());
            values
                .into_iter()
                .enumerate()
                .map(|(offset, value)| CollectionChange::insert(start + offset, value))
                .collect::<Vec<_>>()
        };
        self.inner.record(inserted);
    }

    /// Run several mutations and publish them as one change set.
    ///
    /// Batches nest; only the outermost one emits.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let result = {
            self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
            let _level = BatchLevel {
                depth: &self.inner.batch_depth,
            };
            f(self)
        };
        if self.inner.batch_depth.get() == 0 {
            self.inner.flush();
        }
        result
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Call `listener` with each published change set.
    pub fn subscribe(&self, listener: impl Fn(&ChangeSet<T>) + 'static) -> Subscription {
        self.inner
            .listeners
            .subscribe("collection", Rc::new(listener), false)
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

    pub fn as_any_observable(&self) -> Rc<dyn AnyObservable> {
        self.inner.clone()
    }

    fn track(&self) {
        self.inner.tracker.read(self.as_any_observable());
    }
}

impl<T: Clone + 'static> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> From<Vec<T>> for ObservableVec<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T: Clone + 'static> FromIterator<T> for ObservableVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: Clone + 'static> Dispose for ObservableVec<T> {
    /// Detach every subscriber. The contents stay readable.
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

impl<T: fmt::Debug> fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableVec")
            .field("id", &self.inner.id)
            .field("items", &*self.inner.items.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
