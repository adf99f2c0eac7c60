// ============================================================================
// tether - Collection Changes
// Index-addressed mutation records and the change sets that carry them
// ============================================================================

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::core::error::CollectionError;

use super::enumerator::ChangeEnumerator;

// =============================================================================
// COLLECTION CHANGE
// =============================================================================

/// Classification of a single change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Delete,
    Update,
}

/// One insert, delete or update at an index.
///
/// Exactly one of `is_insert`, `is_delete`, `is_update` holds. A record with
/// neither an old nor a new value cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChange<T> {
    index: usize,
    old_value: Option<T>,
    new_value: Option<T>,
}

impl<T> CollectionChange<T> {
    pub fn insert(index: usize, value: T) -> Self {
        Self {
            index,
            old_value: None,
            new_value: Some(value),
        }
    }

    pub fn delete(index: usize, old_value: T) -> Self {
        Self {
            index,
            old_value: Some(old_value),
            new_value: None,
        }
    }

    pub fn update(index: usize, old_value: T, new_value: T) -> Self {
        Self {
            index,
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn old_value(&self) -> Option<&T> {
        self.old_value.as_ref()
    }

    pub fn new_value(&self) -> Option<&T> {
        self.new_value.as_ref()
    }

    pub fn is_insert(&self) -> bool {
        self.old_value.is_none() && self.new_value.is_some()
    }

    pub fn is_delete(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_none()
    }

    pub fn is_update(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_some()
    }

    pub fn kind(&self) -> ChangeKind {
        match (&self.old_value, &self.new_value) {
            (None, _) => ChangeKind::Insert,
            (Some(_), None) => ChangeKind::Delete,
            (Some(_), Some(_)) => ChangeKind::Update,
        }
    }
}

impl<T: Clone> CollectionChange<T> {
    /// Replay this record onto `target`.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<(), CollectionError> {
        match (&self.old_value, &self.new_value) {
            (None, Some(value)) => {
                if self.index > target.len() {
                    return Err(CollectionError::IndexOutOfRange {
                        index: self.index,
                        len: target.len(),
                    });
                }
                target.insert(self.index, value.clone());
            }
            (Some(_), None) => {
                CollectionError::check(self.index, target.len())?;
                target.remove(self.index);
            }
            (Some(_), Some(value)) => {
                CollectionError::check(self.index, target.len())?;
                target[self.index] = value.clone();
            }
            (None, None) => unreachable!("change records always carry a value"),
        }
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Display for CollectionChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old_value, &self.new_value) {
            (None, Some(new)) => write!(f, "+[{}] {new:?}", self.index),
            (Some(old), None) => write!(f, "-[{}] {old:?}", self.index),
            (Some(old), Some(new)) => write!(f, "~[{}] {old:?} -> {new:?}", self.index),
            (None, None) => write!(f, "?[{}]", self.index),
        }
    }
}

// =============================================================================
// CHANGE SET
// =============================================================================

/// The records produced by one mutation batch, in application order.
///
/// Each record's index refers to the collection as left by the records before
/// it, so replaying them in order onto a copy of the old contents yields the
/// new contents. Cloning is cheap and shares the records.
pub struct ChangeSet<T> {
    changes: Rc<[CollectionChange<T>]>,
}

impl<T> Clone for ChangeSet<T> {
    fn clone(&self) -> Self {
        Self {
            changes: self.changes.clone(),
        }
    }
}

impl<T> ChangeSet<T> {
    pub fn new(changes: Vec<CollectionChange<T>>) -> Self {
        Self {
            changes: changes.into(),
        }
    }

    /// A fresh single-pass cursor over the records.
    pub fn enumerator(&self) -> ChangeEnumerator<T> {
        ChangeEnumerator::new(self.changes.clone())
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CollectionChange<T>> {
        self.changes.iter()
    }

    /// Count of records of the given kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }
}

impl<T: Clone> ChangeSet<T> {
    /// Replay every record onto `target`, stopping at the first bad index.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<(), CollectionError> {
        self.changes.iter().try_for_each(|c| c.apply_to(target))
    }
}

impl<T> Deref for ChangeSet<T> {
    type Target = [CollectionChange<T>];

    fn deref(&self) -> &Self::Target {
        &self.changes
    }
}

impl<'a, T> IntoIterator for &'a ChangeSet<T> {
    type Item = &'a CollectionChange<T>;
    type IntoIter = std::slice::Iter<'a, CollectionChange<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl<T> From<Vec<CollectionChange<T>>> for ChangeSet<T> {
    fn from(changes: Vec<CollectionChange<T>>) -> Self {
        Self::new(changes)
    }
}

impl<T: fmt::Debug> fmt::Debug for ChangeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.changes.iter()).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::enumerator::Enumerator;

    #[test]
    fn exactly_one_classification_holds() {
        let insert = CollectionChange::insert(0, 'x');
        let delete = CollectionChange::delete(1, 'a');
        let update = CollectionChange::update(2, 'a', 'b');

        assert!(insert.is_insert() && !insert.is_delete() && !insert.is_update());
        assert!(!delete.is_insert() && delete.is_delete() && !delete.is_update());
        assert!(!update.is_insert() && !update.is_delete() && update.is_update());

        assert_eq!(insert.kind(), ChangeKind::Insert);
        assert_eq!(delete.kind(), ChangeKind::Delete);
        assert_eq!(update.kind(), ChangeKind::Update);
        assert_eq!(update.old_value(), Some(&'a'));
        assert_eq!(update.new_value(), Some(&'b'));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(CollectionChange::insert(0, 1).to_string(), "+[0] 1");
        assert_eq!(CollectionChange::delete(3, 1).to_string(), "-[3] 1");
        assert_eq!(CollectionChange::update(2, 1, 5).to_string(), "~[2] 1 -> 5");
    }

    #[test]
    fn apply_replays_in_order() {
        let set = ChangeSet::new(vec![
            CollectionChange::insert(0, "z"),
            CollectionChange::update(1, "a", "A"),
            CollectionChange::delete(2, "b"),
        ]);
        let mut items = vec!["a", "b", "c"];
        set.apply_to(&mut items).unwrap();
        assert_eq!(items, vec!["z", "A", "c"]);
        assert_eq!(set.count(ChangeKind::Update), 1);
    }

    #[test]
    fn apply_rejects_bad_index() {
        let mut items = vec![1];
        let err = CollectionChange::delete(4, 0).apply_to(&mut items).unwrap_err();
        assert_eq!(err, CollectionError::IndexOutOfRange { index: 4, len: 1 });

        let err = CollectionChange::insert(3, 0).apply_to(&mut items).unwrap_err();
        assert_eq!(err, CollectionError::IndexOutOfRange { index: 3, len: 1 });

        CollectionChange::insert(1, 2).apply_to(&mut items).unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn enumerators_are_independent() {
        let set: ChangeSet<i32> = vec![CollectionChange::insert(0, 1)].into();
        let mut first = set.enumerator();
        assert!(first.move_next());
        assert!(!first.move_next());

        let mut second = set.enumerator();
        assert!(second.move_next());
        assert_eq!(second.current().map(CollectionChange::index), Some(0));
    }
}
