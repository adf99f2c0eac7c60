// ============================================================================
// tether - Enumerators
// Single-pass, pull-based cursors
// ============================================================================
//
// An enumerator moves through three states:
//
//   NotStarted --move_next--> Positioned --move_next--> ... --> Exhausted
//
// `current` is only defined while positioned. `peek` looks at the element the
// next `move_next` would land on and never moves. Exhausted is terminal; walk
// again by asking for a fresh enumerator.
// ============================================================================

use std::rc::Rc;

use super::change::CollectionChange;

/// Where an enumerator is in its walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumeratorState {
    #[default]
    NotStarted,
    Positioned,
    Exhausted,
}

/// A single-pass cursor over an ordered, finite sequence.
pub trait Enumerator {
    type Item;

    /// The element under the cursor, or `None` unless positioned.
    fn current(&self) -> Option<&Self::Item>;

    /// Advance. Returns false, and becomes exhausted, once nothing remains.
    fn move_next(&mut self) -> bool;

    /// The element the next `move_next` would land on.
    fn peek(&self) -> Option<&Self::Item>;

    fn state(&self) -> EnumeratorState;
}

// =============================================================================
// CURSOR
// =============================================================================

/// Position bookkeeping shared by the slice-backed enumerators.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    state: EnumeratorState,
    position: usize,
}

impl Cursor {
    fn advance(&mut self, len: usize) -> bool {
        let next = match self.state {
            EnumeratorState::Exhausted => return false,
            EnumeratorState::NotStarted => 0,
            EnumeratorState::Positioned => self.position + 1,
        };
        if next < len {
            self.state = EnumeratorState::Positioned;
            self.position = next;
            true
        } else {
            self.state = EnumeratorState::Exhausted;
            false
        }
    }

    fn current(&self) -> Option<usize> {
        (self.state == EnumeratorState::Positioned).then_some(self.position)
    }

    fn upcoming(&self) -> Option<usize> {
        match self.state {
            EnumeratorState::NotStarted => Some(0),
            EnumeratorState::Positioned => Some(self.position + 1),
            EnumeratorState::Exhausted => None,
        }
    }
}

// =============================================================================
// SLICE ENUMERATOR
// =============================================================================

/// Enumerator over a borrowed slice. Also usable as a plain iterator.
///
/// ```
/// use tether::{Enumerator, SliceEnumerator};
///
/// let mut e = SliceEnumerator::new(&[10, 20]);
/// assert_eq!(e.peek(), Some(&10));
/// assert!(e.move_next());
/// assert_eq!(e.current(), Some(&10));
/// assert_eq!(e.peek(), Some(&20));
/// ```
#[derive(Debug, Clone)]
pub struct SliceEnumerator<'a, T> {
    items: &'a [T],
    cursor: Cursor,
}

impl<'a, T> SliceEnumerator<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self {
            items,
            cursor: Cursor::default(),
        }
    }
}

impl<T> Enumerator for SliceEnumerator<'_, T> {
    type Item = T;

    fn current(&self) -> Option<&T> {
        self.cursor.current().and_then(|i| self.items.get(i))
    }

    fn move_next(&mut self) -> bool {
        self.cursor.advance(self.items.len())
    }

    fn peek(&self) -> Option<&T> {
        self.cursor.upcoming().and_then(|i| self.items.get(i))
    }

    fn state(&self) -> EnumeratorState {
        self.cursor.state
    }
}

impl<'a, T> Iterator for SliceEnumerator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.cursor.advance(self.items.len()) {
            self.items.get(self.cursor.position)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .cursor
            .upcoming()
            .map_or(0, |i| self.items.len().saturating_sub(i));
        (remaining, Some(remaining))
    }
}

// =============================================================================
// CHANGE ENUMERATOR
// =============================================================================

/// Enumerator over the records of one change set.
///
/// Holds its own reference to the records, so it stays valid after the
/// collection that produced them has moved on.
#[derive(Debug)]
pub struct ChangeEnumerator<T> {
    changes: Rc<[CollectionChange<T>]>,
    cursor: Cursor,
}

impl<T> ChangeEnumerator<T> {
    pub(crate) fn new(changes: Rc<[CollectionChange<T>]>) -> Self {
        Self {
            changes,
            cursor: Cursor::default(),
        }
    }

    /// Records not yet visited, including the one under the cursor.
    pub fn remaining(&self) -> usize {
        match self.cursor.state {
            EnumeratorState::NotStarted => self.changes.len(),
            EnumeratorState::Positioned => self.changes.len() - self.cursor.position,
            EnumeratorState::Exhausted => 0,
        }
    }
}

impl<T> Enumerator for ChangeEnumerator<T> {
    type Item = CollectionChange<T>;

    fn current(&self) -> Option<&CollectionChange<T>> {
        self.cursor.current().and_then(|i| self.changes.get(i))
    }

    fn move_next(&mut self) -> bool {
        self.cursor.advance(self.changes.len())
    }

    fn peek(&self) -> Option<&CollectionChange<T>> {
        self.cursor.upcoming().and_then(|i| self.changes.get(i))
    }

    fn state(&self) -> EnumeratorState {
        self.cursor.state
    }
}

impl<T: Clone> IntoIterator for ChangeEnumerator<T> {
    type Item = CollectionChange<T>;
    type IntoIter = EnumeratorIter<Self>;

    fn into_iter(self) -> Self::IntoIter {
        EnumeratorIter { inner: self }
    }
}

/// Iterator adapter that drains an enumerator, cloning each element.
#[derive(Debug)]
pub struct EnumeratorIter<E> {
    inner: E,
}

impl<E> Iterator for EnumeratorIter<E>
where
    E: Enumerator,
    E::Item: Clone,
{
    type Item = E::Item;

    fn next(&mut self) -> Option<E::Item> {
        if self.inner.move_next() {
            self.inner.current().cloned()
        } else {
            None
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_enumerator_exhausts_immediately() {
        let mut e = SliceEnumerator::<u8>::new(&[]);
        assert_eq!(e.state(), EnumeratorState::NotStarted);
        assert_eq!(e.peek(), None);
        assert!(!e.move_next());
        assert_eq!(e.current(), None);
        assert_eq!(e.state(), EnumeratorState::Exhausted);
        assert!(!e.move_next());
    }

    #[test]
    fn current_undefined_before_first_move() {
        let mut e = SliceEnumerator::new(&["a", "b"]);
        assert_eq!(e.current(), None);
        assert!(e.move_next());
        assert_eq!(e.current(), Some(&"a"));
        assert_eq!(e.state(), EnumeratorState::Positioned);
    }

    #[test]
    fn peek_never_advances() {
        let mut e = SliceEnumerator::new(&[1, 2, 3]);
        assert_eq!(e.peek(), Some(&1));
        assert_eq!(e.peek(), Some(&1));
        e.move_next();
        e.move_next();
        assert_eq!(e.current(), Some(&2));
        assert_eq!(e.peek(), Some(&3));
        assert_eq!(e.current(), Some(&2));
        e.move_next();
        assert_eq!(e.peek(), None);
        assert!(!e.move_next());
        assert_eq!(e.current(), None);
    }

    #[test]
    fn exhausted_is_terminal() {
        let mut e = SliceEnumerator::new(&[1]);
        assert!(e.move_next());
        assert!(!e.move_next());
        assert!(!e.move_next());
        assert_eq!(e.peek(), None);
    }

    #[test]
    fn slice_enumerator_iterates() {
        let e = SliceEnumerator::new(&[1, 2, 3]);
        assert_eq!(e.size_hint(), (3, Some(3)));
        assert_eq!(e.copied().sum::<i32>(), 6);
    }

    #[test]
    fn change_enumerator_walks_records() {
        let records: Rc<[CollectionChange<char>]> = vec![
            CollectionChange::insert(0, 'x'),
            CollectionChange::delete(1, 'a'),
        ]
        .into();
        let mut e = ChangeEnumerator::new(records.clone());
        assert_eq!(e.remaining(), 2);
        assert!(e.move_next());
        assert!(e.current().is_some_and(CollectionChange::is_insert));
        assert_eq!(e.remaining(), 2);
        assert!(e.move_next());
        assert_eq!(e.remaining(), 1);
        assert!(!e.move_next());
        assert_eq!(e.remaining(), 0);

        let collected: Vec<_> = ChangeEnumerator::new(records).into_iter().collect();
        assert_eq!(collected.len(), 2);
        assert!(collected[1].is_delete());
    }
}
