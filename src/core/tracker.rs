// ============================================================================
// tether - Dependency Tracker
// The LIFO frame stack attributing reads to the innermost computation
// ============================================================================
//
// Each dependency property evaluation pushes a frame, the observables read
// while it runs land in that frame, and the frame is popped to hand the
// collected list back. Only the top frame ever receives reads, which is what
// lets nested properties compose.
//
// A tracker is an ordinary value. Each one owns its own frame stack, so tests
// and embedders can run isolated graphs side by side, and
// `DependencyTracker::current()` hands out the thread's default instance.
// Reads always land in the innermost frame open on the thread, whichever
// tracker owns it: an observable created on one tracker that is read by a
// property computing on another is still a dependency of that property.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{error, trace};

use super::types::{AnyObservable, ObservableId};

// =============================================================================
// FRAME
// =============================================================================

struct Frame {
    /// The computation collecting reads
    owner: ObservableId,

    /// Observables read so far, in first-read order, without repeats
    deps: Vec<Rc<dyn AnyObservable>>,

    /// Nesting depth of `untrack` calls made while this frame is on top
    untracked: Cell<u32>,
}

struct TrackerInner {
    frames: RefCell<Vec<Frame>>,
}

// =============================================================================
// DEPENDENCY TRACKER
// =============================================================================

/// Stack of evaluation frames shared by every observable attached to it.
///
/// Cloning yields another handle to the same stack.
#[derive(Clone)]
pub struct DependencyTracker {
    inner: Rc<TrackerInner>,
}

thread_local! {
    /// The tracker used by constructors that are not handed one explicitly
    static DEFAULT_TRACKER: DependencyTracker = DependencyTracker::new();

    /// Owner of every open frame on this thread, innermost last
    static OPEN_FRAMES: RefCell<Vec<Weak<TrackerInner>>> = const { RefCell::new(Vec::new()) };
}

impl DependencyTracker {
    /// Create an isolated tracker with an empty stack.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TrackerInner {
                frames: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The calling thread's default tracker.
    pub fn current() -> Self {
        DEFAULT_TRACKER.with(Clone::clone)
    }

    /// Start collecting reads for `owner`.
    ///
    /// The owner itself is first reported as a read to the enclosing frame,
    /// so a property evaluated inside another computation becomes one of its
    /// dependencies.
    pub fn begin(&self, owner: Rc<dyn AnyObservable>) {
        let id = owner.id();
        self.read(owner);

        let mut frames = self.inner.frames.borrow_mut();
        frames.push(Frame {
            owner: id,
            deps: Vec::new(),
            untracked: Cell::new(0),
        });
        OPEN_FRAMES.with(|open| open.borrow_mut().push(Rc::downgrade(&self.inner)));
        trace!(owner = %id, depth = frames.len(), "tracking frame opened");
    }

    /// Stop collecting reads for `owner` and return what it read.
    ///
    /// Calls must pair with `begin` in LIFO order. A mismatched `end` is a
    /// programming error: it trips a debug assertion, and in release builds
    /// the top frame is popped regardless.
    pub fn end(&self, owner: ObservableId) -> Vec<Rc<dyn AnyObservable>> {
        let popped = self.inner.frames.borrow_mut().pop();
        if popped.is_some() {
            OPEN_FRAMES.with(|open| {
                let mut open = open.borrow_mut();
                match open.iter().rposition(|t| std::ptr::eq(t.as_ptr(), Rc::as_ptr(&self.inner))) {
                    Some(pos) => {
                        if pos + 1 != open.len() {
                            error!(owner = %owner, "tracking frame closed under another tracker's frame");
                        }
                        open.remove(pos);
                    }
                    None => error!(owner = %owner, "tracking frame missing from the thread's open frames"),
                }
            });
        }
        match popped {
            Some(frame) => {
                if frame.owner != owner {
                    error!(expected = %owner, found = %frame.owner, "unbalanced tracking frame");
                    debug_assert!(false, "tracking frame for {owner} closed out of order");
                }
                trace!(owner = %owner, deps = frame.deps.len(), "tracking frame closed");
                frame.deps
            }
            None => {
                error!(owner = %owner, "tracking frame closed with an empty stack");
                debug_assert!(false, "tracking frame for {owner} closed with an empty stack");
                Vec::new()
            }
        }
    }

    /// Record a read of `observable` in the innermost open frame on this
    /// thread, if there is one. That frame may belong to another tracker.
    ///
    /// Repeated reads within one frame are kept once. A computation reading
    /// itself is not recorded.
    pub fn read(&self, observable: Rc<dyn AnyObservable>) {
        match Self::innermost() {
            Some(active) => active.record(observable),
            None => self.record(observable),
        }
    }

    /// The tracker owning the innermost open frame on this thread.
    fn innermost() -> Option<Self> {
        OPEN_FRAMES.with(|open| {
            open.borrow()
                .last()
                .and_then(Weak::upgrade)
                .map(|inner| Self { inner })
        })
    }

    fn record(&self, observable: Rc<dyn AnyObservable>) {
        let mut frames = self.inner.frames.borrow_mut();
        let Some(top) = frames.last_mut() else {
            return;
        };
        if top.untracked.get() > 0 {
            return;
        }

        let id = observable.id();
        if top.owner == id || top.deps.iter().any(|dep| dep.id() == id) {
            return;
        }
        top.deps.push(observable);
    }

    /// Run `f` without recording reads into the innermost open frame.
    ///
    /// Computations started inside `f` still track their own reads.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        struct UntrackGuard {
            tracker: DependencyTracker,
            depth: usize,
        }

        impl Drop for UntrackGuard {
            fn drop(&mut self) {
                let frames = self.tracker.inner.frames.borrow();
                if let Some(frame) = frames.get(self.depth.wrapping_sub(1)) {
                    frame.untracked.set(frame.untracked.get().saturating_sub(1));
                }
            }
        }

        let tracker = Self::innermost().unwrap_or_else(|| self.clone());
        let depth = {
            let frames = tracker.inner.frames.borrow();
            if let Some(top) = frames.last() {
                top.untracked.set(top.untracked.get() + 1);
            }
            frames.len()
        };

        let _guard = UntrackGuard { tracker, depth };
        f()
    }

    /// Open a frame that is closed on drop, so an unwinding compute function
    /// cannot leave the stack unbalanced.
    pub(crate) fn enter(&self, owner: Rc<dyn AnyObservable>) -> TrackingFrame<'_> {
        let id = owner.id();
        self.begin(owner);
        TrackingFrame {
            tracker: self,
            owner: id,
            open: true,
        }
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.inner.frames.borrow().len()
    }

    /// Whether this tracker's top frame is recording reads.
    pub fn is_tracking(&self) -> bool {
        self.inner
            .frames
            .borrow()
            .last()
            .is_some_and(|top| top.untracked.get() == 0)
    }

    /// Whether two handles share one stack.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DependencyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyTracker")
            .field("depth", &self.depth())
            .finish()
    }
}

// =============================================================================
// TRACKING FRAME GUARD
// =============================================================================

pub(crate) struct TrackingFrame<'a> {
    tracker: &'a DependencyTracker,
    owner: ObservableId,
    open: bool,
}

impl TrackingFrame<'_> {
    pub(crate) fn finish(mut self) -> Vec<Rc<dyn AnyObservable>> {
        self.open = false;
        self.tracker.end(self.owner)
    }
}

impl Drop for TrackingFrame<'_> {
    fn drop(&mut self) {
        if self.open {
            self.tracker.end(self.owner);
        }
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Run `f` without recording reads on the thread's default tracker.
///
/// # Example
///
/// ```
/// use tether::{Observable, property, untrack};
///
/// let a = Observable::new(1);
/// let b = Observable::new(10);
/// let sum = property({
///     let (a, b) = (a.clone(), b.clone());
///     move || a.get() + untrack(|| b.get())
/// });
///
/// assert_eq!(sum.get(), 11);
/// b.set(20);
/// assert!(sum.is_valid());
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    DependencyTracker::current().untrack(f)
}

// =============================================================================
// TESTS
// =============================================================================
