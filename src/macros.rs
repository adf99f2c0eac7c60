// ============================================================================
// tether - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// Saves the `let a = a.clone();` boilerplate before handing observables to
/// a compute function or listener.
///
/// ```rust
/// use tether::{Observable, cloned, property};
///
/// let a = Observable::new(1);
/// let b = Observable::new(2);
///
/// let sum = property(cloned!(a, b => move || a.get() + b.get()));
/// assert_eq!(sum.get(), 3);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Create a dependency property, cloning the listed observables into it.
///
/// Wraps `property(cloned!(... => move || ...))`.
///
/// ```rust
/// use tether::{Observable, property};
///
/// let width = Observable::new(4);
/// let height = Observable::new(5);
///
/// let area = property!(width, height => width.get() * height.get());
/// assert_eq!(area.get(), 20);
///
/// height.set(6);
/// assert_eq!(area.get(), 24);
/// ```
#[macro_export]
macro_rules! property {
    ($($deps:ident),+ => $body:expr) => {
        $crate::property($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::property(move || $body)
    };
}
