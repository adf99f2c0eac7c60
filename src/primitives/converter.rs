// ============================================================================
// tether - Converters
// Value transforms applied by bindings
// ============================================================================

use std::fmt;
use std::rc::Rc;

type ForwardFn<A, B> = Rc<dyn Fn(&A) -> B>;
type ReverseFn<A, B> = Rc<dyn Fn(&B) -> A>;

/// Maps source values to target values, and optionally back.
///
/// A converter without a reverse conversion can only drive one-way bindings;
/// asking a two-way binding to use one is rejected when the binding is built.
///
/// # Example
///
/// ```
/// use tether::Converter;
///
/// let percent = Converter::two_way(
///     |ratio: &f64| format!("{:.0}%", ratio * 100.0),
///     |text: &String| text.trim_end_matches('%').parse::<f64>().unwrap_or(0.0) / 100.0,
/// );
///
/// assert_eq!(percent.convert_to(&0.25), "25%");
/// assert_eq!(percent.convert_from(&String::from("50%")), Some(0.5));
/// ```
pub struct Converter<A, B> {
    to: ForwardFn<A, B>,
    from: Option<ReverseFn<A, B>>,
}

impl<A, B> Clone for Converter<A, B> {
    fn clone(&self) -> Self {
        Self {
            to: self.to.clone(),
            from: self.from.clone(),
        }
    }
}

impl<A: 'static, B: 'static> Converter<A, B> {
    /// A one-way converter.
    pub fn new(to: impl Fn(&A) -> B + 'static) -> Self {
        Self {
            to: Rc::new(to),
            from: None,
        }
    }

    /// A converter usable in both directions.
    pub fn two_way(to: impl Fn(&A) -> B + 'static, from: impl Fn(&B) -> A + 'static) -> Self {
        Self {
            to: Rc::new(to),
            from: Some(Rc::new(from)),
        }
    }

    /// Add or replace the reverse conversion.
    pub fn with_reverse(mut self, from: impl Fn(&B) -> A + 'static) -> Self {
        self.from = Some(Rc::new(from));
        self
    }

    /// Source value to target value.
    pub fn convert_to(&self, value: &A) -> B {
        (self.to)(value)
    }

    /// Target value to source value, if this converter can go back.
    pub fn convert_from(&self, value: &B) -> Option<A> {
        self.from.as_ref().map(|from| from(value))
    }

    pub fn is_reversible(&self) -> bool {
        self.from.is_some()
    }
}

impl<A: Clone + 'static> Converter<A, A> {
    /// Pass values through unchanged in both directions.
    pub fn identity() -> Self {
        Self::two_way(A::clone, A::clone)
    }
}

impl<A: Clone + 'static> Default for Converter<A, A> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<A, B> fmt::Debug for Converter<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("reversible", &self.from.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let id: Converter<String, String> = Converter::identity();
        assert_eq!(id.convert_to(&"x".to_string()), "x");
        assert_eq!(id.convert_from(&"y".to_string()), Some("y".to_string()));
        assert!(id.is_reversible());
    }

    #[test]
    fn one_way_has_no_reverse() {
        let len = Converter::new(|s: &String| s.len());
        assert_eq!(len.convert_to(&"abc".to_string()), 3);
        assert_eq!(len.convert_from(&3), None);
        assert!(!len.is_reversible());
    }

    #[test]
    fn with_reverse_upgrades_a_one_way_converter() {
        let doubled = Converter::new(|v: &i32| v * 2).with_reverse(|v: &i32| v / 2);
        assert_eq!(doubled.convert_from(&8), Some(4));
        assert_eq!(format!("{doubled:?}"), "Converter { reversible: true }");
    }
}
