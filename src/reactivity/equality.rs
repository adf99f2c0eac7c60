// ============================================================================
// tether - Equality Functions
// Decide whether a write is a change worth notifying about
// ============================================================================

// =============================================================================
// STRICT EQUALITY (Default)
// =============================================================================

/// Default strict equality using PartialEq.
///
/// # Example
/// ```
/// use tether::reactivity::equality::equals;
///
/// assert!(equals(&42, &42));
/// assert!(!equals(&42, &43));
/// ```
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Never equal: every write notifies, even with an identical value.
///
/// Use for values mutated behind interior pointers or types whose
/// `PartialEq` is not meaningful.
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

// =============================================================================
// SAFE EQUALITY (NaN-aware)
// =============================================================================

/// Equality for f64 that treats NaN as equal to NaN, so animating a value
/// through NaN does not notify on every frame.
///
/// # Example
/// ```
/// use tether::reactivity::equality::safe_equals_f64;
///
/// assert!(safe_equals_f64(&1.0, &1.0));
/// assert!(!safe_equals_f64(&1.0, &2.0));
/// assert!(safe_equals_f64(&f64::NAN, &f64::NAN));
/// ```
pub fn safe_equals_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// Equality for f32 that treats NaN as equal to NaN.
pub fn safe_equals_f32(a: &f32, b: &f32) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}
