// ============================================================================
// tether - Core Module
// Identity, dependency tracking and errors shared by every primitive
// ============================================================================

pub mod error;
pub mod tracker;
pub mod types;

// Re-export commonly used items
pub use error::{BindingError, CollectionError};
pub use tracker::{DependencyTracker, untrack};
pub use types::{AnyObservable, EqualsFn, ObservableId, default_equals};
