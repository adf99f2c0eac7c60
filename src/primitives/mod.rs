// ============================================================================
// tether - Primitives Module
// Observable values, dependency properties, converters and bindings
// ============================================================================

pub mod binding;
pub mod converter;
pub mod observable;
pub mod property;

// Re-export for convenience
pub use binding::{Bindable, Binding, BindingMode, bind_one_way, bind_two_way};
pub use converter::Converter;
pub use observable::{Observable, ObservableOptions};
pub use property::{DependencyProperty, property};
