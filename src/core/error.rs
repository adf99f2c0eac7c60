// ============================================================================
// tether - Errors
// ============================================================================

use thiserror::Error;

use super::types::ObservableId;

/// Configuration and write errors raised by properties and bindings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A two-way binding was requested with a converter that cannot convert back.
    #[error("two-way binding requires a converter with a reverse conversion")]
    IrreversibleConverter,

    /// The target has no way to accept writes (a dependency property without a setter).
    #[error("property {0} is read-only")]
    ReadOnly(ObservableId),

    /// The property was disposed and no longer accepts writes.
    #[error("property {0} has been disposed")]
    Disposed(ObservableId),
}

/// Index errors raised by observable collection mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

impl CollectionError {
    pub(crate) fn check(index: usize, len: usize) -> Result<(), Self> {
        if index < len {
            Ok(())
        } else {
            Err(Self::IndexOutOfRange { index, len })
        }
    }
}
