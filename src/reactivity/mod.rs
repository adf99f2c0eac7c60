// ============================================================================
// tether - Reactivity Module
// Listener plumbing, teardown and change suppression
// ============================================================================

pub mod disposer;
pub mod equality;
pub mod subscription;

pub use disposer::{Dispose, Disposer};
pub use subscription::Subscription;
