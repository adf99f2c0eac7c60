// ============================================================================
// tether - Observable Collections
// Change records, enumerators, and a vector that emits them
// ============================================================================
//
// A collection mutation is published as one ChangeSet: an immutable, shared
// list of CollectionChange records. Consumers either iterate it directly or
// walk it with an Enumerator. Since the set owns its records, a consumer can
// hold on to it while the collection keeps changing.
// ============================================================================

pub mod change;
pub mod enumerator;
pub mod vec;

pub use change::{ChangeKind, ChangeSet, CollectionChange};
pub use enumerator::{ChangeEnumerator, Enumerator, EnumeratorIter, EnumeratorState, SliceEnumerator};
pub use vec::ObservableVec;
