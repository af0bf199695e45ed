pub mod controller;
pub mod id_allocator;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::CollectionController;
pub use id_allocator::SessionIdAllocator;
pub use state::{CollectionState, CollectionStats, CollectionStatus, SaveCompletion, SaveOutcome};
