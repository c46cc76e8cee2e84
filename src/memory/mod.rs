//! Memory module for Mnemo
//!
//! Provides the durable per-identity store, heuristic fact extraction,
//! candidate merging, and bounded context assembly.

mod context;
mod extract;
mod merge;
mod store;
mod types;

pub use context::ContextAssembler;
pub use extract::FactExtractor;
pub use merge::merge;
pub use store::MemoryStore;
pub use types::{Fact, MemoryRecord, TurnEntry, TurnRole};
