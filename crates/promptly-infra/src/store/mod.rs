//! Document store implementations.

mod feed;
mod memory;

pub use feed::ChangeFeed;
pub use memory::InMemoryDocumentStore;
