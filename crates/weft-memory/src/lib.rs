pub mod ephemeral;
pub mod store;

pub use ephemeral::{InMemoryStore, MemoryEvent};
pub use store::SqliteStore;
