//! Asset Store Implementations
//!
//! - [`MemoryStore`] - process-local maps behind one read/write lock
//! - [`SqlStore`] - normalized SQLite schema with transactional writes
//! - [`CachedStore`] - cache-aside decorator for favourites over either of the above

pub mod cached;
pub mod memory;
pub mod sql;

pub use cached::{CachedStore, CachedStoreStats, FAVOURITES_TTL, favourites_cache_key};
pub use memory::MemoryStore;
pub use sql::SqlStore;
