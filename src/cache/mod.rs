//! Time-bounded caching of fetched collections.
//!
//! [`TtlCache`] stores timestamped JSON blobs on top of any synchronous
//! [`KeyValueStore`]. Entries older than the namespace TTL read as misses;
//! there is no background eviction and no size bound.

pub mod store;
pub mod ttl;

pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use ttl::{CacheEntry, TtlCache};
