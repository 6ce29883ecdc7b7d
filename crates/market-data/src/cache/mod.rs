//! Response cache.
//!
//! - [`CacheStore`]: TTL map with lazy eviction and an atomic JSON snapshot
//! - [`Category`] / [`CategoryTtls`]: key scheme and per-category expiry
//! - [`CacheJanitor`]: periodic sweep of expired entries
//! - [`Clock`]: time source, swappable in tests

mod category;
mod clock;
mod janitor;
mod store;

pub use category::{normalize_symbol, Category, CategoryTtls};
pub use clock::{Clock, ManualClock, SystemClock};
pub use janitor::{CacheJanitor, JanitorHandle, DEFAULT_JANITOR_INTERVAL};
pub use store::{CacheConfig, CacheFileStatus, CacheStatus, CacheStore};
