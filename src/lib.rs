pub mod config;
pub mod errors;
pub mod lookup;
pub mod observe;
pub mod refine;
pub mod store;
pub mod types;

// Re-export the lookup entry points and shared types
pub use config::CacheConfig;
pub use errors::{LookupError, UnavailableReason};
pub use lookup::{CacheLookup, LookupOutcome, LookupStatus};
pub use observe::{CacheEvent, CacheObserver, CountingObserver, LogObserver};
pub use store::{ConnectionProvider, PerCallConnection, SharedConnection};
pub use types::*;

use std::path::PathBuf;

/// Get the default cache path, relative to the working directory.
pub fn get_cache_path() -> PathBuf {
    PathBuf::from("data").join("cache.db")
}
