//! Folio Store Adapters
//!
//! The two storage seams of the sync core:
//!
//! - [`LocalCache`]: string key-value store that survives reloads
//!   ([`MemoryCache`], [`FileCache`])
//! - [`RemoteContentStore`]: document store with read, merge-write and live
//!   subscription ([`MemoryContentStore`] for tests and replay)
//!
//! Every live registration is represented by a [`Subscription`] guard that
//! unregisters on drop, so teardown happens on every exit path.

#![warn(unreachable_pub)]

mod cache;
mod remote;
mod subscription;

pub use cache::{CacheError, FileCache, LocalCache, MemoryCache};
pub use remote::{
    DocumentListener, MemoryContentStore, RemoteContentStore, RemoteDocument, StoreError,
};
pub use subscription::{ListenerSet, Subscription};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
