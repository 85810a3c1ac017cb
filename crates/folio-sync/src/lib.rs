//! Folio Sync
//!
//! Ownership-aware content synchronization for a single-owner portfolio.
//!
//! # Architecture
//!
//! ```text
//! IdentityProvider ──> AuthSession ──(watch RoleState)──> ContentSyncEngine
//!                                                             │      ▲
//!                                              LocalReplica <─┘      │ pushes
//!                                                             RemoteContentStore
//! ```
//!
//! - [`ContentSyncEngine`]: owner-gated writes, optimistic local updates and
//!   push reconciliation
//! - [`Reconciler`]: decides which pushes reach subscribers
//! - [`EditSession`]: editor mode and unsaved-changes marker
//! - [`PortfolioSession`]: wires the above together with an explicit
//!   `init()`/`dispose()` lifecycle
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_sync::{PortfolioSession, SyncConfig};
//!
//! let config = SyncConfig::from_env()?;
//! let session = PortfolioSession::new(config, provider, store, cache)?;
//! session.init()?;
//!
//! let outcome = session.write("editable_hero_title", "Hello".into()).await;
//! ```

#![warn(unreachable_pub)]

pub mod config;
mod edit;
mod engine;
mod error;
pub mod logging;
mod reconcile;
mod replica;
mod session;

pub use config::SyncConfig;
pub use edit::{EditMode, EditSession, EditState};
pub use engine::{ContentListener, ContentSyncEngine, WriteOutcome};
pub use error::{ConfigError, SyncError};
pub use reconcile::{PushDecision, Reconciler};
pub use replica::{LocalReplica, MANIFEST_KEY, REVISION_KEY};
pub use session::PortfolioSession;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
