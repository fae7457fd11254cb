//! Org Tree
//!
//! Client-side state for a lazily-loaded department hierarchy:
//! - api: HTTP client wrapper and backing-store implementations
//! - store: tree node repository (fetch, open, search, add, move)
//! - notify: single-slot user notifications
//! - forest / helpers / tree: arena, filters and display helpers

pub mod api;
pub mod config;
pub mod error;
pub mod forest;
pub mod helpers;
pub mod models;
pub mod notify;
pub mod store;
pub mod tree;

pub use api::{ApiService, Endpoint, HttpBackend, MemoryBackend, NodeBackend};
pub use config::TreeConfig;
pub use error::{ApiError, ConfigError, TreeError, TreeResult};
pub use models::{NewNode, Node, NodeId, NodeView, Severity};
pub use notify::{Notifier, Snackbar};
pub use store::{FetchOutcome, TreeStore};
