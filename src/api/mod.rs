//! Backend Access
//!
//! `NodeBackend` is the seam between the tree store and the backing store.
//! Implementations: REST over HTTP, and an in-process mock.

mod endpoints;
mod http;
mod memory;
mod service;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::models::{NewNode, Node, NodeQuery};

pub use endpoints::Endpoint;
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use service::{ApiService, RequestOptions};

/// Operations the tree store needs from the backing store
#[async_trait]
pub trait NodeBackend: Send + Sync {
    /// List nodes. The `parentId` filter is allowed to be substring-based,
    /// callers must filter for exact parents themselves.
    async fn list(&self, endpoint: Endpoint, query: &NodeQuery) -> ApiResult<Vec<Node>>;

    /// Persist a new node; the returned node carries the assigned id
    async fn create(&self, endpoint: Endpoint, node: &NewNode) -> ApiResult<Node>;

    /// Overwrite an existing node
    async fn update(&self, endpoint: Endpoint, node: &Node) -> ApiResult<Node>;
}
