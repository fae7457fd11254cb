//! Helper Utilities
//!
//! Exact-parent filtering, id preprocessing and a small async debouncer.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::models::Node;

/// Keep only nodes whose `parent_id` is exactly `parent_id`.
///
/// The mock API matches `parentId` by substring, so asking for the children
/// of `"1"` also returns the children of `"12"`, `"21"` and so on.
pub fn filter_by_exact_parent_id(nodes: Vec<Node>, parent_id: Option<&str>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter(|node| node.parent_id.as_deref() == parent_id)
        .collect()
}

/// Cut ids with more than one `-` down to their first two sections
/// (`dept-1-3` -> `dept-1`); other ids are returned as-is.
pub fn preprocess_node_id(id: &str) -> String {
    let parts: Vec<&str> = id.split('-').collect();
    if parts.len() > 2 {
        format!("{}-{}", parts[0], parts[1])
    } else {
        id.to_string()
    }
}

/// Runs only the most recently scheduled action once `delay` has passed
/// without a newer call.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `action`, aborting whatever was scheduled before.
    /// Must be called from inside a tokio runtime.
    pub fn call<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending action, if any
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
