//! In-Memory Backend
//!
//! Behaves like the hosted mock API, including its substring matching on
//! `parentId`. Failures and latency can be queued per call, which makes it
//! the backend of choice for offline demos and store tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::endpoints::Endpoint;
use super::NodeBackend;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewNode, Node, NodeQuery};

#[derive(Default)]
struct MemoryState {
    nodes: Vec<Node>,
    next_id: u64,
    failures: VecDeque<ApiError>,
    delays: VecDeque<Duration>,
    queries: Vec<NodeQuery>,
    updates: Vec<Node>,
}

impl MemoryState {
    fn take_failure(&mut self) -> ApiResult<()> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Mock backing store shared by every endpoint
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records; numeric ids continue after the largest one
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        let next_id = nodes
            .iter()
            .filter_map(|n| n.id.as_deref()?.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        Self {
            state: Mutex::new(MemoryState {
                nodes,
                next_id,
                ..Default::default()
            }),
        }
    }

    pub async fn insert(&self, node: Node) {
        self.state.lock().await.nodes.push(node);
    }

    /// Make the next call (of any kind) fail with `error`
    pub async fn fail_next(&self, error: ApiError) {
        self.state.lock().await.failures.push_back(error);
    }

    /// Delay the response of the next `list` call
    pub async fn delay_next(&self, delay: Duration) {
        self.state.lock().await.delays.push_back(delay);
    }

    /// Every listing query received so far
    pub async fn queries(&self) -> Vec<NodeQuery> {
        self.state.lock().await.queries.clone()
    }

    /// Every node received through `update`
    pub async fn updates(&self) -> Vec<Node> {
        self.state.lock().await.updates.clone()
    }

    pub async fn nodes(&self) -> Vec<Node> {
        self.state.lock().await.nodes.clone()
    }
}

fn matches_query(node: &Node, query: &NodeQuery) -> bool {
    let parent_ok = match (&query.parent_id, &node.parent_id) {
        (None, None) => true,
        (None, Some(_)) => false,
        // substring match, same as the hosted mock
        (Some(wanted), Some(actual)) => actual.contains(wanted.as_str()),
        (Some(_), None) => false,
    };
    let label_ok = match &query.label {
        Some(label) if !label.is_empty() => node.label_matches(&label.to_lowercase()),
        _ => true,
    };
    parent_ok && label_ok
}

#[async_trait]
impl NodeBackend for MemoryBackend {
    async fn list(&self, _endpoint: Endpoint, query: &NodeQuery) -> ApiResult<Vec<Node>> {
        let (result, delay) = {
            let mut state = self.state.lock().await;
            state.queries.push(query.clone());
            state.take_failure()?;
            let delay = state.delays.pop_front();

            let mut found: Vec<Node> = state
                .nodes
                .iter()
                .filter(|n| matches_query(n, query))
                .cloned()
                .collect();
            // newest first, undated last
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            if let (Some(page), Some(limit)) = (query.page, query.limit) {
                let skip = page.saturating_sub(1) as usize * limit as usize;
                found = found.into_iter().skip(skip).take(limit as usize).collect();
            }
            (found, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(result)
    }

    async fn create(&self, _endpoint: Endpoint, node: &NewNode) -> ApiResult<Node> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let id = state.next_id.max(1);
        state.next_id = id + 1;

        let created = Node {
            id: Some(id.to_string()),
            parent_id: node.parent_id.clone(),
            label: node.label.clone(),
            created_at: Some(Utc::now()),
            description: node.description.clone(),
            number_of_employees: node.number_of_employees,
            is_open: false,
            visible: false,
        };
        state.nodes.push(created.clone());
        Ok(created)
    }

    async fn update(&self, _endpoint: Endpoint, node: &Node) -> ApiResult<Node> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.updates.push(node.clone());
        let id = node
            .id
            .as_deref()
            .ok_or_else(|| ApiError::InvalidRequest(format!("cannot update unsaved node {}", node.label)))?;
        match state.nodes.iter_mut().find(|n| n.id.as_deref() == Some(id)) {
            Some(stored) => {
                *stored = node.clone();
                Ok(node.clone())
            }
            None => Err(ApiError::status(404, "Not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn dated(id: &str, parent_id: Option<&str>, label: &str, day: i64) -> Node {
        let mut node = Node::with_id(id, parent_id, label);
        node.created_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::days(day));
        node
    }

    #[tokio::test]
    async fn test_parent_filter_is_substring_based() {
        let backend = MemoryBackend::with_nodes(vec![
            dated("a", Some("1"), "A", 1),
            dated("b", Some("12"), "B", 2),
            dated("c", Some("3"), "C", 3),
        ]);
        let found = backend
            .list(Endpoint::Departments, &NodeQuery::children_of("1"))
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().filter_map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_roots_are_paged_newest_first() {
        let backend = MemoryBackend::with_nodes(
            (1..=5).map(|i| dated(&i.to_string(), None, &format!("Dept {}", i), i)).collect(),
        );
        let page2 = backend
            .list(Endpoint::Departments, &NodeQuery::roots(2, 2, ""))
            .await
            .unwrap();
        let ids: Vec<_> = page2.iter().filter_map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec!["3".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let backend = MemoryBackend::with_nodes(vec![dated("7", None, "Seed", 0)]);
        let created = backend.create(Endpoint::Departments, &NewNode::root("New")).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("8"));
        assert!(created.created_at.is_some());
        assert_eq!(backend.nodes().await.len(), 2);
    }

    #[tokio::test]
    async fn test_queued_failure_is_consumed_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(ApiError::status(500, "boom")).await;

        let first = backend.list(Endpoint::Departments, &NodeQuery::roots(1, 10, "")).await;
        let second = backend.list(Endpoint::Departments, &NodeQuery::roots(1, 10, "")).await;

        assert_eq!(first.unwrap_err(), ApiError::status(500, "boom"));
        assert!(second.unwrap().is_empty());
        assert_eq!(backend.queries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_node_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .update(Endpoint::Departments, &Node::with_id("404", None, "Ghost"))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::status(404, "Not found"));
    }
}
