//! Tree Store
//!
//! Owns the loaded department forest plus the pagination and search state,
//! and keeps it in sync with the backing store. Every failure is shown to
//! the user through the injected `Notifier` and also returned to the caller.
//!
//! Network calls are the only suspension points; each mutation that follows
//! a response runs under the state lock in one go. Responses are tagged with
//! a per-query generation so a slow, outdated response never overwrites a
//! newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};

use crate::api::{Endpoint, NodeBackend};
use crate::config::TreeConfig;
use crate::error::{TreeError, TreeResult};
use crate::forest::Forest;
use crate::helpers::{filter_by_exact_parent_id, Debouncer};
use crate::models::{NewNode, Node, NodeId, NodeQuery, NodeView, Severity};
use crate::notify::Notifier;

/// Text written into the caller's slot when an opened node has no children
pub const NO_CHILDREN_TEXT: &str = "No children";

/// Result of a fetch that made it back from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Response was applied; carries the number of nodes it placed
    Applied(usize),
    /// Response was dropped: a newer request for the same data exists,
    /// the target node is no longer loaded, or there was nothing to fetch
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RequestKey {
    Roots,
    Children(NodeId),
}

/// In-flight request counter; loading while non-zero
#[derive(Debug, Default, Clone)]
pub struct LoadingFlag(Arc<AtomicUsize>);

impl LoadingFlag {
    pub fn is_loading(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }

    fn begin(&self) -> LoadingTicket {
        self.0.fetch_add(1, Ordering::SeqCst);
        LoadingTicket(self.0.clone())
    }
}

struct LoadingTicket(Arc<AtomicUsize>);

impl Drop for LoadingTicket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct TreeState {
    forest: Forest,
    /// 0 until the first page arrives
    current_page: u32,
    search_label: String,
    /// Whether the last root page was full
    has_more: bool,
    /// In-flight `open_node` calls per node
    loading_nodes: HashMap<NodeId, usize>,
    /// Latest generation handed out per query key
    generations: HashMap<RequestKey, u64>,
    /// Source of generations, shared by every key so a dropped key never
    /// hands out a number an in-flight request already holds
    next_generation: u64,
    revision: u64,
}

impl Default for TreeState {
    fn default() -> Self {
        Self {
            forest: Forest::new(),
            current_page: 0,
            search_label: String::new(),
            has_more: true,
            loading_nodes: HashMap::new(),
            generations: HashMap::new(),
            next_generation: 0,
            revision: 0,
        }
    }
}

impl TreeState {
    fn is_current(&self, key: &RequestKey, generation: u64) -> bool {
        self.generations.get(key).copied() == Some(generation)
    }

    fn bump_generation(&mut self, key: RequestKey) -> u64 {
        self.next_generation += 1;
        self.generations.insert(key, self.next_generation);
        self.next_generation
    }

    /// Forget children requests of nodes that are no longer loaded
    fn drop_pruned_generations(&mut self) {
        let forest = &self.forest;
        self.generations.retain(|key, _| match key {
            RequestKey::Roots => true,
            RequestKey::Children(id) => forest.contains(id),
        });
    }
}

pub struct TreeStore {
    backend: Arc<dyn NodeBackend>,
    notifier: Arc<dyn Notifier>,
    endpoint: Endpoint,
    page_size: u32,
    total_items: u32,
    persist_moves: bool,
    loading: LoadingFlag,
    state: Mutex<TreeState>,
    revision_tx: watch::Sender<u64>,
}

impl TreeStore {
    pub fn new(backend: Arc<dyn NodeBackend>, notifier: Arc<dyn Notifier>, config: &TreeConfig) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            backend,
            notifier,
            endpoint: config.endpoint,
            page_size: config.page_size.max(1),
            total_items: config.total_items,
            persist_moves: config.persist_moves,
            loading: LoadingFlag::default(),
            state: Mutex::new(TreeState::default()),
            revision_tx,
        }
    }

    // ========================
    // Internals
    // ========================

    async fn begin_request(&self, key: RequestKey) -> u64 {
        self.state.lock().await.bump_generation(key)
    }

    /// Page 1 starts a new root generation; later pages join the current one
    /// and lose to any page 1 started after them.
    async fn begin_roots_request(&self, page: u32) -> u64 {
        let mut state = self.state.lock().await;
        match state.generations.get(&RequestKey::Roots).copied() {
            Some(current) if page > 1 => current,
            _ => state.bump_generation(RequestKey::Roots),
        }
    }

    /// Publish a state change to subscribers
    fn commit(&self, state: &mut TreeState) {
        state.drop_pruned_generations();
        state.revision += 1;
        self.revision_tx.send_replace(state.revision);
    }

    /// Show the error to the user and hand it back
    fn fail(&self, err: TreeError) -> TreeError {
        warn!("[STORE] {}", err);
        self.notifier.show(&err.to_string(), Severity::Error);
        err
    }

    // ========================
    // Fetching
    // ========================

    /// Fetch one page of root departments.
    ///
    /// Page 1 replaces the root level, later pages append to it. A later page
    /// is only appended while the loaded roots were fetched with the same label.
    pub async fn fetch_roots(&self, page: u32, label: &str, endpoint: Endpoint) -> TreeResult<FetchOutcome> {
        let page = page.max(1);
        let generation = self.begin_roots_request(page).await;

        let result = {
            let _ticket = self.loading.begin();
            self.backend
                .list(endpoint, &NodeQuery::roots(page, self.page_size, label))
                .await
        };
        let nodes = result.map_err(|e| self.fail(e.into()))?;

        let mut state = self.state.lock().await;
        if !state.is_current(&RequestKey::Roots, generation) {
            debug!("[STORE] Discarding stale root page {}", page);
            return Ok(FetchOutcome::Discarded);
        }
        if page > 1 && state.current_page > 0 && state.search_label != label {
            debug!(
                "[STORE] Discarding page {} for {:?}, roots now show {:?}",
                page, label, state.search_label
            );
            return Ok(FetchOutcome::Discarded);
        }

        let fetched = nodes.len();
        let nodes = filter_by_exact_parent_id(nodes, None);
        let placed = if page == 1 {
            state.forest.replace_roots(nodes);
            state.forest.roots().len()
        } else {
            state.forest.append_roots(nodes)
        };
        state.current_page = page;
        state.search_label = label.to_string();
        state.has_more = fetched >= self.page_size as usize;
        self.commit(&mut state);

        info!("[STORE] Page {} placed {} roots (label={:?})", page, placed, label);
        Ok(FetchOutcome::Applied(placed))
    }

    /// Fetch the direct children of a loaded node and replace its children list
    pub async fn fetch_children(&self, parent_id: &str) -> TreeResult<FetchOutcome> {
        let key = RequestKey::Children(parent_id.to_string());
        let generation = self.begin_request(key.clone()).await;

        let result = {
            let _ticket = self.loading.begin();
            self.backend
                .list(self.endpoint, &NodeQuery::children_of(parent_id))
                .await
        };
        let nodes = result.map_err(|e| self.fail(e.into()))?;
        let children = filter_by_exact_parent_id(nodes, Some(parent_id));

        let mut state = self.state.lock().await;
        if !state.is_current(&key, generation) {
            debug!("[STORE] Discarding stale children of {}", parent_id);
            return Ok(FetchOutcome::Discarded);
        }

        let count = children.len();
        if !state.forest.replace_children(parent_id, children) {
            debug!("[STORE] Parent {} is not loaded, dropping {} children", parent_id, count);
            return Ok(FetchOutcome::Discarded);
        }
        self.commit(&mut state);

        debug!("[STORE] Loaded {} children under {}", count, parent_id);
        Ok(FetchOutcome::Applied(count))
    }

    /// Fetch the next root page for infinite scrolling
    pub async fn load_next_page(&self) -> TreeResult<FetchOutcome> {
        let (page, label, has_more) = {
            let state = self.state.lock().await;
            (state.current_page + 1, state.search_label.clone(), state.has_more)
        };
        if !has_more {
            return Ok(FetchOutcome::Discarded);
        }
        self.fetch_roots(page, &label, self.endpoint).await
    }

    /// Server-side search from page 1, then open the matching branches
    pub async fn search(&self, label: &str) -> TreeResult<FetchOutcome> {
        let outcome = self.fetch_roots(1, label, self.endpoint).await?;
        self.filter_by_search(label).await;
        Ok(outcome)
    }

    /// Search once typing settles; a newer call replaces a pending one
    pub fn search_debounced(self: &Arc<Self>, debouncer: &Debouncer, label: impl Into<String>) {
        let store = self.clone();
        let label = label.into();
        debouncer.call(async move {
            // failures are already shown to the user
            let _ = store.search(&label).await;
        });
    }

    // ========================
    // Expand / Collapse
    // ========================

    /// Load a node's children and open it.
    ///
    /// The node ends up open even when the fetch fails. When it turns out to
    /// have no children, `empty_slot` receives `NO_CHILDREN_TEXT`; otherwise
    /// the slot is cleared.
    pub async fn open_node(&self, node_id: &str, empty_slot: &mut String) -> TreeResult<FetchOutcome> {
        {
            let mut state = self.state.lock().await;
            if !state.forest.contains(node_id) {
                drop(state);
                return Err(self.fail(TreeError::NotFound(node_id.to_string())));
            }
            *state.loading_nodes.entry(node_id.to_string()).or_insert(0) += 1;
            self.commit(&mut state);
        }

        let result = self.fetch_children(node_id).await;

        let mut state = self.state.lock().await;
        if let Some(count) = state.loading_nodes.get_mut(node_id) {
            *count -= 1;
            if *count == 0 {
                state.loading_nodes.remove(node_id);
            }
        }
        state.forest.set_open(node_id, true);
        if result.is_ok() {
            match state.forest.children(node_id) {
                Some(children) if children.is_empty() => *empty_slot = NO_CHILDREN_TEXT.to_string(),
                _ => empty_slot.clear(),
            }
        }
        self.commit(&mut state);
        result
    }

    pub async fn close_node(&self, node_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let found = state.forest.set_open(node_id, false);
        if found {
            self.commit(&mut state);
        }
        found
    }

    /// Flip `visible` on a node; returns the new value, `None` if unknown
    pub async fn toggle_visibility(&self, node_id: &str) -> Option<bool> {
        let mut state = self.state.lock().await;
        let visible = state.forest.toggle_visible(node_id);
        if visible.is_some() {
            self.commit(&mut state);
        }
        visible
    }

    /// Open branches matching `label` over what is already loaded; an empty
    /// label closes everything. Never fetches.
    pub async fn filter_by_search(&self, label: &str) {
        let mut state = self.state.lock().await;
        state.forest.apply_search(label);
        self.commit(&mut state);
    }

    // ========================
    // Mutations
    // ========================

    /// Create a department and place it at the front of its level.
    ///
    /// For a child, the parent's children are then re-fetched so the list
    /// matches the server's order.
    pub async fn add(&self, new_node: NewNode) -> TreeResult<Node> {
        let result = {
            let _ticket = self.loading.begin();
            self.backend.create(self.endpoint, &new_node).await
        };
        let mut created = result.map_err(|e| self.fail(e.into()))?;
        if created.parent_id.is_none() {
            created.parent_id = new_node.parent_id.clone();
        }

        let parent_loaded = {
            let mut state = self.state.lock().await;
            let placed = match created.parent_id.as_deref() {
                None => state.forest.prepend_root(created.clone()),
                Some(pid) => state.forest.prepend_child(pid, created.clone()),
            };
            if placed {
                self.commit(&mut state);
            } else {
                debug!("[STORE] Created {:?} but its parent is not loaded", created.id);
            }
            placed && created.parent_id.is_some()
        };

        self.notifier
            .show(&format!("Department \"{}\" created", created.label), Severity::Success);

        if parent_loaded {
            if let Some(pid) = created.parent_id.as_deref() {
                // already notified on failure; the create itself succeeded
                let _ = self.fetch_children(pid).await;
            }
        }
        Ok(created)
    }

    /// Move `node_id` to sit right before `target_id`, under the target's parent.
    ///
    /// Runs on a copy of the forest that replaces the live one only when the
    /// move succeeds. When move persistence is on, the new parent is sent to
    /// the server and a failed save rolls the move back, unless something
    /// else changed the tree in the meantime.
    pub async fn move_node(&self, node_id: &str, target_id: &str) -> TreeResult<()> {
        let (moved, previous, revision) = {
            let mut state = self.state.lock().await;
            let mut next = state.forest.clone();
            if let Err(err) = next.move_before(node_id, target_id) {
                drop(state);
                return Err(self.fail(err));
            }
            let previous = std::mem::replace(&mut state.forest, next);
            self.commit(&mut state);
            (state.forest.get(node_id).cloned(), previous, state.revision)
        };
        info!("[STORE] Moved {} before {}", node_id, target_id);

        if !self.persist_moves {
            return Ok(());
        }
        let Some(moved) = moved else {
            return Ok(());
        };

        let result = {
            let _ticket = self.loading.begin();
            self.backend.update(self.endpoint, &moved).await
        };
        if let Err(err) = result {
            let mut state = self.state.lock().await;
            if state.revision == revision {
                state.forest = previous;
                self.commit(&mut state);
                info!("[STORE] Rolled back move of {}", node_id);
            } else {
                warn!("[STORE] Move of {} failed to save; tree changed since, keeping it", node_id);
            }
            drop(state);
            return Err(self.fail(err.into()));
        }
        Ok(())
    }

    /// Replace the whole forest, e.g. with a snapshot taken earlier
    pub async fn restore(&self, views: Vec<NodeView>) {
        let mut state = self.state.lock().await;
        state.forest = Forest::from_views(views);
        self.commit(&mut state);
    }

    // ========================
    // Reads
    // ========================

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn total_pages(&self) -> u32 {
        self.total_items.div_ceil(self.page_size)
    }

    /// Watch channel carrying a revision number bumped on every change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub async fn is_node_loading(&self, node_id: &str) -> bool {
        self.state.lock().await.loading_nodes.contains_key(node_id)
    }

    pub async fn current_page(&self) -> u32 {
        self.state.lock().await.current_page
    }

    pub async fn search_label(&self) -> String {
        self.state.lock().await.search_label.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.has_more
    }

    pub async fn node(&self, node_id: &str) -> Option<Node> {
        self.state.lock().await.forest.get(node_id).cloned()
    }

    pub async fn children_of(&self, node_id: &str) -> Option<Vec<NodeId>> {
        self.state.lock().await.forest.children(node_id).map(<[NodeId]>::to_vec)
    }

    pub async fn root_ids(&self) -> Vec<NodeId> {
        self.state.lock().await.forest.roots().to_vec()
    }

    /// Loaded nodes at every depth
    pub async fn node_count(&self) -> usize {
        self.state.lock().await.forest.len()
    }

    pub async fn forest(&self) -> Forest {
        self.state.lock().await.forest.clone()
    }

    pub async fn snapshot(&self) -> Vec<NodeView> {
        self.state.lock().await.forest.to_views()
    }
}
