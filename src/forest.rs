//! Forest Arena
//!
//! Loaded departments indexed by id, with parent/children stored as id
//! references. Cloning the forest is a flat map clone, which is what makes
//! copy-then-swap mutations cheap.
//!
//! Holder invariant: a node listed in `roots` has `parent_id == None`, a node
//! listed in `P.children` has `parent_id == Some(P)`, and every entry is
//! listed exactly once.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::error::{TreeError, TreeResult};
use crate::models::{Node, NodeId, NodeView};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    node: Node,
    /// `None` = children never fetched
    children: Option<Vec<NodeId>>,
}

/// Position of a node inside its holder collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub parent_id: Option<NodeId>,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    entries: HashMap<NodeId, Entry>,
    roots: Vec<NodeId>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a nested view, e.g. a previous snapshot.
    /// `parent_id` of every node is rewritten to match where it sits.
    pub fn from_views(views: Vec<NodeView>) -> Self {
        let mut forest = Self::default();
        for view in views {
            if let Some(id) = forest.insert_view(view, None) {
                forest.roots.push(id);
            }
        }
        forest
    }

    fn insert_view(&mut self, view: NodeView, parent: Option<&str>) -> Option<NodeId> {
        let NodeView { mut node, children } = view;
        let id = node.id.clone()?;
        if self.entries.contains_key(&id) {
            warn!("[FOREST] Duplicate node {} in snapshot, keeping the first", id);
            return None;
        }
        node.parent_id = parent.map(str::to_string);
        self.entries.insert(id.clone(), Entry { node, children: None });
        let child_ids = children.map(|views| {
            views
                .into_iter()
                .filter_map(|child| self.insert_view(child, Some(&id)))
                .collect()
        });
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.children = child_ids;
        }
        Some(id)
    }

    // ========================
    // Reads
    // ========================

    /// Total number of loaded nodes at every depth
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.entries.get(id).map(|e| &e.node)
    }

    /// Child ids of a node; `None` if the node is unknown or its children were never fetched
    pub fn children(&self, id: &str) -> Option<&[NodeId]> {
        self.entries.get(id)?.children.as_deref()
    }

    fn siblings(&self, parent: Option<&str>) -> Option<&Vec<NodeId>> {
        match parent {
            None => Some(&self.roots),
            Some(pid) => self.entries.get(pid)?.children.as_ref(),
        }
    }

    fn siblings_mut(&mut self, parent: Option<&str>) -> Option<&mut Vec<NodeId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(pid) => self.entries.get_mut(pid)?.children.as_mut(),
        }
    }

    /// Find the holder collection and index of a node
    pub fn locate(&self, id: &str) -> Option<Location> {
        let entry = self.entries.get(id)?;
        let parent_id = entry.node.parent_id.clone();
        let index = self
            .siblings(parent_id.as_deref())?
            .iter()
            .position(|sibling| sibling == id)?;
        Some(Location { parent_id, index })
    }

    /// True if `ancestor` is `id` or one of its loaded ancestors
    pub fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.entries.len() {
                return false;
            }
            current = self.entries.get(cur).and_then(|e| e.node.parent_id.as_deref());
        }
        false
    }

    /// Nested projection for readers
    pub fn to_views(&self) -> Vec<NodeView> {
        self.roots.iter().filter_map(|id| self.view_of(id)).collect()
    }

    fn view_of(&self, id: &str) -> Option<NodeView> {
        let entry = self.entries.get(id)?;
        Some(NodeView {
            node: entry.node.clone(),
            children: entry
                .children
                .as_ref()
                .map(|ids| ids.iter().filter_map(|cid| self.view_of(cid)).collect()),
        })
    }

    // ========================
    // Structural Mutations
    // ========================

    /// Remove a node from whatever collection currently holds it
    fn detach(&mut self, id: &str) {
        let parent = match self.entries.get(id) {
            Some(entry) => entry.node.parent_id.clone(),
            None => return,
        };
        if let Some(siblings) = self.siblings_mut(parent.as_deref()) {
            siblings.retain(|sibling| sibling != id);
        }
    }

    /// Drop a node and its loaded descendants from the index.
    /// The caller is responsible for the holder list.
    fn remove_subtree(&mut self, id: &str) {
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.entries.remove(&current) {
                if let Some(children) = entry.children {
                    stack.extend(children);
                }
            }
        }
    }

    /// Merge a fetched record into the index under `parent`.
    ///
    /// A node already known elsewhere is detached from its old holder; its
    /// loaded children and view flags are kept. Returns the id unless the
    /// record has no id or would create a cycle. Does not touch the new
    /// holder list.
    fn adopt(&mut self, mut node: Node, parent: Option<&str>) -> Option<NodeId> {
        let Some(id) = node.id.clone() else {
            warn!("[FOREST] Ignoring node without id: {}", node.label);
            return None;
        };
        if let Some(pid) = parent {
            if self.contains(&id) && self.is_ancestor_or_self(&id, pid) {
                warn!("[FOREST] Ignoring node {} under {}: would create a cycle", id, pid);
                return None;
            }
        }
        node.parent_id = parent.map(str::to_string);

        let previous_parent = self.entries.get(&id).map(|e| e.node.parent_id.clone());
        match previous_parent {
            Some(previous_parent) => {
                if previous_parent.as_deref() != parent {
                    self.detach(&id);
                }
                if let Some(entry) = self.entries.get_mut(&id) {
                    node.is_open = entry.node.is_open;
                    node.visible = entry.node.visible;
                    entry.node = node;
                }
            }
            None => {
                self.entries.insert(id.clone(), Entry { node, children: None });
            }
        }
        Some(id)
    }

    /// Adopt a batch under one holder, dropping duplicate ids
    fn adopt_all(&mut self, nodes: Vec<Node>, parent: Option<&str>) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Some(id) = self.adopt(node, parent) {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Prune ids from a previous holder list that the fresh list no longer contains
    fn prune_missing(&mut self, previous: Vec<NodeId>, next: &[NodeId], parent: Option<&str>) {
        let keep: HashSet<&NodeId> = next.iter().collect();
        let stale: Vec<NodeId> = previous
            .into_iter()
            .filter(|id| !keep.contains(id))
            .filter(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|e| e.node.parent_id.as_deref() == parent)
            })
            .collect();
        for id in stale {
            self.remove_subtree(&id);
        }
    }

    /// Page 1 semantics: the fetched nodes become the whole root level
    pub fn replace_roots(&mut self, nodes: Vec<Node>) {
        let previous = std::mem::take(&mut self.roots);
        let next = self.adopt_all(nodes, None);
        self.prune_missing(previous, &next, None);
        self.roots = next;
    }

    /// Later-page semantics: append, skipping ids already at root level.
    /// Returns how many roots were added.
    pub fn append_roots(&mut self, nodes: Vec<Node>) -> usize {
        let mut added = 0;
        for node in nodes {
            let already_root = node
                .id
                .as_ref()
                .is_some_and(|id| self.roots.contains(id));
            if let Some(id) = self.adopt(node, None) {
                if !already_root {
                    self.roots.push(id);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn prepend_root(&mut self, node: Node) -> bool {
        match self.adopt(node, None) {
            Some(id) => {
                self.roots.retain(|r| *r != id);
                self.roots.insert(0, id);
                true
            }
            None => false,
        }
    }

    /// Replace the children of `parent_id` with a fresh fetch.
    /// Returns false when the parent is not loaded.
    pub fn replace_children(&mut self, parent_id: &str, nodes: Vec<Node>) -> bool {
        let previous = match self.entries.get_mut(parent_id) {
            Some(entry) => entry.children.take().unwrap_or_default(),
            None => return false,
        };
        let next = self.adopt_all(nodes, Some(parent_id));
        self.prune_missing(previous, &next, Some(parent_id));
        if let Some(entry) = self.entries.get_mut(parent_id) {
            entry.children = Some(next);
        }
        true
    }

    /// Put a node at the front of `parent_id`'s children, creating the list if absent
    pub fn prepend_child(&mut self, parent_id: &str, node: Node) -> bool {
        if !self.contains(parent_id) {
            return false;
        }
        let Some(id) = self.adopt(node, Some(parent_id)) else {
            return false;
        };
        match self.entries.get_mut(parent_id) {
            Some(entry) => {
                let children = entry.children.get_or_insert_with(Vec::new);
                children.retain(|c| *c != id);
                children.insert(0, id);
                true
            }
            None => false,
        }
    }

    /// Place `node_id` immediately before `target_id`, adopting the target's parent.
    ///
    /// Mutates in place; callers wanting atomicity run this on a clone.
    pub fn move_before(&mut self, node_id: &str, target_id: &str) -> TreeResult<()> {
        let missing: Vec<&str> = [node_id, target_id]
            .into_iter()
            .filter(|id| self.locate(id).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(TreeError::NotFound(missing.join(", ")));
        }
        if node_id == target_id {
            return Err(TreeError::InvalidMove(format!("{} cannot be placed before itself", node_id)));
        }
        if self.is_ancestor_or_self(node_id, target_id) {
            return Err(TreeError::InvalidMove(format!(
                "{} is inside the subtree of {}",
                target_id, node_id
            )));
        }

        let new_parent = self.get(target_id).and_then(|t| t.parent_id.clone());
        self.detach(node_id);
        if let Some(entry) = self.entries.get_mut(node_id) {
            entry.node.parent_id = new_parent.clone();
        }

        let siblings = match new_parent.as_deref() {
            None => &mut self.roots,
            Some(pid) => match self.entries.get_mut(pid) {
                Some(entry) => entry.children.get_or_insert_with(Vec::new),
                None => return Err(TreeError::NotFound(pid.to_string())),
            },
        };
        let id = node_id.to_string();
        match siblings.iter().position(|s| s == target_id) {
            Some(index) => siblings.insert(index, id),
            None => siblings.push(id),
        }
        Ok(())
    }

    // ========================
    // View Flags
    // ========================

    pub fn set_open(&mut self, id: &str, open: bool) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.node.is_open = open;
                true
            }
            None => false,
        }
    }

    /// Flip `visible`; returns the new value
    pub fn toggle_visible(&mut self, id: &str) -> Option<bool> {
        let entry = self.entries.get_mut(id)?;
        entry.node.visible = !entry.node.visible;
        Some(entry.node.visible)
    }

    /// Open exactly the nodes whose label, or a loaded descendant's label,
    /// contains `label` (case-insensitive). An empty label closes everything.
    pub fn apply_search(&mut self, label: &str) {
        if label.is_empty() {
            for entry in self.entries.values_mut() {
                entry.node.is_open = false;
            }
            return;
        }
        let needle = label.to_lowercase();
        let roots = self.roots.clone();
        for id in &roots {
            self.mark_matches(id, &needle);
        }
    }

    fn mark_matches(&mut self, id: &str, needle: &str) -> bool {
        let (own, children) = match self.entries.get(id) {
            Some(entry) => (entry.node.label_matches(needle), entry.children.clone()),
            None => return false,
        };
        let mut descendant = false;
        for child in children.iter().flatten() {
            // no short-circuit: every descendant gets its flag set
            if self.mark_matches(child, needle) {
                descendant = true;
            }
        }
        let matched = own || descendant;
        if let Some(entry) = self.entries.get_mut(id) {
            entry.node.is_open = matched;
        }
        matched
    }
}
