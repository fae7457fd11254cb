//! Tree Models
//!
//! Data structures matching the departments API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the backing store
pub type NodeId = String;

/// Department node as stored by the API.
///
/// `is_open` and `visible` are view state; they are never sent back to the
/// server. Children live in the forest, not on the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// Parent node ID (None = root level)
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_employees: Option<u64>,

    #[serde(default, skip_serializing)]
    pub is_open: bool,
    #[serde(default, skip_serializing)]
    pub visible: bool,
}

impl Node {
    /// Create an unsaved root node
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: None,
            parent_id: None,
            label: label.into(),
            created_at: None,
            description: None,
            number_of_employees: None,
            is_open: false,
            visible: false,
        }
    }

    /// Create a persisted node with a known id
    pub fn with_id(id: impl Into<NodeId>, parent_id: Option<&str>, label: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            parent_id: parent_id.map(str::to_string),
            ..Self::new(label)
        }
    }

    /// Check if this is a root node (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Case-insensitive substring match against the label
    pub fn label_matches(&self, needle_lower: &str) -> bool {
        self.label.to_lowercase().contains(needle_lower)
    }
}

/// Payload for creating a node; the server assigns `id` and `createdAt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    pub parent_id: Option<NodeId>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_employees: Option<u64>,
}

impl NewNode {
    pub fn root(label: impl Into<String>) -> Self {
        Self {
            parent_id: None,
            label: label.into(),
            description: None,
            number_of_employees: None,
        }
    }

    pub fn child(parent_id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::root(label)
        }
    }
}

/// Nested projection of the forest handed to readers.
///
/// `children == None` means the children were never fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeView>>,
}

impl NodeView {
    pub fn id(&self) -> &str {
        self.node.id.as_deref().unwrap_or_default()
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

/// Query sent to the backing store when listing nodes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeQuery {
    /// `None` asks for roots (`parentId=null`)
    pub parent_id: Option<NodeId>,
    /// Page and limit are only sent for root listings
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub label: Option<String>,
}

impl NodeQuery {
    pub fn roots(page: u32, limit: u32, label: &str) -> Self {
        Self {
            parent_id: None,
            page: Some(page),
            limit: Some(limit),
            label: Some(label.to_string()),
        }
    }

    pub fn children_of(parent_id: &str) -> Self {
        Self {
            parent_id: Some(parent_id.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_deserializes_api_shape() {
        let json = r#"{
            "id": "7",
            "parentId": null,
            "label": "Engineering",
            "createdAt": "2025-03-14T10:00:00.000Z",
            "description": "Builds things",
            "numberOfEmployees": 42
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.id.as_deref(), Some("7"));
        assert!(node.is_root());
        assert_eq!(node.number_of_employees, Some(42));
        assert!(!node.is_open);
        assert!(node.created_at.is_some());
    }

    #[test]
    fn test_view_flags_are_not_serialized() {
        let mut node = Node::with_id("1", None, "Sales");
        node.is_open = true;
        node.visible = true;
        let value = serde_json::to_value(&node).unwrap();
        assert!(value.get("isOpen").is_none());
        assert!(value.get("visible").is_none());
        assert_eq!(value["parentId"], serde_json::Value::Null);
    }

    #[test]
    fn test_new_node_has_no_id_field() {
        let value = serde_json::to_value(NewNode::child("3", "Payroll")).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["parentId"], "3");
        assert_eq!(value["label"], "Payroll");
    }

    #[test]
    fn test_label_match_is_case_insensitive() {
        let node = Node::with_id("1", None, "Human Resources");
        assert!(node.label_matches("resou"));
        assert!(!node.label_matches("finance"));
    }
}
