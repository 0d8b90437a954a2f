//! Node Data Structures
//!
//! This module defines the identity and attribute types shared by every layer
//! of the tree document.
//!
//! # Identity
//!
//! - **`NodeId`**: opaque, stable identity (v4 UUID). Survives reindex, move,
//!   detach and reattach. Everything that refers to a node (focus, selection,
//!   clipboard, undo, render caches) holds a `NodeId`.
//! - **Label**: the synthetic, order-derived id shown in the label column
//!   (`"0"`, `"0_3"`, `"0_3_1"`). Labels are regenerated by reindex and are
//!   never used as references inside the crate.
//!
//! # Examples
//!
//! ```rust
//! use treeview_core::models::NodeAttributes;
//!
//! let folder = NodeAttributes::new("Photos")
//!     .with_values(vec![String::new(), String::new(), "Folder".to_string(), String::new()])
//!     .with_open(true);
//! assert!(folder.open);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, stable node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Authoritative per-node data
///
/// `values` is a fixed-width record whose meaning is supplied by the
/// [`ValueSchema`](crate::models::ValueSchema), not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// Display name
    pub text: String,

    /// Semantic fields (label, modified time, kind, size, ...)
    #[serde(default)]
    pub values: Vec<String>,

    /// Whether children are currently expanded
    #[serde(default)]
    pub open: bool,
}

impl NodeAttributes {
    /// Attributes with the given text, no values, collapsed
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            values: Vec::new(),
            open: false,
        }
    }

    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.values = values;
        self
    }

    pub fn with_open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    /// Value at `index`, or `""` when the record is shorter
    pub fn value(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    /// Write a value, padding the record with empty strings as needed
    pub fn set_value(&mut self, index: usize, value: impl Into<String>) {
        if self.values.len() <= index {
            self.values.resize(index + 1, String::new());
        }
        self.values[index] = value.into();
    }
}

/// Read-only snapshot of an attached or detached node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,

    /// Order-derived synthetic id
    pub label: String,

    pub text: String,
    pub values: Vec<String>,
    pub open: bool,

    /// `None` for top-level and detached nodes
    pub parent: Option<NodeId>,

    /// Ordered child ids
    pub children: Vec<NodeId>,

    /// Cached number of descendants
    pub size: usize,
}

/// Detached description of a subtree, used for deep copies and document import
///
/// Templates carry attributes only; every node built from a template receives
/// a fresh [`NodeId`] and label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeTemplate {
    pub attrs: NodeAttributes,
    pub children: Vec<NodeTemplate>,
}

impl NodeTemplate {
    pub fn new(attrs: NodeAttributes) -> Self {
        Self {
            attrs,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<NodeTemplate>) -> Self {
        self.children = children;
        self
    }

    /// Number of nodes in the template, including the root
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(template) = stack.pop() {
            count += 1;
            stack.extend(template.children.iter());
        }
        count
    }
}
