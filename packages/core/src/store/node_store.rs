//! Node Store - Structural Operations
//!
//! This module owns every node of the tree document and implements the
//! structural operations the editing services build on:
//!
//! - insert / move / rename with sibling-name conflict negotiation
//! - delete, detach, restore, reattach, purge
//! - reindex of synthetic labels
//! - display-order navigation (`next` / `prev`)
//! - document import/export at the serialization boundary
//!
//! # Identity and Labels
//!
//! Nodes are keyed by [`NodeId`], which never changes. The synthetic label
//! (`"0"`, `"0_3"`, `"0_3_1"`) is derived from position: a new child of
//! `parent` takes the smallest suffix not used by an attached sibling, and
//! [`NodeStore::reindex`] rebuilds labels from current order. Labels are
//! unique among attached nodes.
//!
//! # Detached Subtrees
//!
//! `detach` unlinks a subtree but keeps it in the arena so the clipboard and
//! undo record can bring it back. A detached subtree is dropped only through
//! `purge`. Traversals (`preorder`, `display_order`, `find_by_label`) see
//! attached nodes only.
//!
//! # Examples
//!
//! ```rust
//! use treeview_core::config::TreeConfig;
//! use treeview_core::models::NodeAttributes;
//! use treeview_core::store::NodeStore;
//! use treeview_core::surface::ScriptedPrompt;
//!
//! let mut store = NodeStore::new(&TreeConfig::default());
//! let mut prompt = ScriptedPrompt::silent();
//!
//! let folder = store
//!     .insert(None, None, NodeAttributes::new("Folder 0"), &mut prompt)?
//!     .id()
//!     .unwrap();
//! let photo = store
//!     .insert(Some(folder), None, NodeAttributes::new("photo.png"), &mut prompt)?
//!     .id()
//!     .unwrap();
//!
//! assert_eq!(store.label(photo), Some("0_0"));
//! assert_eq!(store.subtree_size(folder), Some(1));
//! # Ok::<(), treeview_core::TreeError>(())
//! ```

use crate::config::TreeConfig;
use crate::conflict::{resolve_unique_name, Resolution};
use crate::error::{Result, TreeError};
use crate::models::{
    Column, Heading, Node, NodeAttributes, NodeId, NodeRecord, NodeTemplate, TreeDocument,
    ValueSchema,
};
use crate::surface::ModalPrompt;
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of an operation that places a node under a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The node now lives under the requested parent
    Placed(NodeId),
    /// The user skipped this node during conflict resolution
    Skipped,
    /// The user cancelled the enclosing operation
    Cancelled,
}

impl Placement {
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Self::Placed(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    label: String,
    attrs: NodeAttributes,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Number of descendants, maintained on every link/unlink
    size: usize,
}

/// Arena-backed tree of nodes
#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: HashMap<NodeId, NodeEntry>,
    roots: Vec<NodeId>,
    detached: Vec<NodeId>,
    schema: ValueSchema,
    container_kind: String,
    unique_text: bool,
    headings: Vec<Heading>,
    columns: Vec<Column>,
}

impl NodeStore {
    /// Empty store governed by `config`
    pub fn new(config: &TreeConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            detached: Vec::new(),
            schema: config.value_schema.clone(),
            container_kind: config.container_kind.clone(),
            unique_text: config.unique_text.unwrap_or(false),
            headings: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Build a store from a serialized document
    ///
    /// Records are loaded as-is: duplicate sibling names already present in
    /// the document are accepted without prompting. Every node gets a fresh
    /// id and a sequential label.
    pub fn from_document(document: &TreeDocument, config: &TreeConfig) -> Self {
        let mut store = Self::new(config);
        store.headings = document.headings.clone();
        store.columns = document.columns.clone();
        store.unique_text = config
            .unique_text
            .unwrap_or_else(|| document.text_is_unique());

        for record in &document.data {
            let template = template_from_record(record);
            if let Err(e) = store.graft(None, None, &template) {
                tracing::warn!("Skipping record '{}': {}", record.text, e);
            }
        }

        tracing::debug!(
            "Loaded document with {} node(s) in {} top-level record(s)",
            store.len(),
            store.roots.len()
        );
        store
    }

    /// Serialize the attached forest
    ///
    /// Detached subtrees (cut or pending undo) are not part of the document.
    pub fn to_document(&self) -> TreeDocument {
        TreeDocument {
            headings: self.headings.clone(),
            columns: self.columns.clone(),
            data: self.roots.iter().map(|id| self.record_for(*id)).collect(),
        }
    }

    fn record_for(&self, id: NodeId) -> NodeRecord {
        let entry = &self.nodes[&id];
        let children = if entry.children.is_empty() {
            None
        } else {
            Some(
                entry
                    .children
                    .iter()
                    .map(|child| self.record_for(*child))
                    .collect(),
            )
        };

        NodeRecord {
            text: entry.attrs.text.clone(),
            open: entry.attrs.open,
            values: entry.attrs.values.clone(),
            children,
        }
    }

    // =========================================================================
    // Policy
    // =========================================================================

    pub fn schema(&self) -> &ValueSchema {
        &self.schema
    }

    pub fn headings(&self) -> &[Heading] {
        &self.headings
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether sibling texts must be unique
    pub fn unique_text(&self) -> bool {
        self.unique_text
    }

    pub fn set_unique_text(&mut self, unique: bool) {
        self.unique_text = unique;
    }

    /// Kind value of the node, per the schema's kind column
    pub fn kind(&self, id: NodeId) -> Option<&str> {
        let column = self.schema.kind_column?;
        self.nodes.get(&id).map(|entry| entry.attrs.value(column))
    }

    /// Whether the node may hold children; the synthetic root (`None`) always can
    pub fn is_container(&self, id: Option<NodeId>) -> bool {
        match id {
            None => true,
            Some(id) => self.kind(id) == Some(self.container_kind.as_str()),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Snapshot of a node (attached or detached)
    pub fn get(&self, id: NodeId) -> Option<Node> {
        let entry = self.nodes.get(&id)?;
        Some(Node {
            id,
            label: entry.label.clone(),
            text: entry.attrs.text.clone(),
            values: entry.attrs.values.clone(),
            open: entry.attrs.open,
            parent: entry.parent,
            children: entry.children.clone(),
            size: entry.size,
        })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn attributes(&self, id: NodeId) -> Option<&NodeAttributes> {
        self.nodes.get(&id).map(|entry| &entry.attrs)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|entry| entry.attrs.text.as_str())
    }

    pub fn values(&self, id: NodeId) -> Option<&[String]> {
        self.nodes.get(&id).map(|entry| entry.attrs.values.as_slice())
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|entry| entry.label.as_str())
    }

    pub fn is_open(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .map(|entry| entry.attrs.open)
            .unwrap_or(false)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|entry| entry.parent)
    }

    /// Ordered children of `parent`; `None` addresses the top-level forest
    pub fn children(&self, parent: Option<NodeId>) -> Result<&[NodeId]> {
        match parent {
            None => Ok(&self.roots),
            Some(id) => self
                .nodes
                .get(&id)
                .map(|entry| entry.children.as_slice())
                .ok_or_else(|| TreeError::node_not_found(id)),
        }
    }

    /// Top-level nodes in order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Position among siblings (detached roots have none)
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let entry = self.nodes.get(&id)?;
        let siblings = match entry.parent {
            Some(parent) => &self.nodes.get(&parent)?.children,
            None => &self.roots,
        };
        siblings.iter().position(|sibling| *sibling == id)
    }

    /// Cached number of descendants
    pub fn subtree_size(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(&id).map(|entry| entry.size)
    }

    /// Number of attached nodes
    pub fn len(&self) -> usize {
        self.roots
            .iter()
            .map(|id| self.nodes[id].size + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of nodes held, attached or detached
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Topmost ancestor of `id` (itself when it has no parent)
    fn top_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Whether the node is part of the visible forest (not detached)
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && !self.detached.contains(&self.top_of(id))
    }

    /// Whether the node heads a detached subtree
    pub fn is_detached_root(&self, id: NodeId) -> bool {
        self.detached.contains(&id)
    }

    /// Heads of all detached subtrees, in detach order
    pub fn detached_roots(&self) -> &[NodeId] {
        &self.detached
    }

    /// Whether `ancestor` is a strict ancestor of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether every ancestor is open and the node is attached
    pub fn is_shown(&self, id: NodeId) -> bool {
        if !self.is_attached(id) {
            return false;
        }
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            if !self.is_open(ancestor) {
                return false;
            }
            current = self.parent(ancestor);
        }
        true
    }

    /// Descendants of `id` in pre-order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&id) {
            Some(entry) => entry.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[&current].children.iter().rev().copied());
        }
        out
    }

    /// Rows shown beneath `id` in display order (empty when it is collapsed)
    pub fn visible_descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&id) {
            Some(entry) if entry.attrs.open => entry.children.iter().rev().copied().collect(),
            _ => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current);
            let entry = &self.nodes[&current];
            if entry.attrs.open {
                stack.extend(entry.children.iter().rev().copied());
            }
        }
        out
    }

    /// Every id held in the arena, attached or detached, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Every attached node in pre-order, regardless of open state
    pub fn preorder(&self) -> Vec<NodeId> {
        self.walk(false)
    }

    /// Visible rows in display order: descends only into open nodes
    pub fn display_order(&self) -> Vec<NodeId> {
        self.walk(true)
    }

    fn walk(&self, open_only: bool) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            let entry = &self.nodes[&id];
            if !open_only || entry.attrs.open {
                stack.extend(entry.children.iter().rev().copied());
            }
        }
        out
    }

    /// Attached node currently carrying `label`
    pub fn find_by_label(&self, label: &str) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|id| self.nodes[id].label == label)
    }

    /// Reduce `ids` to attached nodes without a selected ancestor, in pre-order
    pub fn top_level_of(&self, ids: &HashSet<NodeId>) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| ids.contains(id))
            .filter(|id| {
                let mut current = self.parent(*id);
                while let Some(ancestor) = current {
                    if ids.contains(&ancestor) {
                        return false;
                    }
                    current = self.parent(ancestor);
                }
                true
            })
            .collect()
    }

    /// Successor in display order
    ///
    /// An open node's first child comes next; otherwise the next sibling of
    /// the node or of its nearest ancestor that has one.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        let entry = self.nodes.get(&id)?;
        if entry.attrs.open {
            if let Some(first) = entry.children.first() {
                return Some(*first);
            }
        }

        let mut current = id;
        loop {
            let parent = self.parent(current);
            let siblings = self.children(parent).ok()?;
            let index = siblings.iter().position(|s| *s == current)?;
            if let Some(next) = siblings.get(index + 1) {
                return Some(*next);
            }
            current = parent?;
        }
    }

    /// Predecessor in display order
    ///
    /// The previous sibling's last visible descendant, or the parent when
    /// the node is the first child.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id);
        let index = self.index_of(id)?;
        if index == 0 {
            return parent;
        }

        let mut current = self.children(parent).ok()?[index - 1];
        loop {
            let entry = &self.nodes[&current];
            match entry.children.last() {
                Some(last) if entry.attrs.open => current = *last,
                _ => return Some(current),
            }
        }
    }

    // =========================================================================
    // Labels
    // =========================================================================

    fn make_label(&self, parent: Option<NodeId>, suffix: usize) -> String {
        match parent {
            None => suffix.to_string(),
            Some(parent) => format!("{}_{}", self.nodes[&parent].label, suffix),
        }
    }

    /// Smallest suffix not used by the attached children of `parent`
    fn next_free_suffix(&self, parent: Option<NodeId>, exclude: Option<NodeId>) -> usize {
        let used: HashSet<usize> = self
            .children(parent)
            .unwrap_or(&[])
            .iter()
            .filter(|id| Some(**id) != exclude)
            .filter_map(|id| label_suffix(&self.nodes[id].label))
            .collect();
        (0..).find(|n| !used.contains(n)).unwrap_or(0)
    }

    fn set_label(&mut self, id: NodeId, label: String) {
        let column = self.schema.label_column;
        if let Some(entry) = self.nodes.get_mut(&id) {
            if let Some(column) = column {
                entry.attrs.set_value(column, label.clone());
            }
            entry.label = label;
        }
    }

    /// Give `id` a fresh label under its current parent and relabel its subtree
    fn assign_label(&mut self, id: NodeId) {
        let parent = self.parent(id);
        let suffix = self.next_free_suffix(parent, Some(id));
        let label = self.make_label(parent, suffix);
        self.set_label(id, label);
        self.relabel_descendants(id);
    }

    /// Relabel every descendant of `id` from current order
    fn relabel_descendants(&mut self, id: NodeId) -> Vec<(String, String)> {
        let mut changed = Vec::new();
        let mut queue: VecDeque<NodeId> = VecDeque::from([id]);
        while let Some(parent) = queue.pop_front() {
            let children = self.nodes[&parent].children.clone();
            for (index, child) in children.into_iter().enumerate() {
                let label = self.make_label(Some(parent), index);
                let old = self.nodes[&child].label.clone();
                if old != label {
                    changed.push((old, label.clone()));
                    self.set_label(child, label);
                }
                queue.push_back(child);
            }
        }
        changed
    }

    /// Rebuild labels for everything under `parent` from current order
    ///
    /// `None` reindexes the whole forest. Text, values (apart from the label
    /// column), open state and order are preserved. Returns the
    /// `(old, new)` label pairs that changed so hosts holding labels can
    /// re-point them; crate-internal references use [`NodeId`] and need no
    /// rewriting.
    pub fn reindex(&mut self, parent: Option<NodeId>) -> Result<Vec<(String, String)>> {
        let children = self.children(parent)?.to_vec();
        let mut changed = Vec::new();

        for (index, child) in children.into_iter().enumerate() {
            let label = self.make_label(parent, index);
            let old = self.nodes[&child].label.clone();
            if old != label {
                changed.push((old, label.clone()));
                self.set_label(child, label);
            }
            changed.extend(self.relabel_descendants(child));
        }

        if !changed.is_empty() {
            tracing::debug!("Reindex relabelled {} node(s)", changed.len());
        }
        Ok(changed)
    }

    /// Labels of every attached node under `parent` (`None` = whole forest)
    pub fn labels_under(&self, parent: Option<NodeId>) -> Vec<(NodeId, String)> {
        let ids = match parent {
            None => self.preorder(),
            Some(id) => self.descendants(id),
        };
        ids.into_iter()
            .map(|id| (id, self.nodes[&id].label.clone()))
            .collect()
    }

    /// Put back labels captured by [`labels_under`](Self::labels_under)
    pub fn restore_labels(&mut self, labels: &[(NodeId, String)]) {
        for (id, label) in labels {
            if self.contains(*id) {
                self.set_label(*id, label.clone());
            }
        }
    }

    // =========================================================================
    // Linking and size bookkeeping
    // =========================================================================

    fn adjust_sizes(&mut self, start: Option<NodeId>, delta: isize) {
        let mut current = start;
        while let Some(id) = current {
            let Some(entry) = self.nodes.get_mut(&id) else {
                tracing::warn!("Size update stopped at missing ancestor {}", id);
                break;
            };
            entry.size = entry.size.saturating_add_signed(delta);
            current = entry.parent;
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeId>) -> Result<&mut Vec<NodeId>> {
        match parent {
            None => Ok(&mut self.roots),
            Some(id) => self
                .nodes
                .get_mut(&id)
                .map(|entry| &mut entry.children)
                .ok_or_else(|| TreeError::invalid_parent(id)),
        }
    }

    fn link(&mut self, id: NodeId, parent: Option<NodeId>, index: Option<usize>) -> Result<usize> {
        let siblings = self.siblings_mut(parent)?;
        let position = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(position, id);

        let size = {
            let entry = self
                .nodes
                .get_mut(&id)
                .ok_or_else(|| TreeError::node_not_found(id))?;
            entry.parent = parent;
            entry.size
        };
        self.adjust_sizes(parent, size as isize + 1);
        Ok(position)
    }

    fn unlink(&mut self, id: NodeId) -> Result<(Option<NodeId>, usize)> {
        let (parent, size) = {
            let entry = self
                .nodes
                .get(&id)
                .ok_or_else(|| TreeError::node_not_found(id))?;
            (entry.parent, entry.size)
        };

        let siblings = self.siblings_mut(parent)?;
        let index = siblings
            .iter()
            .position(|sibling| *sibling == id)
            .ok_or_else(|| TreeError::node_not_found(id))?;
        siblings.remove(index);

        self.adjust_sizes(parent, -(size as isize + 1));
        if let Some(entry) = self.nodes.get_mut(&id) {
            entry.parent = None;
        }
        Ok((parent, index))
    }

    /// Build nodes for `template` under `parent` without conflict checks
    fn graft(
        &mut self,
        parent: Option<NodeId>,
        index: Option<usize>,
        template: &NodeTemplate,
    ) -> Result<NodeId> {
        let root = self.create_entry(parent, template.attrs.clone());
        if let Err(e) = self.link(root, parent, index) {
            self.nodes.remove(&root);
            return Err(e);
        }
        self.assign_label(root);

        let mut queue: VecDeque<(&NodeTemplate, NodeId)> = template
            .children
            .iter()
            .map(|child| (child, root))
            .collect();

        while let Some((child, parent_id)) = queue.pop_front() {
            let id = self.create_entry(Some(parent_id), child.attrs.clone());
            self.link(id, Some(parent_id), None)?;
            let suffix = self.nodes[&parent_id].children.len() - 1;
            let label = self.make_label(Some(parent_id), suffix);
            self.set_label(id, label);
            queue.extend(child.children.iter().map(|grandchild| (grandchild, id)));
        }

        Ok(root)
    }

    fn create_entry(&mut self, parent: Option<NodeId>, attrs: NodeAttributes) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(
            id,
            NodeEntry {
                label: String::new(),
                attrs,
                parent,
                children: Vec::new(),
                size: 0,
            },
        );
        id
    }

    fn require_attached_parent(&self, parent: Option<NodeId>) -> Result<()> {
        match parent {
            Some(id) if !self.is_attached(id) => Err(TreeError::invalid_parent(id)),
            _ => Ok(()),
        }
    }

    fn require_attached(&self, id: NodeId) -> Result<()> {
        if self.is_attached(id) {
            Ok(())
        } else {
            Err(TreeError::node_not_found(id))
        }
    }

    // =========================================================================
    // Conflict negotiation
    // =========================================================================

    /// Whether an attached child of `parent` other than `exclude` has `text`
    pub fn text_taken(&self, parent: Option<NodeId>, text: &str, exclude: Option<NodeId>) -> bool {
        self.children(parent)
            .unwrap_or(&[])
            .iter()
            .filter(|id| Some(**id) != exclude)
            .any(|id| self.nodes[id].attrs.text == text)
    }

    fn resolve_name(
        &self,
        parent: Option<NodeId>,
        text: &str,
        exclude: Option<NodeId>,
        prompt: &mut dyn ModalPrompt,
    ) -> Resolution {
        if !self.unique_text {
            return Resolution::Unique(text.to_string());
        }
        resolve_unique_name(prompt, text, |candidate| {
            self.text_taken(parent, candidate, exclude)
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a child of `parent` at `index` (end of list when `None`)
    ///
    /// Runs the conflict protocol first when sibling names must be unique.
    /// On success the node gets the smallest free label suffix under
    /// `parent` and every ancestor's size grows by one.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        index: Option<usize>,
        attrs: NodeAttributes,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<Placement> {
        self.insert_subtree(parent, index, &NodeTemplate::new(attrs), prompt)
    }

    /// Create a whole subtree from `template`
    ///
    /// Only the subtree root is checked against its new siblings; the
    /// template's internal structure is reproduced as-is with fresh ids.
    pub fn insert_subtree(
        &mut self,
        parent: Option<NodeId>,
        index: Option<usize>,
        template: &NodeTemplate,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<Placement> {
        self.require_attached_parent(parent)?;

        let text = match self.resolve_name(parent, &template.attrs.text, None, prompt) {
            Resolution::Unique(text) => text,
            Resolution::Skip => return Ok(Placement::Skipped),
            Resolution::Cancel => return Ok(Placement::Cancelled),
        };

        let id = if text == template.attrs.text {
            self.graft(parent, index, template)?
        } else {
            let mut renamed = template.clone();
            renamed.attrs.text = text;
            self.graft(parent, index, &renamed)?
        };

        tracing::debug!(
            "Inserted '{}' as {} ({} node(s))",
            self.nodes[&id].attrs.text,
            self.nodes[&id].label,
            template.node_count()
        );
        Ok(Placement::Placed(id))
    }

    /// Re-parent an attached node
    ///
    /// `index` is the position in the destination list after the node has
    /// been removed from its old place. The moved subtree is relabelled
    /// under its new parent.
    pub fn move_node(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        index: Option<usize>,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<Placement> {
        self.require_attached(id)?;
        self.require_attached_parent(new_parent)?;

        if let Some(parent) = new_parent {
            if parent == id || self.is_ancestor(id, parent) {
                return Err(TreeError::circular_reference(format!(
                    "Cannot move node {} under its descendant {}",
                    id, parent
                )));
            }
        }

        let current = self.nodes[&id].attrs.text.clone();
        let text = match self.resolve_name(new_parent, &current, Some(id), prompt) {
            Resolution::Unique(text) => text,
            Resolution::Skip => return Ok(Placement::Skipped),
            Resolution::Cancel => return Ok(Placement::Cancelled),
        };

        self.unlink(id)?;
        self.link(id, new_parent, index)?;
        if let Some(entry) = self.nodes.get_mut(&id) {
            entry.attrs.text = text;
        }
        self.assign_label(id);

        tracing::debug!("Moved {} to {}", id, self.nodes[&id].label);
        Ok(Placement::Placed(id))
    }

    /// Change a node's text, negotiating conflicts with its siblings
    pub fn rename(
        &mut self,
        id: NodeId,
        text: &str,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<Placement> {
        let parent = match self.nodes.get(&id) {
            Some(entry) => entry.parent,
            None => return Err(TreeError::node_not_found(id)),
        };

        let text = match self.resolve_name(parent, text, Some(id), prompt) {
            Resolution::Unique(text) => text,
            Resolution::Skip => return Ok(Placement::Skipped),
            Resolution::Cancel => return Ok(Placement::Cancelled),
        };

        if let Some(entry) = self.nodes.get_mut(&id) {
            tracing::debug!("Renamed '{}' to '{}'", entry.attrs.text, text);
            entry.attrs.text = text;
        }
        Ok(Placement::Placed(id))
    }

    /// Expand or collapse a node; returns whether the state changed
    pub fn set_open(&mut self, id: NodeId, open: bool) -> Result<bool> {
        let entry = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| TreeError::node_not_found(id))?;
        let changed = entry.attrs.open != open;
        entry.attrs.open = open;
        Ok(changed)
    }

    pub fn set_value(&mut self, id: NodeId, index: usize, value: impl Into<String>) -> Result<()> {
        let entry = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| TreeError::node_not_found(id))?;
        entry.attrs.set_value(index, value);
        Ok(())
    }

    /// Permanently remove nodes and their subtrees
    ///
    /// Unknown and detached ids are ignored, as are nodes whose ancestor is
    /// also listed. Returns the number of nodes removed.
    pub fn delete(&mut self, ids: &[NodeId]) -> usize {
        let wanted: HashSet<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| {
                let attached = self.is_attached(*id);
                if !attached {
                    tracing::debug!("Ignoring delete of unknown or detached node {}", id);
                }
                attached
            })
            .collect();

        let mut removed = 0;
        for id in self.top_level_of(&wanted) {
            if self.detach(id).is_ok() {
                removed += self.purge(id).map(|ids| ids.len()).unwrap_or(0);
            }
        }

        if removed > 0 {
            tracing::debug!("Deleted {} node(s)", removed);
        }
        removed
    }

    /// Unlink an attached subtree but keep it in the arena
    ///
    /// Returns the previous `(parent, index)`. Ids and labels persist.
    pub fn detach(&mut self, id: NodeId) -> Result<(Option<NodeId>, usize)> {
        self.require_attached(id)?;
        let position = self.unlink(id)?;
        self.detached.push(id);
        Ok(position)
    }

    /// Put a detached subtree back at an exact position without prompting
    ///
    /// Used by undo. Labels are kept unless they collide with an attached
    /// sibling, in which case the subtree is relabelled.
    pub fn restore(&mut self, id: NodeId, parent: Option<NodeId>, index: usize) -> Result<()> {
        if !self.is_detached_root(id) {
            return Err(TreeError::invalid_target(format!(
                "{} is not a detached subtree",
                id
            )));
        }
        self.require_attached_parent(parent)?;

        self.link(id, parent, Some(index))?;
        self.detached.retain(|detached| *detached != id);

        let label = self.nodes[&id].label.clone();
        let prefix_ok = match parent {
            None => !label.contains('_'),
            Some(p) => label
                .strip_prefix(self.nodes[&p].label.as_str())
                .map(|rest| rest.starts_with('_') && !rest[1..].contains('_'))
                .unwrap_or(false),
        };
        let collides = self
            .children(parent)?
            .iter()
            .any(|sibling| *sibling != id && self.nodes[sibling].label == label);

        if collides || !prefix_ok {
            tracing::debug!("Restored node {} collided on label {}; relabelling", id, label);
            self.assign_label(id);
        }
        Ok(())
    }

    /// Attach a detached subtree under `parent`, negotiating its name
    pub fn reattach(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        index: Option<usize>,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<Placement> {
        if !self.is_detached_root(id) {
            return Err(TreeError::invalid_target(format!(
                "{} is not a detached subtree",
                id
            )));
        }
        self.require_attached_parent(parent)?;

        let current = self.nodes[&id].attrs.text.clone();
        let text = match self.resolve_name(parent, &current, None, prompt) {
            Resolution::Unique(text) => text,
            Resolution::Skip => return Ok(Placement::Skipped),
            Resolution::Cancel => return Ok(Placement::Cancelled),
        };

        self.link(id, parent, index)?;
        self.detached.retain(|detached| *detached != id);
        if let Some(entry) = self.nodes.get_mut(&id) {
            entry.attrs.text = text;
        }
        self.assign_label(id);

        tracing::debug!("Reattached {} as {}", id, self.nodes[&id].label);
        Ok(Placement::Placed(id))
    }

    /// Drop a detached subtree from the arena; returns the removed ids
    pub fn purge(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        if !self.is_detached_root(id) {
            return Err(TreeError::invalid_target(format!(
                "{} is not a detached subtree",
                id
            )));
        }

        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        for node in &removed {
            self.nodes.remove(node);
        }
        self.detached.retain(|detached| *detached != id);
        Ok(removed)
    }

    /// Snapshot the structure spanned by `marked` as paste templates
    ///
    /// Every attached marked node becomes a template nested under its
    /// nearest marked ancestor; marked nodes without one become roots, in
    /// tree pre-order. When `stamp` is given it is written into the
    /// schema's modified column of every copy.
    pub fn deep_copy(&self, marked: &HashSet<NodeId>, stamp: Option<&str>) -> Vec<NodeTemplate> {
        let order: Vec<NodeId> = self
            .preorder()
            .into_iter()
            .filter(|id| marked.contains(id))
            .collect();

        let nearest_marked = |id: NodeId| {
            let mut current = self.parent(id);
            while let Some(ancestor) = current {
                if marked.contains(&ancestor) {
                    return Some(ancestor);
                }
                current = self.parent(ancestor);
            }
            None
        };

        let mut children: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
        for id in &order {
            children.entry(nearest_marked(*id)).or_default().push(*id);
        }

        // Reverse pre-order visits every child before its parent
        let mut built: HashMap<NodeId, NodeTemplate> = HashMap::new();
        for id in order.iter().rev() {
            let mut attrs = self.nodes[id].attrs.clone();
            if let (Some(stamp), Some(column)) = (stamp, self.schema.modified_column) {
                attrs.set_value(column, stamp);
            }
            let kids = children
                .get(&Some(*id))
                .map(|kids| kids.iter().filter_map(|kid| built.remove(kid)).collect())
                .unwrap_or_default();
            built.insert(*id, NodeTemplate::new(attrs).with_children(kids));
        }

        children
            .get(&None)
            .map(|roots| roots.iter().filter_map(|root| built.remove(root)).collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Indented outline of the attached forest, one node per line
    ///
    /// ```text
    /// . Folder 0 [0]
    /// .. photo1.png [0_0]
    /// ```
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().rev().map(|id| (*id, 1)).collect();
        while let Some((id, depth)) = stack.pop() {
            let entry = &self.nodes[&id];
            out.push_str(&".".repeat(depth));
            out.push(' ');
            out.push_str(&entry.attrs.text);
            out.push_str(&format!(" [{}]\n", entry.label));
            stack.extend(entry.children.iter().rev().map(|child| (*child, depth + 1)));
        }
        out
    }
}

fn label_suffix(label: &str) -> Option<usize> {
    label.rsplit('_').next()?.parse().ok()
}

fn template_from_record(record: &NodeRecord) -> NodeTemplate {
    NodeTemplate {
        attrs: NodeAttributes {
            text: record.text.clone(),
            values: record.values.clone(),
            open: record.open,
        },
        children: record
            .children
            .iter()
            .flatten()
            .map(template_from_record)
            .collect(),
    }
}

#[cfg(test)]
#[path = "node_store_test.rs"]
mod node_store_test;
