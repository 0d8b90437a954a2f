//! Clipboard/Undo Engine
//!
//! Cut detaches subtrees and keeps them in the store's arena; copy only
//! marks nodes. Paste either reattaches the cut subtrees or rebuilds the
//! marked structure with fresh ids. Delete detaches too, so the single undo
//! record can bring back the most recent cut or delete exactly.
//!
//! # Lifecycle of detached subtrees
//!
//! A detached subtree is kept while the cut clipboard or the undo record
//! references it. Whenever either is replaced or consumed, unreferenced
//! detached subtrees are purged from the store.

use crate::error::{Result, TreeError};
use crate::models::time::{
    format_timestamp, SystemTimeProvider, TimeProvider, DEFAULT_TIMESTAMP_FORMAT,
};
use crate::models::NodeId;
use crate::store::{NodeStore, Placement};
use crate::surface::ModalPrompt;
use std::collections::HashSet;

/// Clipboard contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Clipboard {
    #[default]
    Empty,
    /// Heads of detached subtrees, in the order they were cut
    Cut(Vec<NodeId>),
    /// Marked attached nodes, in tree pre-order
    Copied(Vec<NodeId>),
}

impl Clipboard {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Cut(ids) | Self::Copied(ids) => ids.is_empty(),
        }
    }

    pub fn ids(&self) -> &[NodeId] {
        match self {
            Self::Empty => &[],
            Self::Cut(ids) | Self::Copied(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Cut,
    Delete,
}

/// Where a detached subtree used to live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoEntry {
    pub node: NodeId,
    pub parent: Option<NodeId>,
    pub index: usize,
}

/// The single undoable operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub kind: UndoKind,
    pub entries: Vec<UndoEntry>,
    /// Labels of the affected parents' subtrees before the operation
    pub labels: Vec<(NodeId, String)>,
}

impl UndoRecord {
    pub fn references(&self, id: NodeId) -> bool {
        self.entries.iter().any(|entry| entry.node == id)
    }
}

/// What a paste did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteOutcome {
    /// Roots now under the target (reattached or freshly built)
    pub placed: Vec<NodeId>,
    pub skipped: usize,
    /// Whether the user cancelled partway; earlier placements remain
    pub cancelled: bool,
}

/// Clipboard, undo record, and the clock used to stamp copies
pub struct ClipboardEngine {
    clipboard: Clipboard,
    undo: Option<UndoRecord>,
    clock: Box<dyn TimeProvider>,
    timestamp_format: String,
}

impl Default for ClipboardEngine {
    fn default() -> Self {
        Self::new(Box::new(SystemTimeProvider), DEFAULT_TIMESTAMP_FORMAT)
    }
}

impl std::fmt::Debug for ClipboardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardEngine")
            .field("clipboard", &self.clipboard)
            .field("undo", &self.undo)
            .field("timestamp_format", &self.timestamp_format)
            .finish()
    }
}

impl ClipboardEngine {
    pub fn new(clock: Box<dyn TimeProvider>, timestamp_format: impl Into<String>) -> Self {
        Self {
            clipboard: Clipboard::Empty,
            undo: None,
            clock,
            timestamp_format: timestamp_format.into(),
        }
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn undo_record(&self) -> Option<&UndoRecord> {
        self.undo.as_ref()
    }

    /// Current time in the configured timestamp format
    pub fn timestamp(&self) -> String {
        format_timestamp(self.clock.as_ref(), &self.timestamp_format)
    }

    /// Whether the node is cut, directly or through a cut ancestor
    pub fn is_cut(&self, store: &NodeStore, id: NodeId) -> bool {
        let Clipboard::Cut(roots) = &self.clipboard else {
            return false;
        };
        let mut current = Some(id);
        while let Some(node) = current {
            if roots.contains(&node) {
                return true;
            }
            current = store.parent(node);
        }
        false
    }

    pub fn is_copied(&self, id: NodeId) -> bool {
        matches!(&self.clipboard, Clipboard::Copied(ids) if ids.contains(&id))
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Detach `roots` and hold them in the cut clipboard
    ///
    /// `roots` must already be ancestor-deduplicated. Affected parents are
    /// reindexed. Replaces the previous clipboard and undo record.
    pub fn cut(&mut self, store: &mut NodeStore, roots: &[NodeId]) -> Result<Vec<NodeId>> {
        let record = detach_all(store, roots, UndoKind::Cut)?;
        let cut: Vec<NodeId> = record.entries.iter().map(|entry| entry.node).collect();

        self.clipboard = Clipboard::Cut(cut.clone());
        self.undo = Some(record);
        self.collect_garbage(store);

        tracing::info!("Cut {} subtree(s)", cut.len());
        Ok(cut)
    }

    /// Mark `selected` as copied
    ///
    /// A collapsed selected node brings all its descendants along; an open
    /// one only contributes itself, since its children are rows of their
    /// own. Returns the marked nodes in pre-order.
    pub fn copy(&mut self, store: &mut NodeStore, selected: &HashSet<NodeId>) -> Vec<NodeId> {
        let mut marked: HashSet<NodeId> = HashSet::new();
        for id in selected.iter().filter(|id| store.is_attached(**id)) {
            marked.insert(*id);
            if !store.is_open(*id) {
                marked.extend(store.descendants(*id));
            }
        }

        let ordered: Vec<NodeId> = store
            .preorder()
            .into_iter()
            .filter(|id| marked.contains(id))
            .collect();

        self.clipboard = Clipboard::Copied(ordered.clone());
        self.collect_garbage(store);

        tracing::info!("Copied {} node(s)", ordered.len());
        ordered
    }

    /// Paste the clipboard under `target` (`None` is the top level)
    ///
    /// The target must be a container. Each root is checked against the
    /// target's children; a skip drops just that root, a cancel stops the
    /// paste with earlier roots left in place. The undo record is cleared.
    pub fn paste(
        &mut self,
        store: &mut NodeStore,
        target: Option<NodeId>,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<PasteOutcome> {
        if let Some(id) = target {
            if !store.is_attached(id) {
                return Err(TreeError::invalid_target(format!(
                    "paste target {} is not in the tree",
                    id
                )));
            }
        }
        if !store.is_container(target) {
            return Err(TreeError::invalid_target(format!(
                "paste target {} cannot hold children",
                target.map(|id| id.to_string()).unwrap_or_default()
            )));
        }

        let mut outcome = PasteOutcome::default();
        match self.clipboard.clone() {
            Clipboard::Empty => return Ok(outcome),
            Clipboard::Cut(roots) => {
                let mut remaining = Vec::new();
                for (position, id) in roots.iter().enumerate() {
                    if !store.is_detached_root(*id) {
                        tracing::warn!("Cut node {} is no longer detached; dropping it", id);
                        continue;
                    }
                    match store.reattach(*id, target, None, prompt)? {
                        Placement::Placed(id) => outcome.placed.push(id),
                        Placement::Skipped => {
                            outcome.skipped += 1;
                            remaining.push(*id);
                        }
                        Placement::Cancelled => {
                            outcome.cancelled = true;
                            remaining.extend_from_slice(&roots[position..]);
                            break;
                        }
                    }
                }
                self.clipboard = if remaining.is_empty() {
                    Clipboard::Empty
                } else {
                    Clipboard::Cut(remaining)
                };
            }
            Clipboard::Copied(marked) => {
                let marked: HashSet<NodeId> = marked.into_iter().collect();
                let stamp = self.timestamp();
                let templates = store.deep_copy(&marked, Some(stamp.as_str()));
                for template in &templates {
                    match store.insert_subtree(target, None, template, prompt)? {
                        Placement::Placed(id) => outcome.placed.push(id),
                        Placement::Skipped => outcome.skipped += 1,
                        Placement::Cancelled => {
                            outcome.cancelled = true;
                            break;
                        }
                    }
                }
            }
        }

        store.reindex(target)?;
        self.undo = None;
        self.collect_garbage(store);

        tracing::info!(
            "Pasted {} subtree(s), {} skipped{}",
            outcome.placed.len(),
            outcome.skipped,
            if outcome.cancelled { ", cancelled" } else { "" }
        );
        Ok(outcome)
    }

    /// Remove `roots` from the tree, keeping them only for undo
    pub fn delete(&mut self, store: &mut NodeStore, roots: &[NodeId]) -> Result<usize> {
        let record = detach_all(store, roots, UndoKind::Delete)?;
        let removed = record
            .entries
            .iter()
            .map(|entry| store.subtree_size(entry.node).unwrap_or(0) + 1)
            .sum();

        self.undo = Some(record);
        self.collect_garbage(store);

        tracing::info!("Deleted {} node(s)", removed);
        Ok(removed)
    }

    /// Put back everything the last cut or delete removed
    ///
    /// Entries are restored in ascending index order so each lands at its
    /// recorded position; labels are restored from the snapshot. Returns
    /// the restored subtree roots.
    pub fn undo(&mut self, store: &mut NodeStore) -> Result<Vec<NodeId>> {
        let Some(record) = self.undo.take() else {
            return Ok(Vec::new());
        };

        let mut entries = record.entries.clone();
        entries.sort_by_key(|entry| entry.index);

        let mut restored = Vec::new();
        for entry in entries {
            if !store.is_detached_root(entry.node) {
                tracing::warn!("Undo skipped {}: no longer detached", entry.node);
                continue;
            }
            if let Some(parent) = entry.parent {
                if !store.is_attached(parent) {
                    tracing::warn!("Undo skipped {}: parent {} is gone", entry.node, parent);
                    continue;
                }
            }
            store.restore(entry.node, entry.parent, entry.index)?;
            restored.push(entry.node);
        }
        store.restore_labels(&record.labels);

        if record.kind == UndoKind::Cut {
            if let Clipboard::Cut(roots) = &mut self.clipboard {
                roots.retain(|id| !restored.contains(id));
                if roots.is_empty() {
                    self.clipboard = Clipboard::Empty;
                }
            }
        }
        self.collect_garbage(store);

        tracing::info!("Undo restored {} subtree(s)", restored.len());
        Ok(restored)
    }

    /// Forget the undo record (any insert or move invalidates it)
    pub fn clear_undo(&mut self, store: &mut NodeStore) -> Vec<NodeId> {
        self.undo = None;
        self.collect_garbage(store)
    }

    /// Purge detached subtrees neither the clipboard nor undo references
    ///
    /// Returns every purged id so render caches can forget them.
    pub fn collect_garbage(&mut self, store: &mut NodeStore) -> Vec<NodeId> {
        let orphans: Vec<NodeId> = store
            .detached_roots()
            .iter()
            .copied()
            .filter(|id| {
                let cut = matches!(&self.clipboard, Clipboard::Cut(roots) if roots.contains(id));
                let undoable = self
                    .undo
                    .as_ref()
                    .map(|record| record.references(*id))
                    .unwrap_or(false);
                !cut && !undoable
            })
            .collect();

        let mut purged = Vec::new();
        for id in orphans {
            match store.purge(id) {
                Ok(ids) => purged.extend(ids),
                Err(e) => tracing::warn!("Failed to purge detached node {}: {}", id, e),
            }
        }
        if !purged.is_empty() {
            tracing::debug!("Purged {} unreferenced node(s)", purged.len());
        }
        purged
    }
}

/// Record positions and labels, then detach every root and reindex parents
fn detach_all(store: &mut NodeStore, roots: &[NodeId], kind: UndoKind) -> Result<UndoRecord> {
    let mut entries = Vec::new();
    for id in roots {
        if !store.is_attached(*id) {
            return Err(TreeError::node_not_found(id));
        }
        let index = store
            .index_of(*id)
            .ok_or_else(|| TreeError::node_not_found(id))?;
        entries.push(UndoEntry {
            node: *id,
            parent: store.parent(*id),
            index,
        });
    }

    let mut parents: Vec<Option<NodeId>> = Vec::new();
    for entry in &entries {
        if !parents.contains(&entry.parent) {
            parents.push(entry.parent);
        }
    }

    let labels = if parents.contains(&None) {
        store.labels_under(None)
    } else {
        let mut labels = Vec::new();
        for parent in parents.iter().flatten() {
            labels.extend(store.labels_under(Some(*parent)));
        }
        labels
    };

    for entry in &entries {
        store.detach(entry.node)?;
    }
    for parent in &parents {
        store.reindex(*parent)?;
    }

    Ok(UndoRecord {
        kind,
        entries,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::models::time::MockTimeProvider;
    use crate::models::NodeAttributes;
    use crate::surface::{PromptResponse, ScriptedPrompt};
    use chrono::{TimeZone, Utc};

    fn folder(text: &str, open: bool) -> NodeAttributes {
        NodeAttributes::new(text)
            .with_values(vec![String::new(), String::new(), "Folder".into(), String::new()])
            .with_open(open)
    }

    fn item(text: &str) -> NodeAttributes {
        NodeAttributes::new(text)
            .with_values(vec![String::new(), String::new(), "Item".into(), String::new()])
    }

    fn add(store: &mut NodeStore, parent: Option<NodeId>, attrs: NodeAttributes) -> NodeId {
        let mut prompt = ScriptedPrompt::silent();
        store
            .insert(parent, None, attrs, &mut prompt)
            .unwrap()
            .id()
            .unwrap()
    }

    fn engine() -> ClipboardEngine {
        let clock = MockTimeProvider::with_time(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        ClipboardEngine::new(Box::new(clock), "%Y-%m-%d")
    }

    struct Fixture {
        store: NodeStore,
        x: NodeId,
        x1: NodeId,
        x2: NodeId,
        y: NodeId,
        z: NodeId,
    }

    /// `X (closed) [x1, x2]`, `Y`, `Z (open, empty)` at the top level
    fn fixture() -> Fixture {
        let mut store = NodeStore::new(&TreeConfig::default());
        store.set_unique_text(true);
        let x = add(&mut store, None, folder("X", false));
        let x1 = add(&mut store, Some(x), item("x1"));
        let x2 = add(&mut store, Some(x), item("x2"));
        let y = add(&mut store, None, item("Y"));
        let z = add(&mut store, None, folder("Z", true));
        Fixture {
            store,
            x,
            x1,
            x2,
            y,
            z,
        }
    }

    #[test]
    fn test_cut_detaches_and_reindexes() {
        let mut f = fixture();
        let mut clip = engine();
        clip.cut(&mut f.store, &[f.x]).unwrap();

        assert!(!f.store.is_attached(f.x));
        assert!(clip.is_cut(&f.store, f.x2));
        assert_eq!(f.store.label(f.y), Some("0"));
        assert_eq!(f.store.label(f.z), Some("1"));
        assert_eq!(clip.undo_record().unwrap().kind, UndoKind::Cut);
    }

    #[test]
    fn test_copy_marks_descendants_of_closed_nodes() {
        let mut f = fixture();
        let mut clip = engine();
        let marked = clip.copy(&mut f.store, &HashSet::from([f.x, f.z]));
        assert_eq!(marked, vec![f.x, f.x1, f.x2, f.z]);
        assert!(clip.is_copied(f.x1));
    }

    #[test]
    fn test_paste_copy_builds_fresh_subtree() {
        let mut f = fixture();
        let mut clip = engine();
        clip.copy(&mut f.store, &HashSet::from([f.x]));

        let mut prompt = ScriptedPrompt::silent();
        let outcome = clip.paste(&mut f.store, Some(f.z), &mut prompt).unwrap();

        assert_eq!(outcome.placed.len(), 1);
        let copy = outcome.placed[0];
        assert_ne!(copy, f.x);
        let children = f.store.children(Some(copy)).unwrap().to_vec();
        assert_eq!(children.len(), 2);
        assert!(!children.contains(&f.x1) && !children.contains(&f.x2));
        assert_eq!(f.store.values(children[0]).unwrap()[1], clip.timestamp());
        assert!(matches!(clip.clipboard(), Clipboard::Copied(_)));
    }

    #[test]
    fn test_paste_into_leaf_is_rejected() {
        let mut f = fixture();
        let mut clip = engine();
        clip.copy(&mut f.store, &HashSet::from([f.x]));
        let mut prompt = ScriptedPrompt::silent();
        let result = clip.paste(&mut f.store, Some(f.y), &mut prompt);
        assert!(matches!(result, Err(TreeError::InvalidTarget(_))));
        assert_eq!(f.store.len(), 5);
    }

    #[test]
    fn test_paste_cut_moves_and_empties_clipboard() {
        let mut f = fixture();
        let mut clip = engine();
        clip.cut(&mut f.store, &[f.x]).unwrap();

        let mut prompt = ScriptedPrompt::silent();
        let outcome = clip.paste(&mut f.store, Some(f.z), &mut prompt).unwrap();

        assert_eq!(outcome.placed, vec![f.x]);
        assert_eq!(f.store.parent(f.x), Some(f.z));
        assert_eq!(f.store.subtree_size(f.z), Some(3));
        assert!(clip.clipboard().is_empty());
        assert!(clip.undo_record().is_none());
    }

    #[test]
    fn test_skipped_cut_nodes_stay_in_clipboard() {
        let mut f = fixture();
        add(&mut f.store, Some(f.z), item("Y"));
        let mut clip = engine();
        clip.cut(&mut f.store, &[f.x, f.y]).unwrap();

        let mut prompt = ScriptedPrompt::new([PromptResponse::Skip]);
        let outcome = clip.paste(&mut f.store, Some(f.z), &mut prompt).unwrap();

        assert_eq!(outcome.placed, vec![f.x]);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(clip.clipboard(), &Clipboard::Cut(vec![f.y]));
        assert!(f.store.contains(f.y));
    }

    #[test]
    fn test_cancel_keeps_earlier_placements() {
        let mut f = fixture();
        let w = add(&mut f.store, None, folder("W", true));
        add(&mut f.store, Some(w), item("Y"));
        let mut clip = engine();
        clip.copy(&mut f.store, &HashSet::from([f.x, f.y]));

        let mut prompt = ScriptedPrompt::new([PromptResponse::Cancel]);
        let outcome = clip.paste(&mut f.store, Some(w), &mut prompt).unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.placed.len(), 1);
        assert_eq!(f.store.subtree_size(w), Some(4));
    }

    #[test]
    fn test_undo_cut_restores_positions_and_labels() {
        let mut f = fixture();
        let before = f.store.labels_under(None);
        let mut clip = engine();
        clip.cut(&mut f.store, &[f.x, f.z]).unwrap();
        assert_eq!(f.store.roots(), &[f.y]);

        let restored = clip.undo(&mut f.store).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(f.store.roots(), &[f.x, f.y, f.z]);
        assert_eq!(f.store.labels_under(None), before);
        assert!(clip.clipboard().is_empty());
    }

    #[test]
    fn test_delete_then_undo() {
        let mut f = fixture();
        let mut clip = engine();
        let removed = clip.delete(&mut f.store, &[f.x1]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(f.store.label(f.x2), Some("0_0"));

        clip.undo(&mut f.store).unwrap();
        assert_eq!(f.store.children(Some(f.x)).unwrap(), &[f.x1, f.x2]);
        assert_eq!(f.store.label(f.x2), Some("0_1"));
        assert!(clip.undo(&mut f.store).unwrap().is_empty());
    }

    #[test]
    fn test_replaced_undo_record_purges_deleted_nodes() {
        let mut f = fixture();
        let mut clip = engine();
        clip.delete(&mut f.store, &[f.x]).unwrap();
        assert_eq!(f.store.arena_len(), 5);

        clip.delete(&mut f.store, &[f.y]).unwrap();
        assert!(!f.store.contains(f.x1));
        assert!(f.store.contains(f.y));
        assert_eq!(f.store.arena_len(), 2);
    }

    #[test]
    fn test_cut_nodes_survive_while_referenced() {
        let mut f = fixture();
        let mut clip = engine();
        clip.cut(&mut f.store, &[f.x]).unwrap();
        clip.clear_undo(&mut f.store);
        assert!(f.store.contains(f.x));

        // Copy replaces the clipboard; nothing references the cut subtree now
        clip.copy(&mut f.store, &HashSet::from([f.y]));
        assert!(!f.store.contains(f.x));
    }
}
