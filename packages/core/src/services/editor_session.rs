//! Editor Session
//!
//! Owns the document and every piece of editing state (focus, selection,
//! clipboard, undo, render cache, deferred work) and translates host gestures
//! into store and clipboard operations.
//!
//! # Event Flow
//!
//! ```text
//! host event ──► handle()
//!                  ├─ run pending deferred tasks
//!                  ├─ dispatch: press/motion/release, key, menu, toggle
//!                  └─ sync(): lay out rows, flush changed render classes
//! ```
//!
//! Expand/collapse only records the new open state and queues the parity
//! refresh; it runs at the start of the next `handle()` (or when the host
//! calls [`EditorSession::run_deferred`]).
//!
//! Errors never escape `handle()`: invalid targets and stale ids are logged
//! and ignored.

use crate::config::TreeConfig;
use crate::error::{Result, TreeError};
use crate::models::time::{SystemTimeProvider, TimeProvider};
use crate::models::{NodeAttributes, NodeId, Overlay, TreeDocument};
use crate::services::clipboard::{ClipboardEngine, PasteOutcome};
use crate::services::selection::{hit_test, DragSelect, Selection};
use crate::services::tag_engine::TagEngine;
use crate::store::{NodeStore, Placement};
use crate::surface::{ModalPrompt, Point, PromptRequest, PromptResponse, RenderSurface};
use std::collections::{HashSet, VecDeque};

/// Keyboard bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Escape: drop the selection and reset tags
    Escape,
    /// Ctrl-A
    SelectAll,
    /// Ctrl-X
    Cut,
    /// Ctrl-C
    Copy,
    /// Ctrl-V
    Paste,
    /// Ctrl-Z
    Undo,
    /// Delete
    Delete,
    /// Shift-Up
    ExtendUp,
    /// Shift-Down
    ExtendDown,
}

/// Context menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    /// Right-click on a row focuses it before the menu opens
    Focus(NodeId),
    NewItem,
    NewFolder,
    Cut,
    Copy,
    Paste,
    Delete,
    Rename,
}

/// Discrete gesture reported by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// Button press; `toggle` is set while the toggle modifier is held
    Press { point: Point, toggle: bool },
    Motion { point: Point },
    Release { point: Point },
    Key(KeyCommand),
    Menu(MenuCommand),
    /// The user expanded or collapsed a node
    Toggle { id: NodeId, open: bool },
}

/// Work postponed until the host's layout settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    RefreshAfterToggle(NodeId),
}

pub struct EditorSession {
    store: NodeStore,
    tags: TagEngine,
    selection: Selection,
    focus: Option<NodeId>,
    clipboard: ClipboardEngine,
    config: TreeConfig,
    deferred: VecDeque<Deferred>,
    drag: Option<DragSelect>,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("nodes", &self.store.len())
            .field("selected", &self.selection.len())
            .field("focus", &self.focus)
            .field("clipboard", self.clipboard.clipboard())
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl EditorSession {
    pub fn new(store: NodeStore, config: TreeConfig) -> Self {
        Self::with_clock(store, config, Box::new(SystemTimeProvider))
    }

    /// Session whose timestamps come from `clock`
    pub fn with_clock(store: NodeStore, config: TreeConfig, clock: Box<dyn TimeProvider>) -> Self {
        let clipboard = ClipboardEngine::new(clock, config.timestamp_format.clone());
        let mut session = Self {
            store,
            tags: TagEngine::new(),
            selection: Selection::new(),
            focus: None,
            clipboard,
            config,
            deferred: VecDeque::new(),
            drag: None,
        };
        session.retag();
        session
    }

    pub fn from_document(document: &TreeDocument, config: TreeConfig) -> Self {
        let store = NodeStore::from_document(document, &config);
        Self::new(store, config)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn tags(&self) -> &TagEngine {
        &self.tags
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clipboard(&self) -> &ClipboardEngine {
        &self.clipboard
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn focus(&self) -> Option<NodeId> {
        self.focus
    }

    /// Focus a node; unknown or detached ids clear the focus
    pub fn set_focus(&mut self, id: Option<NodeId>) {
        self.focus = id.filter(|id| self.store.is_attached(*id));
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn to_document(&self) -> TreeDocument {
        self.store.to_document()
    }

    // =========================================================================
    // Host loop
    // =========================================================================

    /// Process one host event and push the resulting render changes
    pub fn handle(
        &mut self,
        event: HostEvent,
        surface: &mut dyn RenderSurface,
        prompt: &mut dyn ModalPrompt,
    ) {
        self.drain_deferred();

        let result = match event {
            HostEvent::Press { point, toggle } => {
                self.press(point, toggle, surface);
                Ok(())
            }
            HostEvent::Motion { point } => {
                self.motion(point, surface);
                Ok(())
            }
            HostEvent::Release { point } => {
                self.release(point, surface);
                Ok(())
            }
            HostEvent::Key(key) => self.key(key, prompt),
            HostEvent::Menu(command) => self.menu(command, prompt),
            HostEvent::Toggle { id, open } => self.toggle_open(id, open).map(|_| ()),
        };

        if let Err(e) = result {
            tracing::debug!("Ignoring {:?}: {}", event, e);
        }

        self.sync(surface);
    }

    /// Run queued deferred tasks and flush their render changes
    pub fn run_deferred(&mut self, surface: &mut dyn RenderSurface) -> usize {
        let ran = self.drain_deferred();
        self.tags.flush(surface);
        ran
    }

    /// Lay out the visible rows and send changed render classes
    pub fn sync(&mut self, surface: &mut dyn RenderSurface) -> usize {
        surface.rows_changed(&self.store.display_order());
        self.tags.flush(surface)
    }

    /// The incremental refresh needs a cache that matched the store right
    /// before its toggle, which only holds for a lone task. Several queued
    /// toggles collapse into one full reset.
    fn drain_deferred(&mut self) -> usize {
        let tasks: Vec<Deferred> = self.deferred.drain(..).collect();
        match tasks.as_slice() {
            [] => {}
            [Deferred::RefreshAfterToggle(id)] => {
                self.tags.refresh_after_toggle(&self.store, *id)
            }
            _ => {
                tracing::debug!("{} toggles queued; full parity reset", tasks.len());
                self.tags.reset_tags(&self.store, &Overlay::ALL);
            }
        }
        tasks.len()
    }

    fn key(&mut self, key: KeyCommand, prompt: &mut dyn ModalPrompt) -> Result<()> {
        match key {
            KeyCommand::Escape => self.escape(),
            KeyCommand::SelectAll => self.select_all(),
            KeyCommand::Cut => self.cut().map(|_| ())?,
            KeyCommand::Copy => {
                self.copy();
            }
            KeyCommand::Paste => self.paste(prompt).map(|_| ())?,
            KeyCommand::Undo => self.undo().map(|_| ())?,
            KeyCommand::Delete => self.delete().map(|_| ())?,
            KeyCommand::ExtendUp => {
                self.extend_up();
            }
            KeyCommand::ExtendDown => {
                self.extend_down();
            }
        }
        Ok(())
    }

    fn menu(&mut self, command: MenuCommand, prompt: &mut dyn ModalPrompt) -> Result<()> {
        match command {
            MenuCommand::Focus(id) => {
                if !self.store.is_attached(id) {
                    return Err(TreeError::node_not_found(id));
                }
                self.focus = Some(id);
            }
            MenuCommand::NewItem => self.create(false, prompt).map(|_| ())?,
            MenuCommand::NewFolder => self.create(true, prompt).map(|_| ())?,
            MenuCommand::Cut => self.cut().map(|_| ())?,
            MenuCommand::Copy => {
                self.copy();
            }
            MenuCommand::Paste => self.paste(prompt).map(|_| ())?,
            MenuCommand::Delete => self.delete().map(|_| ())?,
            MenuCommand::Rename => self.rename(prompt).map(|_| ())?,
        }
        Ok(())
    }

    // =========================================================================
    // Render state
    // =========================================================================

    /// Overlay implied by selection and clipboard state
    ///
    /// Selection wins over the clipboard marks so a selected row always
    /// shows as selected.
    fn derived_overlay(&self, id: NodeId) -> Overlay {
        if self.selection.contains(id) {
            Overlay::Selected
        } else if self.clipboard.is_cut(&self.store, id) {
            Overlay::Cut
        } else if self.clipboard.is_copied(id) {
            Overlay::Copied
        } else {
            Overlay::None
        }
    }

    fn refresh_overlays(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            let overlay = self.derived_overlay(id);
            self.tags.set_overlay(id, overlay);
        }
    }

    /// Full parity walk plus overlays re-derived for every node
    fn retag(&mut self) {
        self.tags.reset_tags(&self.store, &Overlay::ALL);
        let ids: Vec<NodeId> = self.store.ids().collect();
        self.refresh_overlays(ids);
    }

    // =========================================================================
    // Pointer
    // =========================================================================

    fn row_at(&self, point: Point, surface: &dyn RenderSurface) -> Option<NodeId> {
        let rows = self.store.display_order();
        hit_test(surface, &rows, point.y, point.y).into_iter().next()
    }

    /// Click selection, then start tracking a drag rectangle
    pub fn press(&mut self, point: Point, toggle: bool, surface: &dyn RenderSurface) {
        match self.row_at(point, surface) {
            Some(row) => {
                let changed = if toggle {
                    self.selection.toggle(row);
                    vec![row]
                } else {
                    self.selection.select_only(row)
                };
                self.focus = Some(row);
                self.refresh_overlays(changed);
            }
            None if !toggle => {
                let changed = self.selection.clear();
                self.refresh_overlays(changed);
            }
            None => {}
        }

        // A plain press starts a fresh rectangle; a toggle press extends
        let base = if toggle {
            self.selection.members().clone()
        } else {
            HashSet::new()
        };
        self.drag = Some(DragSelect::begin(point, base));
    }

    /// Reconcile the live selection with the drag rectangle
    pub fn motion(&mut self, point: Point, surface: &dyn RenderSurface) {
        let rows = self.store.display_order();
        let Some(drag) = self.drag.as_mut() else {
            return;
        };

        let diff = drag.update(point, &rows, surface);
        if !diff.is_empty() {
            tracing::trace!(
                "Drag band: {} row(s) entered, {} left",
                diff.entered.len(),
                diff.left.len()
            );
        }
        // The press-time row may drop out without ever being a hit
        let changed = self.selection.replace(drag.selection());
        self.refresh_overlays(changed);
    }

    /// Finish the drag; its final hit-set becomes the committed selection
    ///
    /// A release without any motion is a plain click and leaves the
    /// selection made on press untouched.
    pub fn release(&mut self, point: Point, surface: &dyn RenderSurface) {
        let rows = self.store.display_order();
        let Some(mut drag) = self.drag.take() else {
            return;
        };
        if !drag.has_moved() {
            return;
        }

        drag.update(point, &rows, surface);
        let changed = self.selection.replace(drag.finish());
        self.refresh_overlays(changed);
    }

    // =========================================================================
    // Selection commands
    // =========================================================================

    /// Drop the selection and reset tags, keeping the configured overlays
    pub fn escape(&mut self) {
        self.drag = None;
        let cleared = self.selection.clear();
        self.tags
            .reset_tags(&self.store, &self.config.preserve_on_escape);

        // A deselected row that is still on the clipboard shows that mark again
        for id in cleared {
            let overlay = self.derived_overlay(id);
            if self.config.preserve_on_escape.contains(&overlay) {
                self.tags.set_overlay(id, overlay);
            }
        }
    }

    pub fn select_all(&mut self) {
        let added = self.selection.select_all(&self.store);
        tracing::debug!("Selected all ({} added)", added.len());
        self.refresh_overlays(added);
    }

    /// Click on a row without pointer geometry
    pub fn click(&mut self, id: NodeId, toggle: bool) -> Result<()> {
        if !self.store.is_attached(id) {
            return Err(TreeError::node_not_found(id));
        }
        let changed = if toggle {
            self.selection.toggle(id);
            vec![id]
        } else {
            self.selection.select_only(id)
        };
        self.focus = Some(id);
        self.refresh_overlays(changed);
        Ok(())
    }

    pub fn extend_up(&mut self) -> Option<NodeId> {
        let focus = self.focus?;
        let target = self.selection.extend_up(&self.store, focus)?;
        self.focus = Some(target);
        self.refresh_overlays([target]);
        Some(target)
    }

    pub fn extend_down(&mut self) -> Option<NodeId> {
        let focus = self.focus?;
        let target = self.selection.extend_down(&self.store, focus)?;
        self.focus = Some(target);
        self.refresh_overlays([target]);
        Some(target)
    }

    /// Expand or collapse a node and queue the parity refresh
    pub fn toggle_open(&mut self, id: NodeId, open: bool) -> Result<bool> {
        let changed = self.store.set_open(id, open)?;
        if changed {
            self.deferred.push_back(Deferred::RefreshAfterToggle(id));
        }
        Ok(changed)
    }

    // =========================================================================
    // Clipboard commands
    // =========================================================================

    /// Where focus goes once `first` and its selected siblings are removed
    fn focus_after_removal(&self, first: NodeId) -> Option<NodeId> {
        let parent = self.store.parent(first);
        match self.store.index_of(first) {
            Some(index) if index > 0 => self
                .store
                .children(parent)
                .ok()
                .and_then(|siblings| siblings.get(index - 1).copied()),
            _ => parent,
        }
    }

    /// Detach the selection's top-level nodes into the cut clipboard
    pub fn cut(&mut self) -> Result<Vec<NodeId>> {
        let roots = self.selection.top_level(&self.store);
        let Some(first) = roots.first().copied() else {
            return Ok(Vec::new());
        };

        let focus = self.focus_after_removal(first);
        let cut = self.clipboard.cut(&mut self.store, &roots)?;
        self.focus = focus;
        self.selection.retain_attached(&self.store);
        self.retag();
        Ok(cut)
    }

    /// Mark the selection as copied
    pub fn copy(&mut self) -> Vec<NodeId> {
        let selected: HashSet<NodeId> = self.selection.members().clone();
        if selected.is_empty() {
            return Vec::new();
        }
        let marked = self.clipboard.copy(&mut self.store, &selected);
        self.retag();
        marked
    }

    /// Paste under the focused node (the top level when nothing is focused)
    pub fn paste(&mut self, prompt: &mut dyn ModalPrompt) -> Result<PasteOutcome> {
        let target = self.focus;
        let outcome = self.clipboard.paste(&mut self.store, target, prompt)?;

        match target {
            Some(target) => {
                self.selection.select_only(target);
            }
            None => {
                self.selection.clear();
            }
        }
        self.retag();
        Ok(outcome)
    }

    /// Permanently remove the selection's top-level nodes (undoable once)
    pub fn delete(&mut self) -> Result<usize> {
        let roots = self.selection.top_level(&self.store);
        let Some(first) = roots.first().copied() else {
            return Ok(0);
        };

        let focus = self.focus_after_removal(first);
        let removed = self.clipboard.delete(&mut self.store, &roots)?;
        self.focus = focus;
        self.selection.retain_attached(&self.store);
        self.retag();
        Ok(removed)
    }

    /// Restore the most recent cut or delete
    pub fn undo(&mut self) -> Result<Vec<NodeId>> {
        let restored = self.clipboard.undo(&mut self.store)?;
        for root in &restored {
            self.selection.remove(*root);
            for descendant in self.store.descendants(*root) {
                self.selection.remove(descendant);
            }
        }
        self.retag();
        Ok(restored)
    }

    // =========================================================================
    // Structural commands
    // =========================================================================

    /// Insert a node directly; invalidates the undo record
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        index: Option<usize>,
        attrs: NodeAttributes,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<Placement> {
        let placement = self.store.insert(parent, index, attrs, prompt)?;
        if placement.id().is_some() {
            self.clipboard.clear_undo(&mut self.store);
            self.retag();
        }
        Ok(placement)
    }

    /// Re-parent a node; invalidates the undo record
    pub fn move_node(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        index: Option<usize>,
        prompt: &mut dyn ModalPrompt,
    ) -> Result<Placement> {
        let old_parent = self.store.parent(id);
        let placement = self.store.move_node(id, new_parent, index, prompt)?;
        if placement.id().is_some() {
            self.store.reindex(old_parent)?;
            self.clipboard.clear_undo(&mut self.store);
            self.retag();
        }
        Ok(placement)
    }

    /// "Create New Item" / "Create New Folder"
    ///
    /// Asks for a name, then inserts next to or under the focused node:
    /// into it when it is a container, otherwise right after it. A blank
    /// name, skip or cancel aborts.
    pub fn create(&mut self, folder: bool, prompt: &mut dyn ModalPrompt) -> Result<Option<NodeId>> {
        let (title, kind) = if folder {
            ("Add Folder", self.config.container_kind.clone())
        } else {
            ("Add Item", self.config.leaf_kind.clone())
        };

        let request = PromptRequest::new(title, "Enter a name", "");
        let name = match prompt.request(&request) {
            PromptResponse::Rename { value } if !value.trim().is_empty() => value.trim().to_string(),
            _ => {
                tracing::debug!("{} aborted", title);
                return Ok(None);
            }
        };

        let (parent, index) = match self.focus.filter(|id| self.store.is_attached(*id)) {
            None => (None, None),
            Some(focus) if self.store.is_container(Some(focus)) => (Some(focus), None),
            Some(focus) => (
                self.store.parent(focus),
                self.store.index_of(focus).map(|index| index + 1),
            ),
        };

        let schema = self.store.schema().clone();
        let mut attrs = NodeAttributes::new(name)
            .with_values(schema.blank_values())
            .with_open(folder);
        if let Some(column) = schema.kind_column {
            attrs.set_value(column, kind);
        }
        if let Some(column) = schema.modified_column {
            attrs.set_value(column, self.clipboard.timestamp());
        }

        let placement = self.insert(parent, index, attrs, prompt)?;
        let Some(id) = placement.id() else {
            return Ok(None);
        };

        if let Some(parent) = parent {
            if !self.store.is_open(parent) {
                self.store.set_open(parent, true)?;
                self.retag();
            }
        }
        self.focus = Some(id);
        let changed = self.selection.select_only(id);
        self.refresh_overlays(changed);
        Ok(Some(id))
    }

    /// Rename the focused node through the prompt
    pub fn rename(&mut self, prompt: &mut dyn ModalPrompt) -> Result<Placement> {
        let Some(id) = self.focus.filter(|id| self.store.is_attached(*id)) else {
            return Err(TreeError::invalid_target("nothing focused to rename"));
        };

        let current = self.store.text(id).unwrap_or_default().to_string();
        let request = PromptRequest::new("Rename", "Enter a new name", current.clone());
        let name = match prompt.request(&request) {
            PromptResponse::Rename { value } if !value.trim().is_empty() => value.trim().to_string(),
            PromptResponse::Skip => return Ok(Placement::Skipped),
            _ => return Ok(Placement::Cancelled),
        };

        if name == current {
            return Ok(Placement::Placed(id));
        }
        self.store.rename(id, &name, prompt)
    }
}

#[cfg(test)]
#[path = "editor_session_test.rs"]
mod editor_session_test;
