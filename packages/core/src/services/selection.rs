//! Selection & Hit-Testing
//!
//! [`Selection`] is the committed set of selected nodes. [`DragSelect`] is
//! the per-gesture state of a rectangle drag: created on press, fed pointer
//! motion, consumed on release.

use crate::models::NodeId;
use crate::store::NodeStore;
use crate::surface::{Point, RenderSurface};
use std::collections::HashSet;

/// Committed multi-selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    members: HashSet<NodeId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &HashSet<NodeId> {
        &self.members
    }

    /// Replace the whole set; returns every node whose membership changed
    pub fn replace(&mut self, members: HashSet<NodeId>) -> Vec<NodeId> {
        let changed = self
            .members
            .symmetric_difference(&members)
            .copied()
            .collect();
        self.members = members;
        changed
    }

    /// Single-click: exactly `id` stays selected
    pub fn select_only(&mut self, id: NodeId) -> Vec<NodeId> {
        self.replace(HashSet::from([id]))
    }

    /// Modifier-click: flip `id`; returns whether it is now selected
    pub fn toggle(&mut self, id: NodeId) -> bool {
        if self.members.remove(&id) {
            false
        } else {
            self.members.insert(id);
            true
        }
    }

    pub fn insert(&mut self, id: NodeId) -> bool {
        self.members.insert(id)
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        self.members.remove(&id)
    }

    /// Empty the selection; returns the nodes that were selected
    pub fn clear(&mut self) -> Vec<NodeId> {
        self.members.drain().collect()
    }

    /// Add every attached node, open or not; returns the nodes added
    pub fn select_all(&mut self, store: &NodeStore) -> Vec<NodeId> {
        store
            .preorder()
            .into_iter()
            .filter(|id| self.members.insert(*id))
            .collect()
    }

    /// Drop members that are no longer attached; returns the dropped nodes
    pub fn retain_attached(&mut self, store: &NodeStore) -> Vec<NodeId> {
        let stale: Vec<NodeId> = self
            .members
            .iter()
            .filter(|id| !store.is_attached(**id))
            .copied()
            .collect();
        for id in &stale {
            self.members.remove(id);
        }
        stale
    }

    /// Selected nodes without a selected ancestor, in tree pre-order
    pub fn top_level(&self, store: &NodeStore) -> Vec<NodeId> {
        store.top_level_of(&self.members)
    }

    /// Move focus to the display-order predecessor and toggle it
    ///
    /// Returns the new focus, or `None` when `focus` is the first row.
    pub fn extend_up(&mut self, store: &NodeStore, focus: NodeId) -> Option<NodeId> {
        let target = store.prev(focus)?;
        self.toggle(target);
        Some(target)
    }

    /// Move focus to the display-order successor and toggle it
    pub fn extend_down(&mut self, store: &NodeStore, focus: NodeId) -> Option<NodeId> {
        let target = store.next(focus)?;
        self.toggle(target);
        Some(target)
    }
}

/// Visible rows among `rows` whose extent meets the band `[y0, y1]`
///
/// The band is normalized and clamped to the surface viewport first.
pub fn hit_test(surface: &dyn RenderSurface, rows: &[NodeId], y0: f64, y1: f64) -> Vec<NodeId> {
    let viewport = surface.viewport();
    let (low, high) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
    let low = low.clamp(viewport.top(), viewport.bottom());
    let high = high.clamp(viewport.top(), viewport.bottom());

    rows.iter()
        .copied()
        .filter(|id| surface.is_visible(*id))
        .filter(|id| {
            surface
                .bounds(*id)
                .map(|rect| rect.intersects_rows(low, high))
                .unwrap_or(false)
        })
        .collect()
}

/// Rows that entered or left the drag rectangle on one motion event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitDiff {
    pub entered: Vec<NodeId>,
    pub left: Vec<NodeId>,
}

impl HitDiff {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

/// Rectangle drag in progress
#[derive(Debug, Clone)]
pub struct DragSelect {
    anchor: Point,
    base: HashSet<NodeId>,
    hits: HashSet<NodeId>,
    moved: bool,
}

impl DragSelect {
    /// Start a drag at `anchor`; `base` is the selection held at press time
    pub fn begin(anchor: Point, base: HashSet<NodeId>) -> Self {
        Self {
            anchor,
            base,
            hits: HashSet::new(),
            moved: false,
        }
    }

    /// Whether any pointer motion was reported since the press
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Live selection: press-time selection plus the current hit-set
    pub fn selection(&self) -> HashSet<NodeId> {
        self.base.union(&self.hits).copied().collect()
    }

    /// Recompute the hit-set for the pointer at `pointer`
    ///
    /// Only the difference against the previous hit-set is reported; rows
    /// that were part of the press-time selection never count as left.
    pub fn update(
        &mut self,
        pointer: Point,
        rows: &[NodeId],
        surface: &dyn RenderSurface,
    ) -> HitDiff {
        let hits: HashSet<NodeId> = hit_test(surface, rows, self.anchor.y, pointer.y)
            .into_iter()
            .collect();

        let entered = hits
            .difference(&self.hits)
            .filter(|id| !self.base.contains(id))
            .copied()
            .collect();
        let left = self
            .hits
            .difference(&hits)
            .filter(|id| !self.base.contains(id))
            .copied()
            .collect();

        self.hits = hits;
        self.moved = true;
        HitDiff { entered, left }
    }

    /// End the gesture; the live selection becomes the committed one
    pub fn finish(self) -> HashSet<NodeId> {
        self.selection()
    }
}
