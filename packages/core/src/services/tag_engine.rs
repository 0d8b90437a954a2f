//! Tag Engine
//!
//! Derives the render state of every node and remembers which nodes changed
//! since the last flush to the render surface.
//!
//! # Parity
//!
//! Parity follows display order: the first visible row is `Odd` and every
//! following visible row flips it. A collapsed node's descendants take no
//! parity slot and carry no parity. Detached nodes carry no parity either.
//!
//! # Overlays
//!
//! At most one overlay per node. [`TagEngine::set_overlay`] replaces
//! whatever overlay the node had; the engine never stores two.

use crate::models::{NodeId, Overlay, Parity, RenderState};
use crate::store::NodeStore;
use crate::surface::RenderSurface;
use std::collections::{HashMap, HashSet};

/// Parity of every visible row, from a full display-order walk
pub fn compute_parity(store: &NodeStore) -> HashMap<NodeId, Parity> {
    let mut parity = Parity::Odd;
    let mut out = HashMap::new();
    for id in store.display_order() {
        out.insert(id, parity);
        parity = parity.flip();
    }
    out
}

/// Cache of render states with dirty tracking
#[derive(Debug, Default, Clone)]
pub struct TagEngine {
    states: HashMap<NodeId, RenderState>,
    dirty: HashSet<NodeId>,
}

impl TagEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current render state (default when the node was never tagged)
    pub fn state(&self, id: NodeId) -> RenderState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    pub fn parity(&self, id: NodeId) -> Option<Parity> {
        self.state(id).parity
    }

    pub fn overlay(&self, id: NodeId) -> Overlay {
        self.state(id).overlay
    }

    /// Nodes changed since the last flush
    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    fn update(&mut self, id: NodeId, state: RenderState) {
        let previous = self.states.insert(id, state);
        if previous.unwrap_or_default() != state {
            self.dirty.insert(id);
        }
    }

    fn set_parity(&mut self, id: NodeId, parity: Option<Parity>) {
        let state = self.state(id);
        self.update(id, RenderState::new(parity, state.overlay));
    }

    /// Apply `overlay`, replacing any overlay the node had
    pub fn set_overlay(&mut self, id: NodeId, overlay: Overlay) {
        let state = self.state(id);
        self.update(id, RenderState::new(state.parity, overlay));
    }

    /// Full recomputation
    ///
    /// Parity is rebuilt from display order. Overlays listed in `preserve`
    /// are kept, every other overlay is cleared. State for nodes that no
    /// longer exist is dropped. Calling it twice in a row changes nothing
    /// the second time.
    pub fn reset_tags(&mut self, store: &NodeStore, preserve: &[Overlay]) {
        self.states.retain(|id, _| store.contains(*id));
        self.dirty.retain(|id| store.contains(*id));

        let parities = compute_parity(store);
        let known: Vec<NodeId> = self
            .states
            .keys()
            .chain(parities.keys())
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        for id in known {
            let current = self.state(id);
            let overlay = if preserve.contains(&current.overlay) {
                current.overlay
            } else {
                Overlay::None
            };
            self.update(id, RenderState::new(parities.get(&id).copied(), overlay));
        }

        tracing::debug!(
            "Reset tags over {} visible row(s), {} pending update(s)",
            parities.len(),
            self.dirty.len()
        );
    }

    /// Recompute parity after `id` was expanded or collapsed
    ///
    /// When the visible row count under `id` changed by an even number the
    /// rows after the subtree keep their parity, so only the subtree is
    /// walked. Otherwise this falls back to [`reset_tags`](Self::reset_tags)
    /// with every overlay preserved.
    pub fn refresh_after_toggle(&mut self, store: &NodeStore, id: NodeId) {
        if !store.contains(id) {
            return;
        }

        let descendants = store.descendants(id);
        let parity = if store.is_shown(id) {
            self.parity(id)
        } else {
            None
        };

        let Some(parity) = parity else {
            for descendant in descendants {
                self.set_parity(descendant, None);
            }
            return;
        };

        let previously = descendants
            .iter()
            .filter(|d| self.parity(**d).is_some())
            .count();
        let visible = store.visible_descendants(id);

        if previously.abs_diff(visible.len()) % 2 != 0 {
            tracing::debug!(
                "Toggle of {} shifted rows by an odd count; full reset",
                id
            );
            self.reset_tags(store, &Overlay::ALL);
            return;
        }

        for descendant in descendants {
            self.set_parity(descendant, None);
        }
        let mut next = parity;
        for row in visible {
            next = next.flip();
            self.set_parity(row, Some(next));
        }
    }

    /// Send every changed render state to the surface; returns how many
    pub fn flush(&mut self, surface: &mut dyn RenderSurface) -> usize {
        let dirty: Vec<NodeId> = self.dirty.drain().collect();
        let mut sent = 0;
        for id in dirty {
            if let Some(state) = self.states.get(&id) {
                surface.set_visual_class(id, *state);
                sent += 1;
            }
        }
        sent
    }
}
