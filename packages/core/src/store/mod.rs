//! Node Store
//!
//! Authoritative structure of the tree document: the node arena, parent and
//! child adjacency, synthetic labels, size bookkeeping, and the detached
//! subtrees held for the clipboard and undo.

mod node_store;

pub use node_store::{NodeStore, Placement};
