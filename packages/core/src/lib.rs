//! Treeview Core
//!
//! This crate provides the document model and editing engine behind a
//! tree-view control: nested folders and items with ordered siblings,
//! zebra-striped rows, multi-selection, and cut/copy/paste/delete with a
//! single level of undo.
//!
//! # Architecture
//!
//! - **Stable identity**: every node is keyed by an opaque [`NodeId`]; the
//!   order-derived label (`"0_3_1"`) is presentation only
//! - **Host-agnostic**: drawing and dialogs stay with the host behind the
//!   [`RenderSurface`] and [`ModalPrompt`] traits
//! - **Single-threaded**: one [`EditorSession`] owns the document and all
//!   editing state; no operation interleaves with another
//!
//! # Modules
//!
//! - [`models`] - Node identity, attributes, render state, document records
//! - [`store`] - Node Store (structure, labels, size bookkeeping)
//! - [`services`] - Tag Engine, selection, clipboard/undo, editor session
//! - [`conflict`] - Sibling-name conflict resolution protocol
//! - [`surface`] - Host interfaces and reference implementations
//! - [`config`] - Editor policy

pub mod config;
pub mod conflict;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod surface;

// Re-export commonly used types
pub use config::TreeConfig;
pub use error::{Result, TreeError};
pub use models::*;
pub use services::*;
pub use store::{NodeStore, Placement};
pub use surface::{ModalPrompt, RenderSurface};
