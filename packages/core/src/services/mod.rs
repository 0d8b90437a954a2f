//! Editing Services
//!
//! This module contains the logic layered over the Node Store:
//!
//! - `TagEngine` - zebra parity and selected/cut/copied overlays per node
//! - `Selection` / `DragSelect` - multi-selection and rectangle hit-testing
//! - `ClipboardEngine` - cut, copy, paste, delete and single-level undo
//! - `EditorSession` - translates host gestures into the operations above
//!
//! Services never draw. Render classes reach the host through
//! [`RenderSurface`](crate::surface::RenderSurface) and naming conflicts
//! through [`ModalPrompt`](crate::surface::ModalPrompt).

pub mod clipboard;
pub mod editor_session;
pub mod selection;
pub mod tag_engine;

pub use clipboard::{Clipboard, ClipboardEngine, PasteOutcome, UndoEntry, UndoKind, UndoRecord};
pub use editor_session::{Deferred, EditorSession, HostEvent, KeyCommand, MenuCommand};
pub use selection::{hit_test, DragSelect, HitDiff, Selection};
pub use tag_engine::{compute_parity, TagEngine};
