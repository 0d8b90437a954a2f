//! Treeview Dev Tools
//!
//! Development host for `treeview-core`: a line-oriented shell that loads a
//! document from disk, edits it through an [`EditorSession`], and saves it
//! back.
//!
//! [`EditorSession`]: treeview_core::EditorSession

pub mod persistence;
pub mod shell;

pub use persistence::{default_document_path, load_config, load_document, save_document};
pub use shell::{Command, LinePrompt, Outcome, Shell};
