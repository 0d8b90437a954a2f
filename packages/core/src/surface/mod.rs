//! Host Interfaces
//!
//! The core never draws and never shows dialogs. It talks to the host through
//! two traits:
//!
//! - [`RenderSurface`] - row geometry/visibility queries and "set visual class"
//!   commands
//! - [`ModalPrompt`] - synchronous rename/skip/cancel negotiation
//!
//! Reference implementations ([`RowGridSurface`], [`ScriptedPrompt`]) back the
//! test suites and the line-oriented demo host.

mod prompt;
mod render;

pub use prompt::{ModalPrompt, PromptRequest, PromptResponse, ScriptedPrompt};
pub use render::{Point, Rect, RenderSurface, RowGridSurface};
