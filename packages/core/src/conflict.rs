//! Conflict Resolution Protocol
//!
//! Whenever a structural operation would give two siblings the same text
//! under a uniqueness-constrained text column, the offending name is shown to
//! the host's modal prompt and the operation blocks until the user answers:
//!
//! - `RENAME value` - retry the uniqueness check with `value`, looping until
//!   the name is free or the user escalates
//! - `SKIP` - abandon only the node being placed
//! - `CANCEL` - abort the whole enclosing operation
//!
//! Blank replacement strings are treated as "ask again".

use crate::surface::{ModalPrompt, PromptRequest, PromptResponse};

/// Title of the conflict prompt
pub const CONFLICT_TITLE: &str = "Name Conflict";

/// Outcome of a uniqueness negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Name that is free among the siblings (possibly the original)
    Unique(String),
    Skip,
    Cancel,
}

/// Negotiate a sibling-unique name
///
/// `is_taken` reports whether a candidate collides with an existing sibling.
/// The prompt is consulted only when `proposed` collides.
pub fn resolve_unique_name<F>(
    prompt: &mut dyn ModalPrompt,
    proposed: &str,
    is_taken: F,
) -> Resolution
where
    F: Fn(&str) -> bool,
{
    let mut candidate = proposed.to_string();
    let mut rounds = 0usize;

    while is_taken(&candidate) {
        rounds += 1;
        let request = PromptRequest::new(
            CONFLICT_TITLE,
            format!(
                "An item named \"{}\" already exists in this location. \
                 Enter a different name, or skip this item.",
                candidate
            ),
            candidate.clone(),
        );

        match prompt.request(&request) {
            PromptResponse::Rename { value } => {
                let value = value.trim();
                if !value.is_empty() {
                    candidate = value.to_string();
                }
            }
            PromptResponse::Skip => {
                tracing::debug!("Name conflict on '{}' skipped", candidate);
                return Resolution::Skip;
            }
            PromptResponse::Cancel => {
                tracing::debug!("Name conflict on '{}' cancelled", candidate);
                return Resolution::Cancel;
            }
        }
    }

    if rounds > 0 {
        tracing::debug!(
            "Name conflict on '{}' resolved as '{}' after {} prompt(s)",
            proposed,
            candidate,
            rounds
        );
    }

    Resolution::Unique(candidate)
}
