//! Modal prompt contract
//!
//! Request `{ title, message, currentValue }`, response
//! `{ kind: RENAME, value } | { kind: SKIP } | { kind: CANCEL }`. The call is
//! synchronous from the core's point of view and may block indefinitely.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Question shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub title: String,
    pub message: String,
    pub current_value: String,
}

impl PromptRequest {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        current_value: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            current_value: current_value.into(),
        }
    }
}

/// User's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptResponse {
    /// Retry with a replacement string
    Rename { value: String },
    /// Abandon only the node being placed
    Skip,
    /// Abort the whole enclosing operation
    Cancel,
}

impl PromptResponse {
    pub fn rename(value: impl Into<String>) -> Self {
        Self::Rename {
            value: value.into(),
        }
    }
}

/// Host capability that answers prompts
pub trait ModalPrompt {
    fn request(&mut self, request: &PromptRequest) -> PromptResponse;
}

impl<F> ModalPrompt for F
where
    F: FnMut(&PromptRequest) -> PromptResponse,
{
    fn request(&mut self, request: &PromptRequest) -> PromptResponse {
        self(request)
    }
}

/// Prompt that replays a queue of canned answers
///
/// Answers `Cancel` once the queue runs dry, so a script that is too short
/// aborts instead of looping. Every request is recorded for inspection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    responses: VecDeque<PromptResponse>,
    requests: Vec<PromptRequest>,
}

impl ScriptedPrompt {
    pub fn new(responses: impl IntoIterator<Item = PromptResponse>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            requests: Vec::new(),
        }
    }

    /// Prompt that must never be consulted; answers `Cancel` if it is
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: PromptResponse) {
        self.responses.push_back(response);
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> &[PromptRequest] {
        &self.requests
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl ModalPrompt for ScriptedPrompt {
    fn request(&mut self, request: &PromptRequest) -> PromptResponse {
        self.requests.push(request.clone());
        self.responses.pop_front().unwrap_or(PromptResponse::Cancel)
    }
}
