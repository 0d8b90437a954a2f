//! Render State
//!
//! Every node's visual classification is `Parity × Overlay`. Parity is the
//! zebra stripe assigned by display order (absent when the row is hidden);
//! the overlay is at most one of selected/cut/copied.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zebra-stripe classification of a visible row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    pub fn flip(self) -> Self {
        match self {
            Self::Odd => Self::Even,
            Self::Even => Self::Odd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Odd => "odd",
            Self::Even => "even",
        }
    }
}

/// Temporary classification layered over parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overlay {
    #[default]
    None,
    Selected,
    Cut,
    Copied,
}

impl Overlay {
    /// Every overlay that can be applied to a node
    pub const ALL: [Overlay; 3] = [Overlay::Selected, Overlay::Cut, Overlay::Copied];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Selected => "selected",
            Self::Cut => "cut",
            Self::Copied => "copied",
        }
    }
}

/// Effective render class of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderState {
    /// `None` while the row is hidden under a collapsed ancestor or detached
    pub parity: Option<Parity>,
    pub overlay: Overlay,
}

impl RenderState {
    pub fn new(parity: Option<Parity>, overlay: Overlay) -> Self {
        Self { parity, overlay }
    }

    /// Space separated class names, e.g. `"odd selected"`
    pub fn class_name(&self) -> String {
        let parts: Vec<&str> = [
            self.parity.map(|p| p.as_str()).unwrap_or(""),
            self.overlay.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
        parts.join(" ")
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name())
    }
}
