//! Value Schema
//!
//! Node `values` are a positional record. The schema names the slots the core
//! cares about; everything else in the record is carried through untouched.

use serde::{Deserialize, Serialize};

/// Positions of the semantic fields inside a node's `values`
///
/// The default layout matches the stock explorer columns:
/// `[label, date modified, type, size]`. The size slot is document data the
/// core never touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSchema {
    /// Slot mirroring the node's synthetic label
    #[serde(default)]
    pub label_column: Option<usize>,

    /// Slot stamped with the modification time on copy and create
    #[serde(default)]
    pub modified_column: Option<usize>,

    /// Slot holding the node kind (e.g. "Folder", "Item")
    #[serde(default)]
    pub kind_column: Option<usize>,

    /// Number of slots in a fresh record
    pub width: usize,
}

impl Default for ValueSchema {
    fn default() -> Self {
        Self {
            label_column: Some(0),
            modified_column: Some(1),
            kind_column: Some(2),
            width: 4,
        }
    }
}

impl ValueSchema {
    /// Empty record of `width` slots
    pub fn blank_values(&self) -> Vec<String> {
        vec![String::new(); self.width]
    }

    /// Validate that every declared slot lies inside the record
    pub fn validate(&self) -> Result<(), String> {
        let slots = [
            ("label_column", self.label_column),
            ("modified_column", self.modified_column),
            ("kind_column", self.kind_column),
        ];

        for (name, slot) in slots {
            if let Some(index) = slot {
                if index >= self.width {
                    return Err(format!(
                        "{} ({}) is outside the record width {}",
                        name, index, self.width
                    ));
                }
            }
        }

        let mut used: Vec<usize> = slots.iter().filter_map(|(_, slot)| *slot).collect();
        used.sort_unstable();
        if used.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err("value columns must not share a slot".to_string());
        }

        Ok(())
    }
}
