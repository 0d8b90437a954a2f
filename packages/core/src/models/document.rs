//! Serialized Document Records
//!
//! The serialization boundary exchanges the tree as
//! `{ headings: [...], columns: [...], data: [...] }` where `data` is a nested
//! list of node records. Decoding is lenient so documents written by older
//! hosts load unchanged:
//!
//! - `open` and `stretch` accept booleans or `0`/`1`
//! - non-string values are coerced to strings (`null` becomes `""`)
//! - unknown keys (`tags`, `image`, ...) are ignored
//!
//! Ids are not part of the record; they are regenerated on load.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Column heading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub text: String,

    #[serde(default = "default_anchor")]
    pub anchor: String,

    /// Explicit column key; positional (`#0`, `#1`, ...) when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Heading {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            anchor: default_anchor(),
            column: None,
        }
    }
}

fn default_anchor() -> String {
    "w".to_string()
}

/// Column geometry and constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default)]
    pub minwidth: u32,

    #[serde(default, deserialize_with = "bool_or_int")]
    pub stretch: bool,

    /// Sibling values in this column must be unique (only honored on `#0`)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Column {
    pub fn new(width: u32, stretch: bool) -> Self {
        Self {
            width,
            minwidth: 3,
            stretch,
            unique: false,
            column: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

fn default_width() -> u32 {
    100
}

/// One node and, recursively, its children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub text: String,

    #[serde(default, deserialize_with = "bool_or_int")]
    pub open: bool,

    #[serde(default, deserialize_with = "lenient_values")]
    pub values: Vec<String>,

    /// Absent for leaves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeRecord>>,
}

impl NodeRecord {
    pub fn leaf(text: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            text: text.into(),
            open: false,
            values,
            children: None,
        }
    }

    pub fn branch(
        text: impl Into<String>,
        open: bool,
        values: Vec<String>,
        children: Vec<NodeRecord>,
    ) -> Self {
        Self {
            text: text.into(),
            open,
            values,
            children: Some(children),
        }
    }
}

/// Whole serialized tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeDocument {
    #[serde(default)]
    pub headings: Vec<Heading>,

    #[serde(default)]
    pub columns: Vec<Column>,

    #[serde(default)]
    pub data: Vec<NodeRecord>,
}

impl TreeDocument {
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether the text column (`#0`) is flagged unique
    pub fn text_is_unique(&self) -> bool {
        self.columns.first().map(|c| c.unique).unwrap_or(false)
    }

    /// Total number of node records
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&NodeRecord> = self.data.iter().collect();
        while let Some(record) = stack.pop() {
            count += 1;
            if let Some(children) = &record.children {
                stack.extend(children.iter());
            }
        }
        count
    }

    /// Stock explorer document: two folders of photos, one nested folder
    ///
    /// `stamp` fills the "Date Modified" column of every record.
    pub fn sample(stamp: &str) -> Self {
        let folder = || vec![String::new(), stamp.to_string(), "Folder".into(), String::new()];
        let item = |size: &str| {
            vec![
                String::new(),
                stamp.to_string(),
                "Item".to_string(),
                size.to_string(),
            ]
        };

        Self {
            headings: ["Name", "IID", "Date Modified", "Type", "Size"]
                .into_iter()
                .map(Heading::new)
                .collect(),
            columns: vec![
                Column::new(180, false).unique(),
                Column::new(80, false),
                Column::new(120, false),
                Column::new(100, false),
                Column::new(100, true),
            ],
            data: vec![
                NodeRecord::branch(
                    "Folder 0",
                    true,
                    folder(),
                    vec![
                        NodeRecord::leaf("photo1.png", item("2.6 KB")),
                        NodeRecord::leaf("photo2.png", item("2.6 KB")),
                        NodeRecord::leaf("photo3.png", item("2.7 KB")),
                        NodeRecord::branch(
                            "Folder 0_1",
                            true,
                            folder(),
                            vec![
                                NodeRecord::leaf("photo1.png", item("2.6 KB")),
                                NodeRecord::leaf("photo2.png", item("2.6 KB")),
                                NodeRecord::leaf("photo3.png", item("2.8 KB")),
                            ],
                        ),
                    ],
                ),
                NodeRecord::branch(
                    "Folder 1",
                    true,
                    folder(),
                    vec![
                        NodeRecord::leaf("photo4.png", item("2.6 KB")),
                        NodeRecord::leaf("photo5.png", item("2.6 KB")),
                        NodeRecord::leaf("photo6.png", item("2.9 KB")),
                    ],
                ),
            ],
        }
    }
}

/// Accept `true`/`false`, integers (non-zero is true), or strings like `"1"`
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "yes"),
        _ => false,
    })
}

/// Accept any JSON scalars and coerce them to strings
fn lenient_values<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        // Older hosts wrote an empty string for "no values"
        Value::String(s) if s.is_empty() => Vec::new(),
        other => vec![other],
    };

    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_decoding_is_lenient() {
        let record: NodeRecord = serde_json::from_value(json!({
            "text": "Folder 0",
            "image": "",
            "open": 1,
            "tags": ["odd"],
            "values": ["I001", 12, null, "Folder"]
        }))
        .unwrap();

        assert!(record.open);
        assert_eq!(record.values, vec!["I001", "12", "", "Folder"]);
        assert!(record.children.is_none());
    }

    #[test]
    fn test_leaf_serializes_without_children_key() {
        let record = NodeRecord::leaf("a.txt", vec![]);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("children").is_none());
        assert_eq!(json["open"], json!(false));
    }

    #[test]
    fn test_column_unique_flag_omitted_when_false() {
        let json = serde_json::to_value(Column::new(100, true)).unwrap();
        assert!(json.get("unique").is_none());
        let json = serde_json::to_value(Column::new(100, true).unique()).unwrap();
        assert_eq!(json["unique"], json!(true));
    }

    #[test]
    fn test_stretch_accepts_tk_style_flags() {
        let column: Column =
            serde_json::from_value(json!({"width": 80, "minwidth": 3, "stretch": 0})).unwrap();
        assert!(!column.stretch);
        let column: Column = serde_json::from_value(json!({"stretch": "1"})).unwrap();
        assert!(column.stretch);
        assert_eq!(column.width, 100);
    }

    #[test]
    fn test_sample_document_shape() {
        let doc = TreeDocument::sample("01/01/2025 10:00:00");
        assert_eq!(doc.headings.len(), 5);
        assert_eq!(doc.columns.len(), 5);
        assert!(doc.text_is_unique());
        assert_eq!(doc.data.len(), 2);
        assert_eq!(doc.node_count(), 12);
    }

    #[test]
    fn test_document_json_round_trip() {
        let doc = TreeDocument::sample("01/01/2025 10:00:00");
        let json = doc.to_json_string_pretty().unwrap();
        let back = TreeDocument::from_json_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
