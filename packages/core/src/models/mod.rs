//! Data Models
//!
//! This module contains the data structures shared by the Node Store and the
//! editing services:
//!
//! - `NodeId`, `NodeAttributes`, `Node`, `NodeTemplate` - identity and node data
//! - `RenderState`, `Parity`, `Overlay` - derived render classification
//! - `TreeDocument` and friends - the serialization boundary
//! - `ValueSchema` - meaning of the positional `values` record
//! - `time` - clock abstraction for timestamp columns

mod document;
mod node;
mod render_state;
mod schema;
pub mod time;

pub use document::{Column, Heading, NodeRecord, TreeDocument};
pub use node::{Node, NodeAttributes, NodeId, NodeTemplate};
pub use render_state::{Overlay, Parity, RenderState};
pub use schema::ValueSchema;
