//! Render surface contract and a fixed-row-height reference surface

use crate::models::{NodeId, RenderState};
use std::collections::HashMap;

/// Pointer position in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the half-open vertical extent `[top, bottom)` meets `[y0, y1]`
    pub fn intersects_rows(&self, y0: f64, y1: f64) -> bool {
        self.top() <= y1 && y0 < self.bottom()
    }

    pub fn contains_y(&self, y: f64) -> bool {
        self.top() <= y && y < self.bottom()
    }
}

/// What the core needs from the widget that displays the tree
pub trait RenderSurface {
    /// Whether the row is currently laid out inside the viewport
    fn is_visible(&self, id: NodeId) -> bool;

    /// Pixel bounding box of the row, if it is laid out
    fn bounds(&self, id: NodeId) -> Option<Rect>;

    /// Scrollable viewport; drag rectangles are clamped to it
    fn viewport(&self) -> Rect;

    /// Apply a render class to one row
    fn set_visual_class(&mut self, id: NodeId, state: RenderState);

    /// Notification that the visible rows changed, in display order
    fn rows_changed(&mut self, _rows: &[NodeId]) {}
}

/// Surface with uniform row height below a fixed header
///
/// Rows are stacked in the order passed to `rows_changed`. The row height
/// defaults to the common font linespace plus line padding.
#[derive(Debug, Clone)]
pub struct RowGridSurface {
    row_height: f64,
    header_height: f64,
    viewport: Rect,
    scroll_offset: f64,
    rows: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
    classes: HashMap<NodeId, RenderState>,
    class_updates: usize,
}

impl RowGridSurface {
    pub const DEFAULT_ROW_HEIGHT: f64 = 23.0;

    pub fn new(row_height: f64, header_height: f64, viewport: Rect) -> Self {
        Self {
            row_height,
            header_height,
            viewport,
            scroll_offset: 0.0,
            rows: Vec::new(),
            positions: HashMap::new(),
            classes: HashMap::new(),
            class_updates: 0,
        }
    }

    /// Surface with no header whose viewport fits `visible_rows` rows
    pub fn with_rows(row_height: f64, visible_rows: usize) -> Self {
        Self::new(
            row_height,
            0.0,
            Rect::new(0.0, 0.0, 400.0, row_height * visible_rows as f64),
        )
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset.max(0.0);
    }

    pub fn rows(&self) -> &[NodeId] {
        &self.rows
    }

    /// Last class applied to the row
    pub fn class_of(&self, id: NodeId) -> Option<RenderState> {
        self.classes.get(&id).copied()
    }

    /// Number of `set_visual_class` calls received so far
    pub fn class_updates(&self) -> usize {
        self.class_updates
    }

    /// Vertical center of the row at `position`, handy for synthesizing pointer events
    pub fn row_center(&self, position: usize) -> Point {
        let top = self.row_top(position);
        Point::new(self.viewport.x + 10.0, top + self.row_height / 2.0)
    }

    /// Row under the pointer, if any
    pub fn row_at(&self, point: Point) -> Option<NodeId> {
        if !self.viewport.contains_y(point.y) {
            return None;
        }
        let offset = point.y - self.viewport.y - self.header_height + self.scroll_offset;
        if offset < 0.0 {
            return None;
        }
        let position = (offset / self.row_height).floor() as usize;
        self.rows.get(position).copied()
    }

    fn row_top(&self, position: usize) -> f64 {
        self.viewport.y + self.header_height + position as f64 * self.row_height
            - self.scroll_offset
    }
}

impl RenderSurface for RowGridSurface {
    fn is_visible(&self, id: NodeId) -> bool {
        match self.bounds(id) {
            Some(rect) => rect.intersects_rows(self.viewport.top(), self.viewport.bottom()),
            None => false,
        }
    }

    fn bounds(&self, id: NodeId) -> Option<Rect> {
        let position = *self.positions.get(&id)?;
        Some(Rect::new(
            self.viewport.x,
            self.row_top(position),
            self.viewport.width,
            self.row_height,
        ))
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn set_visual_class(&mut self, id: NodeId, state: RenderState) {
        self.class_updates += 1;
        self.classes.insert(id, state);
    }

    fn rows_changed(&mut self, rows: &[NodeId]) {
        self.rows = rows.to_vec();
        self.positions = rows.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        self.classes.retain(|id, _| self.positions.contains_key(id));
    }
}
