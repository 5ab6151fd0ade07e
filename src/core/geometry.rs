use serde::{Deserialize, Serialize};

/// Axis-aligned pixel box, `(top, left)` is the origin corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BBox {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Builds a box from the `[left, top, width, height]` form OCR services emit.
    pub fn from_ltwh(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Smallest box holding every input box, `None` for an empty slice.
    pub fn enclosing(boxes: &[BBox]) -> Option<Self> {
        let (first, rest) = boxes.split_first()?;
        Some(rest.iter().fold(*first, |acc, b| acc.union(b)))
    }
}
