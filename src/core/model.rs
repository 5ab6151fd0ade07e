use serde::{Deserialize, Serialize};

use crate::core::geometry::BBox;
use crate::error::{Result, RoutingError};

/// A word found by OCR: its text and pixel bounding box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
}

impl Word {
    pub fn new(text: impl Into<String>, left: i64, right: i64, top: i64, bottom: i64) -> Self {
        Self {
            text: text.into(),
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.left, self.top, self.right, self.bottom)
    }
}

impl AsRef<str> for Word {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Target `(rows, cols)` of the layout grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[usize; 2]", into = "[usize; 2]")]
pub struct LayoutShape {
    rows: usize,
    cols: usize,
    cells: usize,
}

impl LayoutShape {
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        match rows.checked_mul(cols) {
            Some(cells) if cells > 0 => Ok(Self { rows, cols, cells }),
            _ => Err(RoutingError::InvalidShape { rows, cols }),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> usize {
        self.cells
    }
}

impl TryFrom<[usize; 2]> for LayoutShape {
    type Error = RoutingError;

    fn try_from([rows, cols]: [usize; 2]) -> Result<Self> {
        Self::new(rows, cols)
    }
}

impl From<LayoutShape> for [usize; 2] {
    fn from(shape: LayoutShape) -> Self {
        [shape.rows, shape.cols]
    }
}

impl std::fmt::Display for LayoutShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Predicted layout label and the classifier's confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub probability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn word_exposes_its_box() {
        let word = Word::new("total", 3, 40, 7, 19);
        assert_eq!(word.bbox(), BBox::new(3, 7, 40, 19));
    }

    #[test]
    fn rejects_empty_shape() {
        assert!(matches!(
            LayoutShape::new(0, 5),
            Err(RoutingError::InvalidShape { rows: 0, cols: 5 })
        ));
    }

    #[test]
    fn rejects_overflowing_shape() {
        let side = usize::MAX / 2;
        assert!(matches!(
            LayoutShape::new(side, 3),
            Err(RoutingError::InvalidShape { cols: 3, .. })
        ));
        assert_eq!(LayoutShape::new(side, 2).unwrap().cells(), side * 2);
    }

    #[test]
    fn shape_serializes_as_pair() {
        let shape = LayoutShape::new(50, 40).unwrap();
        let json = serde_json::to_string(&shape).unwrap();
        assert_eq!(json, "[50,40]");
        let back: LayoutShape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shape);
        assert!(serde_json::from_str::<LayoutShape>("[0,4]").is_err());
    }
}
