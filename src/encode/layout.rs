use crate::core::geometry::BBox;
use crate::core::model::{LayoutShape, Word};
use crate::error::{Result, RoutingError};

/// Float slack used when an edge is expected to land on a cell boundary.
pub const TOLERANCE: f64 = 0.00001;

/// Row-major occupancy grid produced by [`rasterize`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutGrid {
    shape: LayoutShape,
    cells: Vec<f64>,
}

impl LayoutGrid {
    pub fn zeros(shape: LayoutShape) -> Self {
        Self {
            shape,
            cells: vec![0.0; shape.cells()],
        }
    }

    pub fn shape(&self) -> LayoutShape {
        self.shape
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells[row * self.shape.cols() + col]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.cells
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.cells.chunks(self.shape.cols())
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    fn add(&mut self, row: usize, col: usize, weight: f64) {
        let cols = self.shape.cols();
        self.cells[row * cols + col] += weight;
    }
}

/// Cells touched by one box edge pair along a single axis.
#[derive(Debug, Clone, Copy)]
struct CellSpan {
    first: usize,
    last: usize,
    first_fraction: f64,
    last_fraction: f64,
}

impl CellSpan {
    fn new(start: f64, end: f64, cells: usize) -> Self {
        let first = (start.floor() as usize).min(cells - 1);
        let last = ((end + TOLERANCE).floor() as usize).min(cells - 1);

        let first_fraction = (first + 1) as f64 - start;
        let mut last_fraction = end - last as f64;
        if last_fraction <= TOLERANCE {
            last_fraction = 1.0;
        }

        Self {
            first,
            last,
            first_fraction,
            last_fraction,
        }
    }
}

/// Projects boxes onto a `shape` grid, accumulating fractional coverage.
///
/// The union of all boxes is stretched so that its edges land on the first
/// and last cell of each axis. Interior cells of a box get weight 1, border
/// cells get the fraction of the cell the box covers, and overlapping boxes
/// add up (the grid is not clamped).
pub fn rasterize(boxes: &[BBox], shape: LayoutShape) -> Result<LayoutGrid> {
    let content = BBox::enclosing(boxes).ok_or(RoutingError::EmptyInput)?;
    if content.width() <= 0 || content.height() <= 0 {
        return Err(RoutingError::DegenerateGeometry {
            width: content.width(),
            height: content.height(),
        });
    }

    let vertical_scaler = (shape.rows() - 1) as f64 / content.height() as f64;
    let horizontal_scaler = (shape.cols() - 1) as f64 / content.width() as f64;

    let mut grid = LayoutGrid::zeros(shape);

    for bbox in boxes {
        let rows = CellSpan::new(
            (bbox.top - content.top) as f64 * vertical_scaler,
            (bbox.bottom - content.top) as f64 * vertical_scaler,
            shape.rows(),
        );
        let cols = CellSpan::new(
            (bbox.left - content.left) as f64 * horizontal_scaler,
            (bbox.right - content.left) as f64 * horizontal_scaler,
            shape.cols(),
        );

        for ix in rows.first..=rows.last {
            for iy in cols.first..=cols.last {
                let mut value = 1.0;
                if ix == rows.first {
                    value *= rows.first_fraction;
                }
                if ix == rows.last {
                    value *= rows.last_fraction;
                }
                if iy == cols.first {
                    value *= cols.first_fraction;
                }
                if iy == cols.last {
                    value *= cols.last_fraction;
                }
                grid.add(ix, iy, value);
            }
        }
    }

    Ok(grid)
}

/// Rasterizes the bounding boxes of OCR words.
pub fn encode_layout(words: &[Word], shape: LayoutShape) -> Result<LayoutGrid> {
    let boxes: Vec<BBox> = words.iter().map(Word::bbox).collect();
    rasterize(&boxes, shape)
}
