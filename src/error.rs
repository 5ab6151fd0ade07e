use thiserror::Error;

/// Errors raised by the encoding and routing core.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no bounding boxes to rasterize")]
    EmptyInput,

    #[error("degenerate content box: {width}x{height} pixels")]
    DegenerateGeometry { width: i64, height: i64 },

    #[error("invalid layout shape {rows}x{cols}: both dimensions must be at least 1")]
    InvalidShape { rows: usize, cols: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed model document: {0}")]
    Format(String),

    #[error("cannot decode classifier blob: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;
