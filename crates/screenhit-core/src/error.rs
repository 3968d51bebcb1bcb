/// Errors produced when wrapping raw frame buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame buffer length (expected {expected} elements, got {got})")]
    BufferLength { expected: usize, got: usize },

    #[error("invalid frame dimensions (width={width}, height={height})")]
    ZeroDimension { width: usize, height: usize },
}

/// Errors produced when building a screen polygon.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PolygonError {
    #[error("screen polygon needs at least 3 vertices (got {got})")]
    TooFewVertices { got: usize },

    #[error("screen polygon vertex {index} is not finite")]
    NonFiniteVertex { index: usize },
}
