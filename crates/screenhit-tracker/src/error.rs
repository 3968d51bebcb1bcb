use screenhit_core::PolygonError;

/// Errors while reading or writing calibration and tracker config files.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid screen depth {0} m (must be positive and finite)")]
    InvalidDepth(f64),
    #[error("invalid screen polygon: {0}")]
    InvalidPolygon(#[from] PolygonError),
    #[error("screen area needs 4 points, got {0}")]
    WrongPointCount(usize),
}

/// Errors from the hit evaluator.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitError {
    #[error("no screen calibration loaded")]
    CalibrationMissing,
}
