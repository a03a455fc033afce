use burn::{config::ConfigError, record::RecorderError};

use crate::canvas::CanvasError;

/// Failures of the preprocessing + inference contract.
///
/// Absent input is not an error; see [`crate::inference::classify`].
#[derive(thiserror::Error, Debug)]
pub enum InferenceError {
    #[error("invalid canvas: {0}")]
    Canvas(#[from] CanvasError),

    #[error("resampled image is {width}x{height}, expected {expected}x{expected}")]
    ImageSize {
        width: u32,
        height: u32,
        expected: usize,
    },

    #[error("classifier input has shape {actual:?}, expected {expected:?}")]
    InputShape {
        expected: [usize; 4],
        actual: Vec<usize>,
    },

    #[error("classifier returned {0} scores, expected one per digit")]
    OutputSize(usize),

    #[error("classifier returned a non-finite score for label {0}")]
    NonFinite(usize),

    #[error("classifier output could not be read: {0}")]
    Output(String),

    #[error("inference panicked: {0}")]
    Panicked(String),

    #[error("inference worker is not running")]
    WorkerUnavailable,
}

/// Failures reading or writing the training artifacts.
#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("model record error: {0}")]
    Record(#[from] RecorderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("metric log error: {0}")]
    MetricLog(String),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("{0} is not empty and holds no previous training run")]
    Occupied(String),
}
