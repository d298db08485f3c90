use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("cover image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("dehyphenation failed ({reason}) on {structure}")]
    Dehyphenation { reason: String, structure: String },

    #[error("rendered page has {actual} pixel bytes, expected {expected}")]
    MalformedRaster { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index task {task_uid} ended as {status}: {message}")]
    TaskFailed {
        task_uid: u64,
        status: String,
        message: String,
    },

    #[error("timed out after {seconds}s waiting for index task {task_uid}")]
    TaskTimeout { task_uid: u64, seconds: u64 },
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
