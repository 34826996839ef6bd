use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Request rejected by the generation service: {0}")]
    BadRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation did not finish within {retries} polls")]
    Timeout { retries: u32 },

    #[error("Generation failed remotely with status {status:?}")]
    RemoteFailure { status: Option<String> },

    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("Unsupported depth format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Depth model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Depth estimator is already running an inference")]
    Busy,

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
