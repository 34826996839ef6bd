use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Usage: {0}")]
    Usage(String),
}
