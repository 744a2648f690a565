#[derive(Debug, thiserror::Error)]
pub enum PacingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("timer error: {0}")]
    Timer(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PacingError>;
