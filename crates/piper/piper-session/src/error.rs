#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] piper_transport::TransportError),

    #[error(transparent)]
    Pacing(#[from] piper_pacing::PacingError),

    #[error("end of stream")]
    EndOfStream,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
