use std::io;

/// Error kinds raised by the backer/medium/transport layers. Each variant is
/// raised by exactly one layer and carries enough context for a caller to
/// decide whether to resync, retry, or abort.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("platform does not provide lock-free 64-bit atomics")]
    AtomicsNotLockFree,

    #[error("a writer session is already active")]
    ConcurrentSession,

    #[error("session id {provided} does not match the live session {live}")]
    StaleSession { provided: u64, live: u64 },

    #[error("position {position} is outside the visible window [{start}, {end})")]
    InvalidPosition {
        position: u64,
        start: u64,
        end: u64,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
