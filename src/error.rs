use thiserror::Error;

/// The distinct failure kinds the driver must tell apart, printed as a
/// single human-readable line and mapped to a nonzero exit status.
#[derive(Debug, Error)]
pub enum MiniLightError {
    #[error("file error: {0}")]
    File(#[source] std::io::Error),

    #[error("I/O read error: {0}")]
    ReadIo(#[source] std::io::Error),

    #[error("truncated model file")]
    Truncated,

    #[error("invalid model syntax: {0}")]
    InvalidModel(String),

    #[error("I/O write error: {0}")]
    WriteIo(#[source] std::io::Error),

    #[error("unrecognised model format")]
    UnrecognizedFormat,

    #[error("storage allocation error")]
    Alloc,
}

pub type Result<T> = std::result::Result<T, MiniLightError>;
