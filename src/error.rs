//! Error taxonomy of the record engine.
//!
//! Structural corruption, old-format input and encryption failures are fatal
//! and surface as distinct variants. Recoverable data-quality problems never
//! reach this type: they are logged and skipped where they occur.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PptError {
    /// Missing bookkeeping records, unrepairable edit chain, record overrun.
    #[error("corrupt container: {0}")]
    Corrupt(String),

    /// Predecessor (PowerPoint 95) container.
    #[error("unsupported old PowerPoint format: {0}")]
    OldFormat(String),

    /// Wrong or missing password, verifier mismatch, unreadable descriptor.
    #[error("encrypted document: {0}")]
    Encrypted(String),

    #[error("record at offset {offset} declares {len} bytes, limit is {limit}")]
    RecordTooLarge { offset: usize, len: usize, limit: usize },

    #[error("document stream of {len} bytes exceeds limit {limit}")]
    DocumentTooLarge { len: usize, limit: usize },

    #[error("stream '{0}' not found")]
    MissingStream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PptError {
    pub(crate) fn corrupt<S: Into<String>>(msg: S) -> Self {
        PptError::Corrupt(msg.into())
    }

    pub(crate) fn encrypted<S: Into<String>>(msg: S) -> Self {
        PptError::Encrypted(msg.into())
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, PptError::Corrupt(_))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, PptError::Encrypted(_))
    }
}

pub type Result<T> = std::result::Result<T, PptError>;
