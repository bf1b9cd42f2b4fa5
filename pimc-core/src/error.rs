//! Error handling for this crate
//!
//! Shaped after `a653rs_linux_core::error`: a small closed taxonomy
//! ([`SystemError`]) combined with the underlying [`anyhow::Error`] that
//! explains it, so that callers at the binary boundary can map failures to
//! exit codes without losing the original diagnostic.

use thiserror::Error;

/// A `Result` whose error carries a [`SystemError`] classification.
pub type PimcResult<T> = Result<T, PimcError>;

/// The taxonomy from the error handling design: configuration errors are
/// rejected at startup, resource-acquisition errors are fatal before the
/// loop starts, transmit errors are fatal once running, dissection errors
/// are non-fatal warnings.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemError {
    #[error("configuration error")]
    Config,
    #[error("resource acquisition error")]
    Resource,
    #[error("transmit error")]
    Transmit,
    #[error("packet dissection error")]
    Dissection,
}

impl SystemError {
    /// Maps this error to the process exit code from the external interfaces
    /// contract: configuration errors exit 2, everything else exits 1.
    pub fn exit_code(self) -> i32 {
        match self {
            SystemError::Config => 2,
            SystemError::Resource | SystemError::Transmit | SystemError::Dissection => 1,
        }
    }
}

/// Combination of a [`SystemError`] with the [`anyhow::Error`] describing it.
#[derive(Error, Debug)]
#[error("{err}: {source}")]
pub struct PimcError {
    err: SystemError,
    #[source]
    source: anyhow::Error,
}

impl PimcError {
    pub fn new(err: SystemError, source: anyhow::Error) -> Self {
        Self { err, source }
    }

    pub fn err(&self) -> SystemError {
        self.err
    }

    pub fn source(&self) -> &anyhow::Error {
        &self.source
    }
}

/// Converts a fallible result into a [`PimcResult`] tagged with a
/// [`SystemError`] classification.
pub trait ResultExt<T> {
    fn typ(self, err: SystemError) -> PimcResult<T>;
}

impl<T, E: Into<anyhow::Error>> ResultExt<T> for Result<T, E> {
    fn typ(self, err: SystemError) -> PimcResult<T> {
        self.map_err(|e| PimcError {
            err,
            source: e.into(),
        })
    }
}
