// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use serde::{Deserialize, Serialize};
use tracing::log;
use crate::error::error_kind::ErrorKind;

/// Manages the store internal errors, that can be logged
///
/// `Clone` because a single producer failure is handed to every pull that
/// is waiting on (or arrives after) the failed upload.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StoreError {
    /// The kind of error
    pub kind: ErrorKind,

    /// General description of the error
    pub message: String,

    /// The original error we might want to log
    pub error: String,
}

impl fmt::Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "StoreError {{ kind: ErrorKind::{:#?}, message: {:?}, error: {:?} }}",
            self.kind, self.message, self.error
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.message, self.error)
    }
}

impl std::error::Error for StoreError {}

/// Converts from std::io::Error to module error
impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> StoreError {
        StoreError::new(ErrorKind::StorageError)
            .with_context("i/o failure")
            .with_error(e.to_string())
    }
}

/// Converts from config::ConfigError to module error
impl From<config::ConfigError> for StoreError {
    fn from(e: config::ConfigError) -> StoreError {
        StoreError::new(ErrorKind::ConfigError)
            .with_context("failed to load the application config")
            .with_error(e.to_string())
    }
}

impl StoreError {

    pub fn log(&self) {
        log::error!("{}", self)
    }

    /// Creates a new [`StoreError`]
    pub fn new(kind: ErrorKind) -> StoreError {
        StoreError { kind, message: Default::default(), error: Default::default() }
    }

    /// Adds additional context to the [`StoreError`]. The additional context will be appended to
    /// the end of the error's display string
    pub fn with_context<S>(mut self, context: S) -> StoreError
        where
            S: AsRef<str>
    {
        self.message = context.as_ref().to_string();
        self
    }

    /// Add the original error as string to the StoreError
    pub fn with_error<S>(mut self, error: S) -> StoreError where S: AsRef<str> {
        self.error = error.as_ref().to_string();
        self
    }
}
