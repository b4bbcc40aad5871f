// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use serde::{Deserialize, Serialize};

const PRODUCER_ERROR:&str = "PRODUCER_ERROR";
const STORAGE_ERROR:&str = "STORAGE_ERROR";
const CONFIG_ERROR: &str = "CONFIG_ERROR";

/// Enum representing the various kinds of store errors
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorKind {

    /// The upstream producer of an upload terminated with a failure
    ProducerError,

    /// Reading or writing the stored object failed
    StorageError,

    /// Error loading config
    ConfigError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {

        let kind = match *self {
            ErrorKind::ProducerError => PRODUCER_ERROR,
            ErrorKind::StorageError => STORAGE_ERROR,
            ErrorKind::ConfigError => CONFIG_ERROR,
        };

        write!(f, "{}", kind)
    }
}
