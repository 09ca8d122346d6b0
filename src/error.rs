// Error module: one closed enumeration for everything that can end an
// invocation early. Every variant is terminal; the binary turns it into a
// single `[program] message` line and exit status 255.

use thiserror::Error;

/// Exit status used for every failed invocation (the classic `-1`).
pub const FAILURE_STATUS: u8 = 255;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or malformed course/assignment on the command line.
    #[error("{0}")]
    Usage(String),

    /// Startup configuration is missing or unreadable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The filename listing could not be obtained for the assignment.
    #[error("Unable to query file names")]
    Discovery,

    /// The service listed a filename that is not a plain local file name.
    #[error("Refusing unsafe file name from server: {0:?}")]
    UnsafeFilename(String),

    /// The HTTP client could not be constructed or the request could not be
    /// assembled.
    #[error("Unable to initialize client")]
    TransportInit(#[source] Option<reqwest::Error>),

    /// One or more upload parts could not be attached or sent.
    #[error("Unable to upload file(s): {}", .filenames.join(" "))]
    Upload { filenames: Vec<String> },

    /// Any other failure to talk to the service.
    #[error("Unable to connect to server")]
    Connectivity(#[source] Option<reqwest::Error>),

    /// Writing to the invoker's output failed.
    #[error("Unable to write output")]
    Output(#[from] std::io::Error),

    /// The request ran past the configured timeout.
    #[error("Unable to connect to server (timed out after {0}s)")]
    Timeout(u64),
}

impl ClientError {
    /// `Timeout` is reported as a flavour of connectivity failure.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Connectivity(_) | ClientError::Timeout(_))
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
