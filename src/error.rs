//! Error types for the RTC client adapter
//!
//! Errors originate from the wrapped RTC engine; this layer does not retry,
//! classify, or recover. Every engine failure is carried to the caller
//! unmodified inside one of the variants below. The single exception is
//! remote-stream subscription, which is logged and swallowed (see
//! [`crate::session::StreamSession::subscribe_to_remote_stream`]).

use thiserror::Error;

use crate::sdk::SdkError;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur in the RTC client adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The engine reported a failure while initializing a client
    #[error("engine initialization failed: {source}")]
    InitFailed {
        /// The engine's failure value, unmodified
        #[source]
        source: SdkError,
    },

    /// The engine reported a failure while initializing a local stream
    #[error("local stream initialization failed: {source}")]
    StreamInitFailed {
        /// The engine's failure value, unmodified
        #[source]
        source: SdkError,
    },

    /// Any other engine failure, passed through unchanged
    #[error("engine error: {0}")]
    Sdk(#[from] SdkError),

    /// An operation was invoked in a state it cannot run in
    #[error("invalid state: {message}")]
    InvalidState {
        /// What the caller got wrong
        message: String,
    },
}

impl AdapterError {
    /// Wrap an engine failure raised during client initialization
    pub fn init_failed(source: SdkError) -> Self {
        Self::InitFailed { source }
    }

    /// Wrap an engine failure raised during local stream initialization
    pub fn stream_init_failed(source: SdkError) -> Self {
        Self::StreamInitFailed { source }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
