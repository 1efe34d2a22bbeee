//! Error types for the management API client.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, Report<ClientError>>;

/// Errors that can occur while talking to the array's management API.
#[derive(Debug, Display)]
pub enum ClientError {
    /// The HTTP client or base URL could not be built
    #[display("Failed to build client: {message}")]
    Build { message: String },

    /// Transport level failure (connect, TLS, timeout)
    #[display("Request to {url} failed")]
    Request { url: String },

    /// Non-success HTTP status
    #[display("HTTP error: {status} from {url}")]
    Status { status: u16, url: String },

    /// Body could not be decoded into the expected shape
    #[display("Failed to decode response from {url}")]
    Decode { url: String },
}

impl Error for ClientError {}
