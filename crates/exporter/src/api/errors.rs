use core::error::Error;

/// API errors
#[derive(Debug, derive_more::Display)]
pub enum ApiError {
    #[display("Server error: {message}")]
    ServerError { message: String },
    #[display("Bad target {target}")]
    BadTarget { target: String },
}

impl Error for ApiError {}
