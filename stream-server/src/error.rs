use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Nothing in the configured port range could be bound
    #[error("No available port found in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    /// No address to advertise in callback and descriptor URLs
    #[error("Failed to detect local IP address")]
    LocalAddress,

    /// The HTTP listener could not be started
    #[error("Failed to bind stream server: {0}")]
    Bind(#[from] warp::Error),

    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = ServerError::NoAvailablePort { start: 3400, end: 3500 };
        assert_eq!(error.to_string(), "No available port found in range 3400-3500");
        assert_eq!(ServerError::LocalAddress.to_string(), "Failed to detect local IP address");
    }
}
