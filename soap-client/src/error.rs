//! Error types for the SOAP client

use thiserror::Error;

/// Malformed or unparseable message content, with the offending body attached
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnsupportedDataError {
    pub message: String,
    /// The raw body that failed to parse
    pub data: String,
}

impl UnsupportedDataError {
    pub fn new(message: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: data.into(),
        }
    }
}

/// Errors that can occur during HTTP stream communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// Network or HTTP communication error, no response was received
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body could not be read or decoded
    #[error(transparent)]
    UnsupportedData(#[from] UnsupportedDataError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_data_keeps_body() {
        let error = UnsupportedDataError::new("Missing SOAP Body", "<Envelope/>");
        assert_eq!(error.to_string(), "Missing SOAP Body");
        assert_eq!(error.data, "<Envelope/>");

        let soap: SoapError = error.into();
        assert_eq!(soap.to_string(), "Missing SOAP Body");
    }
}
