//! Error types for SSDP and descriptor binding.

use thiserror::Error;
use upnp_model::InvalidValueError;

/// Error type for SSDP datagram handling.
#[derive(Debug, Error)]
pub enum SsdpError {
    /// The datagram is not a NOTIFY, M-SEARCH or HTTP response
    #[error("Invalid SSDP datagram: {0}")]
    InvalidDatagram(String),
    /// A header value could not be interpreted
    #[error("Invalid SSDP header value: {0}")]
    InvalidHeader(#[from] InvalidValueError),
    /// Socket creation, multicast membership or send/receive failure
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),
}

/// Error type for reading and writing descriptor XML.
#[derive(Debug, Error)]
pub enum DescriptorBindingError {
    /// The document is not well-formed or does not match the descriptor schema
    #[error("Failed to parse descriptor XML: {0}")]
    Xml(String),
    /// A required value is absent
    #[error("Descriptor is missing {0}")]
    MissingValue(&'static str),
    /// A value is present but cannot be interpreted
    #[error("Descriptor contains an invalid value: {0}")]
    InvalidValue(#[from] InvalidValueError),
    /// A URL in the descriptor cannot be resolved
    #[error("Descriptor contains an invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Convenience Result type alias for SSDP operations.
pub type Result<T> = std::result::Result<T, SsdpError>;
