use soap_client::{SoapError, UnsupportedDataError};
use thiserror::Error;
use upnp_discovery::DescriptorBindingError;

/// Errors raised by a [`Router`](crate::Router) while moving messages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    /// The router was disabled or shut down while the operation was in flight
    #[error("Router operation interrupted")]
    Interrupted,

    /// The message could not be delivered
    #[error("Transport failure: {0}")]
    Transport(String),
}

impl From<SoapError> for RouterError {
    fn from(error: SoapError) -> Self {
        RouterError::Transport(error.to_string())
    }
}

/// No handler exists for an incoming message
#[derive(Error, Debug, Clone, PartialEq)]
#[error("No protocol for {method} {path}")]
pub struct ProtocolCreationError {
    pub method: String,
    pub path: String,
}

/// Errors that abort a protocol handler
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Sending a message through the router failed
    #[error(transparent)]
    Router(#[from] RouterError),

    /// A descriptor could not be generated or bound
    #[error(transparent)]
    Binding(#[from] DescriptorBindingError),

    /// A message body could not be read
    #[error(transparent)]
    UnsupportedData(#[from] UnsupportedDataError),

    /// The handler reached a state it cannot continue from
    #[error("Protocol failure: {0}")]
    Failed(String),
}

impl ProtocolError {
    /// True if the failure came from the router shutting down
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ProtocolError::Router(RouterError::Interrupted))
    }
}

/// Result type for protocol handlers
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interruption_is_recognized() {
        assert!(ProtocolError::from(RouterError::Interrupted).is_interrupted());
        assert!(!ProtocolError::from(RouterError::Transport("refused".to_string())).is_interrupted());
        assert!(!ProtocolError::Failed("boom".to_string()).is_interrupted());
    }

    #[test]
    fn test_soap_network_error_becomes_transport() {
        let error = RouterError::from(SoapError::Network("timed out".to_string()));
        assert!(matches!(error, RouterError::Transport(message) if message.contains("timed out")));
    }
}
