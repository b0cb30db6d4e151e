use thiserror::Error;
use upnp_model::ServiceReference;

#[derive(Error, Debug)]
pub enum UpnpError {
    #[error("Configuration error: {0}")]
    Config(#[from] upnp_registry::ConfigError),

    #[error("Registration error: {0}")]
    Registration(#[from] upnp_registry::RegistrationError),

    #[error("Stream server error: {0}")]
    StreamServer(#[from] stream_server::ServerError),

    #[error("SSDP error: {0}")]
    Ssdp(#[from] upnp_discovery::SsdpError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] upnp_protocol::ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No known remote device offers the service
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceReference),

    /// The service declares no usable URL for the requested exchange
    #[error("Service {reference} has no valid {kind} URL")]
    InvalidServiceUrl {
        reference: ServiceReference,
        kind: &'static str,
    },

    #[error("Service is shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, UpnpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use upnp_model::{ServiceId, Udn};

    #[test]
    fn test_error_messages() {
        let reference = ServiceReference::new(Udn::new("renderer"), ServiceId::uda("AVTransport"));
        let error = UpnpError::InvalidServiceUrl {
            reference,
            kind: "control",
        };
        assert!(error.to_string().contains("has no valid control URL"));
        assert_eq!(UpnpError::ShutDown.to_string(), "Service is shut down");
    }

    #[test]
    fn test_conversions() {
        let error: UpnpError = upnp_registry::ConfigError::Invalid("bad".to_string()).into();
        assert!(matches!(error, UpnpError::Config(_)));

        let error: UpnpError = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken").into();
        assert!(matches!(error, UpnpError::Io(_)));
    }
}
