//! Configuration of a running [`UpnpService`](crate::UpnpService).

use std::net::Ipv4Addr;
use std::time::Duration;

use stream_server::StreamServerConfig;
use upnp_registry::{ConfigError, UpnpConfig};

/// Everything needed to start a [`UpnpService`](crate::UpnpService)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Registry, protocol and executor settings
    pub upnp: UpnpConfig,

    /// HTTP listener serving descriptors, control, eventing and callbacks
    pub stream: StreamServerConfig,

    /// Join the SSDP multicast group and send datagrams
    /// Default: true
    pub ssdp_enabled: bool,

    /// Interface used for SSDP multicast membership and outgoing datagrams
    /// Default: 0.0.0.0 (chosen by the system)
    pub ssdp_interface: Ipv4Addr,

    /// How long an SSDP receive blocks before the listener checks for shutdown
    /// Default: 1 second
    pub socket_read_timeout: Duration,

    /// Connect timeout of outgoing HTTP requests
    /// Default: 5 seconds
    pub http_connect_timeout: Duration,

    /// Read timeout of outgoing HTTP requests
    /// Default: 10 seconds
    pub http_read_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upnp: UpnpConfig::default(),
            stream: StreamServerConfig::default(),
            ssdp_enabled: true,
            ssdp_interface: Ipv4Addr::UNSPECIFIED,
            socket_read_timeout: Duration::from_secs(1),
            http_connect_timeout: Duration::from_secs(5),
            http_read_timeout: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loopback-only HTTP and no SSDP; devices are reached by URL only
    pub fn loopback() -> Self {
        Self {
            upnp: UpnpConfig::resource_efficient(),
            stream: StreamServerConfig::loopback(),
            ssdp_enabled: false,
            ..Default::default()
        }
    }

    pub fn with_upnp(mut self, upnp: UpnpConfig) -> Self {
        self.upnp = upnp;
        self
    }

    pub fn with_stream(mut self, stream: StreamServerConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_ssdp_interface(mut self, interface: Ipv4Addr) -> Self {
        self.ssdp_interface = interface;
        self
    }

    pub fn without_ssdp(mut self) -> Self {
        self.ssdp_enabled = false;
        self
    }

    pub fn with_http_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.http_connect_timeout = connect;
        self.http_read_timeout = read;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upnp.validate()?;

        if self.socket_read_timeout == Duration::ZERO {
            return Err(ConfigError::Invalid(
                "Socket read timeout must be greater than 0".to_string(),
            ));
        }

        if self.http_connect_timeout == Duration::ZERO || self.http_read_timeout == Duration::ZERO {
            return Err(ConfigError::Invalid(
                "HTTP timeouts must be greater than 0".to_string(),
            ));
        }

        let (start, end) = self.stream.port_range;
        if start > end {
            return Err(ConfigError::Invalid(format!(
                "Stream server port range {}-{} is empty",
                start, end
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.ssdp_enabled);
        assert_eq!(config.stream.port_range, (3400, 3500));
    }

    #[test]
    fn test_loopback_preset() {
        let config = ServiceConfig::loopback();
        assert!(!config.ssdp_enabled);
        assert_eq!(config.stream.port_range, (0, 0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ServiceConfig::default();
        config.socket_read_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let config = ServiceConfig::default().with_http_timeouts(Duration::ZERO, Duration::from_secs(1));
        assert!(config.validate().is_err());

        let config = ServiceConfig::default().with_stream(StreamServerConfig::default().with_port_range(4000, 3000));
        assert!(config.validate().is_err());

        let mut upnp = UpnpConfig::default();
        upnp.search_mx = 0;
        assert!(ServiceConfig::default().with_upnp(upnp).validate().is_err());
    }
}
