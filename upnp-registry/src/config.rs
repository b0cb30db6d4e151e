//! Configuration for the UPnP stack
//!
//! [`UpnpConfig`] holds every tunable used by the registry, its maintainer and
//! the protocol handlers that read their settings through the registry.

use std::time::Duration;

use upnp_model::{Headers, ServiceType};

use crate::error::ConfigError;

/// Default max-age announced for local devices and used for unknown remote ones
pub const DEFAULT_MAX_AGE_SECONDS: u32 = 1800;

/// Configuration for the registry and protocol layer
#[derive(Debug, Clone)]
pub struct UpnpConfig {
    /// Interval between maintenance sweeps
    /// Default: 1 second
    pub maintenance_interval: Duration,

    /// Replaces the max-age of every remote device when set
    /// Default: None
    pub remote_device_max_age_override: Option<u32>,

    /// Service types whose advertisements are acted on.
    /// `None` disables discovery, an empty list accepts everything.
    /// Default: Some(empty)
    pub exclusive_service_types: Option<Vec<ServiceType>>,

    /// Extra headers sent with every descriptor GET
    /// Default: none
    pub descriptor_retrieval_headers: Headers,

    /// Extra headers sent with every outgoing SUBSCRIBE
    /// Default: none
    pub event_subscription_headers: Headers,

    /// Forces the duration granted to incoming subscriptions
    /// Default: None (grant what was requested, or the default duration)
    pub received_subscription_timeout: Option<u32>,

    /// Duration requested for, and granted to, subscriptions without an explicit timeout
    /// Default: 1800 seconds
    pub default_subscription_duration: u32,

    /// How many times each alive/byebye datagram is sent
    /// Default: 3
    pub notification_bulk_repeats: u32,

    /// Pause between repeated alive/byebye datagrams
    /// Default: 150 milliseconds
    pub notification_bulk_interval: Duration,

    /// How many times each M-SEARCH datagram is sent
    /// Default: 3
    pub search_bulk_repeats: u32,

    /// Pause between repeated M-SEARCH datagrams
    /// Default: 500 milliseconds
    pub search_bulk_interval: Duration,

    /// MX value of outgoing searches
    /// Default: 3 seconds
    pub search_mx: u32,

    /// Workers running asynchronous protocols (searches, notifications, retrievals)
    /// Default: 8
    pub async_protocol_threads: usize,

    /// Workers running synchronous protocols for inbound HTTP requests
    /// Default: 4
    pub sync_protocol_threads: usize,

    /// Workers delivering registry listener callbacks
    /// Default: 2
    pub registry_listener_threads: usize,

    /// Path prefix under which local resources are served
    /// Default: "/dev"
    pub namespace_base_path: String,

    /// SERVER / USER-AGENT token
    /// Default: "<os>/1.0 UPnP/1.0 upnp-stack/<version>"
    pub server_token: String,
}

impl Default for UpnpConfig {
    fn default() -> Self {
        Self {
            maintenance_interval: Duration::from_secs(1),
            remote_device_max_age_override: None,
            exclusive_service_types: Some(Vec::new()),
            descriptor_retrieval_headers: Headers::new(),
            event_subscription_headers: Headers::new(),
            received_subscription_timeout: None,
            default_subscription_duration: DEFAULT_MAX_AGE_SECONDS,
            notification_bulk_repeats: 3,
            notification_bulk_interval: Duration::from_millis(150),
            search_bulk_repeats: 3,
            search_bulk_interval: Duration::from_millis(500),
            search_mx: 3,
            async_protocol_threads: 8,
            sync_protocol_threads: 4,
            registry_listener_threads: 2,
            namespace_base_path: "/dev".to_string(),
            server_token: format!(
                "{}/1.0 UPnP/1.0 upnp-stack/{}",
                std::env::consts::OS,
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl UpnpConfig {
    /// Create a new UpnpConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a UpnpConfig that never acts on advertisements
    pub fn discovery_disabled() -> Self {
        Self {
            exclusive_service_types: None,
            ..Default::default()
        }
    }

    /// Create a UpnpConfig with small worker pools
    pub fn resource_efficient() -> Self {
        Self {
            async_protocol_threads: 2,
            sync_protocol_threads: 1,
            registry_listener_threads: 1,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maintenance_interval == Duration::ZERO {
            return Err(ConfigError::Invalid(
                "Maintenance interval must be greater than 0".to_string(),
            ));
        }

        if self.default_subscription_duration == 0 {
            return Err(ConfigError::Invalid(
                "Default subscription duration must be greater than 0".to_string(),
            ));
        }

        if self.received_subscription_timeout == Some(0) {
            return Err(ConfigError::Invalid(
                "Received subscription timeout must be greater than 0".to_string(),
            ));
        }

        if self.notification_bulk_repeats == 0 || self.search_bulk_repeats == 0 {
            return Err(ConfigError::Invalid(
                "Bulk repeats must be greater than 0".to_string(),
            ));
        }

        if self.search_mx == 0 {
            return Err(ConfigError::Invalid("Search MX must be at least 1".to_string()));
        }

        if self.async_protocol_threads == 0 || self.sync_protocol_threads == 0 || self.registry_listener_threads == 0 {
            return Err(ConfigError::Invalid(
                "Executor pool sizes must be greater than 0".to_string(),
            ));
        }

        if !self.namespace_base_path.starts_with('/') || self.namespace_base_path.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "Namespace base path '{}' must start with '/' and not end with one",
                self.namespace_base_path
            )));
        }

        Ok(())
    }

    /// Whether an advertisement whose USN carries `service_type` may be acted on
    pub fn is_discovery_allowed(&self, service_type: Option<&ServiceType>) -> bool {
        match &self.exclusive_service_types {
            None => false,
            Some(allowed) if allowed.is_empty() => true,
            Some(allowed) => service_type
                .map(|candidate| allowed.iter().any(|entry| candidate.implements_version(entry)))
                .unwrap_or(false),
        }
    }

    /// Whether a service of a discovered device is kept during hydration
    pub fn is_service_type_retained(&self, service_type: &ServiceType) -> bool {
        match &self.exclusive_service_types {
            Some(allowed) if !allowed.is_empty() => allowed.iter().any(|entry| service_type.implements_version(entry)),
            _ => true,
        }
    }

    /// Max-age a remote device announced with `announced` is stored under
    pub fn remote_max_age(&self, announced: u32) -> u32 {
        self.remote_device_max_age_override.unwrap_or(announced)
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    pub fn with_remote_device_max_age_override(mut self, max_age_seconds: u32) -> Self {
        self.remote_device_max_age_override = Some(max_age_seconds);
        self
    }

    pub fn with_exclusive_service_types(mut self, service_types: Option<Vec<ServiceType>>) -> Self {
        self.exclusive_service_types = service_types;
        self
    }

    pub fn with_descriptor_retrieval_header(mut self, name: &str, value: &str) -> Self {
        self.descriptor_retrieval_headers.add(name, value);
        self
    }

    pub fn with_event_subscription_header(mut self, name: &str, value: &str) -> Self {
        self.event_subscription_headers.add(name, value);
        self
    }

    pub fn with_received_subscription_timeout(mut self, seconds: u32) -> Self {
        self.received_subscription_timeout = Some(seconds);
        self
    }

    pub fn with_default_subscription_duration(mut self, seconds: u32) -> Self {
        self.default_subscription_duration = seconds;
        self
    }

    pub fn with_namespace_base_path(mut self, base_path: &str) -> Self {
        self.namespace_base_path = base_path.to_string();
        self
    }

    pub fn with_server_token(mut self, token: &str) -> Self {
        self.server_token = token.to_string();
        self
    }
}
