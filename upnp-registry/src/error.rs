use thiserror::Error;
use upnp_model::{Udn, ValidationErrors};

/// Errors that abort adding a device or resource to the registry
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Another resource is already served under this path
    #[error("Resource path collision: {path}")]
    ResourceCollision { path: String },

    /// A device with this UDN is already registered
    #[error("Device {0} is already registered")]
    DuplicateUdn(Udn),

    /// The device graph failed validation
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A local device was passed where a remote one was expected, or the reverse
    #[error("Device {0} has the wrong origin for this registration")]
    WrongOrigin(Udn),

    /// The registry no longer accepts devices
    #[error("Registry is shutting down")]
    ShuttingDown,
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting is out of range or inconsistent
    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Why a discovered device could not be registered
#[derive(Debug, Clone, Error)]
pub enum DiscoveryFailure {
    /// The device or a service descriptor could not be bound
    #[error("Descriptor binding failed: {0}")]
    Binding(String),

    /// The hydrated device graph is invalid
    #[error(transparent)]
    Validation(ValidationErrors),

    /// The registry refused the device
    #[error("Registration failed: {0}")]
    Registration(String),
}

impl From<RegistrationError> for DiscoveryFailure {
    fn from(error: RegistrationError) -> Self {
        match error {
            RegistrationError::Validation(errors) => DiscoveryFailure::Validation(errors),
            other => DiscoveryFailure::Registration(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
