//! # upnp-stack - a UPnP device and control point stack
//!
//! [`UpnpService`] runs the whole stack: SSDP discovery, descriptor retrieval,
//! the registry of local and remote devices, SOAP actions and GENA eventing in
//! both directions.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use upnp_stack::model::{
//!     ActionTable, Datatype, Device, DeviceDetails, DeviceIdentity, DeviceType, Service,
//!     ServiceId, ServiceType, StateVariable, Udn,
//! };
//! use upnp_stack::{DiscoveryOptions, ServiceConfig, UpnpService};
//!
//! fn main() -> Result<(), upnp_stack::UpnpError> {
//!     let service = UpnpService::start(ServiceConfig::default())?;
//!
//!     // Host a device
//!     let switch = Service::new(ServiceType::uda("SwitchPower", 1), ServiceId::uda("SwitchPower"))
//!         .with_state_variable(StateVariable::new("Status", Datatype::Boolean).evented(true))
//!         .with_manager(Arc::new(ActionTable::new().state_variable("Status", || "0".to_string())));
//!     let light = Device::new(
//!         DeviceIdentity::local(Udn::new("my-light"), 1800),
//!         DeviceType::uda("BinaryLight", 1),
//!         DeviceDetails::new("Desk Light", "ACME", "Light 1"),
//!     )
//!     .with_service(switch);
//!     service.add_local_device(light, DiscoveryOptions::default())?;
//!
//!     // Find others
//!     service.control_point().search();
//!
//!     service.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! upnp-stack (UpnpService, ControlPoint, NetworkRouter)
//!     ↓
//! upnp-protocol (protocol factory, receiving and sending handlers)
//!     ↓
//! upnp-registry (devices, resources, subscriptions, maintenance)
//!     ↓
//! upnp-discovery / soap-client / stream-server (SSDP, SOAP, GENA, HTTP)
//!     ↓
//! upnp-model (devices, services, actions, state variables)
//! ```

pub use config::ServiceConfig;
pub use control_point::{ActionCallback, ControlPoint};
pub use error::{Result, UpnpError};
pub use router::NetworkRouter;
pub use service::UpnpService;

pub use upnp_registry::{DiscoveryOptions, RegistryListener, SubscriptionCallback, UpnpConfig};

/// Device and service model
pub use upnp_model as model;

pub mod logging;

mod config;
mod control_point;
mod error;
mod router;
mod service;
