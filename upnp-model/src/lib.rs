//! # UPnP device model
//!
//! Plain data types describing UPnP devices as the rest of the stack sees them:
//!
//! - [`Device`] trees with [`Service`]s, [`Icon`]s and embedded devices
//! - [`Action`]s, their arguments and [`StateVariable`]s
//! - identifiers ([`Udn`], [`DeviceType`], [`ServiceType`], [`ServiceId`])
//! - [`ActionInvocation`], which carries input, output and failure of one call
//! - [`Headers`] and [`UpnpResponse`], shared by SSDP and HTTP messages
//!
//! Local services are backed by a [`ServiceManager`]; [`ActionTable`] is the
//! declarative implementation most applications use.
//!
//! ```
//! use upnp_model::{Device, DeviceDetails, DeviceIdentity, DeviceType, Service, ServiceId, ServiceType, Udn};
//!
//! let light = Device::new(
//!     DeviceIdentity::local(Udn::random(), 1800),
//!     DeviceType::uda("BinaryLight", 1),
//!     DeviceDetails::new("Hall light", "Acme", "BL-1"),
//! )
//! .with_service(Service::new(ServiceType::uda("SwitchPower", 1), ServiceId::uda("SwitchPower")));
//!
//! assert!(light.validate().is_empty());
//! ```

pub mod action;
pub mod datatype;
pub mod device;
pub mod error;
pub mod message;
pub mod service;
pub mod state_variable;
pub mod table;
pub mod types;

pub use action::{
    Action, ActionArgument, ActionArgumentValue, ActionException, ActionInvocation, Direction, ErrorCode,
};
pub use datatype::Datatype;
pub use device::{Device, DeviceDetails, DeviceIdentity, DeviceOrigin, Icon};
pub use error::{InvalidValueError, ValidationError, ValidationErrors};
pub use message::{header, is_xml_content_type, Headers, UpnpResponse, CONTENT_TYPE_XML};
pub use service::{Service, ServiceManager};
pub use state_variable::{AllowedValueRange, StateVariable, StateVariableValue};
pub use table::ActionTable;
pub use types::{DeviceType, ServiceId, ServiceReference, ServiceType, Udn};
