//! SSDP discovery plumbing and descriptor binding for upnp-stack
//!
//! - [`ssdp`]: datagram codec, notification types, USNs and search matching
//! - [`SsdpSocket`]: blocking UDP socket joined to the SSDP multicast group
//! - [`DeviceDescriptorBinder`] / [`ServiceDescriptorBinder`]: device and SCPD
//!   documents to and from the device model, with quick-xml defaults
//!
//! ```
//! use upnp_discovery::ssdp::{IncomingDatagramMessage, NotificationSubtype};
//!
//! let datagram = "NOTIFY * HTTP/1.1\r\n\
//!     NT: upnp:rootdevice\r\n\
//!     NTS: ssdp:byebye\r\n\
//!     USN: uuid:abc::upnp:rootdevice\r\n\r\n";
//! let message = IncomingDatagramMessage::parse(datagram.as_bytes(), "10.0.0.2:1900".parse().unwrap(), None).unwrap();
//!
//! assert_eq!(message.notification_subtype(), Some(NotificationSubtype::ByeBye));
//! assert!(message.usn().unwrap().is_root_device());
//! ```

mod descriptor;
mod error;
mod service_descriptor;
mod socket;
mod xml;
pub mod ssdp;

pub use descriptor::{DeviceDescriptorBinder, XmlDeviceDescriptorBinder};
pub use error::{DescriptorBindingError, Result, SsdpError};
pub use service_descriptor::{ServiceDescriptorBinder, XmlServiceDescriptorBinder};
pub use socket::SsdpSocket;
pub use ssdp::{IncomingDatagramMessage, NotificationSubtype, NotificationType, OutgoingDatagramMessage, Usn};
