//! SSDP (Simple Service Discovery Protocol) datagrams
//!
//! Parsing of incoming NOTIFY, M-SEARCH and search-response datagrams, the
//! notification/search target types carried in their `NT`, `ST` and `USN`
//! headers, and formatting of the datagrams a device or control point sends.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use upnp_model::{header, Device, DeviceType, Headers, InvalidValueError, ServiceType, Udn, UpnpResponse};
use url::Url;

use crate::error::{Result, SsdpError};

pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;

pub const NTS_ALIVE: &str = "ssdp:alive";
pub const NTS_BYEBYE: &str = "ssdp:byebye";
pub const SEARCH_ALL: &str = "ssdp:all";
pub const ROOT_DEVICE: &str = "upnp:rootdevice";
pub const MAN_DISCOVER: &str = "\"ssdp:discover\"";

const NOTIFY_LINE: &str = "NOTIFY * HTTP/1.1";
const SEARCH_LINE: &str = "M-SEARCH * HTTP/1.1";

/// The multicast group and port every NOTIFY and M-SEARCH is sent to
pub fn multicast_destination() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT))
}

/// Value of the `NTS` header of a NOTIFY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSubtype {
    Alive,
    ByeBye,
}

impl NotificationSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSubtype::Alive => NTS_ALIVE,
            NotificationSubtype::ByeBye => NTS_BYEBYE,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(NTS_ALIVE) {
            Some(NotificationSubtype::Alive)
        } else if value.eq_ignore_ascii_case(NTS_BYEBYE) {
            Some(NotificationSubtype::ByeBye)
        } else {
            None
        }
    }
}

/// A notification type (`NT`) or search target (`ST`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// `ssdp:all`, only meaningful as a search target
    All,
    RootDevice,
    Udn(Udn),
    DeviceType(DeviceType),
    ServiceType(ServiceType),
}

impl NotificationType {
    /// True if a search for `self` should be answered for `candidate`.
    ///
    /// Device and service types match any candidate of the same kind at the
    /// same or a newer version.
    pub fn matches(&self, candidate: &NotificationType) -> bool {
        match (self, candidate) {
            (NotificationType::All, _) => true,
            (NotificationType::RootDevice, NotificationType::RootDevice) => true,
            (NotificationType::Udn(search), NotificationType::Udn(udn)) => search == udn,
            (NotificationType::DeviceType(search), NotificationType::DeviceType(device_type)) => {
                device_type.implements_version(search)
            }
            (NotificationType::ServiceType(search), NotificationType::ServiceType(service_type)) => {
                service_type.implements_version(search)
            }
            _ => false,
        }
    }
}

impl FromStr for NotificationType {
    type Err = InvalidValueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(SEARCH_ALL) {
            Ok(NotificationType::All)
        } else if s.eq_ignore_ascii_case(ROOT_DEVICE) {
            Ok(NotificationType::RootDevice)
        } else if s.get(..5).map_or(false, |p| p.eq_ignore_ascii_case("uuid:")) {
            Ok(NotificationType::Udn(s.parse()?))
        } else if s.contains(":device:") {
            Ok(NotificationType::DeviceType(s.parse()?))
        } else if s.contains(":service:") {
            Ok(NotificationType::ServiceType(s.parse()?))
        } else {
            Err(InvalidValueError::new("notification type", s))
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::All => f.write_str(SEARCH_ALL),
            NotificationType::RootDevice => f.write_str(ROOT_DEVICE),
            NotificationType::Udn(udn) => write!(f, "{}", udn),
            NotificationType::DeviceType(device_type) => write!(f, "{}", device_type),
            NotificationType::ServiceType(service_type) => write!(f, "{}", service_type),
        }
    }
}

/// Unique Service Name: `uuid:<id>` or `uuid:<id>::<notification type>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Usn {
    pub udn: Udn,
    pub notification_type: NotificationType,
}

impl Usn {
    pub fn new(udn: Udn, notification_type: NotificationType) -> Self {
        Self { udn, notification_type }
    }

    /// The plain `uuid:<id>` form
    pub fn for_udn(udn: Udn) -> Self {
        Self {
            notification_type: NotificationType::Udn(udn.clone()),
            udn,
        }
    }

    pub fn service_type(&self) -> Option<&ServiceType> {
        match &self.notification_type {
            NotificationType::ServiceType(service_type) => Some(service_type),
            _ => None,
        }
    }

    pub fn device_type(&self) -> Option<&DeviceType> {
        match &self.notification_type {
            NotificationType::DeviceType(device_type) => Some(device_type),
            _ => None,
        }
    }

    pub fn is_root_device(&self) -> bool {
        self.notification_type == NotificationType::RootDevice
    }
}

impl FromStr for Usn {
    type Err = InvalidValueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once("::") {
            Some((udn, notification_type)) => Ok(Self::new(udn.parse()?, notification_type.parse()?)),
            None => Ok(Self::for_udn(s.parse()?)),
        }
    }
}

impl fmt::Display for Usn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.notification_type {
            NotificationType::Udn(_) => write!(f, "{}", self.udn),
            other => write!(f, "{}::{}", self.udn, other),
        }
    }
}

/// Seconds from a `CACHE-CONTROL: max-age=N` header value
pub fn parse_max_age(cache_control: &str) -> Option<u32> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().trim_matches('"').parse::<u32>().ok()
        } else {
            None
        }
    })
}

/// Every `USN` a device tree announces: the root device entry, then per device
/// its UDN, its type and each distinct service type.
pub fn advertisement_usns(device: &Device) -> Vec<Usn> {
    let mut usns = vec![Usn::new(device.udn().clone(), NotificationType::RootDevice)];
    for current in device.find_devices() {
        let udn = current.udn();
        usns.push(Usn::for_udn(udn.clone()));
        usns.push(Usn::new(
            udn.clone(),
            NotificationType::DeviceType(current.device_type.clone()),
        ));

        let mut seen = HashSet::new();
        for service in &current.services {
            if seen.insert(&service.service_type) {
                usns.push(Usn::new(
                    udn.clone(),
                    NotificationType::ServiceType(service.service_type.clone()),
                ));
            }
        }
    }
    usns
}

/// `(ST, USN)` pairs a device tree answers a search for `target` with.
///
/// A search for `ssdp:all` is answered with every advertised entry under its own
/// type; any other search is answered with the requested target as `ST`.
pub fn search_responses(device: &Device, target: &NotificationType) -> Vec<(String, Usn)> {
    advertisement_usns(device)
        .into_iter()
        .filter(|usn| target.matches(&usn.notification_type))
        .map(|usn| {
            let st = match target {
                NotificationType::All => usn.notification_type.to_string(),
                requested => requested.to_string(),
            };
            (st, usn)
        })
        .collect()
}

/// What kind of datagram a message is
#[derive(Debug, Clone, PartialEq)]
pub enum DatagramOperation {
    Notify,
    Search,
    /// A unicast response to an M-SEARCH
    Response(UpnpResponse),
}

/// A datagram received on an SSDP socket
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingDatagramMessage {
    pub operation: DatagramOperation,
    pub headers: Headers,
    /// Address the datagram came from
    pub source: SocketAddr,
    /// Local interface address it was received on, when known
    pub local_address: Option<IpAddr>,
}

impl IncomingDatagramMessage {
    /// Parse raw datagram bytes
    pub fn parse(buf: &[u8], source: SocketAddr, local_address: Option<IpAddr>) -> Result<Self> {
        let text = std::str::from_utf8(buf)
            .map_err(|_| SsdpError::InvalidDatagram(format!("non UTF-8 datagram from {}", source)))?;

        let mut lines = text.lines();
        let start_line = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| SsdpError::InvalidDatagram(format!("empty datagram from {}", source)))?;

        let operation = parse_start_line(start_line)?;

        let mut headers = Headers::new();
        for line in lines {
            if line.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.add(name.trim(), value.trim());
            }
        }

        Ok(Self {
            operation,
            headers,
            source,
            local_address,
        })
    }

    pub fn is_notify(&self) -> bool {
        matches!(self.operation, DatagramOperation::Notify)
    }

    pub fn is_search(&self) -> bool {
        matches!(self.operation, DatagramOperation::Search)
    }

    pub fn is_search_response(&self) -> bool {
        matches!(&self.operation, DatagramOperation::Response(status) if !status.is_failed())
    }

    pub fn notification_subtype(&self) -> Option<NotificationSubtype> {
        self.headers.get(header::NTS).and_then(NotificationSubtype::parse)
    }

    pub fn notification_type(&self) -> Option<NotificationType> {
        self.headers.get(header::NT).and_then(|nt| nt.parse().ok())
    }

    pub fn usn(&self) -> Option<Usn> {
        let raw = self.headers.get(header::USN)?;
        match raw.parse() {
            Ok(usn) => Some(usn),
            Err(e) => {
                tracing::debug!("Ignoring unparseable USN from {}: {}", self.source, e);
                None
            }
        }
    }

    pub fn location(&self) -> Option<Url> {
        self.headers
            .get(header::LOCATION)
            .and_then(|location| Url::parse(location).ok())
    }

    pub fn max_age(&self) -> Option<u32> {
        self.headers.get(header::CACHE_CONTROL).and_then(parse_max_age)
    }

    /// Raw `ST` header value
    pub fn search_target(&self) -> Option<&str> {
        self.headers.get(header::ST)
    }

    pub fn mx(&self) -> Option<u32> {
        self.headers.get(header::MX).and_then(|mx| mx.trim().parse().ok())
    }
}

fn parse_start_line(line: &str) -> Result<DatagramOperation> {
    if line.eq_ignore_ascii_case(NOTIFY_LINE) {
        return Ok(DatagramOperation::Notify);
    }
    if line.eq_ignore_ascii_case(SEARCH_LINE) {
        return Ok(DatagramOperation::Search);
    }

    let status = line
        .strip_prefix("HTTP/1.")
        .and_then(|rest| rest.split_once(' '))
        .map(|(_, status)| status.trim())
        .ok_or_else(|| SsdpError::InvalidDatagram(format!("unsupported start line '{}'", line)))?;

    let (code, message) = status.split_once(' ').unwrap_or((status, ""));
    let code = code
        .parse::<u16>()
        .map_err(|_| SsdpError::InvalidDatagram(format!("invalid status line '{}'", line)))?;
    Ok(DatagramOperation::Response(UpnpResponse::new(code, message.trim())))
}

/// A datagram to send
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingDatagramMessage {
    pub operation: DatagramOperation,
    pub headers: Headers,
    pub destination: SocketAddr,
}

impl OutgoingDatagramMessage {
    fn notify(usn: &Usn, subtype: NotificationSubtype) -> Self {
        let mut headers = Headers::new();
        headers.set(header::HOST, format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT));
        headers.set(header::NT, usn.notification_type.to_string());
        headers.set(header::NTS, subtype.as_str());
        headers.set(header::USN, usn.to_string());
        Self {
            operation: DatagramOperation::Notify,
            headers,
            destination: multicast_destination(),
        }
    }

    /// `NOTIFY ssdp:alive` for one advertised entry
    pub fn alive(usn: &Usn, location: &Url, max_age: u32, server: &str) -> Self {
        let mut message = Self::notify(usn, NotificationSubtype::Alive);
        message.headers.set(header::CACHE_CONTROL, format!("max-age={}", max_age));
        message.headers.set(header::LOCATION, location.as_str());
        message.headers.set(header::SERVER, server);
        message
    }

    /// `NOTIFY ssdp:byebye` for one advertised entry
    pub fn byebye(usn: &Usn) -> Self {
        Self::notify(usn, NotificationSubtype::ByeBye)
    }

    /// Multicast `M-SEARCH`
    pub fn search(target: &NotificationType, mx: u32, user_agent: &str) -> Self {
        let mut headers = Headers::new();
        headers.set(header::HOST, format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT));
        headers.set(header::MAN, MAN_DISCOVER);
        headers.set(header::MX, mx.max(1).to_string());
        headers.set(header::ST, target.to_string());
        headers.set(header::USER_AGENT, user_agent);
        Self {
            operation: DatagramOperation::Search,
            headers,
            destination: multicast_destination(),
        }
    }

    /// Unicast `HTTP/1.1 200 OK` answering a search
    pub fn search_response(
        destination: SocketAddr,
        search_target: &str,
        usn: &Usn,
        location: &Url,
        max_age: u32,
        server: &str,
    ) -> Self {
        let mut headers = Headers::new();
        headers.set(header::CACHE_CONTROL, format!("max-age={}", max_age));
        headers.set(header::EXT, "");
        headers.set(header::LOCATION, location.as_str());
        headers.set(header::SERVER, server);
        headers.set(header::ST, search_target);
        headers.set(header::USN, usn.to_string());
        Self {
            operation: DatagramOperation::Response(UpnpResponse::with_status(UpnpResponse::OK)),
            headers,
            destination,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut text = match &self.operation {
            DatagramOperation::Notify => NOTIFY_LINE.to_string(),
            DatagramOperation::Search => SEARCH_LINE.to_string(),
            DatagramOperation::Response(status) => {
                format!("HTTP/1.1 {} {}", status.status_code, status.status_message)
            }
        };
        text.push_str("\r\n");
        for (name, value) in self.headers.iter() {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push_str("\r\n");
        }
        text.push_str("\r\n");
        text.into_bytes()
    }
}

impl fmt::Display for OutgoingDatagramMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.operation {
            DatagramOperation::Notify => self.headers.get(header::NTS).unwrap_or("NOTIFY"),
            DatagramOperation::Search => "M-SEARCH",
            DatagramOperation::Response(_) => "search response",
        };
        write!(f, "({}) to {}", kind, self.destination)
    }
}
