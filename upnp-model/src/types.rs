//! Identifiers shared by every layer of the stack: device names, device and
//! service types, service ids and the explicit device/service reference used
//! in place of back-pointers into the device graph.

use std::fmt;
use std::str::FromStr;

use crate::error::InvalidValueError;

/// Namespace of the UPnP forum standard types
pub const UDA_NAMESPACE: &str = "schemas-upnp-org";

/// Namespace used by standard service ids (`urn:upnp-org:serviceId:...`)
pub const UDA_SERVICE_ID_NAMESPACE: &str = "upnp-org";

/// Unique Device Name, always rendered with its `uuid:` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Udn(String);

impl Udn {
    /// Build a UDN from the identifier that follows `uuid:`
    pub fn new(identifier: impl AsRef<str>) -> Self {
        Self(format!("uuid:{}", identifier.as_ref()))
    }

    /// Generate a fresh random UDN for a local device
    pub fn random() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// The part after `uuid:`
    pub fn identifier(&self) -> &str {
        &self.0[5..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Udn {
    type Err = InvalidValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("uuid:") && s.len() > 5 => {
                Ok(Self::new(&s[5..]))
            }
            _ => Err(InvalidValueError::new("UDN", s)),
        }
    }
}

impl fmt::Display for Udn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split `urn:<namespace>:<kind>:<type>:<version>`
fn parse_type_urn(
    s: &str,
    kind: &'static str,
    label: &'static str,
) -> Result<(String, String, u32), InvalidValueError> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 5 || parts[0] != "urn" || parts[2] != kind {
        return Err(InvalidValueError::new(label, s));
    }
    if parts[1].is_empty() || parts[3].is_empty() {
        return Err(InvalidValueError::new(label, s));
    }
    let version = parts[4]
        .trim()
        .parse::<u32>()
        .map_err(|_| InvalidValueError::new(label, s))?;
    Ok((parts[1].to_string(), parts[3].to_string(), version))
}

/// A device type such as `urn:schemas-upnp-org:device:MediaRenderer:1`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceType {
    pub namespace: String,
    pub type_name: String,
    pub version: u32,
}

impl DeviceType {
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>, version: u32) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            version,
        }
    }

    /// A standard device type in the UPnP forum namespace
    pub fn uda(type_name: impl Into<String>, version: u32) -> Self {
        Self::new(UDA_NAMESPACE, type_name, version)
    }

    /// True when this type is the same kind as `other` at the same or a newer version
    pub fn implements_version(&self, other: &DeviceType) -> bool {
        self.namespace == other.namespace
            && self.type_name == other.type_name
            && self.version >= other.version
    }
}

impl FromStr for DeviceType {
    type Err = InvalidValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, type_name, version) = parse_type_urn(s, "device", "device type")?;
        Ok(Self {
            namespace,
            type_name,
            version,
        })
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:device:{}:{}", self.namespace, self.type_name, self.version)
    }
}

/// A service type such as `urn:schemas-upnp-org:service:AVTransport:1`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType {
    pub namespace: String,
    pub type_name: String,
    pub version: u32,
}

impl ServiceType {
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>, version: u32) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            version,
        }
    }

    /// A standard service type in the UPnP forum namespace
    pub fn uda(type_name: impl Into<String>, version: u32) -> Self {
        Self::new(UDA_NAMESPACE, type_name, version)
    }

    /// True when this type is the same kind as `other` at the same or a newer version
    pub fn implements_version(&self, other: &ServiceType) -> bool {
        self.namespace == other.namespace
            && self.type_name == other.type_name
            && self.version >= other.version
    }
}

impl FromStr for ServiceType {
    type Err = InvalidValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, type_name, version) = parse_type_urn(s, "service", "service type")?;
        Ok(Self {
            namespace,
            type_name,
            version,
        })
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:service:{}:{}", self.namespace, self.type_name, self.version)
    }
}

/// A service id such as `urn:upnp-org:serviceId:AVTransport`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub namespace: String,
    pub id: String,
}

impl ServiceId {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    pub fn uda(id: impl Into<String>) -> Self {
        Self::new(UDA_SERVICE_ID_NAMESPACE, id)
    }
}

impl FromStr for ServiceId {
    type Err = InvalidValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 4 || parts[0] != "urn" || parts[2] != "serviceId" || parts[3].is_empty() {
            return Err(InvalidValueError::new("service id", s));
        }
        Ok(Self::new(parts[1], parts[3]))
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:serviceId:{}", self.namespace, self.id)
    }
}

/// Addresses one service of one device without holding a pointer into the graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceReference {
    pub udn: Udn,
    pub service_id: ServiceId,
}

impl ServiceReference {
    pub fn new(udn: Udn, service_id: ServiceId) -> Self {
        Self { udn, service_id }
    }
}

impl fmt::Display for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.udn, self.service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_udn_parse_and_display() {
        let udn: Udn = "uuid:RINCON_000E58A0123401400".parse().unwrap();
        assert_eq!(udn.identifier(), "RINCON_000E58A0123401400");
        assert_eq!(udn.to_string(), "uuid:RINCON_000E58A0123401400");
    }

    #[test]
    fn test_udn_prefix_is_case_insensitive() {
        let udn: Udn = "UUID:abc".parse().unwrap();
        assert_eq!(udn.as_str(), "uuid:abc");
    }

    #[rstest]
    #[case("")]
    #[case("uuid:")]
    #[case("RINCON_000E58A0123401400")]
    fn test_udn_rejects_invalid(#[case] input: &str) {
        assert!(input.parse::<Udn>().is_err());
    }

    #[test]
    fn test_random_udns_differ() {
        assert_ne!(Udn::random(), Udn::random());
    }

    #[test]
    fn test_device_type_roundtrip() {
        let device_type: DeviceType = "urn:schemas-upnp-org:device:MediaRenderer:1".parse().unwrap();
        assert_eq!(device_type, DeviceType::uda("MediaRenderer", 1));
        assert_eq!(device_type.to_string(), "urn:schemas-upnp-org:device:MediaRenderer:1");
    }

    #[rstest]
    #[case("urn:schemas-upnp-org:service:AVTransport:1")]
    #[case("urn:schemas-upnp-org:device:AVTransport:x")]
    #[case("urn:schemas-upnp-org:device:MediaRenderer")]
    fn test_device_type_rejects_invalid(#[case] input: &str) {
        assert!(input.parse::<DeviceType>().is_err());
    }

    #[rstest]
    #[case(2, 1, true)]
    #[case(1, 1, true)]
    #[case(1, 2, false)]
    fn test_service_type_implements_version(
        #[case] actual: u32,
        #[case] required: u32,
        #[case] expected: bool,
    ) {
        let actual = ServiceType::uda("ContentDirectory", actual);
        let required = ServiceType::uda("ContentDirectory", required);
        assert_eq!(actual.implements_version(&required), expected);
    }

    #[test]
    fn test_service_type_other_namespace_does_not_match() {
        let vendor = ServiceType::new("schemas-sonos-com", "Queue", 1);
        assert!(!vendor.implements_version(&ServiceType::uda("Queue", 1)));
    }

    #[test]
    fn test_service_id_parse() {
        let id: ServiceId = "urn:upnp-org:serviceId:AVTransport".parse().unwrap();
        assert_eq!(id, ServiceId::uda("AVTransport"));
        assert_eq!(id.to_string(), "urn:upnp-org:serviceId:AVTransport");
        assert!("urn:upnp-org:service:AVTransport".parse::<ServiceId>().is_err());
    }
}
