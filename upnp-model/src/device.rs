//! The device tree: a root device with services, icons and embedded devices.
//!
//! A device graph is assembled bottom-up and then treated as immutable; the
//! registry holds it behind an `Arc`. Code that needs to change a device builds
//! a new graph (see [`Device::rebuild`]).

use std::collections::HashSet;
use std::net::IpAddr;

use url::Url;

use crate::error::ValidationError;
use crate::service::Service;
use crate::types::{DeviceType, ServiceId, ServiceReference, ServiceType, Udn};

/// Where a device lives
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOrigin {
    /// Hosted by this process
    Local,
    /// Found on the network
    Remote {
        /// Location of the root device descriptor
        descriptor_url: Url,
        /// Local interface address the device was discovered on
        discovered_on: Option<IpAddr>,
    },
}

/// Identity of a device as known from discovery or registration
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub udn: Udn,
    /// Declared max-age, used for expiration and re-advertisement
    pub max_age_seconds: u32,
    pub origin: DeviceOrigin,
}

impl DeviceIdentity {
    pub fn local(udn: Udn, max_age_seconds: u32) -> Self {
        Self {
            udn,
            max_age_seconds,
            origin: DeviceOrigin::Local,
        }
    }

    pub fn remote(udn: Udn, max_age_seconds: u32, descriptor_url: Url, discovered_on: Option<IpAddr>) -> Self {
        Self {
            udn,
            max_age_seconds,
            origin: DeviceOrigin::Remote {
                descriptor_url,
                discovered_on,
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.origin, DeviceOrigin::Remote { .. })
    }

    pub fn descriptor_url(&self) -> Option<&Url> {
        match &self.origin {
            DeviceOrigin::Remote { descriptor_url, .. } => Some(descriptor_url),
            DeviceOrigin::Local => None,
        }
    }

    pub fn discovered_on(&self) -> Option<IpAddr> {
        match &self.origin {
            DeviceOrigin::Remote { discovered_on, .. } => *discovered_on,
            DeviceOrigin::Local => None,
        }
    }
}

/// Descriptive fields of a device descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceDetails {
    pub friendly_name: String,
    pub manufacturer: String,
    pub manufacturer_url: Option<String>,
    pub model_name: String,
    pub model_description: Option<String>,
    pub model_number: Option<String>,
    pub model_url: Option<String>,
    pub serial_number: Option<String>,
    pub upc: Option<String>,
    pub presentation_url: Option<String>,
    /// `URLBase` of the descriptor, if the device declared one
    pub base_url: Option<Url>,
}

impl DeviceDetails {
    pub fn new(
        friendly_name: impl Into<String>,
        manufacturer: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            friendly_name: friendly_name.into(),
            manufacturer: manufacturer.into(),
            model_name: model_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub uri: String,
    /// Image bytes, present for icons served by local devices
    pub data: Option<Vec<u8>>,
}

impl Icon {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.mime_type.trim().is_empty() {
            errors.push(ValidationError::new("Icon", "mimetype", format!("icon '{}' has no mime type", self.uri)));
        }
        if self.uri.trim().is_empty() {
            errors.push(ValidationError::new("Icon", "url", "must not be empty"));
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub identity: DeviceIdentity,
    pub device_type: DeviceType,
    pub details: DeviceDetails,
    pub icons: Vec<Icon>,
    pub services: Vec<Service>,
    pub embedded_devices: Vec<Device>,
}

impl Device {
    pub fn new(identity: DeviceIdentity, device_type: DeviceType, details: DeviceDetails) -> Self {
        Self {
            identity,
            device_type,
            details,
            icons: Vec::new(),
            services: Vec::new(),
            embedded_devices: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_embedded_device(mut self, device: Device) -> Self {
        self.embedded_devices.push(device);
        self
    }

    pub fn with_icon(mut self, icon: Icon) -> Self {
        self.icons.push(icon);
        self
    }

    pub fn udn(&self) -> &Udn {
        &self.identity.udn
    }

    pub fn is_local(&self) -> bool {
        !self.identity.is_remote()
    }

    pub fn is_remote(&self) -> bool {
        self.identity.is_remote()
    }

    /// A new graph with the same identity, type, details and icons but the given
    /// services and embedded devices
    pub fn rebuild(&self, services: Vec<Service>, embedded_devices: Vec<Device>) -> Device {
        Device {
            identity: self.identity.clone(),
            device_type: self.device_type.clone(),
            details: self.details.clone(),
            icons: self.icons.clone(),
            services,
            embedded_devices,
        }
    }

    /// This device and all of its descendants, depth first
    pub fn find_devices(&self) -> Vec<&Device> {
        let mut devices = vec![self];
        for embedded in &self.embedded_devices {
            devices.extend(embedded.find_devices());
        }
        devices
    }

    pub fn find_device(&self, udn: &Udn) -> Option<&Device> {
        self.find_devices().into_iter().find(|d| d.udn() == udn)
    }

    pub fn find_devices_of_type(&self, device_type: &DeviceType) -> Vec<&Device> {
        self.find_devices()
            .into_iter()
            .filter(|d| d.device_type.implements_version(device_type))
            .collect()
    }

    /// Every service in the tree, paired with the UDN of the device that owns it
    pub fn find_services(&self) -> Vec<(&Udn, &Service)> {
        self.find_devices()
            .into_iter()
            .flat_map(|d| d.services.iter().map(move |s| (d.udn(), s)))
            .collect()
    }

    pub fn find_service(&self, reference: &ServiceReference) -> Option<&Service> {
        self.find_device(&reference.udn)?
            .services
            .iter()
            .find(|s| s.service_id == reference.service_id)
    }

    pub fn service(&self, service_id: &ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| &s.service_id == service_id)
    }

    pub fn find_service_types(&self) -> Vec<&ServiceType> {
        let mut types: Vec<&ServiceType> = Vec::new();
        for (_, service) in self.find_services() {
            if !types.contains(&&service.service_type) {
                types.push(&service.service_type);
            }
        }
        types
    }

    pub fn has_service_type(&self, service_type: &ServiceType) -> bool {
        self.find_services()
            .iter()
            .any(|(_, s)| s.service_type.implements_version(service_type))
    }

    pub fn find_icons(&self) -> Vec<(&Udn, &Icon)> {
        self.find_devices()
            .into_iter()
            .flat_map(|d| d.icons.iter().map(move |i| (d.udn(), i)))
            .collect()
    }

    /// Resolve a descriptor-relative URI against `URLBase` or the descriptor location
    pub fn normalize_uri(&self, uri: &str) -> Option<Url> {
        let base = self
            .details
            .base_url
            .as_ref()
            .or_else(|| self.identity.descriptor_url())?;
        base.join(uri.trim()).ok()
    }

    /// Structural checks over the whole tree
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut udns = HashSet::new();
        for device in self.find_devices() {
            if !udns.insert(device.udn()) {
                errors.push(ValidationError::new(
                    "Device",
                    "UDN",
                    format!("duplicate UDN {} in device tree", device.udn()),
                ));
            }
            errors.extend(device.validate_own());
        }
        errors
    }

    fn validate_own(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.details.friendly_name.trim().is_empty() {
            errors.push(ValidationError::new(
                "Device",
                "friendlyName",
                format!("{} has no friendly name", self.udn()),
            ));
        }
        let mut service_ids = HashSet::new();
        for service in &self.services {
            if !service_ids.insert(&service.service_id) {
                errors.push(ValidationError::new(
                    "Device",
                    "serviceList",
                    format!("duplicate service id {} on {}", service.service_id, self.udn()),
                ));
            }
            errors.extend(service.validate());
        }
        for icon in &self.icons {
            errors.extend(icon.validate());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_identity(udn: &str) -> DeviceIdentity {
        DeviceIdentity::remote(
            udn.parse().unwrap(),
            1800,
            Url::parse("http://192.168.1.20:1400/xml/device_description.xml").unwrap(),
            None,
        )
    }

    fn renderer() -> Device {
        let media_renderer = Device::new(
            remote_identity("uuid:renderer-1"),
            DeviceType::uda("MediaRenderer", 1),
            DeviceDetails::new("Kitchen Renderer", "Acme", "R1"),
        )
        .with_service(Service::new(ServiceType::uda("AVTransport", 1), ServiceId::uda("AVTransport")))
        .with_service(Service::new(ServiceType::uda("RenderingControl", 1), ServiceId::uda("RenderingControl")));

        Device::new(
            remote_identity("uuid:root-1"),
            DeviceType::new("schemas-acme-com", "ZonePlayer", 1),
            DeviceDetails::new("Kitchen", "Acme", "Z1"),
        )
        .with_service(Service::new(ServiceType::uda("AlarmClock", 1), ServiceId::uda("AlarmClock")))
        .with_embedded_device(media_renderer)
    }

    #[test]
    fn test_find_devices_depth_first() {
        let device = renderer();
        let udns: Vec<_> = device.find_devices().iter().map(|d| d.udn().to_string()).collect();
        assert_eq!(udns, vec!["uuid:root-1", "uuid:renderer-1"]);
    }

    #[test]
    fn test_find_service_by_reference() {
        let device = renderer();
        let reference = ServiceReference::new("uuid:renderer-1".parse().unwrap(), ServiceId::uda("AVTransport"));
        assert!(device.find_service(&reference).is_some());

        let wrong_device = ServiceReference::new("uuid:root-1".parse().unwrap(), ServiceId::uda("AVTransport"));
        assert!(device.find_service(&wrong_device).is_none());
    }

    #[test]
    fn test_service_types_are_collected_once() {
        let device = renderer();
        assert_eq!(device.find_service_types().len(), 3);
        assert!(device.has_service_type(&ServiceType::uda("RenderingControl", 1)));
        assert!(!device.has_service_type(&ServiceType::uda("RenderingControl", 2)));
    }

    #[test]
    fn test_normalize_uri_prefers_url_base() {
        let mut device = renderer();
        assert_eq!(
            device.normalize_uri("/xml/AVTransport1.xml").unwrap().as_str(),
            "http://192.168.1.20:1400/xml/AVTransport1.xml"
        );

        device.details.base_url = Some(Url::parse("http://10.0.0.5:8080/base/").unwrap());
        assert_eq!(device.normalize_uri("scpd.xml").unwrap().as_str(), "http://10.0.0.5:8080/base/scpd.xml");
    }

    #[test]
    fn test_local_device_has_no_base() {
        let device = Device::new(
            DeviceIdentity::local(Udn::random(), 1800),
            DeviceType::uda("BinaryLight", 1),
            DeviceDetails::new("Light", "Acme", "L1"),
        );
        assert!(device.is_local());
        assert!(device.normalize_uri("/desc").is_none());
    }

    #[test]
    fn test_validate_detects_duplicate_udn_in_tree() {
        let child = Device::new(
            remote_identity("uuid:root-1"),
            DeviceType::uda("MediaServer", 1),
            DeviceDetails::new("Child", "Acme", "C1"),
        );
        let device = renderer().with_embedded_device(child);
        let errors = device.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "UDN");
    }

    #[test]
    fn test_rebuild_keeps_identity() {
        let device = renderer();
        let rebuilt = device.rebuild(Vec::new(), Vec::new());
        assert_eq!(rebuilt.identity, device.identity);
        assert!(rebuilt.services.is_empty());
        assert!(rebuilt.embedded_devices.is_empty());
    }
}
