//! Device descriptor binding.
//!
//! Reads a UPnP device description into a [`Device`] graph and writes the
//! description of a local device. Services come out of [`DeviceDescriptorBinder::describe`]
//! without actions or state variables; those are filled in from each service's
//! SCPD document by a [`ServiceDescriptorBinder`](crate::ServiceDescriptorBinder).

use serde::{Deserialize, Serialize};
use upnp_model::{Device, DeviceDetails, DeviceIdentity, Icon, Service};
use url::Url;

use crate::error::DescriptorBindingError;
use crate::xml::{parse_document, write_document};

const DEVICE_NAMESPACE: &str = "urn:schemas-upnp-org:device-1-0";

/// Converts between device descriptor XML and the device model
pub trait DeviceDescriptorBinder: Send + Sync {
    /// Build the device graph described by `xml`.
    ///
    /// Every device in the tree takes its UDN from the document and its
    /// max-age and origin from `identity`.
    fn describe(&self, identity: &DeviceIdentity, xml: &str) -> Result<Device, DescriptorBindingError>;

    /// Descriptor XML for a local device
    fn generate(&self, device: &Device) -> Result<String, DescriptorBindingError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "root")]
struct RootXml {
    #[serde(rename = "@xmlns", default)]
    xmlns: String,
    #[serde(rename = "specVersion", default)]
    spec_version: SpecVersionXml,
    #[serde(rename = "URLBase", default, skip_serializing_if = "Option::is_none")]
    url_base: Option<String>,
    device: DeviceXml,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SpecVersionXml {
    pub(crate) major: u32,
    pub(crate) minor: u32,
}

impl Default for SpecVersionXml {
    fn default() -> Self {
        Self { major: 1, minor: 0 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceXml {
    device_type: String,
    friendly_name: String,
    manufacturer: String,
    #[serde(rename = "manufacturerURL", default, skip_serializing_if = "Option::is_none")]
    manufacturer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_description: Option<String>,
    model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_number: Option<String>,
    #[serde(rename = "modelURL", default, skip_serializing_if = "Option::is_none")]
    model_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    serial_number: Option<String>,
    #[serde(rename = "UDN")]
    udn: String,
    #[serde(rename = "UPC", default, skip_serializing_if = "Option::is_none")]
    upc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon_list: Option<IconListXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_list: Option<ServiceListXml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_list: Option<DeviceListXml>,
    #[serde(rename = "presentationURL", default, skip_serializing_if = "Option::is_none")]
    presentation_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IconListXml {
    #[serde(rename = "icon", default)]
    icons: Vec<IconXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IconXml {
    mimetype: String,
    width: u32,
    height: u32,
    depth: u32,
    url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ServiceListXml {
    #[serde(rename = "service", default)]
    services: Vec<ServiceXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServiceXml {
    #[serde(rename = "serviceType")]
    service_type: String,
    #[serde(rename = "serviceId")]
    service_id: String,
    #[serde(rename = "SCPDURL")]
    scpd_url: String,
    #[serde(rename = "controlURL")]
    control_url: String,
    #[serde(rename = "eventSubURL")]
    event_sub_url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeviceListXml {
    #[serde(rename = "device", default)]
    devices: Vec<DeviceXml>,
}

/// quick-xml backed [`DeviceDescriptorBinder`]
#[derive(Debug, Clone, Default)]
pub struct XmlDeviceDescriptorBinder;

impl XmlDeviceDescriptorBinder {
    pub fn new() -> Self {
        Self
    }

    fn hydrate_device(
        &self,
        identity: &DeviceIdentity,
        base_url: Option<&Url>,
        xml: DeviceXml,
    ) -> Result<Device, DescriptorBindingError> {
        let udn = xml.udn.parse()?;
        let device_type = xml.device_type.parse()?;

        let details = DeviceDetails {
            friendly_name: xml.friendly_name,
            manufacturer: xml.manufacturer,
            manufacturer_url: xml.manufacturer_url,
            model_name: xml.model_name,
            model_description: xml.model_description,
            model_number: xml.model_number,
            model_url: xml.model_url,
            serial_number: xml.serial_number,
            upc: xml.upc,
            presentation_url: xml.presentation_url,
            base_url: base_url.cloned(),
        };

        let mut device = Device::new(
            DeviceIdentity {
                udn,
                ..identity.clone()
            },
            device_type,
            details,
        );

        for icon in xml.icon_list.unwrap_or_default().icons {
            device.icons.push(Icon {
                mime_type: icon.mimetype,
                width: icon.width,
                height: icon.height,
                depth: icon.depth,
                uri: icon.url,
                data: None,
            });
        }

        for service in xml.service_list.unwrap_or_default().services {
            match (service.service_type.parse(), service.service_id.parse()) {
                (Ok(service_type), Ok(service_id)) => device.services.push(
                    Service::new(service_type, service_id).with_uris(
                        service.scpd_url,
                        service.control_url,
                        service.event_sub_url,
                    ),
                ),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("Skipping service of {}: {}", device.udn(), e);
                }
            }
        }

        for embedded in xml.device_list.unwrap_or_default().devices {
            let embedded = self.hydrate_device(identity, base_url, embedded)?;
            device.embedded_devices.push(embedded);
        }

        Ok(device)
    }
}

fn device_xml(device: &Device) -> DeviceXml {
    let details = &device.details;
    DeviceXml {
        device_type: device.device_type.to_string(),
        friendly_name: details.friendly_name.clone(),
        manufacturer: details.manufacturer.clone(),
        manufacturer_url: details.manufacturer_url.clone(),
        model_description: details.model_description.clone(),
        model_name: details.model_name.clone(),
        model_number: details.model_number.clone(),
        model_url: details.model_url.clone(),
        serial_number: details.serial_number.clone(),
        udn: device.udn().to_string(),
        upc: details.upc.clone(),
        icon_list: (!device.icons.is_empty()).then(|| IconListXml {
            icons: device
                .icons
                .iter()
                .map(|icon| IconXml {
                    mimetype: icon.mime_type.clone(),
                    width: icon.width,
                    height: icon.height,
                    depth: icon.depth,
                    url: icon.uri.clone(),
                })
                .collect(),
        }),
        service_list: (!device.services.is_empty()).then(|| ServiceListXml {
            services: device
                .services
                .iter()
                .map(|service| ServiceXml {
                    service_type: service.service_type.to_string(),
                    service_id: service.service_id.to_string(),
                    scpd_url: service.descriptor_uri.clone(),
                    control_url: service.control_uri.clone(),
                    event_sub_url: service.event_subscription_uri.clone(),
                })
                .collect(),
        }),
        device_list: (!device.embedded_devices.is_empty()).then(|| DeviceListXml {
            devices: device.embedded_devices.iter().map(device_xml).collect(),
        }),
        presentation_url: details.presentation_url.clone(),
    }
}

impl DeviceDescriptorBinder for XmlDeviceDescriptorBinder {
    fn describe(&self, identity: &DeviceIdentity, xml: &str) -> Result<Device, DescriptorBindingError> {
        let root: RootXml = parse_document(xml)?;

        let base_url = match root.url_base.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Some(Url::parse(url).map_err(|e| DescriptorBindingError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?),
            _ => None,
        };

        let device = self.hydrate_device(identity, base_url.as_ref(), root.device)?;
        if device.udn() != &identity.udn {
            tracing::debug!(
                "Descriptor of {} declares root UDN {}",
                identity.udn,
                device.udn()
            );
        }
        Ok(device)
    }

    fn generate(&self, device: &Device) -> Result<String, DescriptorBindingError> {
        let root = RootXml {
            xmlns: DEVICE_NAMESPACE.to_string(),
            spec_version: SpecVersionXml::default(),
            url_base: None,
            device: device_xml(device),
        };
        write_document(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upnp_model::{DeviceType, ServiceId, ServiceType, Udn};

    const SONOS_DESCRIPTOR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <root xmlns="urn:schemas-upnp-org:device-1-0">
            <specVersion><major>1</major><minor>0</minor></specVersion>
            <device>
                <deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>
                <friendlyName>192.168.1.100 - Sonos One</friendlyName>
                <manufacturer>Sonos, Inc.</manufacturer>
                <manufacturerURL>http://www.sonos.com</manufacturerURL>
                <modelNumber>S18</modelNumber>
                <modelName>Sonos One</modelName>
                <UDN>uuid:RINCON_000E58A0123456</UDN>
                <iconList>
                    <icon>
                        <mimetype>image/png</mimetype><width>48</width><height>48</height><depth>24</depth>
                        <url>/img/icon-S18.png</url>
                    </icon>
                </iconList>
                <serviceList>
                    <service>
                        <serviceType>urn:schemas-upnp-org:service:AlarmClock:1</serviceType>
                        <serviceId>urn:upnp-org:serviceId:AlarmClock</serviceId>
                        <controlURL>/AlarmClock/Control</controlURL>
                        <eventSubURL>/AlarmClock/Event</eventSubURL>
                        <SCPDURL>/xml/AlarmClock1.xml</SCPDURL>
                    </service>
                    <service>
                        <serviceType>not-a-service-type</serviceType>
                        <serviceId>urn:upnp-org:serviceId:Broken</serviceId>
                        <controlURL>/Broken/Control</controlURL>
                        <eventSubURL>/Broken/Event</eventSubURL>
                        <SCPDURL>/xml/Broken.xml</SCPDURL>
                    </service>
                </serviceList>
                <deviceList>
                    <device>
                        <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
                        <friendlyName>Sonos One Media Renderer</friendlyName>
                        <manufacturer>Sonos, Inc.</manufacturer>
                        <modelName>Sonos One</modelName>
                        <UDN>uuid:RINCON_000E58A0123456_MR</UDN>
                        <serviceList>
                            <service>
                                <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
                                <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
                                <controlURL>/MediaRenderer/RenderingControl/Control</controlURL>
                                <eventSubURL>/MediaRenderer/RenderingControl/Event</eventSubURL>
                                <SCPDURL>/xml/RenderingControl1.xml</SCPDURL>
                            </service>
                        </serviceList>
                    </device>
                </deviceList>
            </device>
        </root>"#;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::remote(
            Udn::new("RINCON_000E58A0123456"),
            1800,
            Url::parse("http://192.168.1.100:1400/xml/device_description.xml").unwrap(),
            None,
        )
    }

    #[test]
    fn test_describe_builds_device_tree() {
        let device = XmlDeviceDescriptorBinder::new()
            .describe(&identity(), SONOS_DESCRIPTOR)
            .unwrap();

        assert_eq!(device.udn(), &Udn::new("RINCON_000E58A0123456"));
        assert_eq!(device.device_type, DeviceType::uda("ZonePlayer", 1));
        assert_eq!(device.details.friendly_name, "192.168.1.100 - Sonos One");
        assert_eq!(device.details.manufacturer_url.as_deref(), Some("http://www.sonos.com"));
        assert_eq!(device.icons.len(), 1);
        assert_eq!(device.icons[0].width, 48);

        // the service with an invalid type is skipped
        assert_eq!(device.services.len(), 1);
        assert_eq!(device.services[0].service_id, ServiceId::uda("AlarmClock"));
        assert_eq!(device.services[0].descriptor_uri, "/xml/AlarmClock1.xml");
        assert!(device.services[0].actions.is_empty());

        let renderer = &device.embedded_devices[0];
        assert_eq!(renderer.udn(), &Udn::new("RINCON_000E58A0123456_MR"));
        assert_eq!(renderer.identity.max_age_seconds, 1800);
        assert!(renderer.is_remote());
        assert_eq!(
            renderer.normalize_uri(&renderer.services[0].control_uri).unwrap().as_str(),
            "http://192.168.1.100:1400/MediaRenderer/RenderingControl/Control"
        );
    }

    #[test]
    fn test_describe_uses_url_base() {
        let xml = r#"<root xmlns="urn:schemas-upnp-org:device-1-0">
            <specVersion><major>1</major><minor>0</minor></specVersion>
            <URLBase>http://10.0.0.9:49152/</URLBase>
            <device>
                <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
                <friendlyName>Router</friendlyName>
                <manufacturer>Acme</manufacturer>
                <modelName>GW</modelName>
                <UDN>uuid:gw-1</UDN>
            </device>
        </root>"#;
        let device = XmlDeviceDescriptorBinder::new().describe(&identity(), xml).unwrap();
        assert_eq!(device.details.base_url.unwrap().as_str(), "http://10.0.0.9:49152/");
    }

    #[test]
    fn test_describe_rejects_invalid_documents() {
        let binder = XmlDeviceDescriptorBinder::new();
        assert!(matches!(
            binder.describe(&identity(), "<root><device>"),
            Err(DescriptorBindingError::Xml(_))
        ));

        let bad_udn = SONOS_DESCRIPTOR.replace("uuid:RINCON_000E58A0123456_MR", "RINCON");
        assert!(matches!(
            binder.describe(&identity(), &bad_udn),
            Err(DescriptorBindingError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_generated_descriptor_describes_same_device() {
        let local = Device::new(
            DeviceIdentity::local(Udn::new("light-1"), 1800),
            DeviceType::uda("BinaryLight", 1),
            DeviceDetails::new("Hall & Stairs", "Acme", "BL-1"),
        )
        .with_service(
            Service::new(ServiceType::uda("SwitchPower", 1), ServiceId::uda("SwitchPower")).with_uris(
                "/dev/light-1/svc/upnp-org/SwitchPower/desc",
                "/dev/light-1/svc/upnp-org/SwitchPower/action",
                "/dev/light-1/svc/upnp-org/SwitchPower/event",
            ),
        );

        let binder = XmlDeviceDescriptorBinder::new();
        let xml = binder.generate(&local).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(DEVICE_NAMESPACE));

        let remote_identity = DeviceIdentity::remote(
            Udn::new("light-1"),
            1800,
            Url::parse("http://10.0.0.5:8080/dev/light-1/desc").unwrap(),
            None,
        );
        let described = binder.describe(&remote_identity, &xml).unwrap();
        assert_eq!(described.details.friendly_name, "Hall & Stairs");
        assert_eq!(described.services[0].control_uri, "/dev/light-1/svc/upnp-org/SwitchPower/action");
        assert!(described.embedded_devices.is_empty());
    }
}
