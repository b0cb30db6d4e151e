//! URL path layout of local devices, services, icons and event callbacks.
//!
//! ```text
//! /dev/<udn-id>/desc
//! /dev/<udn-id>/icon/<n>
//! /dev/<udn-id>/svc/<ns>/<service-id>/desc
//! /dev/<udn-id>/svc/<ns>/<service-id>/action
//! /dev/<udn-id>/svc/<ns>/<service-id>/event
//! /dev/<udn-id>/svc/<ns>/<service-id>/event/cb
//! ```

use upnp_model::{Device, ServiceId, ServiceReference, Udn};

use crate::resource::{Resource, ResourceKind};

const DESCRIPTOR: &str = "/desc";
const CONTROL: &str = "/action";
const EVENTS: &str = "/event";
const CALLBACK: &str = "/cb";

/// Maps devices and services to local URL paths and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    base_path: String,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new("/dev")
    }
}

impl Namespace {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn device_path(&self, udn: &Udn) -> String {
        format!("{}/{}", self.base_path, udn.identifier())
    }

    pub fn descriptor_path(&self, udn: &Udn) -> String {
        format!("{}{}", self.device_path(udn), DESCRIPTOR)
    }

    pub fn icon_path(&self, udn: &Udn, index: usize) -> String {
        format!("{}/icon/{}", self.device_path(udn), index)
    }

    pub fn service_path(&self, udn: &Udn, service_id: &ServiceId) -> String {
        format!("{}/svc/{}/{}", self.device_path(udn), service_id.namespace, service_id.id)
    }

    pub fn service_descriptor_path(&self, udn: &Udn, service_id: &ServiceId) -> String {
        format!("{}{}", self.service_path(udn, service_id), DESCRIPTOR)
    }

    pub fn control_path(&self, udn: &Udn, service_id: &ServiceId) -> String {
        format!("{}{}", self.service_path(udn, service_id), CONTROL)
    }

    pub fn event_subscription_path(&self, udn: &Udn, service_id: &ServiceId) -> String {
        format!("{}{}", self.service_path(udn, service_id), EVENTS)
    }

    pub fn event_callback_path(&self, udn: &Udn, service_id: &ServiceId) -> String {
        format!("{}{}{}", self.service_path(udn, service_id), EVENTS, CALLBACK)
    }

    fn is_in_namespace(&self, path: &str) -> bool {
        path.starts_with(&self.base_path)
    }

    pub fn is_descriptor_path(&self, path: &str) -> bool {
        self.is_in_namespace(path) && path.ends_with(DESCRIPTOR)
    }

    pub fn is_control_path(&self, path: &str) -> bool {
        self.is_in_namespace(path) && path.ends_with(CONTROL)
    }

    pub fn is_event_subscription_path(&self, path: &str) -> bool {
        self.is_in_namespace(path) && path.ends_with(EVENTS)
    }

    pub fn is_event_callback_path(&self, path: &str) -> bool {
        self.is_in_namespace(path) && path.ends_with(&format!("{}{}", EVENTS, CALLBACK))
    }

    /// Copy of a local device graph with every service endpoint and in-memory icon
    /// pointing into this namespace
    pub fn prepare_local_device(&self, device: &Device) -> Device {
        let udn = device.udn();
        let services = device
            .services
            .iter()
            .map(|service| {
                let id = &service.service_id;
                service.clone().with_uris(
                    self.service_descriptor_path(udn, id),
                    self.control_path(udn, id),
                    self.event_subscription_path(udn, id),
                )
            })
            .collect();
        let embedded = device
            .embedded_devices
            .iter()
            .map(|embedded| self.prepare_local_device(embedded))
            .collect();

        let mut prepared = device.rebuild(services, embedded);
        for (index, icon) in prepared.icons.iter_mut().enumerate() {
            if icon.data.is_some() {
                icon.uri = self.icon_path(udn, index);
            }
        }
        prepared
    }

    /// Everything a local device tree serves
    pub fn local_resources(&self, device: &Device) -> Vec<Resource> {
        let mut resources = Vec::new();
        for node in device.find_devices() {
            let udn = node.udn();
            resources.push(Resource::new(
                self.descriptor_path(udn),
                ResourceKind::DeviceDescriptor { udn: udn.clone() },
            ));
            for (index, icon) in node.icons.iter().enumerate() {
                if icon.data.is_some() {
                    resources.push(Resource::new(
                        self.icon_path(udn, index),
                        ResourceKind::Icon {
                            udn: udn.clone(),
                            index,
                        },
                    ));
                }
            }
            for service in &node.services {
                let id = &service.service_id;
                let reference = ServiceReference::new(udn.clone(), id.clone());
                resources.push(Resource::new(
                    self.service_descriptor_path(udn, id),
                    ResourceKind::ServiceDescriptor {
                        service: reference.clone(),
                    },
                ));
                resources.push(Resource::new(
                    self.control_path(udn, id),
                    ResourceKind::ServiceControl {
                        service: reference.clone(),
                    },
                ));
                resources.push(Resource::new(
                    self.event_subscription_path(udn, id),
                    ResourceKind::ServiceEventSubscription { service: reference },
                ));
            }
        }
        resources
    }

    /// Event callback endpoints for every service of a remote device tree
    pub fn remote_resources(&self, device: &Device) -> Vec<Resource> {
        device
            .find_services()
            .into_iter()
            .map(|(udn, service)| {
                Resource::new(
                    self.event_callback_path(udn, &service.service_id),
                    ResourceKind::EventCallback {
                        service: ServiceReference::new(udn.clone(), service.service_id.clone()),
                    },
                )
            })
            .collect()
    }
}
