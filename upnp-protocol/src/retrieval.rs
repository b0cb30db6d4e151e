//! Descriptor retrieval for newly advertised remote devices.
//!
//! Concurrent advertisements of the same device are collapsed on the descriptor
//! URL, so a device is fetched and announced once however many of its entries
//! arrive together.

use std::sync::Arc;

use dashmap::DashSet;
use soap_client::{StreamRequestMessage, UpnpMethod};
use upnp_discovery::{DeviceDescriptorBinder, ServiceDescriptorBinder};
use upnp_model::{Device, DeviceDetails, DeviceIdentity, DeviceType, Service, Udn, ValidationErrors};
use upnp_registry::{DiscoveryFailure, Registry};
use url::Url;

use crate::context::ProtocolContext;
use crate::error::{Result, RouterError};
use crate::router::Router;

/// Removes a URL from the active set when the retrieval ends
struct ActiveRetrieval<'a> {
    active: &'a DashSet<Url>,
    url: Url,
}

impl Drop for ActiveRetrieval<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.url);
    }
}

/// Fetches, binds and registers remote device descriptors
pub struct RetrievalCoordinator {
    registry: Arc<Registry>,
    router: Arc<dyn Router>,
    device_binder: Arc<dyn DeviceDescriptorBinder>,
    service_binder: Arc<dyn ServiceDescriptorBinder>,
    active: DashSet<Url>,
    failures_reported: DashSet<Udn>,
}

impl RetrievalCoordinator {
    pub fn new(ctx: &ProtocolContext) -> Self {
        Self {
            registry: Arc::clone(&ctx.registry),
            router: Arc::clone(&ctx.router),
            device_binder: Arc::clone(&ctx.device_binder),
            service_binder: Arc::clone(&ctx.service_binder),
            active: DashSet::new(),
            failures_reported: DashSet::new(),
        }
    }

    /// Whether a retrieval of `url` is in flight
    pub fn is_active(&self, url: &Url) -> bool {
        self.active.contains(url)
    }

    /// Retrieve and register the device advertised with `identity`
    pub fn retrieve(&self, identity: DeviceIdentity) {
        let Some(url) = identity.descriptor_url().cloned() else {
            tracing::warn!("Cannot retrieve {} without a descriptor URL", identity.udn);
            return;
        };
        if !self.active.insert(url.clone()) {
            tracing::trace!("Retrieval of {} already in progress", url);
            return;
        }
        let _active = ActiveRetrieval {
            active: &self.active,
            url: url.clone(),
        };
        // Registration happens before the URL is released, so one of the two checks always sees it
        if self.registry.get_device(&identity.udn, false).is_some() {
            tracing::trace!("Device {} already registered, skipping retrieval", identity.udn);
            return;
        }

        if let Err(e) = self.describe(identity, &url) {
            if e.is_interrupted() {
                tracing::debug!("Retrieval of {} interrupted", url);
            } else {
                tracing::warn!("Retrieval of {} failed: {}", url, e);
            }
        }
    }

    fn fetch(&self, url: &Url) -> Result<Option<String>> {
        let request = StreamRequestMessage::new(UpnpMethod::Get, url);
        let request = self.with_retrieval_headers(request);
        let response = match self.router.send(&request) {
            Ok(Some(response)) => response,
            Ok(None) => {
                tracing::warn!("No response retrieving {}", url);
                return Ok(None);
            }
            Err(RouterError::Interrupted) => return Err(RouterError::Interrupted.into()),
            Err(e) => {
                tracing::warn!("Could not retrieve {}: {}", url, e);
                return Ok(None);
            }
        };

        if response.is_failed() {
            tracing::warn!("Retrieving {} failed: {}", url, response.operation.response_details());
            return Ok(None);
        }
        let body = response.body_string();
        if body.trim().is_empty() {
            tracing::warn!("Empty descriptor at {}", url);
            return Ok(None);
        }
        if !response.is_content_type_xml() {
            tracing::debug!("Descriptor at {} is not declared as XML, reading it anyway", url);
        }
        Ok(Some(body))
    }

    fn with_retrieval_headers(&self, mut request: StreamRequestMessage) -> StreamRequestMessage {
        for (name, value) in self.registry.config().descriptor_retrieval_headers.iter() {
            request.headers.set(name, value);
        }
        request
    }

    fn describe(&self, identity: DeviceIdentity, url: &Url) -> Result<()> {
        let Some(xml) = self.fetch(url)? else {
            return Ok(());
        };

        let device = match self.device_binder.describe(&identity, &xml) {
            Ok(device) => device,
            Err(e) => {
                let skeleton = Device::new(identity, DeviceType::uda("Basic", 1), DeviceDetails::default());
                self.report_failure(&skeleton, DiscoveryFailure::Binding(e.to_string()));
                return Ok(());
            }
        };

        if !self.registry.notify_discovery_start(&device) {
            tracing::debug!("Discovery of {} not started, device already known", device.udn());
            return Ok(());
        }

        let hydrated = self.hydrate(&device, &device)?;

        if let Err(errors) = ValidationErrors::check(format!("remote device {}", hydrated.udn()), hydrated.validate()) {
            self.report_failure(&hydrated, DiscoveryFailure::Validation(errors));
            return Ok(());
        }

        if let Err(e) = self.registry.add_remote_device(hydrated.clone()) {
            self.report_failure(&hydrated, DiscoveryFailure::from(e));
        }
        Ok(())
    }

    /// Rebuild `node` with every retained service described by its SCPD
    fn hydrate(&self, root: &Device, node: &Device) -> Result<Device> {
        let mut services = Vec::new();
        for service in &node.services {
            if !self.registry.config().is_service_type_retained(&service.service_type) {
                tracing::trace!("Skipping service {} of {}", service.service_type, node.udn());
                continue;
            }
            match self.describe_service(root, service)? {
                Some(described) => services.push(described),
                None => tracing::warn!("Skipping service {} of {}", service.service_id, node.udn()),
            }
        }

        let mut embedded = Vec::new();
        for child in &node.embedded_devices {
            embedded.push(self.hydrate(root, child)?);
        }

        Ok(node.rebuild(services, embedded))
    }

    fn describe_service(&self, root: &Device, service: &Service) -> Result<Option<Service>> {
        let Some(url) = root.normalize_uri(&service.descriptor_uri) else {
            tracing::warn!("Unresolvable SCPD URL '{}' for {}", service.descriptor_uri, service.service_id);
            return Ok(None);
        };
        let Some(xml) = self.fetch(&url)? else {
            return Ok(None);
        };
        match self.service_binder.describe(service, &xml) {
            Ok(described) => Ok(Some(described)),
            Err(e) => {
                tracing::warn!("Invalid SCPD at {}: {}", url, e);
                Ok(None)
            }
        }
    }

    /// Tell listeners about a failed discovery once per UDN
    fn report_failure(&self, device: &Device, failure: DiscoveryFailure) {
        if self.failures_reported.insert(device.udn().clone()) {
            self.registry.notify_discovery_failure(device, failure);
        } else {
            tracing::debug!("Discovery of {} failed again: {}", device.udn(), failure);
        }
    }
}
