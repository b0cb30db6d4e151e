use std::net::IpAddr;
use std::sync::Arc;

use soap_client::{StreamRequestMessage, StreamResponseMessage};
use upnp_discovery::{DeviceDescriptorBinder, ServiceDescriptorBinder};
use upnp_model::{Headers, ServiceReference, Udn};
use upnp_registry::{Executor, Registry, UpnpConfig};
use url::Url;

use crate::error::{Result, RouterError};
use crate::router::Router;

/// What every protocol handler needs from the running stack
#[derive(Clone)]
pub struct ProtocolContext {
    pub registry: Arc<Registry>,
    pub router: Arc<dyn Router>,
    pub device_binder: Arc<dyn DeviceDescriptorBinder>,
    pub service_binder: Arc<dyn ServiceDescriptorBinder>,
    /// Runs follow-up work such as event delivery and descriptor retrieval
    pub executor: Arc<dyn Executor>,
}

impl ProtocolContext {
    pub fn config(&self) -> &UpnpConfig {
        self.registry.config()
    }

    pub fn server_token(&self) -> &str {
        &self.registry.config().server_token
    }

    /// Send a request; a transport failure counts as no response, an interruption is an error
    pub fn send(&self, request: &StreamRequestMessage) -> Result<Option<StreamResponseMessage>> {
        match self.router.send(request) {
            Ok(response) => Ok(response),
            Err(RouterError::Transport(reason)) => {
                tracing::warn!("No response to {}: {}", request, reason);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Attach extra configured headers without overriding protocol headers
    pub fn with_extra_headers(&self, mut request: StreamRequestMessage, extra: &Headers) -> StreamRequestMessage {
        for (name, value) in extra.iter() {
            if !request.headers.contains(name) {
                request.headers.add(name, value);
            }
        }
        request
    }

    /// `LOCATION` of a local device's descriptor as seen from `local_address`
    pub fn descriptor_location(&self, udn: &Udn, local_address: Option<IpAddr>) -> Option<Url> {
        let path = self.registry.namespace().descriptor_path(udn);
        self.router
            .stream_base_urls(local_address)
            .first()
            .and_then(|base| base.join(&path).ok())
    }

    /// Our GENA callback URLs for events of a remote service
    pub fn callback_urls(&self, reference: &ServiceReference, local_address: Option<IpAddr>) -> Vec<Url> {
        let path = self
            .registry
            .namespace()
            .event_callback_path(&reference.udn, &reference.service_id);
        self.router
            .stream_base_urls(local_address)
            .iter()
            .filter_map(|base| base.join(&path).ok())
            .collect()
    }
}
