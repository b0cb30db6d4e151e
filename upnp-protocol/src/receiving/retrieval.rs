use soap_client::{StreamRequestMessage, StreamResponseMessage};
use upnp_registry::ResourceKind;

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::ReceivingSync;

/// GET of a local device descriptor, service descriptor or icon
pub struct ReceivingRetrieval {
    ctx: ProtocolContext,
    request: StreamRequestMessage,
}

impl ReceivingRetrieval {
    pub fn new(ctx: ProtocolContext, request: StreamRequestMessage) -> Self {
        Self { ctx, request }
    }
}

impl ReceivingSync for ReceivingRetrieval {
    fn name(&self) -> &'static str {
        "ReceivingRetrieval"
    }

    fn execute(&self) -> Result<Option<StreamResponseMessage>> {
        let path = self.request.path();
        let Some(resource) = self.ctx.registry.get_resource(path) else {
            tracing::debug!("No resource for GET {}", path);
            return Ok(None);
        };

        let response = match &resource.kind {
            ResourceKind::DeviceDescriptor { udn } => {
                let Some(device) = self.ctx.registry.get_local_device(udn, false) else {
                    return Ok(None);
                };
                let xml = self.ctx.device_binder.generate(&device)?;
                StreamResponseMessage::ok().with_xml_body(xml)
            }
            ResourceKind::ServiceDescriptor { service } => {
                let Some(service) = self.ctx.registry.get_service(service) else {
                    return Ok(None);
                };
                let xml = self.ctx.service_binder.generate(&service)?;
                StreamResponseMessage::ok().with_xml_body(xml)
            }
            ResourceKind::Icon { udn, index } => {
                let icon = self
                    .ctx
                    .registry
                    .get_local_device(udn, false)
                    .and_then(|device| device.icons.get(*index).cloned());
                match icon {
                    Some(icon) => match icon.data {
                        Some(data) => StreamResponseMessage::ok().with_body(&icon.mime_type, data),
                        None => return Ok(None),
                    },
                    None => return Ok(None),
                }
            }
            other => {
                tracing::debug!("Resource {} ({:?}) is not retrievable", path, other);
                return Ok(None);
            }
        };

        tracing::debug!("Serving {} ({} bytes)", path, response.body.len());
        Ok(Some(response))
    }
}
