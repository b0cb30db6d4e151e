use std::sync::Arc;

use upnp_discovery::{IncomingDatagramMessage, NotificationSubtype};
use upnp_model::DeviceIdentity;

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::AsyncProtocol;
use crate::retrieval::RetrievalCoordinator;

/// Refresh a known remote device or schedule retrieval of its descriptor
fn advertised(ctx: &ProtocolContext, retrieval: &Arc<RetrievalCoordinator>, datagram: &IncomingDatagramMessage) {
    let Some(usn) = datagram.usn() else {
        tracing::debug!("Ignoring advertisement without USN from {}", datagram.source);
        return;
    };
    let (Some(location), Some(max_age)) = (datagram.location(), datagram.max_age()) else {
        tracing::debug!("Ignoring advertisement of {} without LOCATION or max-age", usn.udn);
        return;
    };
    if ctx.registry.is_local_device(&usn.udn) {
        return;
    }

    let identity = DeviceIdentity::remote(usn.udn, max_age, location, datagram.local_address);
    if ctx.registry.update_remote_device_expiration(&identity) {
        return;
    }

    tracing::debug!("Advertisement of unknown device {}, retrieving descriptor", identity.udn);
    let retrieval = Arc::clone(retrieval);
    ctx.executor.execute(Box::new(move || retrieval.retrieve(identity)));
}

/// SSDP `NOTIFY` alive or byebye
pub struct ReceivingNotification {
    ctx: ProtocolContext,
    retrieval: Arc<RetrievalCoordinator>,
    datagram: IncomingDatagramMessage,
}

impl ReceivingNotification {
    pub fn new(ctx: ProtocolContext, retrieval: Arc<RetrievalCoordinator>, datagram: IncomingDatagramMessage) -> Self {
        Self { ctx, retrieval, datagram }
    }
}

impl AsyncProtocol for ReceivingNotification {
    fn name(&self) -> &'static str {
        "ReceivingNotification"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        match self.datagram.notification_subtype() {
            Some(NotificationSubtype::Alive) => advertised(&self.ctx, &self.retrieval, &self.datagram),
            Some(NotificationSubtype::ByeBye) => {
                let Some(usn) = self.datagram.usn() else {
                    return Ok(());
                };
                if self.ctx.registry.get_remote_device(&usn.udn, true).is_some() {
                    tracing::info!("Device {} said byebye", usn.udn);
                    self.ctx.registry.remove_remote_device(&usn.udn);
                }
            }
            None => tracing::debug!("Ignoring NOTIFY without known NTS from {}", self.datagram.source),
        }
        Ok(())
    }
}

/// Unicast answer to one of our M-SEARCH requests
pub struct ReceivingSearchResponse {
    ctx: ProtocolContext,
    retrieval: Arc<RetrievalCoordinator>,
    datagram: IncomingDatagramMessage,
}

impl ReceivingSearchResponse {
    pub fn new(ctx: ProtocolContext, retrieval: Arc<RetrievalCoordinator>, datagram: IncomingDatagramMessage) -> Self {
        Self { ctx, retrieval, datagram }
    }
}

impl AsyncProtocol for ReceivingSearchResponse {
    fn name(&self) -> &'static str {
        "ReceivingSearchResponse"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        advertised(&self.ctx, &self.retrieval, &self.datagram);
        Ok(())
    }
}
