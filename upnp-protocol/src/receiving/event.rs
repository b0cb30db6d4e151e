use soap_client::{gena, StreamRequestMessage, StreamResponseMessage};
use upnp_model::{header, UpnpResponse};
use upnp_registry::ResourceKind;

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::ReceivingSync;

/// GENA NOTIFY delivering events of a remote service we subscribed to
pub struct ReceivingEvent {
    ctx: ProtocolContext,
    request: StreamRequestMessage,
}

impl ReceivingEvent {
    pub fn new(ctx: ProtocolContext, request: StreamRequestMessage) -> Self {
        Self { ctx, request }
    }

    fn reject(&self, code: u16, reason: &str) -> Result<Option<StreamResponseMessage>> {
        tracing::debug!("Rejecting event on {} with {}: {}", self.request.path(), code, reason);
        Ok(Some(StreamResponseMessage::new(code)))
    }
}

impl ReceivingSync for ReceivingEvent {
    fn name(&self) -> &'static str {
        "ReceivingEvent"
    }

    fn execute(&self) -> Result<Option<StreamResponseMessage>> {
        let headers = &self.request.headers;
        let Some(sid) = headers.get(header::SID).map(str::trim) else {
            return self.reject(UpnpResponse::PRECONDITION_FAILED, "missing SID");
        };
        if headers.get(header::NT).map(str::trim) != Some(gena::NT_EVENT)
            || headers.get(header::NTS).map(str::trim) != Some(gena::NTS_PROPCHANGE)
        {
            return self.reject(UpnpResponse::PRECONDITION_FAILED, "invalid NT/NTS");
        }
        let Some(sequence) = headers.get(header::SEQ).and_then(gena::parse_sequence) else {
            return self.reject(UpnpResponse::PRECONDITION_FAILED, "missing SEQ");
        };

        let resource = self.ctx.registry.get_resource(self.request.path());
        let Some(ResourceKind::EventCallback { service: reference }) = resource.map(|r| r.kind) else {
            return self.reject(UpnpResponse::NOT_FOUND, "no callback resource");
        };

        let values = match gena::read_property_set(&self.request.body_string()) {
            Ok(values) => values,
            Err(e) => {
                if let Some(subscription) = self.ctx.registry.get_remote_subscription(sid) {
                    subscription.invalid_message(&e.to_string());
                }
                return self.reject(UpnpResponse::INTERNAL_SERVER_ERROR, &e.message);
            }
        };

        let Some(subscription) = self.ctx.registry.get_wait_remote_subscription(sid) else {
            return self.reject(UpnpResponse::PRECONDITION_FAILED, "unknown SID");
        };
        if subscription.reference() != &reference {
            tracing::warn!(
                "Event for {} arrived on the callback of {}",
                subscription.reference(),
                reference
            );
        }

        tracing::debug!("Event {} for {} with {} value(s)", sequence, sid, values.len());
        self.ctx
            .executor
            .execute(Box::new(move || subscription.receive(sequence, values)));
        Ok(Some(StreamResponseMessage::ok()))
    }
}
