use std::sync::Arc;

use soap_client::{gena, StreamRequestMessage, StreamResponseMessage};
use upnp_model::{header, ServiceReference, UpnpResponse};
use upnp_registry::{LocalGenaSubscription, ResourceKind};

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::{into_job, ReceivingSync};
use crate::sending::SendingEvent;

/// The local service an event subscription path belongs to
fn subscribed_service(ctx: &ProtocolContext, request: &StreamRequestMessage) -> Option<ServiceReference> {
    let resource = ctx.registry.get_resource(request.path())?;
    match resource.kind {
        ResourceKind::ServiceEventSubscription { service } => Some(service),
        _ => None,
    }
}

fn status(code: u16) -> Option<StreamResponseMessage> {
    Some(StreamResponseMessage::new(code))
}

/// GENA SUBSCRIBE to a local service, new or renewal
pub struct ReceivingSubscribe {
    ctx: ProtocolContext,
    request: StreamRequestMessage,
}

impl ReceivingSubscribe {
    pub fn new(ctx: ProtocolContext, request: StreamRequestMessage) -> Self {
        Self { ctx, request }
    }

    fn granted_duration(&self) -> u32 {
        let config = self.ctx.config();
        config.received_subscription_timeout.unwrap_or_else(|| {
            self.request
                .headers
                .get(header::TIMEOUT)
                .and_then(gena::parse_timeout)
                .unwrap_or(config.default_subscription_duration)
        })
    }

    fn accepted(&self, subscription: &LocalGenaSubscription) -> StreamResponseMessage {
        StreamResponseMessage::ok()
            .with_header(header::SERVER, self.ctx.server_token())
            .with_header(header::SID, subscription.sid())
            .with_header(header::TIMEOUT, gena::format_timeout(subscription.actual_duration()))
    }

    fn renew(&self, sid: &str) -> Option<StreamResponseMessage> {
        let Some(subscription) = self.ctx.registry.get_local_subscription(sid) else {
            tracing::debug!("Renewal for unknown subscription {}", sid);
            return status(UpnpResponse::PRECONDITION_FAILED);
        };
        subscription.set_actual_duration(self.granted_duration());
        if !self.ctx.registry.update_local_subscription(&subscription) {
            return status(UpnpResponse::PRECONDITION_FAILED);
        }
        tracing::debug!("Renewed subscription {} for {}s", sid, subscription.actual_duration());
        Some(self.accepted(&subscription))
    }

    fn subscribe(&self, reference: ServiceReference) -> Option<StreamResponseMessage> {
        let headers = &self.request.headers;
        if headers.get(header::NT).map(str::trim) != Some(gena::NT_EVENT) {
            tracing::debug!("SUBSCRIBE to {} without NT {}", reference, gena::NT_EVENT);
            return status(UpnpResponse::PRECONDITION_FAILED);
        }
        let callback_urls = headers
            .get(header::CALLBACK)
            .map(gena::parse_callback)
            .unwrap_or_default();
        if callback_urls.is_empty() {
            tracing::debug!("SUBSCRIBE to {} without usable CALLBACK", reference);
            return status(UpnpResponse::PRECONDITION_FAILED);
        }

        let subscription = Arc::new(LocalGenaSubscription::new(
            reference,
            callback_urls,
            self.granted_duration(),
        ));
        self.ctx.registry.add_local_subscription(Arc::clone(&subscription));
        tracing::info!(
            "New subscription {} on {} for {}s",
            subscription.sid(),
            subscription.reference(),
            subscription.actual_duration()
        );

        let response = self.accepted(&subscription);
        let initial = SendingEvent::initial(self.ctx.clone(), subscription);
        self.ctx.executor.execute(into_job(Box::new(initial)));
        Some(response)
    }
}

impl ReceivingSync for ReceivingSubscribe {
    fn name(&self) -> &'static str {
        "ReceivingSubscribe"
    }

    fn execute(&self) -> Result<Option<StreamResponseMessage>> {
        let Some(reference) = subscribed_service(&self.ctx, &self.request) else {
            return Ok(None);
        };

        let headers = &self.request.headers;
        match headers.get(header::SID) {
            Some(_) if headers.contains(header::NT) || headers.contains(header::CALLBACK) => {
                Ok(status(UpnpResponse::BAD_REQUEST))
            }
            Some(sid) => Ok(self.renew(sid.trim())),
            None => Ok(self.subscribe(reference)),
        }
    }
}

/// GENA UNSUBSCRIBE from a local service
pub struct ReceivingUnsubscribe {
    ctx: ProtocolContext,
    request: StreamRequestMessage,
}

impl ReceivingUnsubscribe {
    pub fn new(ctx: ProtocolContext, request: StreamRequestMessage) -> Self {
        Self { ctx, request }
    }
}

impl ReceivingSync for ReceivingUnsubscribe {
    fn name(&self) -> &'static str {
        "ReceivingUnsubscribe"
    }

    fn execute(&self) -> Result<Option<StreamResponseMessage>> {
        if subscribed_service(&self.ctx, &self.request).is_none() {
            return Ok(None);
        }

        let headers = &self.request.headers;
        let Some(sid) = headers.get(header::SID).map(str::trim) else {
            return Ok(status(UpnpResponse::PRECONDITION_FAILED));
        };
        if headers.contains(header::NT) || headers.contains(header::CALLBACK) {
            return Ok(status(UpnpResponse::BAD_REQUEST));
        }

        match self.ctx.registry.remove_local_subscription(sid) {
            Some(subscription) => {
                subscription.end(None);
                tracing::info!("Subscription {} on {} cancelled", sid, subscription.reference());
                Ok(Some(StreamResponseMessage::ok()))
            }
            None => {
                tracing::debug!("UNSUBSCRIBE for unknown subscription {}", sid);
                Ok(status(UpnpResponse::PRECONDITION_FAILED))
            }
        }
    }
}
