use std::sync::Arc;

use soap_client::{gena, StreamRequestMessage, StreamResponseMessage, UpnpMethod};
use upnp_model::header;
use upnp_registry::{CancelReason, RemoteGenaSubscription};

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::AsyncProtocol;

fn subscription_request(ctx: &ProtocolContext, subscription: &RemoteGenaSubscription, method: UpnpMethod) -> StreamRequestMessage {
    let request = StreamRequestMessage::new(method, subscription.event_subscription_url())
        .with_header(header::USER_AGENT, ctx.server_token());
    ctx.with_extra_headers(request, &ctx.config().event_subscription_headers)
}

/// Granted duration of a successful SUBSCRIBE response
fn granted_duration(response: &StreamResponseMessage, requested: u32) -> u32 {
    response
        .headers
        .get(header::TIMEOUT)
        .and_then(gena::parse_timeout)
        .unwrap_or(requested)
}

/// Initial GENA SUBSCRIBE to a remote service
pub struct SendingSubscribe {
    ctx: ProtocolContext,
    subscription: Arc<RemoteGenaSubscription>,
}

impl SendingSubscribe {
    pub fn new(ctx: ProtocolContext, subscription: Arc<RemoteGenaSubscription>) -> Self {
        Self { ctx, subscription }
    }

    fn subscribe(&self) -> Result<()> {
        let subscription = &self.subscription;
        let response = self.ctx.send(
            &subscription_request(&self.ctx, subscription, UpnpMethod::Subscribe)
                .with_header(header::NT, gena::NT_EVENT)
                .with_header(header::CALLBACK, gena::format_callback(&subscription.callback_urls()))
                .with_header(header::TIMEOUT, gena::format_timeout(subscription.requested_duration())),
        );

        let response = match response {
            Ok(Some(response)) => response,
            Ok(None) => {
                subscription.fail(None, "Subscription failed, no response received");
                return Ok(());
            }
            Err(e) => {
                subscription.fail(None, &e.to_string());
                return Err(e);
            }
        };

        if response.is_failed() {
            subscription.fail(
                Some(&response.operation),
                &format!("Subscription failed: {}", response.operation.response_details()),
            );
            return Ok(());
        }

        let Some(sid) = response.headers.get(header::SID).map(str::trim).filter(|sid| !sid.is_empty()) else {
            subscription.fail(Some(&response.operation), "Subscription response without SID");
            return Ok(());
        };

        subscription.establish(sid, granted_duration(&response, subscription.requested_duration()));
        self.ctx.registry.add_remote_subscription(Arc::clone(subscription));
        Ok(())
    }
}

impl AsyncProtocol for SendingSubscribe {
    fn name(&self) -> &'static str {
        "SendingSubscribe"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let reference = self.subscription.reference().clone();
        let discovered_on = self
            .ctx
            .registry
            .get_remote_device(&reference.udn, false)
            .and_then(|device| device.identity.discovered_on());
        let callback_urls = self.ctx.callback_urls(&reference, discovered_on);
        if callback_urls.is_empty() {
            self.subscription
                .fail(None, "No stream server address to receive events on");
            return Ok(());
        }

        self.subscription.set_callback_urls(callback_urls);
        self.subscription.begin_subscribe();

        self.ctx
            .registry
            .register_pending_remote_subscription(Arc::clone(&self.subscription));
        let result = self.subscribe();
        self.ctx
            .registry
            .unregister_pending_remote_subscription(&self.subscription);
        result
    }
}

/// SUBSCRIBE with SID extending an established subscription
pub struct SendingRenewal {
    ctx: ProtocolContext,
    subscription: Arc<RemoteGenaSubscription>,
}

impl SendingRenewal {
    pub fn new(ctx: ProtocolContext, subscription: Arc<RemoteGenaSubscription>) -> Self {
        Self { ctx, subscription }
    }
}

impl AsyncProtocol for SendingRenewal {
    fn name(&self) -> &'static str {
        "SendingRenewal"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let subscription = &self.subscription;
        let Some(sid) = subscription.sid() else {
            subscription.end(Some(CancelReason::RenewalFailed), None);
            return Ok(());
        };

        let request = subscription_request(&self.ctx, subscription, UpnpMethod::Subscribe)
            .with_header(header::SID, sid.as_str())
            .with_header(header::TIMEOUT, gena::format_timeout(subscription.requested_duration()));

        match self.ctx.send(&request) {
            Ok(Some(response)) if !response.is_failed() => {
                let duration = granted_duration(&response, subscription.requested_duration());
                subscription.renewed(duration);
                self.ctx.registry.update_remote_subscription(subscription);
                tracing::debug!("Renewed subscription {} for {}s", sid, duration);
                Ok(())
            }
            Ok(response) => {
                self.ctx.registry.remove_remote_subscription(&sid);
                subscription.end(
                    Some(CancelReason::RenewalFailed),
                    response.as_ref().map(|r| &r.operation),
                );
                Ok(())
            }
            Err(e) => {
                self.ctx.registry.remove_remote_subscription(&sid);
                subscription.end(Some(CancelReason::RenewalFailed), None);
                Err(e)
            }
        }
    }
}

/// UNSUBSCRIBE ending a subscription; it is removed whatever the publisher answers
pub struct SendingUnsubscribe {
    ctx: ProtocolContext,
    subscription: Arc<RemoteGenaSubscription>,
}

impl SendingUnsubscribe {
    pub fn new(ctx: ProtocolContext, subscription: Arc<RemoteGenaSubscription>) -> Self {
        Self { ctx, subscription }
    }
}

impl AsyncProtocol for SendingUnsubscribe {
    fn name(&self) -> &'static str {
        "SendingUnsubscribe"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let subscription = &self.subscription;
        let Some(sid) = subscription.sid() else {
            subscription.end(None, None);
            return Ok(());
        };
        self.ctx.registry.remove_remote_subscription(&sid);

        let request =
            subscription_request(&self.ctx, subscription, UpnpMethod::Unsubscribe).with_header(header::SID, sid.as_str());
        match self.ctx.send(&request) {
            Ok(Some(response)) if !response.is_failed() => {
                subscription.end(None, Some(&response.operation));
                Ok(())
            }
            Ok(response) => {
                subscription.end(
                    Some(CancelReason::UnsubscribeFailed),
                    response.as_ref().map(|r| &r.operation),
                );
                Ok(())
            }
            Err(e) => {
                subscription.end(Some(CancelReason::UnsubscribeFailed), None);
                Err(e)
            }
        }
    }
}
