use std::sync::Arc;

use soap_client::{gena, StreamRequestMessage, UpnpMethod};
use upnp_model::{header, Service, StateVariableValue};
use upnp_registry::LocalGenaSubscription;

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::AsyncProtocol;

/// Current values of the evented state variables of a local service
pub fn evented_values(service: &Service) -> Vec<StateVariableValue> {
    let Some(manager) = service.manager() else {
        return Vec::new();
    };
    manager
        .current_values()
        .into_iter()
        .filter(|value| {
            service
                .state_variable(&value.name)
                .is_some_and(|variable| variable.send_events)
        })
        .collect()
}

/// GENA NOTIFY to every callback URL of a local subscription
pub struct SendingEvent {
    ctx: ProtocolContext,
    subscription: Arc<LocalGenaSubscription>,
    values: Option<Vec<StateVariableValue>>,
    sequence: u32,
}

impl SendingEvent {
    /// Event carrying the given changed values.
    ///
    /// The SEQ is taken from the subscription here, not when the event is sent.
    pub fn new(ctx: ProtocolContext, subscription: Arc<LocalGenaSubscription>, values: Vec<StateVariableValue>) -> Self {
        let sequence = subscription.next_sequence();
        Self {
            ctx,
            subscription,
            values: Some(values),
            sequence,
        }
    }

    /// Event carrying every evented value, read when the event is sent
    pub fn initial(ctx: ProtocolContext, subscription: Arc<LocalGenaSubscription>) -> Self {
        let sequence = subscription.next_sequence();
        Self {
            ctx,
            subscription,
            values: None,
            sequence,
        }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl AsyncProtocol for SendingEvent {
    fn name(&self) -> &'static str {
        "SendingEvent"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let subscription = &self.subscription;
        if subscription.is_ended() {
            return Ok(());
        }

        let values = match &self.values {
            Some(values) => values.clone(),
            None => match self.ctx.registry.get_service(subscription.reference()) {
                Some(service) => evented_values(&service),
                None => return Ok(()),
            },
        };
        let body = gena::write_property_set(&values);
        let sequence = self.sequence;

        for url in subscription.callback_urls() {
            let request = StreamRequestMessage::new(UpnpMethod::Notify, &url)
                .with_header(header::NT, gena::NT_EVENT)
                .with_header(header::NTS, gena::NTS_PROPCHANGE)
                .with_header(header::SID, subscription.sid())
                .with_header(header::SEQ, sequence.to_string())
                .with_xml_body(body.clone());

            match self.ctx.send(&request)? {
                Some(response) if response.is_failed() => {
                    tracing::warn!("Event {} to {} rejected: {}", sequence, url, response.operation);
                }
                Some(_) => tracing::debug!("Delivered event {} of {} to {}", sequence, subscription.sid(), url),
                None => tracing::warn!("Event {} to {} not delivered", sequence, url),
            }
        }
        Ok(())
    }
}
