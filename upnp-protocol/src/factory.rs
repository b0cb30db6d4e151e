//! Maps incoming messages to receiving handlers and builds sending handlers.

use std::sync::Arc;

use soap_client::{StreamRequestMessage, StreamResponseMessage, UpnpMethod};
use upnp_discovery::ssdp::DatagramOperation;
use upnp_discovery::{IncomingDatagramMessage, NotificationSubtype, NotificationType};
use upnp_model::{header, ActionInvocation, Device, ServiceReference, StateVariableValue};
use upnp_registry::{Job, RemoteGenaSubscription, SendingProtocols};
use url::Url;

use crate::context::ProtocolContext;
use crate::error::ProtocolCreationError;
use crate::protocol::{into_job, run_sync, AsyncProtocol, ReceivingSync};
use crate::receiving::{
    ReceivingAction, ReceivingEvent, ReceivingNotification, ReceivingRetrieval, ReceivingSearch,
    ReceivingSearchResponse, ReceivingSubscribe, ReceivingUnsubscribe,
};
use crate::retrieval::RetrievalCoordinator;
use crate::sending::{
    SendingAction, SendingEvent, SendingNotification, SendingRenewal, SendingSearch, SendingSubscribe,
    SendingUnsubscribe,
};

/// Entry point for every protocol exchange of the stack
pub struct ProtocolFactory {
    ctx: ProtocolContext,
    retrieval: Arc<RetrievalCoordinator>,
}

impl ProtocolFactory {
    /// Create the factory and register it with the registry for renewals and advertisements
    pub fn new(ctx: ProtocolContext) -> Arc<Self> {
        let retrieval = Arc::new(RetrievalCoordinator::new(&ctx));
        let factory = Arc::new(Self { ctx, retrieval });
        let protocols: Arc<dyn SendingProtocols> = factory.clone();
        if !factory.ctx.registry.set_sending_protocols(&protocols) {
            tracing::warn!("Registry already has sending protocols, keeping the existing ones");
        }
        factory
    }

    pub fn context(&self) -> &ProtocolContext {
        &self.ctx
    }

    pub fn retrieval(&self) -> &Arc<RetrievalCoordinator> {
        &self.retrieval
    }

    /// Handler for a received datagram, `None` if it is of no interest
    pub fn create_receiving_async(&self, datagram: IncomingDatagramMessage) -> Option<Box<dyn AsyncProtocol>> {
        let protocol: Box<dyn AsyncProtocol> = match datagram.operation.clone() {
            DatagramOperation::Notify => {
                let byebye = datagram.notification_subtype() == Some(NotificationSubtype::ByeBye);
                if !byebye && !self.is_discovery_allowed(&datagram) {
                    tracing::trace!("Ignoring advertisement {:?}", datagram.headers.get(header::USN));
                    return None;
                }
                Box::new(ReceivingNotification::new(
                    self.ctx.clone(),
                    Arc::clone(&self.retrieval),
                    datagram,
                ))
            }
            DatagramOperation::Search => Box::new(ReceivingSearch::new(self.ctx.clone(), datagram)),
            DatagramOperation::Response(status) if status.is_failed() => {
                tracing::debug!("Ignoring failed search response {} from {}", status, datagram.source);
                return None;
            }
            DatagramOperation::Response(_) => {
                if !self.is_discovery_allowed(&datagram) {
                    return None;
                }
                Box::new(ReceivingSearchResponse::new(
                    self.ctx.clone(),
                    Arc::clone(&self.retrieval),
                    datagram,
                ))
            }
        };
        Some(protocol)
    }

    fn is_discovery_allowed(&self, datagram: &IncomingDatagramMessage) -> bool {
        let usn = datagram.usn();
        let service_type = usn.as_ref().and_then(|usn| usn.service_type());
        self.ctx.config().is_discovery_allowed(service_type)
    }

    /// Handler for a received stream request
    pub fn create_receiving_sync(
        &self,
        request: StreamRequestMessage,
    ) -> Result<Box<dyn ReceivingSync>, ProtocolCreationError> {
        let namespace = self.ctx.registry.namespace();
        let path = request.path().to_string();
        let method = request.method.clone();
        let ctx = self.ctx.clone();

        let protocol: Box<dyn ReceivingSync> = match method {
            UpnpMethod::Get => Box::new(ReceivingRetrieval::new(ctx, request)),
            UpnpMethod::Post if namespace.is_control_path(&path) => Box::new(ReceivingAction::new(ctx, request)),
            UpnpMethod::Subscribe if namespace.is_event_subscription_path(&path) => {
                Box::new(ReceivingSubscribe::new(ctx, request))
            }
            UpnpMethod::Unsubscribe if namespace.is_event_subscription_path(&path) => {
                Box::new(ReceivingUnsubscribe::new(ctx, request))
            }
            UpnpMethod::Notify if namespace.is_event_callback_path(&path) => Box::new(ReceivingEvent::new(ctx, request)),
            method => {
                return Err(ProtocolCreationError {
                    method: method.as_str().to_string(),
                    path,
                })
            }
        };
        Ok(protocol)
    }

    /// Run the matching receiving handler for a stream request.
    ///
    /// `None` means nothing here serves the request.
    pub fn handle_stream_request(&self, request: StreamRequestMessage) -> Option<StreamResponseMessage> {
        match self.create_receiving_sync(request) {
            Ok(protocol) => run_sync(protocol.as_ref()),
            Err(e) => {
                tracing::debug!("{}", e);
                None
            }
        }
    }

    /// Schedule the matching handler for a received datagram on the protocol executor
    pub fn handle_datagram(&self, datagram: IncomingDatagramMessage) {
        if let Some(protocol) = self.create_receiving_async(datagram) {
            self.ctx.executor.execute(into_job(protocol));
        }
    }

    pub fn create_sending_search(&self, target: NotificationType, mx: u32) -> SendingSearch {
        SendingSearch::new(self.ctx.clone(), target, mx)
    }

    pub fn create_sending_notification_alive(&self, device: Arc<Device>) -> SendingNotification {
        SendingNotification::alive(self.ctx.clone(), device)
    }

    pub fn create_sending_notification_byebye(&self, device: Arc<Device>) -> SendingNotification {
        SendingNotification::byebye(self.ctx.clone(), device)
    }

    pub fn create_sending_action(&self, invocation: ActionInvocation, control_url: Url) -> SendingAction {
        SendingAction::new(self.ctx.clone(), invocation, control_url)
    }

    pub fn create_sending_subscribe(&self, subscription: Arc<RemoteGenaSubscription>) -> SendingSubscribe {
        SendingSubscribe::new(self.ctx.clone(), subscription)
    }

    pub fn create_sending_renewal(&self, subscription: Arc<RemoteGenaSubscription>) -> SendingRenewal {
        SendingRenewal::new(self.ctx.clone(), subscription)
    }

    pub fn create_sending_unsubscribe(&self, subscription: Arc<RemoteGenaSubscription>) -> SendingUnsubscribe {
        SendingUnsubscribe::new(self.ctx.clone(), subscription)
    }

    /// One event per current subscriber of a local service
    pub fn create_sending_events(
        &self,
        reference: &ServiceReference,
        values: Vec<StateVariableValue>,
    ) -> Vec<SendingEvent> {
        self.ctx
            .registry
            .local_subscriptions_for(reference)
            .into_iter()
            .map(|subscription| SendingEvent::new(self.ctx.clone(), subscription, values.clone()))
            .collect()
    }
}

impl SendingProtocols for ProtocolFactory {
    fn renewal(&self, subscription: Arc<RemoteGenaSubscription>) -> Job {
        into_job(Box::new(self.create_sending_renewal(subscription)))
    }

    fn unsubscribe(&self, subscription: Arc<RemoteGenaSubscription>) -> Job {
        into_job(Box::new(self.create_sending_unsubscribe(subscription)))
    }

    fn notification_alive(&self, device: Arc<Device>) -> Job {
        into_job(Box::new(self.create_sending_notification_alive(device)))
    }

    fn notification_byebye(&self, device: Arc<Device>) -> Job {
        into_job(Box::new(self.create_sending_notification_byebye(device)))
    }
}
