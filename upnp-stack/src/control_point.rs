//! Client-side operations: search, remote actions, subscriptions and publishing
//! local state changes.

use std::sync::Arc;

use upnp_discovery::NotificationType;
use upnp_model::{ActionInvocation, Service, ServiceReference, StateVariableValue, UpnpResponse};
use upnp_protocol::{into_job, ProtocolFactory};
use upnp_registry::{RemoteGenaSubscription, SubscriptionCallback};
use url::Url;

use crate::error::{Result, UpnpError};

/// Receives the outcome of an action executed with [`ControlPoint::execute`]
pub trait ActionCallback: Send + Sync {
    fn success(&self, invocation: &ActionInvocation);

    /// `response` is the HTTP status if the remote service answered at all
    fn failure(&self, invocation: &ActionInvocation, response: Option<&UpnpResponse>, message: &str);
}

/// Entry point for talking to remote devices
#[derive(Clone)]
pub struct ControlPoint {
    factory: Arc<ProtocolFactory>,
}

impl ControlPoint {
    pub fn new(factory: Arc<ProtocolFactory>) -> Self {
        Self { factory }
    }

    /// Multicast a search for every device, with the configured MX
    pub fn search(&self) {
        let mx = self.factory.context().config().search_mx;
        self.search_for(NotificationType::All, mx);
    }

    /// Multicast a search for `target`; responders arrive through discovery
    pub fn search_for(&self, target: NotificationType, mx: u32) {
        let search = self.factory.create_sending_search(target, mx);
        self.factory.context().executor.execute(into_job(Box::new(search)));
    }

    /// Execute `invocation` in the background and report the outcome to `callback`
    pub fn execute(&self, invocation: ActionInvocation, control_url: Url, callback: Arc<dyn ActionCallback>) {
        let factory = Arc::clone(&self.factory);
        self.factory.context().executor.execute(Box::new(move || {
            let action = invocation.action().name.clone();
            match factory.create_sending_action(invocation.clone(), control_url).send() {
                Ok((invocation, response)) => match invocation.failure() {
                    None => callback.success(&invocation),
                    Some(failure) => {
                        let message = failure.to_string();
                        callback.failure(&invocation, response.as_ref(), &message)
                    }
                },
                Err(e) => {
                    tracing::debug!("Action {} not completed: {}", action, e);
                    callback.failure(&invocation, None, &e.to_string());
                }
            }
        }));
    }

    /// Execute `invocation` on the calling thread.
    ///
    /// Remote failures are recorded on the returned invocation; only a shut down
    /// stack is an `Err`.
    pub fn execute_blocking(&self, invocation: ActionInvocation, control_url: Url) -> Result<ActionInvocation> {
        let (invocation, _) = self.factory.create_sending_action(invocation, control_url).send()?;
        Ok(invocation)
    }

    /// Control URL of a service on a known remote device
    pub fn control_url(&self, reference: &ServiceReference) -> Result<Url> {
        self.resolve(reference, "control", |service| &service.control_uri)
            .map(|(_, url)| url)
    }

    /// Subscribe to events of a service on a known remote device.
    ///
    /// `duration` defaults to the configured subscription duration. The returned
    /// subscription reports progress through `callback`; subscribing happens in
    /// the background.
    pub fn subscribe(
        &self,
        reference: &ServiceReference,
        duration: Option<u32>,
        callback: Arc<dyn SubscriptionCallback>,
    ) -> Result<Arc<RemoteGenaSubscription>> {
        let (service, event_url) = self.resolve(reference, "event subscription", |service| {
            &service.event_subscription_uri
        })?;
        let duration = duration.unwrap_or(self.factory.context().config().default_subscription_duration);

        let subscription = Arc::new(RemoteGenaSubscription::new(
            service,
            reference.clone(),
            event_url,
            duration,
            callback,
        ));
        let subscribe = self.factory.create_sending_subscribe(Arc::clone(&subscription));
        self.factory.context().executor.execute(into_job(Box::new(subscribe)));
        Ok(subscription)
    }

    /// Unsubscribe in the background; the callback sees `ended` when done
    pub fn end_subscription(&self, subscription: Arc<RemoteGenaSubscription>) {
        let unsubscribe = self.factory.create_sending_unsubscribe(subscription);
        self.factory.context().executor.execute(into_job(Box::new(unsubscribe)));
    }

    /// Send changed values of a local service to all of its subscribers.
    ///
    /// Returns the number of subscribers notified.
    pub fn publish(&self, reference: &ServiceReference, values: Vec<StateVariableValue>) -> usize {
        let events = self.factory.create_sending_events(reference, values);
        let count = events.len();
        for event in events {
            self.factory.context().executor.execute(into_job(Box::new(event)));
        }
        tracing::debug!("Published changes of {} to {} subscriber(s)", reference, count);
        count
    }

    /// The service and one of its URLs, resolved against the root device it belongs to
    fn resolve(
        &self,
        reference: &ServiceReference,
        kind: &'static str,
        uri: impl Fn(&Service) -> &String,
    ) -> Result<(Service, Url)> {
        let registry = &self.factory.context().registry;
        let (root, service) = registry
            .remote_devices()
            .into_iter()
            .find_map(|root| {
                let service = root.find_service(reference)?.clone();
                Some((root, service))
            })
            .ok_or_else(|| UpnpError::ServiceNotFound(reference.clone()))?;

        let url = root
            .normalize_uri(uri(&service))
            .ok_or_else(|| UpnpError::InvalidServiceUrl {
                reference: reference.clone(),
                kind,
            })?;
        Ok((service, url))
    }
}
