//! GENA subscription state, for services we subscribe to (remote) and for
//! subscribers of our own services (local).
//!
//! A remote subscription moves through
//! `Created -> Subscribing -> Established -> (Renewing -> Established)* -> Ended`.
//! User callbacks are invoked without the state lock held, so a callback may
//! freely read the subscription it is given. Event delivery is serialized.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use upnp_model::{Service, ServiceReference, StateVariableValue, UpnpResponse};
use url::Url;

/// Lifecycle of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Created,
    Subscribing,
    Established,
    Renewing,
    Ended,
}

/// Why a subscription ended other than by a clean unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    RenewalFailed,
    UnsubscribeFailed,
    DeviceWasRemoved,
    /// A local subscription was not renewed in time
    Expired,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CancelReason::RenewalFailed => "RENEWAL_FAILED",
            CancelReason::UnsubscribeFailed => "UNSUBSCRIBE_FAILED",
            CancelReason::DeviceWasRemoved => "DEVICE_WAS_REMOVED",
            CancelReason::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

/// Application callbacks for a subscription to a remote service
pub trait SubscriptionCallback: Send + Sync {
    /// The publisher accepted the subscription
    fn established(&self, _subscription: &RemoteGenaSubscription) {}

    /// The initial SUBSCRIBE failed; the subscription was never registered
    fn failed(&self, _subscription: &RemoteGenaSubscription, _response: Option<&UpnpResponse>, _message: &str) {}

    /// The subscription is over; `reason` is `None` after a clean unsubscribe
    fn ended(
        &self,
        _subscription: &RemoteGenaSubscription,
        _reason: Option<CancelReason>,
        _response: Option<&UpnpResponse>,
    ) {
    }

    /// New values were applied and can be read from the subscription
    fn event_received(&self, _subscription: &RemoteGenaSubscription) {}

    /// `count` events were skipped by the publisher or lost in transit
    fn events_missed(&self, _subscription: &RemoteGenaSubscription, _count: u32) {}

    /// An event arrived that could not be parsed
    fn invalid_message(&self, _subscription: &RemoteGenaSubscription, _error: &str) {}
}

#[derive(Debug)]
struct RemoteState {
    sid: Option<String>,
    actual_duration: u32,
    callback_urls: Vec<Url>,
    current_sequence: Option<u32>,
    current_values: BTreeMap<String, String>,
    state: SubscriptionState,
}

/// Our subscription to a service of a remote device
pub struct RemoteGenaSubscription {
    service: Service,
    reference: ServiceReference,
    event_subscription_url: Url,
    requested_duration: u32,
    callback: Arc<dyn SubscriptionCallback>,
    inner: Mutex<RemoteState>,
    /// Serializes event delivery so callbacks see events in order
    delivery: Mutex<()>,
}

impl RemoteGenaSubscription {
    pub fn new(
        service: Service,
        reference: ServiceReference,
        event_subscription_url: Url,
        requested_duration: u32,
        callback: Arc<dyn SubscriptionCallback>,
    ) -> Self {
        Self {
            service,
            reference,
            event_subscription_url,
            requested_duration,
            callback,
            inner: Mutex::new(RemoteState {
                sid: None,
                actual_duration: requested_duration,
                callback_urls: Vec::new(),
                current_sequence: None,
                current_values: BTreeMap::new(),
                state: SubscriptionState::Created,
            }),
            delivery: Mutex::new(()),
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn reference(&self) -> &ServiceReference {
        &self.reference
    }

    pub fn event_subscription_url(&self) -> &Url {
        &self.event_subscription_url
    }

    pub fn requested_duration(&self) -> u32 {
        self.requested_duration
    }

    pub fn sid(&self) -> Option<String> {
        self.inner.lock().sid.clone()
    }

    /// Duration granted by the publisher, or the requested one before that
    pub fn actual_duration(&self) -> u32 {
        self.inner.lock().actual_duration
    }

    pub fn callback_urls(&self) -> Vec<Url> {
        self.inner.lock().callback_urls.clone()
    }

    pub fn set_callback_urls(&self, urls: Vec<Url>) {
        self.inner.lock().callback_urls = urls;
    }

    pub fn current_sequence(&self) -> Option<u32> {
        self.inner.lock().current_sequence
    }

    /// Most recently received value of every evented variable
    pub fn current_values(&self) -> BTreeMap<String, String> {
        self.inner.lock().current_values.clone()
    }

    pub fn current_value(&self, name: &str) -> Option<String> {
        self.inner.lock().current_values.get(name).cloned()
    }

    pub fn state(&self) -> SubscriptionState {
        self.inner.lock().state
    }

    /// Created -> Subscribing
    pub fn begin_subscribe(&self) {
        self.inner.lock().state = SubscriptionState::Subscribing;
    }

    /// Record the publisher's SID and granted duration and notify the application
    pub fn establish(&self, sid: impl Into<String>, actual_duration: u32) {
        {
            let mut inner = self.inner.lock();
            inner.sid = Some(sid.into());
            inner.actual_duration = actual_duration;
            inner.state = SubscriptionState::Established;
        }
        tracing::debug!("Subscription to {} established for {}s", self.reference, actual_duration);
        self.callback.established(self);
    }

    /// Established -> Renewing; false when the subscription is in any other state
    pub fn begin_renewal(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == SubscriptionState::Established {
            inner.state = SubscriptionState::Renewing;
            true
        } else {
            false
        }
    }

    /// A renewal succeeded
    pub fn renewed(&self, actual_duration: u32) {
        let mut inner = self.inner.lock();
        inner.actual_duration = actual_duration;
        inner.state = SubscriptionState::Established;
    }

    /// The initial SUBSCRIBE failed
    pub fn fail(&self, response: Option<&UpnpResponse>, message: &str) {
        self.inner.lock().state = SubscriptionState::Ended;
        tracing::warn!("Subscription to {} failed: {}", self.reference, message);
        self.callback.failed(self, response, message);
    }

    /// End the subscription; the callback fires only on the first call
    pub fn end(&self, reason: Option<CancelReason>, response: Option<&UpnpResponse>) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.state == SubscriptionState::Ended {
                return false;
            }
            inner.state = SubscriptionState::Ended;
        }
        match reason {
            Some(reason) => tracing::info!("Subscription to {} ended: {}", self.reference, reason),
            None => tracing::debug!("Subscription to {} ended", self.reference),
        }
        self.callback.ended(self, reason, response);
        true
    }

    /// Apply an incoming event.
    ///
    /// Stale and duplicate sequence numbers are dropped. A gap is reported through
    /// `events_missed` before the new values are applied. The counter wraps from
    /// `u32::MAX` to 1.
    pub fn receive(&self, sequence: u32, values: Vec<StateVariableValue>) {
        let _delivery = self.delivery.lock();

        let current = self.inner.lock().current_sequence;
        if let Some(current) = current {
            match sequence_gap(current, sequence) {
                Some(0) => {}
                Some(missed) => {
                    tracing::warn!("Missed {} event(s) on {}", missed, self.reference);
                    self.callback.events_missed(self, missed);
                }
                None => {
                    tracing::debug!("Ignoring stale event {} on {} (current {})", sequence, self.reference, current);
                    return;
                }
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.current_sequence = Some(sequence);
            for value in values {
                inner.current_values.insert(value.name, value.value);
            }
        }
        self.callback.event_received(self);
    }

    pub fn invalid_message(&self, error: &str) {
        tracing::warn!("Invalid event message on {}: {}", self.reference, error);
        self.callback.invalid_message(self, error);
    }
}

/// Number of events skipped between `current` and `next`, `None` if `next` is stale
fn sequence_gap(current: u32, next: u32) -> Option<u32> {
    if next == current {
        return None;
    }
    let expected = if current == u32::MAX {
        if next == 0 {
            return None;
        }
        1
    } else {
        if next < current {
            return None;
        }
        current + 1
    };
    Some(next - expected)
}

impl fmt::Debug for RemoteGenaSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteGenaSubscription")
            .field("reference", &self.reference)
            .field("event_subscription_url", &self.event_subscription_url.as_str())
            .field("inner", &*self.inner.lock())
            .finish()
    }
}

#[derive(Debug)]
struct LocalState {
    callback_urls: Vec<Url>,
    actual_duration: u32,
    current_sequence: u32,
    state: SubscriptionState,
}

/// A remote subscriber's subscription to one of our services
#[derive(Debug)]
pub struct LocalGenaSubscription {
    sid: String,
    reference: ServiceReference,
    inner: Mutex<LocalState>,
}

impl LocalGenaSubscription {
    /// A new, established subscription with a fresh `uuid:` SID
    pub fn new(reference: ServiceReference, callback_urls: Vec<Url>, duration: u32) -> Self {
        Self {
            sid: format!("uuid:{}", uuid::Uuid::new_v4()),
            reference,
            inner: Mutex::new(LocalState {
                callback_urls,
                actual_duration: duration,
                current_sequence: 0,
                state: SubscriptionState::Established,
            }),
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn reference(&self) -> &ServiceReference {
        &self.reference
    }

    pub fn callback_urls(&self) -> Vec<Url> {
        self.inner.lock().callback_urls.clone()
    }

    pub fn actual_duration(&self) -> u32 {
        self.inner.lock().actual_duration
    }

    pub fn set_actual_duration(&self, duration: u32) {
        self.inner.lock().actual_duration = duration;
    }

    /// SEQ of the next outgoing event
    pub fn current_sequence(&self) -> u32 {
        self.inner.lock().current_sequence
    }

    /// Take the SEQ for a new outgoing event and advance; wraps from `u32::MAX` to 1
    pub fn next_sequence(&self) -> u32 {
        let mut inner = self.inner.lock();
        let sequence = inner.current_sequence;
        inner.current_sequence = match sequence {
            u32::MAX => 1,
            current => current + 1,
        };
        sequence
    }

    pub fn state(&self) -> SubscriptionState {
        self.inner.lock().state
    }

    pub fn is_ended(&self) -> bool {
        self.state() == SubscriptionState::Ended
    }

    pub fn end(&self, reason: Option<CancelReason>) {
        self.inner.lock().state = SubscriptionState::Ended;
        match reason {
            Some(reason) => tracing::info!("Local subscription {} on {} ended: {}", self.sid, self.reference, reason),
            None => tracing::debug!("Local subscription {} on {} ended", self.sid, self.reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use upnp_model::{ServiceId, ServiceType, Udn};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl SubscriptionCallback for Recorder {
        fn established(&self, subscription: &RemoteGenaSubscription) {
            self.calls.lock().push(format!("established {}", subscription.actual_duration()));
        }

        fn ended(&self, _subscription: &RemoteGenaSubscription, reason: Option<CancelReason>, _response: Option<&UpnpResponse>) {
            self.calls.lock().push(format!("ended {:?}", reason));
        }

        fn event_received(&self, subscription: &RemoteGenaSubscription) {
            let status = subscription.current_value("Status").unwrap_or_default();
            self.calls.lock().push(format!("event {}", status));
        }

        fn events_missed(&self, subscription: &RemoteGenaSubscription, count: u32) {
            let status = subscription.current_value("Status").unwrap_or_default();
            self.calls.lock().push(format!("missed {} before {}", count, status));
        }
    }

    fn subscription(recorder: Arc<Recorder>) -> RemoteGenaSubscription {
        let service_id = ServiceId::uda("SwitchPower");
        RemoteGenaSubscription::new(
            Service::new(ServiceType::uda("SwitchPower", 1), service_id.clone()),
            ServiceReference::new(Udn::new("light-1"), service_id),
            Url::parse("http://192.168.1.10:49152/event").unwrap(),
            1800,
            recorder,
        )
    }

    #[test]
    fn test_gap_reported_before_values_applied() {
        let recorder = Arc::new(Recorder::default());
        let subscription = subscription(recorder.clone());
        subscription.establish("uuid:1234", 180);

        subscription.receive(0, vec![StateVariableValue::new("Status", "0")]);
        subscription.receive(3, vec![StateVariableValue::new("Status", "1")]);

        assert_eq!(
            recorder.calls(),
            vec!["established 180", "event 0", "missed 2 before 0", "event 1"]
        );
        assert_eq!(subscription.current_sequence(), Some(3));
    }

    #[test]
    fn test_stale_and_duplicate_events_ignored() {
        let recorder = Arc::new(Recorder::default());
        let subscription = subscription(recorder.clone());

        subscription.receive(5, vec![StateVariableValue::new("Status", "1")]);
        subscription.receive(5, vec![StateVariableValue::new("Status", "0")]);
        subscription.receive(2, vec![StateVariableValue::new("Status", "0")]);

        assert_eq!(recorder.calls(), vec!["event 1"]);
        assert_eq!(subscription.current_value("Status").as_deref(), Some("1"));
    }

    #[test]
    fn test_end_fires_once() {
        let recorder = Arc::new(Recorder::default());
        let subscription = subscription(recorder.clone());

        assert!(subscription.end(Some(CancelReason::RenewalFailed), None));
        assert!(!subscription.end(None, None));
        assert_eq!(recorder.calls(), vec!["ended Some(RenewalFailed)"]);
        assert_eq!(subscription.state(), SubscriptionState::Ended);
    }

    #[test]
    fn test_renewal_transitions() {
        let subscription = subscription(Arc::new(Recorder::default()));
        assert!(!subscription.begin_renewal());

        subscription.establish("uuid:1", 300);
        assert!(subscription.begin_renewal());
        assert!(!subscription.begin_renewal());
        assert_eq!(subscription.state(), SubscriptionState::Renewing);

        subscription.renewed(600);
        assert_eq!(subscription.state(), SubscriptionState::Established);
        assert_eq!(subscription.actual_duration(), 600);
    }

    #[rstest]
    #[case(0, 1, Some(0))]
    #[case(0, 3, Some(2))]
    #[case(7, 7, None)]
    #[case(7, 6, None)]
    #[case(u32::MAX, 1, Some(0))]
    #[case(u32::MAX, 4, Some(3))]
    #[case(u32::MAX, 0, None)]
    fn test_sequence_gap(#[case] current: u32, #[case] next: u32, #[case] expected: Option<u32>) {
        assert_eq!(sequence_gap(current, next), expected);
    }

    #[test]
    fn test_local_sequence_wraps_to_one() {
        let local = LocalGenaSubscription::new(
            ServiceReference::new(Udn::new("light-1"), ServiceId::uda("SwitchPower")),
            vec![Url::parse("http://10.0.0.2:8080/cb").unwrap()],
            1800,
        );
        assert!(local.sid().starts_with("uuid:"));
        assert_eq!(local.next_sequence(), 0);
        assert_eq!(local.current_sequence(), 1);

        local.inner.lock().current_sequence = u32::MAX;
        assert_eq!(local.next_sequence(), u32::MAX);
        assert_eq!(local.current_sequence(), 1);
    }

    #[test]
    fn test_local_sequences_unique_across_threads() {
        let local = Arc::new(LocalGenaSubscription::new(
            ServiceReference::new(Udn::new("light-1"), ServiceId::uda("SwitchPower")),
            vec![Url::parse("http://10.0.0.2:8080/cb").unwrap()],
            1800,
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let local = Arc::clone(&local);
                std::thread::spawn(move || (0..100).map(|_| local.next_sequence()).collect::<Vec<_>>())
            })
            .collect();

        let mut taken: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        taken.sort_unstable();
        assert_eq!(taken, (0..400).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn prop_gap_counts_skipped_numbers(current in 0u32..u32::MAX - 1000, skipped in 0u32..1000) {
            prop_assert_eq!(sequence_gap(current, current + 1 + skipped), Some(skipped));
        }
    }
}
