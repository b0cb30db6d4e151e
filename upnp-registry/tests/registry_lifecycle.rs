//! End-to-end registry scenarios driven by a manual clock and inline executors.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use upnp_model::{
    Device, DeviceDetails, DeviceIdentity, DeviceType, Service, ServiceId, ServiceReference, ServiceType, Udn,
    UpnpResponse,
};
use upnp_registry::{
    CancelReason, DiscoveryFailure, DiscoveryOptions, InlineExecutor, Job, ManualClock, Registry, RegistryListener,
    RegistrationError, RemoteGenaSubscription, Resource, ResourceKind, SendingProtocols, SubscriptionCallback,
    SubscriptionState, UpnpConfig,
};
use url::Url;

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.events.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl RegistryListener for RecordingListener {
    fn remote_device_discovery_started(&self, device: &Device) {
        self.push(format!("started {}", device.udn()));
    }

    fn remote_device_discovery_failed(&self, device: &Device, _cause: &DiscoveryFailure) {
        self.push(format!("failed {}", device.udn()));
    }

    fn remote_device_added(&self, device: &Arc<Device>) {
        self.push(format!("added {}", device.udn()));
    }

    fn remote_device_updated(&self, device: &Arc<Device>) {
        self.push(format!("updated {}", device.udn()));
    }

    fn remote_device_removed(&self, device: &Arc<Device>) {
        self.push(format!("removed {}", device.udn()));
    }

    fn local_device_added(&self, device: &Arc<Device>) {
        self.push(format!("local-added {}", device.udn()));
    }

    fn local_device_removed(&self, device: &Arc<Device>) {
        self.push(format!("local-removed {}", device.udn()));
    }

    fn before_shutdown(&self) {
        self.push("before-shutdown".to_string());
    }

    fn after_shutdown(&self) {
        self.push("after-shutdown".to_string());
    }
}

/// Records the tasks the registry asks for and runs nothing on the network
#[derive(Default)]
struct RecordingProtocols {
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingProtocols {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    fn record(&self, entry: String) -> Job {
        let sent = Arc::clone(&self.sent);
        Box::new(move || sent.lock().push(entry))
    }
}

impl SendingProtocols for RecordingProtocols {
    fn renewal(&self, subscription: Arc<RemoteGenaSubscription>) -> Job {
        self.record(format!("renew {}", subscription.sid().unwrap_or_default()))
    }

    fn unsubscribe(&self, subscription: Arc<RemoteGenaSubscription>) -> Job {
        self.record(format!("unsubscribe {}", subscription.sid().unwrap_or_default()))
    }

    fn notification_alive(&self, device: Arc<Device>) -> Job {
        self.record(format!("alive {}", device.udn()))
    }

    fn notification_byebye(&self, device: Arc<Device>) -> Job {
        self.record(format!("byebye {}", device.udn()))
    }
}

#[derive(Default)]
struct RecordingCallback {
    ended: Mutex<Vec<(Option<CancelReason>, Option<u16>)>>,
}

impl SubscriptionCallback for RecordingCallback {
    fn ended(&self, _subscription: &RemoteGenaSubscription, reason: Option<CancelReason>, response: Option<&UpnpResponse>) {
        self.ended.lock().push((reason, response.map(|r| r.status_code)));
    }
}

struct Fixture {
    registry: Arc<Registry>,
    clock: Arc<ManualClock>,
    listener: Arc<RecordingListener>,
    protocols: Arc<RecordingProtocols>,
    // Keeps the weak reference held by the registry alive
    _protocols_handle: Arc<dyn SendingProtocols>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new());
    let registry = Arc::new(Registry::new(
        UpnpConfig::default(),
        clock.clone(),
        Arc::new(InlineExecutor),
        Arc::new(InlineExecutor),
    ));
    let listener = Arc::new(RecordingListener::default());
    registry.add_listener(listener.clone());

    let protocols = Arc::new(RecordingProtocols::default());
    let handle: Arc<dyn SendingProtocols> = protocols.clone();
    assert!(registry.set_sending_protocols(&handle));

    Fixture {
        registry,
        clock,
        listener,
        protocols,
        _protocols_handle: handle,
    }
}

fn remote_device(id: &str, max_age: u32) -> Device {
    let location = Url::parse("http://192.168.1.20:1400/xml/device_description.xml").unwrap();
    Device::new(
        DeviceIdentity::remote(Udn::new(id), max_age, location, None),
        DeviceType::uda("MediaRenderer", 1),
        DeviceDetails::new("Kitchen", "Acme", "R-1"),
    )
    .with_service(Service::new(ServiceType::uda("AVTransport", 1), ServiceId::uda("AVTransport")))
}

fn local_device(id: &str) -> Device {
    Device::new(
        DeviceIdentity::local(Udn::new(id), 1800),
        DeviceType::uda("BinaryLight", 1),
        DeviceDetails::new("Hall light", "Acme", "BL-1"),
    )
    .with_service(Service::new(ServiceType::uda("SwitchPower", 1), ServiceId::uda("SwitchPower")))
}

fn established_subscription(
    registry: &Registry,
    device_id: &str,
    sid: &str,
    callback: Arc<RecordingCallback>,
) -> Arc<RemoteGenaSubscription> {
    let service_id = ServiceId::uda("AVTransport");
    let subscription = Arc::new(RemoteGenaSubscription::new(
        Service::new(ServiceType::uda("AVTransport", 1), service_id.clone()),
        ServiceReference::new(Udn::new(device_id), service_id),
        Url::parse("http://192.168.1.20:1400/MediaRenderer/AVTransport/Event").unwrap(),
        1800,
        callback,
    ));
    subscription.begin_subscribe();
    subscription.establish(sid, 1800);
    assert!(registry.add_remote_subscription(Arc::clone(&subscription)));
    subscription
}

#[test]
fn test_remote_device_expires_after_max_age() {
    let f = fixture();
    f.registry.add_remote_device(remote_device("renderer", 60)).unwrap();

    f.clock.advance(Duration::from_secs(59));
    f.registry.maintain();
    assert_eq!(f.registry.remote_devices().len(), 1);

    f.clock.advance(Duration::from_secs(2));
    f.registry.maintain();
    f.registry.maintain();

    assert!(f.registry.get_device(&Udn::new("renderer"), false).is_none());
    assert!(f.registry.resources().is_empty());
    assert_eq!(f.listener.count("removed uuid:renderer"), 1);
}

#[test]
fn test_second_add_is_a_refresh() {
    let f = fixture();
    f.registry.add_remote_device(remote_device("renderer", 60)).unwrap();
    f.clock.advance(Duration::from_secs(50));
    f.registry.add_remote_device(remote_device("renderer", 60)).unwrap();

    f.clock.advance(Duration::from_secs(50));
    f.registry.maintain();

    assert_eq!(f.listener.events(), vec!["added uuid:renderer", "updated uuid:renderer"]);
    assert_eq!(f.registry.remote_devices().len(), 1);
}

#[test]
fn test_max_age_override_applies_to_remote_devices() {
    let clock = Arc::new(ManualClock::new());
    let registry = Registry::new(
        UpnpConfig::new().with_remote_device_max_age_override(10),
        clock.clone(),
        Arc::new(InlineExecutor),
        Arc::new(InlineExecutor),
    );
    registry.add_remote_device(remote_device("renderer", 1800)).unwrap();

    clock.advance(Duration::from_secs(11));
    registry.maintain();
    assert!(registry.remote_devices().is_empty());
}

#[test]
fn test_resource_collision_leaves_registry_unchanged() {
    let f = fixture();
    f.registry
        .add_resource(
            Resource::new("/dev/light-1/svc/upnp-org/SwitchPower/action", ResourceKind::Custom { owner: None }),
            None,
        )
        .unwrap();

    let result = f.registry.add_local_device(local_device("light-1"), DiscoveryOptions::default());

    assert!(matches!(result, Err(RegistrationError::ResourceCollision { .. })));
    assert!(f.registry.local_devices().is_empty());
    assert_eq!(f.registry.resources().len(), 1);
    assert!(f.listener.events().is_empty());
    assert!(f.protocols.sent().is_empty());
}

#[test]
fn test_invalid_device_is_rejected() {
    let f = fixture();
    let mut device = remote_device("renderer", 60);
    device.details.friendly_name = String::new();

    let result = f.registry.add_remote_device(device);
    assert!(matches!(result, Err(RegistrationError::Validation(_))));
    assert!(f.registry.remote_devices().is_empty());
}

#[test]
fn test_renewal_scheduled_once_at_half_life() {
    let f = fixture();
    f.registry.add_remote_device(remote_device("renderer", 3600)).unwrap();
    let subscription = established_subscription(&f.registry, "renderer", "uuid:1234", Arc::default());

    f.clock.advance(Duration::from_secs(899));
    f.registry.maintain();
    assert!(f.protocols.sent().is_empty());

    f.clock.advance(Duration::from_secs(2));
    f.registry.maintain();
    f.registry.maintain();

    assert_eq!(f.protocols.sent(), vec!["renew uuid:1234"]);
    assert_eq!(subscription.state(), SubscriptionState::Renewing);

    subscription.renewed(1800);
    assert!(f.registry.update_remote_subscription(&subscription));
    f.registry.maintain();
    assert_eq!(f.protocols.sent().len(), 1);
}

#[test]
fn test_renewal_failure_ends_once() {
    let f = fixture();
    f.registry.add_remote_device(remote_device("renderer", 3600)).unwrap();
    let callback = Arc::new(RecordingCallback::default());
    let subscription = established_subscription(&f.registry, "renderer", "uuid:1234", callback.clone());

    f.clock.advance(Duration::from_secs(901));
    f.registry.maintain();

    // What the renewal task does when the publisher answers 412
    let response = UpnpResponse::new(412, "Precondition Failed");
    let removed = f.registry.remove_remote_subscription("uuid:1234").unwrap();
    removed.end(Some(CancelReason::RenewalFailed), Some(&response));

    f.registry.remove_remote_device(&Udn::new("renderer"));

    assert_eq!(*callback.ended.lock(), vec![(Some(CancelReason::RenewalFailed), Some(412))]);
    assert_eq!(subscription.state(), SubscriptionState::Ended);
}

#[test]
fn test_device_removal_ends_bound_subscriptions() {
    let f = fixture();
    f.registry.add_remote_device(remote_device("renderer", 3600)).unwrap();
    let callback = Arc::new(RecordingCallback::default());
    established_subscription(&f.registry, "renderer", "uuid:1234", callback.clone());

    assert!(f.registry.remove_remote_device(&Udn::new("renderer")));

    assert!(f.registry.get_remote_subscription("uuid:1234").is_none());
    assert_eq!(*callback.ended.lock(), vec![(Some(CancelReason::DeviceWasRemoved), None)]);
}

#[test]
fn test_local_device_advertisement_cycle() {
    let f = fixture();
    let options = DiscoveryOptions {
        advertised: true,
        byebye_before_first_alive: true,
    };
    f.registry.add_local_device(local_device("light-1"), options).unwrap();
    assert_eq!(f.protocols.sent(), vec!["byebye uuid:light-1", "alive uuid:light-1"]);

    f.clock.advance(Duration::from_secs(901));
    f.registry.maintain();
    f.registry.maintain();
    assert_eq!(f.protocols.sent().len(), 3);

    assert!(f.registry.remove_local_device(&Udn::new("light-1")));
    assert_eq!(f.protocols.sent().last().map(String::as_str), Some("byebye uuid:light-1"));
    assert_eq!(
        f.listener.events(),
        vec!["local-added uuid:light-1", "local-removed uuid:light-1"]
    );
}

#[test]
fn test_unadvertised_local_device_is_silent() {
    let f = fixture();
    let options = DiscoveryOptions {
        advertised: false,
        byebye_before_first_alive: false,
    };
    f.registry.add_local_device(local_device("light-1"), options).unwrap();
    f.clock.advance(Duration::from_secs(2000));
    f.registry.maintain();
    f.registry.remove_local_device(&Udn::new("light-1"));

    assert!(f.protocols.sent().is_empty());
    assert!(f.registry.advertised_local_devices().is_empty());
}

#[test]
fn test_discovery_start_refused_for_known_udn() {
    let f = fixture();
    let device = remote_device("renderer", 60);
    assert!(f.registry.notify_discovery_start(&device));
    f.registry.add_remote_device(device.clone()).unwrap();
    assert!(!f.registry.notify_discovery_start(&device));

    f.registry
        .notify_discovery_failure(&device, DiscoveryFailure::Binding("bad xml".to_string()));
    assert_eq!(
        f.listener.events(),
        vec!["started uuid:renderer", "added uuid:renderer", "failed uuid:renderer"]
    );
}

#[test]
fn test_shutdown_sequence() {
    let f = fixture();
    f.registry
        .add_local_device(local_device("light-1"), DiscoveryOptions::default())
        .unwrap();
    f.registry.add_remote_device(remote_device("renderer", 3600)).unwrap();
    established_subscription(&f.registry, "renderer", "uuid:1234", Arc::default());

    f.registry.shutdown();
    f.registry.shutdown();

    assert_eq!(
        f.protocols.sent(),
        vec!["alive uuid:light-1", "unsubscribe uuid:1234", "byebye uuid:light-1"]
    );
    assert_eq!(
        f.listener.events(),
        vec![
            "local-added uuid:light-1",
            "added uuid:renderer",
            "before-shutdown",
            "after-shutdown"
        ]
    );
    assert!(f.registry.devices().is_empty());
    assert!(matches!(
        f.registry.add_remote_device(remote_device("late", 60)),
        Err(RegistrationError::ShuttingDown)
    ));
}

#[test]
fn test_pause_and_resume_refresh_remote_devices() {
    let f = fixture();
    f.registry.add_remote_device(remote_device("renderer", 60)).unwrap();
    f.registry.pause();
    assert!(f.registry.is_paused());

    f.clock.advance(Duration::from_secs(100));
    f.registry.resume().unwrap();
    f.registry.maintain();

    assert_eq!(f.registry.remote_devices().len(), 1);
}

#[test]
fn test_event_lookup_waits_for_pending_subscription() {
    let f = fixture();
    let subscription = Arc::new(RemoteGenaSubscription::new(
        Service::new(ServiceType::uda("AVTransport", 1), ServiceId::uda("AVTransport")),
        ServiceReference::new(Udn::new("renderer"), ServiceId::uda("AVTransport")),
        Url::parse("http://192.168.1.20:1400/event").unwrap(),
        1800,
        Arc::new(RecordingCallback::default()),
    ));
    f.registry.register_pending_remote_subscription(Arc::clone(&subscription));

    let registry = Arc::clone(&f.registry);
    let waiter = thread::spawn(move || registry.get_wait_remote_subscription("uuid:late"));

    thread::sleep(Duration::from_millis(50));
    subscription.establish("uuid:late", 300);
    f.registry.add_remote_subscription(Arc::clone(&subscription));
    f.registry.unregister_pending_remote_subscription(&subscription);

    let found = waiter.join().unwrap();
    assert!(found.is_some_and(|s| Arc::ptr_eq(&s, &subscription)));
}

#[test]
fn test_background_maintainer_expires_devices() {
    let clock = Arc::new(ManualClock::new());
    let registry = Arc::new(Registry::new(
        UpnpConfig::new().with_maintenance_interval(Duration::from_millis(10)),
        clock.clone(),
        Arc::new(InlineExecutor),
        Arc::new(InlineExecutor),
    ));
    registry.add_remote_device(remote_device("renderer", 60)).unwrap();
    clock.advance(Duration::from_secs(61));

    registry.start_maintenance().unwrap();
    for _ in 0..100 {
        if registry.remote_devices().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(registry.remote_devices().is_empty());
    registry.shutdown();
}
