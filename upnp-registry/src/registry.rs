//! The device and service directory
//!
//! [`Registry`] keeps every known device, resource and subscription under a
//! single lock. Operations that need side effects (listener callbacks,
//! advertisements, renewals) record them while the lock is held and hand them
//! to the configured executors only after it has been released, so no callback
//! ever runs inside the critical section.
//!
//! Expiration is driven by [`Registry::maintain`], which the background
//! [`RegistryMaintainer`] calls on a fixed interval.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use upnp_model::{Device, DeviceIdentity, DeviceType, Service, ServiceReference, ServiceType, Udn, ValidationErrors};

use crate::clock::Clock;
use crate::config::UpnpConfig;
use crate::error::{DiscoveryFailure, RegistrationError, Result};
use crate::executor::{Executor, Job};
use crate::expiration::{ExpirationDetails, ExpiringItems};
use crate::listener::RegistryListener;
use crate::maintainer::RegistryMaintainer;
use crate::namespace::Namespace;
use crate::protocols::SendingProtocols;
use crate::resource::Resource;
use crate::subscription::{CancelReason, LocalGenaSubscription, RemoteGenaSubscription};

/// Longest time an event callback waits for a subscription that is still being set up
const PENDING_SUBSCRIPTION_WAIT: Duration = Duration::from_secs(30);

/// How a local device is announced on the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Send alive notifications and answer searches
    /// Default: true
    pub advertised: bool,

    /// Send a byebye before the first alive, clearing stale caches on the network
    /// Default: false
    pub byebye_before_first_alive: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            advertised: true,
            byebye_before_first_alive: false,
        }
    }
}

#[derive(Debug, Clone)]
struct LocalDevice {
    device: Arc<Device>,
    options: DiscoveryOptions,
}

#[derive(Default)]
struct RegistryState {
    local_devices: ExpiringItems<Udn, LocalDevice>,
    remote_devices: ExpiringItems<Udn, Arc<Device>>,
    resources: ExpiringItems<String, Resource>,
    local_subscriptions: ExpiringItems<String, Arc<LocalGenaSubscription>>,
    remote_subscriptions: ExpiringItems<String, Arc<RemoteGenaSubscription>>,
}

impl RegistryState {
    fn local_root(&self, udn: &Udn) -> Option<&LocalDevice> {
        self.local_devices.values().find(|local| local.device.find_device(udn).is_some())
    }

    fn remote_root(&self, udn: &Udn) -> Option<&Arc<Device>> {
        self.remote_devices.values().find(|root| root.find_device(udn).is_some())
    }

    fn roots(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.local_devices
            .values()
            .map(|local| &local.device)
            .chain(self.remote_devices.values())
    }

    fn is_registered(&self, udn: &Udn) -> bool {
        self.roots().any(|root| root.find_device(udn).is_some())
    }

    /// First UDN of `device`'s tree that is already known
    fn registered_udn(&self, device: &Device) -> Option<Udn> {
        device
            .find_devices()
            .into_iter()
            .map(Device::udn)
            .find(|udn| self.is_registered(udn))
            .cloned()
    }

    /// First path of `resources` that is taken, or repeated within `resources`
    fn colliding_path(&self, resources: &[Resource]) -> Option<String> {
        let mut seen = HashSet::new();
        resources
            .iter()
            .find(|r| self.resources.contains_key(r.path.as_str()) || !seen.insert(r.path.as_str()))
            .map(|r| r.path.clone())
    }
}

/// Work recorded under the lock and dispatched after it is released
enum Deferred {
    Listener(Job),
    Protocol(Job),
}

/// Thread-safe directory of local and remote devices, resources and GENA subscriptions
pub struct Registry {
    config: UpnpConfig,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
    state: Mutex<RegistryState>,
    listeners: RwLock<Vec<Arc<dyn RegistryListener>>>,
    /// Outgoing subscriptions whose SUBSCRIBE is in flight; lock before `state`
    pending_subscriptions: Mutex<Vec<Arc<RemoteGenaSubscription>>>,
    pending_changed: Condvar,
    listener_executor: Arc<dyn Executor>,
    protocol_executor: Arc<dyn Executor>,
    protocols: OnceLock<Weak<dyn SendingProtocols>>,
    maintainer: Mutex<Option<RegistryMaintainer>>,
    maintenance_enabled: AtomicBool,
    paused: AtomicBool,
    shutting_down: AtomicBool,
}

impl Registry {
    pub fn new(
        config: UpnpConfig,
        clock: Arc<dyn Clock>,
        listener_executor: Arc<dyn Executor>,
        protocol_executor: Arc<dyn Executor>,
    ) -> Self {
        let namespace = Namespace::new(&config.namespace_base_path);
        Self {
            config,
            namespace,
            clock,
            state: Mutex::new(RegistryState::default()),
            listeners: RwLock::new(Vec::new()),
            pending_subscriptions: Mutex::new(Vec::new()),
            pending_changed: Condvar::new(),
            listener_executor,
            protocol_executor,
            protocols: OnceLock::new(),
            maintainer: Mutex::new(None),
            maintenance_enabled: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &UpnpConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Connect the factory that builds renewal, unsubscribe and notification tasks.
    ///
    /// Only the first call has an effect; returns false afterwards.
    pub fn set_sending_protocols(&self, protocols: &Arc<dyn SendingProtocols>) -> bool {
        self.protocols.set(Arc::downgrade(protocols)).is_ok()
    }

    fn protocols(&self) -> Option<Arc<dyn SendingProtocols>> {
        self.protocols.get().and_then(Weak::upgrade)
    }

    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_listener(&self, listener: &Arc<dyn RegistryListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Run `f` under the lock, then dispatch whatever work it deferred
    fn with_state<R>(&self, f: impl FnOnce(&mut RegistryState, &mut Vec<Deferred>) -> R) -> R {
        let mut deferred = Vec::new();
        let result = {
            let mut state = self.state.lock();
            f(&mut state, &mut deferred)
        };
        self.dispatch(deferred);
        result
    }

    fn dispatch(&self, deferred: Vec<Deferred>) {
        let inline = self.shutting_down.load(Ordering::SeqCst);
        for work in deferred {
            let (executor, job) = match work {
                Deferred::Listener(job) => (&self.listener_executor, job),
                Deferred::Protocol(job) => (&self.protocol_executor, job),
            };
            if inline {
                job();
            } else {
                executor.execute(job);
            }
        }
    }

    fn notify_listeners<F>(&self, deferred: &mut Vec<Deferred>, notify: F)
    where
        F: Fn(&dyn RegistryListener) + Send + 'static,
    {
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            return;
        }
        deferred.push(Deferred::Listener(Box::new(move || {
            for listener in &listeners {
                notify(listener.as_ref());
            }
        })));
    }

    // Local devices

    /// Register a local device and start advertising it.
    ///
    /// Service endpoints are rewritten into the local namespace. Nothing is
    /// changed if the UDN is taken or any resource path collides.
    pub fn add_local_device(&self, device: Device, options: DiscoveryOptions) -> Result<Arc<Device>> {
        if device.is_remote() {
            return Err(RegistrationError::WrongOrigin(device.udn().clone()));
        }
        ValidationErrors::check(format!("local device {}", device.udn()), device.validate())?;

        let device = Arc::new(self.namespace.prepare_local_device(&device));
        let resources = self.namespace.local_resources(&device);

        self.with_state(|state, deferred| {
            if self.shutting_down.load(Ordering::SeqCst) {
                return Err(RegistrationError::ShuttingDown);
            }
            if let Some(udn) = state.registered_udn(&device) {
                return Err(RegistrationError::DuplicateUdn(udn));
            }
            if let Some(path) = state.colliding_path(&resources) {
                return Err(RegistrationError::ResourceCollision { path });
            }

            let now = self.clock.now();
            for resource in resources {
                state
                    .resources
                    .insert(resource.path.clone(), resource, ExpirationDetails::unlimited(now));
            }
            state.local_devices.insert(
                device.udn().clone(),
                LocalDevice {
                    device: Arc::clone(&device),
                    options,
                },
                ExpirationDetails::new(Some(device.identity.max_age_seconds), now),
            );
            tracing::info!("Added local device {} ({})", device.udn(), device.details.friendly_name);

            let added = Arc::clone(&device);
            self.notify_listeners(deferred, move |l| l.local_device_added(&added));

            if options.advertised {
                if let Some(protocols) = self.protocols() {
                    if options.byebye_before_first_alive {
                        deferred.push(Deferred::Protocol(protocols.notification_byebye(Arc::clone(&device))));
                    }
                    deferred.push(Deferred::Protocol(protocols.notification_alive(Arc::clone(&device))));
                }
            }
            Ok(Arc::clone(&device))
        })
    }

    /// Remove a local root device, ending its subscriptions and sending byebye if advertised
    pub fn remove_local_device(&self, udn: &Udn) -> bool {
        self.with_state(|state, deferred| self.remove_local_locked(state, deferred, udn))
    }

    pub fn remove_all_local_devices(&self) {
        self.with_state(|state, deferred| {
            let udns: Vec<Udn> = state.local_devices.keys().cloned().collect();
            for udn in udns {
                self.remove_local_locked(state, deferred, &udn);
            }
        });
    }

    fn remove_local_locked(&self, state: &mut RegistryState, deferred: &mut Vec<Deferred>, udn: &Udn) -> bool {
        let Some(item) = state.local_devices.remove(udn) else {
            return false;
        };
        let LocalDevice { device, options } = item.value;
        let tree: HashSet<Udn> = device.find_devices().into_iter().map(|d| d.udn().clone()).collect();

        state
            .resources
            .remove_where(|r| r.value.owner().is_some_and(|owner| tree.contains(owner)));
        for removed in state
            .local_subscriptions
            .remove_where(|s| tree.contains(&s.value.reference().udn))
        {
            removed.value.end(Some(CancelReason::DeviceWasRemoved));
        }

        if options.advertised {
            if let Some(protocols) = self.protocols() {
                deferred.push(Deferred::Protocol(protocols.notification_byebye(Arc::clone(&device))));
            }
        }
        tracing::info!("Removed local device {}", udn);
        if !self.shutting_down.load(Ordering::SeqCst) {
            self.notify_listeners(deferred, move |l| l.local_device_removed(&device));
        }
        true
    }

    pub fn discovery_options(&self, udn: &Udn) -> Option<DiscoveryOptions> {
        self.with_state(|state, _| state.local_devices.get(udn).map(|item| item.value.options))
    }

    /// Local root devices that announce themselves
    pub fn advertised_local_devices(&self) -> Vec<Arc<Device>> {
        self.with_state(|state, _| {
            state
                .local_devices
                .values()
                .filter(|local| local.options.advertised)
                .map(|local| Arc::clone(&local.device))
                .collect()
        })
    }

    // Remote devices

    /// Register a hydrated remote device; a known UDN only refreshes its expiration
    pub fn add_remote_device(&self, device: Device) -> Result<()> {
        if !device.is_remote() {
            return Err(RegistrationError::WrongOrigin(device.udn().clone()));
        }
        if self.update_remote_device_expiration(&device.identity) {
            return Ok(());
        }
        ValidationErrors::check(format!("remote device {}", device.udn()), device.validate())?;

        let resources = self.namespace.remote_resources(&device);
        let device = Arc::new(device);

        self.with_state(|state, deferred| {
            if self.shutting_down.load(Ordering::SeqCst) {
                return Err(RegistrationError::ShuttingDown);
            }
            if let Some(udn) = state.registered_udn(&device) {
                return Err(RegistrationError::DuplicateUdn(udn));
            }
            if let Some(path) = state.colliding_path(&resources) {
                return Err(RegistrationError::ResourceCollision { path });
            }

            let now = self.clock.now();
            for resource in resources {
                state
                    .resources
                    .insert(resource.path.clone(), resource, ExpirationDetails::unlimited(now));
            }
            let max_age = self.config.remote_max_age(device.identity.max_age_seconds);
            state.remote_devices.insert(
                device.udn().clone(),
                Arc::clone(&device),
                ExpirationDetails::new(Some(max_age), now),
            );
            tracing::info!(
                "Added remote device {} ({}), max-age {}s",
                device.udn(),
                device.details.friendly_name,
                max_age
            );

            self.notify_listeners(deferred, move |l| l.remote_device_added(&device));
            Ok(())
        })
    }

    /// Restart the expiration of the remote root owning `identity.udn`; false if unknown
    pub fn update_remote_device_expiration(&self, identity: &DeviceIdentity) -> bool {
        self.with_state(|state, deferred| {
            let Some(root) = state.remote_root(&identity.udn).cloned() else {
                return false;
            };
            let max_age = self.config.remote_max_age(identity.max_age_seconds);
            let now = self.clock.now();
            if let Some(item) = state.remote_devices.get_mut(root.udn()) {
                item.expiration = ExpirationDetails::new(Some(max_age), now);
            }
            tracing::debug!("Refreshed remote device {} for {}s", root.udn(), max_age);
            self.notify_listeners(deferred, move |l| l.remote_device_updated(&root));
            true
        })
    }

    /// Remove a remote root device and everything bound to it
    pub fn remove_remote_device(&self, udn: &Udn) -> bool {
        self.with_state(|state, deferred| self.remove_remote_locked(state, deferred, udn))
    }

    pub fn remove_all_remote_devices(&self) {
        self.with_state(|state, deferred| {
            let udns: Vec<Udn> = state.remote_devices.keys().cloned().collect();
            for udn in udns {
                self.remove_remote_locked(state, deferred, &udn);
            }
        });
    }

    fn remove_remote_locked(&self, state: &mut RegistryState, deferred: &mut Vec<Deferred>, udn: &Udn) -> bool {
        let Some(item) = state.remote_devices.remove(udn) else {
            return false;
        };
        let device = item.value;
        let tree: HashSet<Udn> = device.find_devices().into_iter().map(|d| d.udn().clone()).collect();

        state
            .resources
            .remove_where(|r| r.value.owner().is_some_and(|owner| tree.contains(owner)));
        let ended: Vec<Arc<RemoteGenaSubscription>> = state
            .remote_subscriptions
            .remove_where(|s| tree.contains(&s.value.reference().udn))
            .into_iter()
            .map(|item| item.value)
            .collect();
        if !ended.is_empty() {
            deferred.push(Deferred::Listener(Box::new(move || {
                for subscription in ended {
                    subscription.end(Some(CancelReason::DeviceWasRemoved), None);
                }
            })));
        }

        tracing::info!("Removed remote device {}", udn);
        if !self.shutting_down.load(Ordering::SeqCst) {
            self.notify_listeners(deferred, move |l| l.remote_device_removed(&device));
        }
        true
    }

    /// Remove a local or remote root device
    pub fn remove_device(&self, udn: &Udn) -> bool {
        self.with_state(|state, deferred| {
            if state.local_devices.contains_key(udn) {
                self.remove_local_locked(state, deferred, udn)
            } else {
                self.remove_remote_locked(state, deferred, udn)
            }
        })
    }

    /// Announce that descriptor retrieval for `device` has begun; false if its UDN is already known
    pub fn notify_discovery_start(&self, device: &Device) -> bool {
        self.with_state(|state, deferred| {
            if state.is_registered(device.udn()) {
                return false;
            }
            let device = device.clone();
            self.notify_listeners(deferred, move |l| l.remote_device_discovery_started(&device));
            true
        })
    }

    pub fn notify_discovery_failure(&self, device: &Device, cause: DiscoveryFailure) {
        tracing::warn!("Discovery of {} failed: {}", device.udn(), cause);
        self.with_state(|_, deferred| {
            let device = device.clone();
            self.notify_listeners(deferred, move |l| l.remote_device_discovery_failed(&device, &cause));
        });
    }

    // Lookups

    /// Device with this UDN, searching embedded devices unless `root_only`
    pub fn get_device(&self, udn: &Udn, root_only: bool) -> Option<Arc<Device>> {
        self.with_state(|state, _| find_in(state.roots(), udn, root_only))
    }

    pub fn get_local_device(&self, udn: &Udn, root_only: bool) -> Option<Arc<Device>> {
        self.with_state(|state, _| find_in(state.local_devices.values().map(|l| &l.device), udn, root_only))
    }

    pub fn get_remote_device(&self, udn: &Udn, root_only: bool) -> Option<Arc<Device>> {
        self.with_state(|state, _| find_in(state.remote_devices.values(), udn, root_only))
    }

    pub fn local_devices(&self) -> Vec<Arc<Device>> {
        self.with_state(|state, _| state.local_devices.values().map(|l| Arc::clone(&l.device)).collect())
    }

    pub fn remote_devices(&self) -> Vec<Arc<Device>> {
        self.with_state(|state, _| state.remote_devices.values().cloned().collect())
    }

    /// All root devices, local first
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.with_state(|state, _| state.roots().cloned().collect())
    }

    /// Every device, embedded ones included, implementing `device_type`
    pub fn devices_of_type(&self, device_type: &DeviceType) -> Vec<Arc<Device>> {
        self.with_state(|state, _| {
            collect_in(state.roots(), |node| node.device_type.implements_version(device_type))
        })
    }

    /// Every device, embedded ones included, with a service implementing `service_type`
    pub fn devices_with_service_type(&self, service_type: &ServiceType) -> Vec<Arc<Device>> {
        self.with_state(|state, _| {
            collect_in(state.roots(), |node| {
                node.services
                    .iter()
                    .any(|s| s.service_type.implements_version(service_type))
            })
        })
    }

    pub fn get_service(&self, reference: &ServiceReference) -> Option<Service> {
        self.with_state(|state, _| {
            state
                .roots()
                .find_map(|root| root.find_service(reference))
                .cloned()
        })
    }

    /// Whether `udn` names a local device (root or embedded)
    pub fn is_local_device(&self, udn: &Udn) -> bool {
        self.with_state(|state, _| state.local_root(udn).is_some())
    }

    // Resources

    pub fn get_resource(&self, path: &str) -> Option<Resource> {
        self.with_state(|state, _| state.resources.get(path).map(|item| item.value.clone()))
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.with_state(|state, _| state.resources.values().cloned().collect())
    }

    /// Serve an application resource; `max_age_seconds` of `None` never expires
    pub fn add_resource(&self, resource: Resource, max_age_seconds: Option<u32>) -> Result<()> {
        self.with_state(|state, _| {
            if state.resources.contains_key(resource.path.as_str()) {
                return Err(RegistrationError::ResourceCollision { path: resource.path });
            }
            let expiration = ExpirationDetails::new(max_age_seconds, self.clock.now());
            state.resources.insert(resource.path.clone(), resource, expiration);
            Ok(())
        })
    }

    pub fn remove_resource(&self, path: &str) -> bool {
        self.with_state(|state, _| state.resources.remove(path).is_some())
    }

    // Local subscriptions

    pub fn add_local_subscription(&self, subscription: Arc<LocalGenaSubscription>) {
        self.with_state(|state, _| {
            let expiration = ExpirationDetails::new(Some(subscription.actual_duration()), self.clock.now());
            tracing::debug!("Added local subscription {} on {}", subscription.sid(), subscription.reference());
            state
                .local_subscriptions
                .insert(subscription.sid().to_string(), subscription, expiration);
        });
    }

    /// Restart the expiration after a renewal; false if the SID is unknown
    pub fn update_local_subscription(&self, subscription: &LocalGenaSubscription) -> bool {
        self.with_state(|state, _| match state.local_subscriptions.get_mut(subscription.sid()) {
            Some(item) => {
                item.expiration = ExpirationDetails::new(Some(subscription.actual_duration()), self.clock.now());
                true
            }
            None => false,
        })
    }

    pub fn remove_local_subscription(&self, sid: &str) -> Option<Arc<LocalGenaSubscription>> {
        self.with_state(|state, _| state.local_subscriptions.remove(sid).map(|item| item.value))
    }

    pub fn get_local_subscription(&self, sid: &str) -> Option<Arc<LocalGenaSubscription>> {
        self.with_state(|state, _| state.local_subscriptions.get(sid).map(|item| Arc::clone(&item.value)))
    }

    /// Subscribers of one local service
    pub fn local_subscriptions_for(&self, reference: &ServiceReference) -> Vec<Arc<LocalGenaSubscription>> {
        self.with_state(|state, _| {
            state
                .local_subscriptions
                .values()
                .filter(|s| s.reference() == reference)
                .cloned()
                .collect()
        })
    }

    // Remote subscriptions

    /// Register an established subscription under its SID; false if it has none
    pub fn add_remote_subscription(&self, subscription: Arc<RemoteGenaSubscription>) -> bool {
        let Some(sid) = subscription.sid() else {
            tracing::warn!("Not registering subscription to {} without SID", subscription.reference());
            return false;
        };
        self.with_state(|state, _| {
            let expiration = ExpirationDetails::new(Some(subscription.actual_duration()), self.clock.now());
            state.remote_subscriptions.insert(sid, subscription, expiration);
            true
        })
    }

    /// Restart the expiration after a renewal; false if the SID is unknown
    pub fn update_remote_subscription(&self, subscription: &RemoteGenaSubscription) -> bool {
        let Some(sid) = subscription.sid() else {
            return false;
        };
        self.with_state(|state, _| match state.remote_subscriptions.get_mut(sid.as_str()) {
            Some(item) => {
                item.expiration = ExpirationDetails::new(Some(subscription.actual_duration()), self.clock.now());
                true
            }
            None => false,
        })
    }

    pub fn remove_remote_subscription(&self, sid: &str) -> Option<Arc<RemoteGenaSubscription>> {
        self.with_state(|state, _| state.remote_subscriptions.remove(sid).map(|item| item.value))
    }

    pub fn get_remote_subscription(&self, sid: &str) -> Option<Arc<RemoteGenaSubscription>> {
        self.with_state(|state, _| state.remote_subscriptions.get(sid).map(|item| Arc::clone(&item.value)))
    }

    pub fn remote_subscriptions(&self) -> Vec<Arc<RemoteGenaSubscription>> {
        self.with_state(|state, _| state.remote_subscriptions.values().cloned().collect())
    }

    /// Mark a subscription whose SUBSCRIBE is in flight
    pub fn register_pending_remote_subscription(&self, subscription: Arc<RemoteGenaSubscription>) {
        self.pending_subscriptions.lock().push(subscription);
    }

    /// The SUBSCRIBE finished, successfully or not; wakes waiting event handlers
    pub fn unregister_pending_remote_subscription(&self, subscription: &Arc<RemoteGenaSubscription>) {
        let mut pending = self.pending_subscriptions.lock();
        pending.retain(|p| !Arc::ptr_eq(p, subscription));
        self.pending_changed.notify_all();
    }

    /// Look up a subscription by SID, waiting while any SUBSCRIBE is still in flight.
    ///
    /// A publisher may deliver the initial event before its SUBSCRIBE response
    /// reached us, so an unknown SID is only final once nothing is pending.
    pub fn get_wait_remote_subscription(&self, sid: &str) -> Option<Arc<RemoteGenaSubscription>> {
        let deadline = Instant::now() + PENDING_SUBSCRIPTION_WAIT;
        let mut pending = self.pending_subscriptions.lock();
        loop {
            if let Some(subscription) = self.get_remote_subscription(sid) {
                return Some(subscription);
            }
            if pending.is_empty() {
                return None;
            }
            tracing::debug!("Waiting for {} pending subscription(s) before resolving {}", pending.len(), sid);
            if self.pending_changed.wait_until(&mut pending, deadline).timed_out() {
                tracing::warn!("Gave up waiting for pending subscriptions to resolve {}", sid);
                return self.get_remote_subscription(sid);
            }
        }
    }

    // Maintenance

    /// Start the background maintainer; a no-op if it is already running
    pub fn start_maintenance(self: &Arc<Self>) -> io::Result<()> {
        self.maintenance_enabled.store(true, Ordering::SeqCst);
        let mut maintainer = self.maintainer.lock();
        if maintainer.is_none() && !self.paused.load(Ordering::SeqCst) {
            *maintainer = Some(RegistryMaintainer::start(
                Arc::downgrade(self),
                self.config.maintenance_interval,
            )?);
        }
        Ok(())
    }

    fn stop_maintenance(&self) {
        let maintainer = self.maintainer.lock().take();
        if let Some(maintainer) = maintainer {
            maintainer.stop();
        }
    }

    /// Stop expiring items until [`Registry::resume`]
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            tracing::info!("Pausing registry maintenance");
            self.stop_maintenance();
        }
    }

    /// Resume maintenance, giving every remote device a fresh expiration
    pub fn resume(self: &Arc<Self>) -> io::Result<()> {
        if !self.paused.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Resuming registry maintenance");
        self.with_state(|state, _| {
            let now = self.clock.now();
            for item in state.remote_devices.iter_mut() {
                item.expiration.stamp(now);
            }
        });
        if self.maintenance_enabled.load(Ordering::SeqCst) {
            self.start_maintenance()?;
        }
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// One maintenance sweep
    pub fn maintain(&self) {
        self.with_state(|state, deferred| {
            let now = self.clock.now();

            for path in state.resources.expired_keys(now, false) {
                tracing::debug!("Removing expired resource {}", path);
                state.resources.remove(path.as_str());
            }
            for resource in state.resources.values() {
                if let Some(hook) = resource.hook() {
                    deferred.extend(hook.maintain().into_iter().map(Deferred::Protocol));
                }
            }

            for udn in state.remote_devices.expired_keys(now, false) {
                tracing::info!("Remote device {} expired", udn);
                self.remove_remote_locked(state, deferred, &udn);
            }

            let protocols = self.protocols();
            for item in state.remote_subscriptions.iter() {
                if item.expiration.has_expired(now, true) && item.value.begin_renewal() {
                    tracing::debug!("Renewing subscription {} on {}", item.key, item.value.reference());
                    if let Some(protocols) = &protocols {
                        deferred.push(Deferred::Protocol(protocols.renewal(Arc::clone(&item.value))));
                    }
                }
            }

            for item in state.local_devices.iter_mut() {
                if item.expiration.has_expired(now, true) {
                    if item.value.options.advertised {
                        if let Some(protocols) = &protocols {
                            tracing::debug!("Re-advertising local device {}", item.key);
                            deferred.push(Deferred::Protocol(
                                protocols.notification_alive(Arc::clone(&item.value.device)),
                            ));
                        }
                    }
                    item.expiration.stamp(now);
                }
            }

            for sid in state.local_subscriptions.expired_keys(now, false) {
                if let Some(item) = state.local_subscriptions.remove(sid.as_str()) {
                    item.value.end(Some(CancelReason::Expired));
                }
            }
        });
    }

    /// Shut the registry down.
    ///
    /// Stops the maintainer, runs one final sweep with its work executed inline,
    /// shuts every resource down, unsubscribes outgoing subscriptions, sends
    /// byebye for local devices and clears both device collections without
    /// per-device notifications. Listeners see `before_shutdown` first and
    /// `after_shutdown` last.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down registry");
        self.stop_maintenance();
        self.maintain();

        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.before_shutdown();
        }

        for resource in self.resources() {
            if let Some(hook) = resource.hook() {
                hook.shutdown();
            }
        }

        let subscriptions = self.remote_subscriptions();
        if let Some(protocols) = self.protocols() {
            for subscription in subscriptions {
                let unsubscribe = protocols.unsubscribe(subscription);
                unsubscribe();
            }
        }

        self.remove_all_remote_devices();
        self.remove_all_local_devices();

        for listener in &listeners {
            listener.after_shutdown();
        }
        tracing::info!("Registry shut down");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.stop_maintenance();
    }
}

fn find_in<'a>(roots: impl Iterator<Item = &'a Arc<Device>>, udn: &Udn, root_only: bool) -> Option<Arc<Device>> {
    for root in roots {
        if root.udn() == udn {
            return Some(Arc::clone(root));
        }
        if !root_only {
            if let Some(embedded) = root.find_device(udn) {
                return Some(Arc::new(embedded.clone()));
            }
        }
    }
    None
}

fn collect_in<'a, F>(roots: impl Iterator<Item = &'a Arc<Device>>, predicate: F) -> Vec<Arc<Device>>
where
    F: Fn(&Device) -> bool,
{
    let mut found = Vec::new();
    for root in roots {
        for node in root.find_devices() {
            if predicate(node) {
                if node.udn() == root.udn() {
                    found.push(Arc::clone(root));
                } else {
                    found.push(Arc::new(node.clone()));
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::executor::InlineExecutor;
    use upnp_model::{DeviceDetails, ServiceId};
    use url::Url;

    fn registry() -> (Registry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let registry = Registry::new(
            UpnpConfig::default(),
            clock.clone(),
            Arc::new(InlineExecutor),
            Arc::new(InlineExecutor),
        );
        (registry, clock)
    }

    fn remote(id: &str, max_age: u32) -> Device {
        let location = Url::parse("http://192.168.1.20:1400/xml/device_description.xml").unwrap();
        Device::new(
            DeviceIdentity::remote(Udn::new(id), max_age, location, None),
            DeviceType::uda("MediaRenderer", 1),
            DeviceDetails::new("Kitchen", "Acme", "R-1"),
        )
        .with_service(Service::new(ServiceType::uda("AVTransport", 1), ServiceId::uda("AVTransport")))
    }

    fn local(id: &str) -> Device {
        Device::new(
            DeviceIdentity::local(Udn::new(id), 1800),
            DeviceType::uda("BinaryLight", 1),
            DeviceDetails::new("Hall light", "Acme", "BL-1"),
        )
        .with_service(Service::new(ServiceType::uda("SwitchPower", 1), ServiceId::uda("SwitchPower")))
    }

    #[test]
    fn test_remote_device_lookup_and_embedded_refresh() {
        let (registry, _) = registry();
        let child = remote("child", 100);
        let root = remote("root", 100).with_embedded_device(child.clone());
        registry.add_remote_device(root).unwrap();

        assert!(registry.get_device(&Udn::new("child"), true).is_none());
        assert_eq!(registry.get_device(&Udn::new("child"), false).unwrap().udn(), &Udn::new("child"));
        assert!(registry.update_remote_device_expiration(&child.identity));
        assert_eq!(registry.remote_devices().len(), 1);
    }

    #[test]
    fn test_local_device_gets_namespace_endpoints() {
        let (registry, _) = registry();
        let added = registry.add_local_device(local("light-1"), DiscoveryOptions::default()).unwrap();

        assert_eq!(added.services[0].control_uri, "/dev/light-1/svc/upnp-org/SwitchPower/action");
        assert!(registry.get_resource("/dev/light-1/desc").is_some());
        assert!(registry.is_local_device(&Udn::new("light-1")));
    }

    #[test]
    fn test_duplicate_udn_rejected_across_collections() {
        let (registry, _) = registry();
        registry.add_remote_device(remote("shared", 100)).unwrap();

        let result = registry.add_local_device(local("shared"), DiscoveryOptions::default());
        assert!(matches!(result, Err(RegistrationError::DuplicateUdn(_))));
        assert!(registry.local_devices().is_empty());
    }

    #[test]
    fn test_remove_device_dispatches_by_collection() {
        let (registry, _) = registry();
        registry.add_local_device(local("light-1"), DiscoveryOptions::default()).unwrap();
        registry.add_remote_device(remote("renderer", 100)).unwrap();

        assert!(registry.remove_device(&Udn::new("light-1")));
        assert!(registry.remove_device(&Udn::new("renderer")));
        assert!(!registry.remove_device(&Udn::new("renderer")));
        assert!(registry.resources().is_empty());
    }

    #[test]
    fn test_local_subscription_expires_after_full_duration() {
        let (registry, clock) = registry();
        let subscription = Arc::new(LocalGenaSubscription::new(
            ServiceReference::new(Udn::new("light-1"), ServiceId::uda("SwitchPower")),
            vec![],
            60,
        ));
        registry.add_local_subscription(Arc::clone(&subscription));

        clock.advance(Duration::from_secs(59));
        registry.maintain();
        assert!(registry.get_local_subscription(subscription.sid()).is_some());

        clock.advance(Duration::from_secs(2));
        registry.maintain();
        assert!(registry.get_local_subscription(subscription.sid()).is_none());
        assert!(subscription.is_ended());
    }

    #[test]
    fn test_pending_lookup_returns_immediately_without_pending() {
        let (registry, _) = registry();
        assert!(registry.get_wait_remote_subscription("uuid:unknown").is_none());
    }

    #[test]
    fn test_custom_resource_expires() {
        let (registry, clock) = registry();
        registry
            .add_resource(Resource::new("/status", crate::resource::ResourceKind::Custom { owner: None }), Some(10))
            .unwrap();
        assert!(registry
            .add_resource(Resource::new("/status", crate::resource::ResourceKind::Custom { owner: None }), None)
            .is_err());

        clock.advance(Duration::from_secs(11));
        registry.maintain();
        assert!(registry.get_resource("/status").is_none());
    }
}
