//! Registry change notifications.

use std::sync::Arc;

use upnp_model::Device;

use crate::error::DiscoveryFailure;

/// Receives registry changes on the registry-listener executor.
///
/// Every method has an empty default so implementations only override what
/// they care about. Callbacks are never made while the registry lock is held.
pub trait RegistryListener: Send + Sync {
    /// Descriptor retrieval for a new remote device has begun
    fn remote_device_discovery_started(&self, _device: &Device) {}

    /// A discovered device could not be hydrated or registered
    fn remote_device_discovery_failed(&self, _device: &Device, _cause: &DiscoveryFailure) {}

    fn remote_device_added(&self, _device: &Arc<Device>) {}

    /// A known remote device re-announced itself
    fn remote_device_updated(&self, _device: &Arc<Device>) {}

    fn remote_device_removed(&self, _device: &Arc<Device>) {}

    fn local_device_added(&self, _device: &Arc<Device>) {}

    fn local_device_removed(&self, _device: &Arc<Device>) {}

    /// Called synchronously at the start of shutdown
    fn before_shutdown(&self) {}

    /// Called synchronously once shutdown has finished
    fn after_shutdown(&self) {}
}
