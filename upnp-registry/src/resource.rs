//! Addressable things served or received under a local URL path.

use std::fmt;
use std::sync::Arc;

use upnp_model::{ServiceReference, Udn};

use crate::executor::Job;

/// What a resource path resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// Device descriptor XML of a local device
    DeviceDescriptor { udn: Udn },
    /// SCPD XML of a local service
    ServiceDescriptor { service: ServiceReference },
    /// SOAP control endpoint of a local service
    ServiceControl { service: ServiceReference },
    /// GENA SUBSCRIBE/UNSUBSCRIBE endpoint of a local service
    ServiceEventSubscription { service: ServiceReference },
    /// GENA NOTIFY callback for events of a remote service
    EventCallback { service: ServiceReference },
    /// Icon data of a local device, by position in its icon list
    Icon { udn: Udn, index: usize },
    /// Application-defined content
    Custom { owner: Option<Udn> },
}

/// Optional behavior attached to a resource
pub trait ResourceHook: Send + Sync {
    /// Called on every maintenance sweep the resource survives
    fn maintain(&self) -> Vec<Job> {
        Vec::new()
    }

    /// Called once when the registry shuts down
    fn shutdown(&self) {}
}

/// A path in the local namespace and what it serves
#[derive(Clone)]
pub struct Resource {
    pub path: String,
    pub kind: ResourceKind,
    hook: Option<Arc<dyn ResourceHook>>,
}

impl Resource {
    pub fn new(path: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ResourceHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn hook(&self) -> Option<&Arc<dyn ResourceHook>> {
        self.hook.as_ref()
    }

    /// UDN of the device this resource belongs to
    pub fn owner(&self) -> Option<&Udn> {
        match &self.kind {
            ResourceKind::DeviceDescriptor { udn } | ResourceKind::Icon { udn, .. } => Some(udn),
            ResourceKind::ServiceDescriptor { service }
            | ResourceKind::ServiceControl { service }
            | ResourceKind::ServiceEventSubscription { service }
            | ResourceKind::EventCallback { service } => Some(&service.udn),
            ResourceKind::Custom { owner } => owner.as_ref(),
        }
    }

    pub fn service(&self) -> Option<&ServiceReference> {
        match &self.kind {
            ResourceKind::ServiceDescriptor { service }
            | ResourceKind::ServiceControl { service }
            | ResourceKind::ServiceEventSubscription { service }
            | ResourceKind::EventCallback { service } => Some(service),
            _ => None,
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upnp_model::ServiceId;

    #[test]
    fn test_owner_and_service() {
        let udn = Udn::new("1234");
        let reference = ServiceReference::new(udn.clone(), ServiceId::uda("SwitchPower"));

        let control = Resource::new("/dev/1234/svc/upnp-org/SwitchPower/action", ResourceKind::ServiceControl {
            service: reference.clone(),
        });
        assert_eq!(control.owner(), Some(&udn));
        assert_eq!(control.service(), Some(&reference));

        let descriptor = Resource::new("/dev/1234/desc", ResourceKind::DeviceDescriptor { udn: udn.clone() });
        assert_eq!(descriptor.owner(), Some(&udn));
        assert!(descriptor.service().is_none());

        let custom = Resource::new("/status", ResourceKind::Custom { owner: None });
        assert!(custom.owner().is_none());
    }
}
