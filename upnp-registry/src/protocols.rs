use std::sync::Arc;

use upnp_model::Device;

use crate::executor::Job;
use crate::subscription::RemoteGenaSubscription;

/// Builds the outbound protocol tasks the registry schedules on its own.
///
/// Implemented by the protocol factory. Building a job must not touch the
/// registry, since the registry asks for jobs while holding its lock; running
/// the job may.
pub trait SendingProtocols: Send + Sync {
    fn renewal(&self, subscription: Arc<RemoteGenaSubscription>) -> Job;

    fn unsubscribe(&self, subscription: Arc<RemoteGenaSubscription>) -> Job;

    fn notification_alive(&self, device: Arc<Device>) -> Job;

    fn notification_byebye(&self, device: Arc<Device>) -> Job;
}
