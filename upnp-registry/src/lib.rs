//! # upnp-registry
//!
//! The in-memory directory behind the UPnP stack:
//!
//! - [`Registry`]: local and remote devices, served resources and GENA
//!   subscriptions under one lock, with side effects deferred to executors
//! - [`ExpiringItems`]: keyed storage with max-age and half-life expiration
//! - [`RegistryMaintainer`]: the background sweep that expires devices, renews
//!   subscriptions and re-advertises local devices
//! - [`RemoteGenaSubscription`] / [`LocalGenaSubscription`]: subscription state
//!   and event sequencing
//! - [`UpnpConfig`]: every tunable of the stack
//!
//! ```
//! use std::sync::Arc;
//! use upnp_registry::{InlineExecutor, Registry, SystemClock, UpnpConfig};
//!
//! let registry = Registry::new(
//!     UpnpConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(InlineExecutor),
//!     Arc::new(InlineExecutor),
//! );
//! assert!(registry.remote_devices().is_empty());
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod expiration;
pub mod listener;
pub mod maintainer;
pub mod namespace;
pub mod protocols;
pub mod registry;
pub mod resource;
pub mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{UpnpConfig, DEFAULT_MAX_AGE_SECONDS};
pub use error::{ConfigError, DiscoveryFailure, RegistrationError, Result};
pub use executor::{Executor, InlineExecutor, Job, ThreadPoolExecutor};
pub use expiration::{ExpirationDetails, ExpiringItems, RegistryItem};
pub use listener::RegistryListener;
pub use maintainer::RegistryMaintainer;
pub use namespace::Namespace;
pub use protocols::SendingProtocols;
pub use registry::{DiscoveryOptions, Registry};
pub use resource::{Resource, ResourceHook, ResourceKind};
pub use subscription::{
    CancelReason, LocalGenaSubscription, RemoteGenaSubscription, SubscriptionCallback, SubscriptionState,
};
