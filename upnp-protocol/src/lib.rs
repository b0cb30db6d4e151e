//! # upnp-protocol
//!
//! Every UPnP message exchange of the stack, built on the registry:
//!
//! - [`ProtocolFactory`]: picks the receiving handler for an incoming datagram or
//!   stream request and builds the sending handlers
//! - [`receiving`]: descriptor and icon retrieval, SOAP actions, GENA
//!   SUBSCRIBE/UNSUBSCRIBE/NOTIFY, SSDP notifications and searches
//! - [`sending`]: M-SEARCH, alive/byebye bulks, actions, subscriptions and events
//! - [`RetrievalCoordinator`]: deduplicated retrieval of remote descriptors
//! - [`Router`]: the network seam every handler sends through
//!
//! Receiving handlers for stream requests run synchronously on the caller's
//! thread. Everything else runs as a one-shot job on the protocol executor.

pub mod context;
pub mod error;
pub mod factory;
pub mod protocol;
pub mod receiving;
pub mod retrieval;
pub mod router;
pub mod sending;

pub use context::ProtocolContext;
pub use error::{ProtocolCreationError, ProtocolError, Result, RouterError};
pub use factory::ProtocolFactory;
pub use protocol::{into_job, run_async, run_sync, AsyncProtocol, ReceivingSync};
pub use retrieval::RetrievalCoordinator;
pub use router::Router;
