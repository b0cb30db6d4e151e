use std::net::IpAddr;

use soap_client::{StreamRequestMessage, StreamResponseMessage};
use upnp_discovery::OutgoingDatagramMessage;
use url::Url;

use crate::error::RouterError;

/// The network seam the protocol handlers talk through.
///
/// `send` returns `Ok(None)` when no response was received at all; error
/// statuses are regular responses.
pub trait Router: Send + Sync {
    /// Send a stream request and wait for the response
    fn send(&self, request: &StreamRequestMessage) -> Result<Option<StreamResponseMessage>, RouterError>;

    /// Send a datagram to its destination
    fn send_datagram(&self, message: &OutgoingDatagramMessage) -> Result<(), RouterError>;

    /// Base URLs of the local stream server, preferring the interface `local_address` when given
    fn stream_base_urls(&self, local_address: Option<IpAddr>) -> Vec<Url>;
}
