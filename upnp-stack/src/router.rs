//! The [`Router`] moving protocol messages over the real network.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use soap_client::{HttpClient, StreamRequestMessage, StreamResponseMessage};
use upnp_discovery::{OutgoingDatagramMessage, SsdpSocket};
use upnp_protocol::{Router, RouterError};
use url::Url;

/// Sends stream requests with a blocking HTTP client and datagrams from the
/// unicast SSDP socket. Without a socket, datagrams are dropped.
///
/// Starts enabled; once [`NetworkRouter::disable`] is called every send fails
/// with [`RouterError::Interrupted`].
pub struct NetworkRouter {
    client: HttpClient,
    datagram_socket: Option<SsdpSocket>,
    bind_address: IpAddr,
    base_url: RwLock<Option<Url>>,
    enabled: AtomicBool,
}

impl NetworkRouter {
    /// `bind_address` is the stream server's listen address; when unspecified,
    /// callback URLs follow the interface a message arrived on
    pub fn new(client: HttpClient, datagram_socket: Option<SsdpSocket>, bind_address: IpAddr) -> Self {
        Self {
            client,
            datagram_socket,
            bind_address,
            base_url: RwLock::new(None),
            enabled: AtomicBool::new(true),
        }
    }

    /// Base URL of the running stream server
    pub fn set_stream_base_url(&self, url: Url) {
        *self.base_url.write() = Some(url);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            tracing::debug!("Network router disabled");
        }
    }

    fn check_enabled(&self) -> Result<(), RouterError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(RouterError::Interrupted)
        }
    }
}

impl Router for NetworkRouter {
    fn send(&self, request: &StreamRequestMessage) -> Result<Option<StreamResponseMessage>, RouterError> {
        self.check_enabled()?;
        tracing::trace!("Sending {}", request);
        let response = self.client.send(request)?;
        self.check_enabled()?;
        Ok(Some(response))
    }

    fn send_datagram(&self, message: &OutgoingDatagramMessage) -> Result<(), RouterError> {
        self.check_enabled()?;
        let Some(socket) = &self.datagram_socket else {
            tracing::trace!("SSDP disabled, dropping {}", message);
            return Ok(());
        };
        socket
            .send(message)
            .map_err(|e| RouterError::Transport(e.to_string()))
    }

    fn stream_base_urls(&self, local_address: Option<IpAddr>) -> Vec<Url> {
        let Some(base) = self.base_url.read().clone() else {
            return Vec::new();
        };

        match local_address {
            Some(address) if self.bind_address.is_unspecified() && !address.is_unspecified() => {
                let mut on_interface = base.clone();
                match on_interface.set_ip_host(address) {
                    Ok(()) if on_interface != base => vec![on_interface, base],
                    _ => vec![base],
                }
            }
            _ => vec![base],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::time::Duration;
    use soap_client::UpnpMethod;
    use upnp_discovery::NotificationType;

    fn router(bind_address: IpAddr) -> NetworkRouter {
        let router = NetworkRouter::new(HttpClient::new(), None, bind_address);
        router.set_stream_base_url(Url::parse("http://192.168.1.10:3400/").unwrap());
        router
    }

    #[test]
    fn test_no_base_url_before_the_server_starts() {
        let router = NetworkRouter::new(HttpClient::new(), None, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(router.stream_base_urls(None).is_empty());
    }

    #[test]
    fn test_base_url_follows_the_receiving_interface() {
        let router = router(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let urls = router.stream_base_urls(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert_eq!(urls[0].as_str(), "http://10.0.0.5:3400/");
        assert_eq!(urls[1].as_str(), "http://192.168.1.10:3400/");

        let urls = router.stream_base_urls(Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))));
        assert_eq!(urls.len(), 1);

        let urls = router.stream_base_urls(Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(urls[0].as_str(), "http://[::1]:3400/");
    }

    #[test]
    fn test_specific_bind_address_keeps_the_advertised_url() {
        let router = router(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
        let urls = router.stream_base_urls(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].as_str(), "http://192.168.1.10:3400/");
    }

    #[test]
    fn test_disabled_router_interrupts() {
        let router = router(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        router.disable();
        assert!(!router.is_enabled());

        let request = StreamRequestMessage::new(UpnpMethod::Get, &Url::parse("http://127.0.0.1:1/desc").unwrap());
        assert!(matches!(router.send(&request), Err(RouterError::Interrupted)));

        let search = OutgoingDatagramMessage::search(&NotificationType::All, 1, "test/1.0");
        assert_eq!(router.send_datagram(&search), Err(RouterError::Interrupted));
    }

    #[test]
    fn test_datagram_without_socket_is_dropped() {
        let router = router(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let search = OutgoingDatagramMessage::search(&NotificationType::All, 1, "test/1.0");
        assert_eq!(router.send_datagram(&search), Ok(()));
    }

    #[test]
    fn test_datagram_is_sent_from_the_socket() {
        let socket = SsdpSocket::bind_unicast(Ipv4Addr::LOCALHOST, Duration::from_secs(2)).unwrap();
        let receiver = SsdpSocket::bind_unicast(Ipv4Addr::LOCALHOST, Duration::from_secs(2)).unwrap();
        let router = NetworkRouter::new(HttpClient::new(), Some(socket), IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let mut search = OutgoingDatagramMessage::search(&NotificationType::RootDevice, 1, "test/1.0");
        search.destination = receiver.local_addr().unwrap();
        router.send_datagram(&search).unwrap();

        let received = receiver.receive().unwrap().unwrap();
        assert!(received.is_search());
    }

    #[test]
    fn test_connection_refused_is_a_transport_failure() {
        let client = HttpClient::with_timeouts(Duration::from_millis(500), Duration::from_millis(500));
        let router = NetworkRouter::new(client, None, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("http://127.0.0.1:{}/desc", port)).unwrap();
        let request = StreamRequestMessage::new(UpnpMethod::Get, &url);
        assert!(matches!(router.send(&request), Err(RouterError::Transport(_))));
    }
}
