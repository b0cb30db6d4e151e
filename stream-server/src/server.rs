//! warp server forwarding every inbound request to a [`StreamHandler`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;

use bytes::Bytes;
use soap_client::{StreamRequestMessage, StreamResponseMessage};
use tokio::sync::{mpsc, oneshot};
use upnp_registry::Executor;
use url::Url;
use warp::http::{HeaderMap, Method, Response, StatusCode};
use warp::Filter;

use crate::error::{Result, ServerError};
use crate::request::{status_only, to_http_response, to_stream_request};

/// Produces the response to an inbound stream request, `None` if nothing serves it
pub trait StreamHandler: Send + Sync + 'static {
    fn handle(&self, request: StreamRequestMessage) -> Option<StreamResponseMessage>;
}

impl<F> StreamHandler for F
where
    F: Fn(StreamRequestMessage) -> Option<StreamResponseMessage> + Send + Sync + 'static,
{
    fn handle(&self, request: StreamRequestMessage) -> Option<StreamResponseMessage> {
        self(request)
    }
}

/// Where the stream server listens and how it is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamServerConfig {
    /// Ports tried in order; `(0, 0)` lets the OS pick one
    /// Default: (3400, 3500)
    pub port_range: (u16, u16),

    /// Interface address the listener binds to
    /// Default: 0.0.0.0
    pub bind_address: IpAddr,

    /// Address put in callback and descriptor URLs
    /// Default: None (the address of the default route)
    pub advertised_address: Option<IpAddr>,
}

impl Default for StreamServerConfig {
    fn default() -> Self {
        Self {
            port_range: (3400, 3500),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            advertised_address: None,
        }
    }
}

impl StreamServerConfig {
    /// Listen on loopback only, on a port picked by the OS
    pub fn loopback() -> Self {
        Self {
            port_range: (0, 0),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            advertised_address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        }
    }

    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range = (start, end);
        self
    }

    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn with_advertised_address(mut self, address: IpAddr) -> Self {
        self.advertised_address = Some(address);
        self
    }
}

/// Running HTTP stream server
pub struct StreamServer {
    local_address: SocketAddr,
    base_url: Url,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl StreamServer {
    /// Bind a port in the configured range and start serving.
    ///
    /// Every request is converted to a [`StreamRequestMessage`] and handled on
    /// `executor`; the HTTP response is sent once the handler returns.
    pub async fn start(
        config: StreamServerConfig,
        handler: Arc<dyn StreamHandler>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let (start, end) = config.port_range;
        let port = Self::find_available_port(config.bind_address, start, end)
            .ok_or(ServerError::NoAvailablePort { start, end })?;
        let advertised = match config.advertised_address {
            Some(address) => address,
            None => Self::detect_local_ip().ok_or(ServerError::LocalAddress)?,
        };

        let local_address = SocketAddr::new(advertised, port);
        let base_url = Url::parse(&format!("http://{}/", local_address))?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let routes = Self::routes(handler, executor, local_address);
        let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(
            SocketAddr::new(config.bind_address, port),
            async move {
                shutdown_rx.recv().await;
            },
        )?;

        let server_handle = tokio::spawn(server);
        tracing::info!("Stream server listening on {} as {}", bound, base_url);

        Ok(Self {
            local_address,
            base_url,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// `http://<advertised address>:<port>/`, the base of every URL this host serves
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.local_address.port()
    }

    /// Advertised address and bound port
    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.server_handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Stream server task failed: {}", e);
            }
        }
        tracing::info!("Stream server on {} stopped", self.local_address);
    }

    fn routes(
        handler: Arc<dyn StreamHandler>,
        executor: Arc<dyn Executor>,
        local_address: SocketAddr,
    ) -> impl Filter<Extract = (Response<Vec<u8>>,), Error = warp::Rejection> + Clone + Send + Sync + 'static {
        let query = warp::query::raw().or(warp::any().map(String::new)).unify();

        warp::method()
            .and(warp::path::full())
            .and(query)
            .and(warp::header::headers_cloned())
            .and(warp::addr::remote())
            .and(warp::body::bytes())
            .and_then(
                move |method: Method,
                      path: warp::path::FullPath,
                      query: String,
                      headers: HeaderMap,
                      remote: Option<SocketAddr>,
                      body: Bytes| {
                    let handler = Arc::clone(&handler);
                    let executor = Arc::clone(&executor);
                    async move {
                        let request =
                            to_stream_request(&method, path.as_str(), &query, &headers, remote, local_address, body);
                        Ok::<_, warp::Rejection>(Self::dispatch(handler, executor, request).await)
                    }
                },
            )
    }

    async fn dispatch(
        handler: Arc<dyn StreamHandler>,
        executor: Arc<dyn Executor>,
        request: StreamRequestMessage,
    ) -> Response<Vec<u8>> {
        let description = request.to_string();
        tracing::debug!("Received {} from {:?}", description, request.remote_address);

        let (tx, rx) = oneshot::channel();
        executor.execute(Box::new(move || {
            let _ = tx.send(handler.handle(request));
        }));

        match rx.await {
            Ok(Some(response)) => {
                tracing::debug!("Responding to {} with {}", description, response.operation);
                to_http_response(response)
            }
            Ok(None) => {
                tracing::debug!("Nothing serves {}", description);
                status_only(StatusCode::NOT_FOUND)
            }
            Err(_) => {
                tracing::warn!("Request {} dropped before a response was produced", description);
                status_only(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// First bindable port of the range; port 0 resolves to the one the OS hands out
    fn find_available_port(address: IpAddr, start: u16, end: u16) -> Option<u16> {
        (start..=end).find_map(|port| {
            TcpListener::bind(SocketAddr::new(address, port))
                .and_then(|listener| listener.local_addr())
                .map(|bound| bound.port())
                .ok()
        })
    }

    /// Address of the interface on the default route; nothing is sent
    fn detect_local_ip() -> Option<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        Some(socket.local_addr().ok()?.ip())
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_available_port_skips_taken_ports() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = listener.local_addr().unwrap().port();

        assert_eq!(StreamServer::find_available_port(localhost, taken, taken), None);
    }

    #[test]
    fn test_port_zero_resolves_to_a_real_port() {
        let port = StreamServer::find_available_port(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, 0);
        assert!(port.is_some_and(|port| port != 0));
    }

    #[test]
    fn test_config_presets() {
        let config = StreamServerConfig::default();
        assert_eq!(config.port_range, (3400, 3500));
        assert_eq!(config.advertised_address, None);

        let loopback = StreamServerConfig::loopback().with_port_range(50000, 50010);
        assert_eq!(loopback.port_range, (50000, 50010));
        assert_eq!(loopback.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
