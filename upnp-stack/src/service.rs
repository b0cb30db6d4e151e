//! UpnpService - the running stack
//!
//! Wires the registry, protocol factory, stream server and SSDP listeners
//! together behind a synchronous API.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use soap_client::{HttpClient, StreamRequestMessage};
use stream_server::StreamServer;
use upnp_discovery::{SsdpSocket, XmlDeviceDescriptorBinder, XmlServiceDescriptorBinder};
use upnp_model::Device;
use upnp_protocol::{ProtocolContext, ProtocolFactory, Router};
use upnp_registry::{DiscoveryOptions, Executor, Registry, RegistryListener, SystemClock, ThreadPoolExecutor};
use url::Url;

use crate::config::ServiceConfig;
use crate::control_point::ControlPoint;
use crate::error::{Result, UpnpError};
use crate::router::NetworkRouter;

/// A running UPnP stack
///
/// UpnpService is fully synchronous; it owns the async runtime the stream
/// server runs on. Do not create it from inside an async context.
///
/// # Example
///
/// ```rust,no_run
/// use upnp_stack::{ServiceConfig, UpnpService};
///
/// fn main() -> Result<(), upnp_stack::UpnpError> {
///     let service = UpnpService::start(ServiceConfig::default())?;
///
///     // Look for devices; they show up in the registry as they respond
///     service.control_point().search();
///     std::thread::sleep(std::time::Duration::from_secs(5));
///
///     for device in service.registry().remote_devices() {
///         println!("{} ({})", device.details.friendly_name, device.udn());
///     }
///
///     service.shutdown();
///     Ok(())
/// }
/// ```
pub struct UpnpService {
    config: ServiceConfig,
    registry: Arc<Registry>,
    factory: Arc<ProtocolFactory>,
    router: Arc<NetworkRouter>,
    control_point: ControlPoint,
    executors: Vec<Arc<ThreadPoolExecutor>>,
    runtime: Mutex<Option<tokio::runtime::Runtime>>,
    server: Mutex<Option<StreamServer>>,
    stream_base_url: Url,
    stop_listeners: Arc<AtomicBool>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl UpnpService {
    /// Start the stack
    ///
    /// This will:
    /// 1. Start the protocol, stream and listener worker pools
    /// 2. Bind the SSDP sockets, unless disabled
    /// 3. Start the HTTP stream server
    /// 4. Start SSDP listening and registry maintenance
    pub fn start(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let upnp = &config.upnp;

        let async_protocol = Arc::new(ThreadPoolExecutor::new("async-protocol", upnp.async_protocol_threads)?);
        let sync_protocol = Arc::new(ThreadPoolExecutor::new("sync-protocol", upnp.sync_protocol_threads)?);
        let registry_listener = Arc::new(ThreadPoolExecutor::new(
            "registry-listener",
            upnp.registry_listener_threads,
        )?);
        let executors = vec![
            Arc::clone(&async_protocol),
            Arc::clone(&sync_protocol),
            Arc::clone(&registry_listener),
        ];

        let registry = Arc::new(Registry::new(
            upnp.clone(),
            Arc::new(SystemClock),
            registry_listener,
            async_protocol.clone(),
        ));

        let (multicast, unicast) = if config.ssdp_enabled {
            let multicast = SsdpSocket::bind_multicast(config.ssdp_interface, config.socket_read_timeout)?;
            let unicast = SsdpSocket::bind_unicast(config.ssdp_interface, config.socket_read_timeout)?;
            (Some(multicast), Some(unicast))
        } else {
            (None, None)
        };

        let client = HttpClient::with_timeouts(config.http_connect_timeout, config.http_read_timeout)
            .with_user_agent(upnp.server_token.clone());
        let sending_socket = unicast.as_ref().map(SsdpSocket::try_clone).transpose()?;
        let router = Arc::new(NetworkRouter::new(client, sending_socket, config.stream.bind_address));

        let factory = ProtocolFactory::new(ProtocolContext {
            registry: Arc::clone(&registry),
            router: router.clone(),
            device_binder: Arc::new(XmlDeviceDescriptorBinder::new()),
            service_binder: Arc::new(XmlServiceDescriptorBinder::new()),
            executor: async_protocol,
        });

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("stream-server")
            .enable_all()
            .build()?;
        let handler_factory = Arc::clone(&factory);
        let handler = Arc::new(move |request: StreamRequestMessage| handler_factory.handle_stream_request(request));
        let stream_executor: Arc<dyn Executor> = sync_protocol;
        let server = runtime.block_on(StreamServer::start(config.stream.clone(), handler, stream_executor))?;
        let stream_base_url = server.base_url().clone();
        router.set_stream_base_url(stream_base_url.clone());

        let stop_listeners = Arc::new(AtomicBool::new(false));
        let mut listeners = Vec::new();
        for (name, socket) in [("ssdp-multicast", multicast), ("ssdp-unicast", unicast)] {
            if let Some(socket) = socket {
                listeners.push(spawn_listener(name, socket, Arc::clone(&factory), Arc::clone(&stop_listeners))?);
            }
        }

        registry.start_maintenance()?;
        tracing::info!("UPnP service started, serving at {}", stream_base_url);

        Ok(Self {
            control_point: ControlPoint::new(Arc::clone(&factory)),
            config,
            registry,
            factory,
            router,
            executors,
            runtime: Mutex::new(Some(runtime)),
            server: Mutex::new(Some(server)),
            stream_base_url,
            stop_listeners,
            listeners: Mutex::new(listeners),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn protocol_factory(&self) -> &Arc<ProtocolFactory> {
        &self.factory
    }

    pub fn control_point(&self) -> &ControlPoint {
        &self.control_point
    }

    pub fn router(&self) -> &Arc<NetworkRouter> {
        &self.router
    }

    /// Base URL of the stream server, `http://<address>:<port>/`
    pub fn stream_base_url(&self) -> &Url {
        &self.stream_base_url
    }

    /// Host a local device and advertise it, unless `options` say otherwise
    pub fn add_local_device(&self, device: Device, options: DiscoveryOptions) -> Result<Arc<Device>> {
        self.ensure_running()?;
        Ok(self.registry.add_local_device(device, options)?)
    }

    /// Descriptor URL of a local device as seen from `local_address`
    pub fn descriptor_url(&self, device: &Device, local_address: Option<IpAddr>) -> Option<Url> {
        let path = self.registry.namespace().descriptor_path(device.udn());
        self.router
            .stream_base_urls(local_address)
            .first()
            .and_then(|base| base.join(&path).ok())
    }

    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        self.registry.add_listener(listener);
    }

    pub fn is_running(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(UpnpError::ShutDown)
        }
    }

    /// Stop the stack
    ///
    /// Local devices say byebye and remote subscriptions are ended before the
    /// network goes away. Calling it again has no effect.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down UPnP service");
        self.registry.shutdown();

        self.stop_listeners.store(true, Ordering::SeqCst);
        for listener in std::mem::take(&mut *self.listeners.lock()) {
            if listener.join().is_err() {
                tracing::error!("SSDP listener terminated abnormally");
            }
        }

        // Queued byebyes still need the network
        for executor in &self.executors {
            executor.shutdown();
        }
        self.router.disable();

        let server = self.server.lock().take();
        if let Some(runtime) = self.runtime.lock().take() {
            if let Some(server) = server {
                runtime.block_on(server.shutdown());
            }
            runtime.shutdown_background();
        }
        tracing::info!("UPnP service stopped");
    }
}

impl Drop for UpnpService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_listener(
    name: &str,
    socket: SsdpSocket,
    factory: Arc<ProtocolFactory>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let thread_name = name.to_string();
    let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
        if let Err(e) = socket.run(&stop, |datagram| factory.handle_datagram(datagram)) {
            tracing::error!("{} stopped: {}", thread_name, e);
        }
    })?;
    Ok(handle)
}
