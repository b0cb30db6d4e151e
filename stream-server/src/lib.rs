//! HTTP stream server for inbound UPnP requests.
//!
//! The server accepts every method on every path and hands each request, as a
//! [`soap_client::StreamRequestMessage`], to a [`StreamHandler`]. Handlers run on
//! a blocking [`upnp_registry::Executor`], off the async runtime.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use soap_client::{StreamRequestMessage, StreamResponseMessage};
//! use stream_server::{StreamServer, StreamServerConfig};
//! use upnp_registry::ThreadPoolExecutor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = Arc::new(ThreadPoolExecutor::new("stream", 4)?);
//!     let handler = Arc::new(|_request: StreamRequestMessage| Some(StreamResponseMessage::ok()));
//!
//!     let server = StreamServer::start(StreamServerConfig::default(), handler, executor).await?;
//!     println!("Serving at {}", server.base_url());
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! A handler returning `None` produces `404 Not Found`.

mod error;
mod request;
mod server;

pub use error::{Result, ServerError};
pub use server::{StreamHandler, StreamServer, StreamServerConfig};
