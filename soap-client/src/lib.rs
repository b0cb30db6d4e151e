//! HTTP stream layer for UPnP
//!
//! This crate carries the messages UPnP exchanges over HTTP and the codecs for
//! their bodies:
//!
//! - [`StreamRequestMessage`] / [`StreamResponseMessage`]
//! - [`envelope`]: SOAP action requests, responses and faults
//! - [`gena`]: GENA headers (`TIMEOUT`, `CALLBACK`, `SEQ`) and property sets
//! - [`HttpClient`]: a blocking ureq client that sends stream requests

mod client;
mod error;
mod message;

pub mod envelope;
pub mod gena;

pub use client::HttpClient;
pub use error::{SoapError, UnsupportedDataError};
pub use message::{StreamRequestMessage, StreamResponseMessage, UpnpMethod};
