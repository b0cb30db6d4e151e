//! HTTP stream messages exchanged with devices and control points

use std::fmt;
use std::net::SocketAddr;

use upnp_model::{header, is_xml_content_type, Headers, UpnpResponse, CONTENT_TYPE_XML};
use url::Url;

/// HTTP methods used by UPnP
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpnpMethod {
    Get,
    Post,
    Subscribe,
    Unsubscribe,
    Notify,
    MSearch,
    Other(String),
}

impl UpnpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            UpnpMethod::Get => "GET",
            UpnpMethod::Post => "POST",
            UpnpMethod::Subscribe => "SUBSCRIBE",
            UpnpMethod::Unsubscribe => "UNSUBSCRIBE",
            UpnpMethod::Notify => "NOTIFY",
            UpnpMethod::MSearch => "M-SEARCH",
            UpnpMethod::Other(method) => method,
        }
    }

    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => UpnpMethod::Get,
            "POST" => UpnpMethod::Post,
            "SUBSCRIBE" => UpnpMethod::Subscribe,
            "UNSUBSCRIBE" => UpnpMethod::Unsubscribe,
            "NOTIFY" => UpnpMethod::Notify,
            "M-SEARCH" => UpnpMethod::MSearch,
            other => UpnpMethod::Other(other.to_string()),
        }
    }
}

impl fmt::Display for UpnpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request over HTTP, either outgoing (absolute URI) or incoming (path and query)
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequestMessage {
    pub method: UpnpMethod,
    pub uri: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Address of the local socket an incoming request arrived on
    pub local_address: Option<SocketAddr>,
    /// Address of the peer that sent an incoming request
    pub remote_address: Option<SocketAddr>,
}

impl StreamRequestMessage {
    /// Outgoing request to an absolute URL
    pub fn new(method: UpnpMethod, url: &Url) -> Self {
        Self {
            method,
            uri: url.to_string(),
            headers: Headers::new(),
            body: Vec::new(),
            local_address: None,
            remote_address: None,
        }
    }

    /// Incoming request for a path on this host
    pub fn incoming(method: UpnpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            uri: path.into(),
            headers: Headers::new(),
            body: Vec::new(),
            local_address: None,
            remote_address: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Attach an XML body and the matching Content-Type header
    pub fn with_xml_body(mut self, body: impl Into<String>) -> Self {
        self.headers.set(header::CONTENT_TYPE, CONTENT_TYPE_XML);
        self.body = body.into().into_bytes();
        self
    }

    /// The path component of the URI, without query
    pub fn path(&self) -> &str {
        let without_scheme = match self.uri.find("://") {
            Some(index) => {
                let rest = &self.uri[index + 3..];
                rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/")
            }
            None => self.uri.as_str(),
        };
        without_scheme.split('?').next().unwrap_or(without_scheme)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE)
    }

    pub fn is_content_type_xml(&self) -> bool {
        self.content_type().map(is_xml_content_type).unwrap_or(false)
    }

    pub fn has_host_header(&self) -> bool {
        self.headers.contains(header::HOST)
    }
}

impl fmt::Display for StreamRequestMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.method, self.uri)
    }
}

/// A response over HTTP
#[derive(Debug, Clone, PartialEq)]
pub struct StreamResponseMessage {
    pub operation: UpnpResponse,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl StreamResponseMessage {
    pub fn new(status_code: u16) -> Self {
        Self {
            operation: UpnpResponse::with_status(status_code),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(UpnpResponse::OK)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_xml_body(mut self, body: impl Into<String>) -> Self {
        self.headers.set(header::CONTENT_TYPE, CONTENT_TYPE_XML);
        self.body = body.into().into_bytes();
        self
    }

    pub fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers.set(header::CONTENT_TYPE, content_type);
        self.body = body;
        self
    }

    pub fn status_code(&self) -> u16 {
        self.operation.status_code
    }

    pub fn is_failed(&self) -> bool {
        self.operation.is_failed()
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_content_type_xml(&self) -> bool {
        self.headers
            .get(header::CONTENT_TYPE)
            .map(is_xml_content_type)
            .unwrap_or(false)
    }
}

impl fmt::Display for StreamResponseMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {} bytes", self.operation, self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("GET", UpnpMethod::Get)]
    #[case("subscribe", UpnpMethod::Subscribe)]
    #[case("M-SEARCH", UpnpMethod::MSearch)]
    #[case("PROPFIND", UpnpMethod::Other("PROPFIND".to_string()))]
    fn test_method_parse(#[case] input: &str, #[case] expected: UpnpMethod) {
        assert_eq!(UpnpMethod::parse(input), expected);
    }

    #[rstest]
    #[case("http://192.168.1.2:1400/dev/abc/desc?x=1", "/dev/abc/desc")]
    #[case("/dev/abc/svc/upnp-org/Foo/action", "/dev/abc/svc/upnp-org/Foo/action")]
    #[case("/cb?sid=1", "/cb")]
    #[case("http://host", "/")]
    fn test_path(#[case] uri: &str, #[case] expected: &str) {
        let request = StreamRequestMessage::incoming(UpnpMethod::Get, uri);
        assert_eq!(request.path(), expected);
    }

    #[test]
    fn test_xml_body_sets_content_type() {
        let url = Url::parse("http://10.0.0.1/ctl").unwrap();
        let request = StreamRequestMessage::new(UpnpMethod::Post, &url).with_xml_body("<a/>");
        assert!(request.is_content_type_xml());
        assert_eq!(request.body_string(), "<a/>");
        assert_eq!(request.uri, "http://10.0.0.1/ctl");
    }

    #[test]
    fn test_response_status() {
        let response = StreamResponseMessage::new(UpnpResponse::PRECONDITION_FAILED);
        assert!(response.is_failed());
        assert_eq!(response.to_string(), "(412 Precondition Failed) 0 bytes");
    }
}
