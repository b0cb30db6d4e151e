use std::io::Read;
use std::time::Duration;

use upnp_model::{header, Headers, UpnpResponse};

use crate::error::SoapError;
use crate::message::{StreamRequestMessage, StreamResponseMessage};

/// Largest response body accepted from a device
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// A minimal blocking HTTP client for UPnP stream messages
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    user_agent: Option<String>,
}

impl HttpClient {
    /// Create a new client with default timeouts
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
            user_agent: None,
        }
    }

    /// USER-AGENT sent on requests that do not carry one
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Send a request and return the response, including error statuses.
    ///
    /// Only a failure to get any response (connection refused, timeout, bad URL)
    /// is an `Err`.
    pub fn send(&self, request: &StreamRequestMessage) -> Result<StreamResponseMessage, SoapError> {
        let mut http = self.agent.request(request.method.as_str(), &request.uri);
        for (name, value) in request.headers.iter() {
            // ureq derives HOST from the URL
            if name.eq_ignore_ascii_case(header::HOST) {
                continue;
            }
            http = http.set(name, value);
        }
        if let Some(user_agent) = &self.user_agent {
            if !request.headers.contains(header::USER_AGENT) {
                http = http.set(header::USER_AGENT, user_agent);
            }
        }

        let result = if request.body.is_empty() {
            http.call()
        } else {
            http.send_bytes(&request.body)
        };

        match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => Self::read_response(response),
            Err(ureq::Error::Transport(transport)) => Err(SoapError::Network(transport.to_string())),
        }
    }

    fn read_response(response: ureq::Response) -> Result<StreamResponseMessage, SoapError> {
        let operation = UpnpResponse::new(response.status(), response.status_text());

        let mut headers = Headers::new();
        for name in response.headers_names() {
            for value in response.all(&name) {
                headers.add(name.clone(), value);
            }
        }

        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut body)
            .map_err(|e| SoapError::Network(e.to_string()))?;

        Ok(StreamResponseMessage {
            operation,
            headers,
            body,
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::UpnpMethod;
    use url::Url;

    #[test]
    fn test_get_returns_body_and_headers() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/desc.xml")
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body("<root/>")
            .create();

        let url = Url::parse(&format!("{}/desc.xml", server.url())).unwrap();
        let response = HttpClient::new()
            .send(&StreamRequestMessage::new(UpnpMethod::Get, &url))
            .unwrap();

        mock.assert();
        assert_eq!(response.status_code(), 200);
        assert!(response.is_content_type_xml());
        assert_eq!(response.body_string(), "<root/>");
    }

    #[test]
    fn test_error_status_is_a_response() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/ctl")
            .match_header("soapaction", "\"urn:schemas-upnp-org:service:SwitchPower:1#SetTarget\"")
            .with_status(500)
            .with_body("<fault/>")
            .create();

        let url = Url::parse(&format!("{}/ctl", server.url())).unwrap();
        let request = StreamRequestMessage::new(UpnpMethod::Post, &url)
            .with_header(header::SOAPACTION, "\"urn:schemas-upnp-org:service:SwitchPower:1#SetTarget\"")
            .with_xml_body("<s:Envelope/>");
        let response = HttpClient::new().send(&request).unwrap();

        mock.assert();
        assert_eq!(response.status_code(), 500);
        assert!(response.is_failed());
        assert_eq!(response.body_string(), "<fault/>");
    }

    #[test]
    fn test_connection_failure_is_network_error() {
        let url = Url::parse("http://127.0.0.1:1/unreachable").unwrap();
        let client = HttpClient::with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
        let result = client.send(&StreamRequestMessage::new(UpnpMethod::Get, &url));
        assert!(matches!(result, Err(SoapError::Network(_))));
    }
}
