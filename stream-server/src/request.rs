//! Conversion between warp's HTTP types and stream messages.

use std::net::SocketAddr;

use bytes::Bytes;
use soap_client::{StreamRequestMessage, StreamResponseMessage, UpnpMethod};
use warp::http::{HeaderMap, Method, Response, StatusCode};

pub(crate) fn to_stream_request(
    method: &Method,
    path: &str,
    query: &str,
    headers: &HeaderMap,
    remote_address: Option<SocketAddr>,
    local_address: SocketAddr,
    body: Bytes,
) -> StreamRequestMessage {
    let uri = if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    };

    let mut request = StreamRequestMessage::incoming(UpnpMethod::parse(method.as_str()), uri);
    for (name, value) in headers {
        match value.to_str() {
            Ok(value) => request.headers.add(name.as_str(), value),
            Err(_) => tracing::debug!("Dropping non-ASCII header {} from {:?}", name, remote_address),
        }
    }
    request.body = body.to_vec();
    request.local_address = Some(local_address);
    request.remote_address = remote_address;
    request
}

pub(crate) fn status_only(status: StatusCode) -> Response<Vec<u8>> {
    let mut response = Response::new(Vec::new());
    *response.status_mut() = status;
    response
}

pub(crate) fn to_http_response(message: StreamResponseMessage) -> Response<Vec<u8>> {
    let mut builder = Response::builder().status(message.status_code());
    for (name, value) in message.headers.iter() {
        builder = builder.header(name, value);
    }
    builder.body(message.body).unwrap_or_else(|e| {
        tracing::error!("Unrepresentable stream response: {}", e);
        status_only(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use upnp_model::header;
    use warp::http::HeaderValue;

    fn local() -> SocketAddr {
        "192.168.1.10:8080".parse().unwrap()
    }

    #[test]
    fn test_request_keeps_method_headers_and_query() {
        let mut headers = HeaderMap::new();
        headers.insert("sid", HeaderValue::from_static("uuid:1234"));
        headers.insert("seq", HeaderValue::from_static("3"));
        let remote: SocketAddr = "192.168.1.20:49152".parse().unwrap();

        let request = to_stream_request(
            &Method::from_bytes(b"NOTIFY").unwrap(),
            "/dev/renderer/svc/upnp-org/AVTransport/event/cb",
            "x=1",
            &headers,
            Some(remote),
            local(),
            Bytes::from_static(b"<e:propertyset/>"),
        );

        assert_eq!(request.method, UpnpMethod::Notify);
        assert_eq!(request.uri, "/dev/renderer/svc/upnp-org/AVTransport/event/cb?x=1");
        assert_eq!(request.path(), "/dev/renderer/svc/upnp-org/AVTransport/event/cb");
        assert_eq!(request.headers.get(header::SID), Some("uuid:1234"));
        assert_eq!(request.headers.get(header::SEQ), Some("3"));
        assert_eq!(request.body_string(), "<e:propertyset/>");
        assert_eq!(request.remote_address, Some(remote));
        assert_eq!(request.local_address, Some(local()));
    }

    #[rstest]
    #[case("GET", UpnpMethod::Get)]
    #[case("POST", UpnpMethod::Post)]
    #[case("SUBSCRIBE", UpnpMethod::Subscribe)]
    #[case("UNSUBSCRIBE", UpnpMethod::Unsubscribe)]
    #[case("NOTIFY", UpnpMethod::Notify)]
    fn test_method_mapping(#[case] name: &str, #[case] expected: UpnpMethod) {
        let method = Method::from_bytes(name.as_bytes()).unwrap();
        let request = to_stream_request(&method, "/", "", &HeaderMap::new(), None, local(), Bytes::new());
        assert_eq!(request.method, expected);
    }

    #[test]
    fn test_non_ascii_header_is_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-name", HeaderValue::from_bytes(&[0xe9]).unwrap());
        let request = to_stream_request(&Method::GET, "/", "", &headers, None, local(), Bytes::new());
        assert_eq!(request.headers.get("x-name"), None);
        assert_eq!(request.uri, "/");
    }

    #[test]
    fn test_response_carries_status_headers_and_body() {
        let message = StreamResponseMessage::new(412).with_header(header::SERVER, "test/1.0");
        let response = to_http_response(message);
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(response.headers().get("server").unwrap(), "test/1.0");

        let response = to_http_response(StreamResponseMessage::ok().with_xml_body("<root/>"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), b"<root/>");
    }

    #[test]
    fn test_invalid_status_becomes_server_error() {
        let response = to_http_response(StreamResponseMessage::new(42));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
