//! Start a real server on loopback and talk to it over HTTP.

use std::sync::Arc;

use parking_lot::Mutex;
use soap_client::{StreamRequestMessage, StreamResponseMessage, UpnpMethod};
use stream_server::{StreamServer, StreamServerConfig};
use upnp_model::header;
use upnp_registry::ThreadPoolExecutor;

/// Requests seen by the handler
#[derive(Default)]
struct Recorded(Mutex<Vec<StreamRequestMessage>>);

impl Recorded {
    fn push(&self, request: StreamRequestMessage) {
        self.0.lock().push(request);
    }

    fn all(&self) -> Vec<StreamRequestMessage> {
        self.0.lock().clone()
    }
}

async fn start(recorded: Arc<Recorded>) -> StreamServer {
    let executor = Arc::new(ThreadPoolExecutor::new("stream-test", 2).unwrap());
    let handler = Arc::new(move |request: StreamRequestMessage| {
        let response = match (&request.method, request.path()) {
            (UpnpMethod::Subscribe, "/dev/light/svc/upnp-org/SwitchPower/event") => Some(
                StreamResponseMessage::ok()
                    .with_header(header::SID, "uuid:granted")
                    .with_header(header::TIMEOUT, "Second-300"),
            ),
            (UpnpMethod::Get, "/dev/light/desc") => Some(StreamResponseMessage::ok().with_xml_body("<root/>")),
            (UpnpMethod::Notify, _) => Some(StreamResponseMessage::new(412)),
            _ => None,
        };
        recorded.push(request);
        response
    });
    StreamServer::start(StreamServerConfig::loopback(), handler, executor)
        .await
        .expect("server should start on loopback")
}

#[tokio::test]
async fn test_extension_methods_reach_the_handler() {
    let recorded = Arc::new(Recorded::default());
    let server = start(Arc::clone(&recorded)).await;
    let client = reqwest::Client::new();

    let url = server.base_url().join("dev/light/svc/upnp-org/SwitchPower/event").unwrap();
    let response = client
        .request(reqwest::Method::from_bytes(b"SUBSCRIBE").unwrap(), url)
        .header("CALLBACK", "<http://127.0.0.1:9000/cb>")
        .header("NT", "upnp:event")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("sid").unwrap(), "uuid:granted");
    assert_eq!(response.headers().get("timeout").unwrap(), "Second-300");

    let requests = recorded.all();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, UpnpMethod::Subscribe);
    assert_eq!(requests[0].headers.get(header::CALLBACK), Some("<http://127.0.0.1:9000/cb>"));
    assert_eq!(requests[0].local_address, Some(server.local_address()));
    assert!(requests[0].remote_address.is_some());

    server.shutdown().await;
}

#[tokio::test]
async fn test_body_and_status_pass_through() {
    let recorded = Arc::new(Recorded::default());
    let server = start(Arc::clone(&recorded)).await;
    let client = reqwest::Client::new();

    let descriptor = client
        .get(server.base_url().join("dev/light/desc").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(descriptor.status(), 200);
    assert!(descriptor
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("text/xml"));
    assert_eq!(descriptor.text().await.unwrap(), "<root/>");

    let event = client
        .request(
            reqwest::Method::from_bytes(b"NOTIFY").unwrap(),
            server.base_url().join("dev/renderer/svc/upnp-org/AVTransport/event/cb").unwrap(),
        )
        .header("SID", "uuid:unknown")
        .body("<e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\"/>")
        .send()
        .await
        .unwrap();
    assert_eq!(event.status(), 412);
    assert!(recorded.all()[1].body_string().contains("propertyset"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_unhandled_request_is_not_found() {
    let server = start(Arc::new(Recorded::default())).await;

    let response = reqwest::get(server.base_url().join("nowhere?x=1").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_listening() {
    let server = start(Arc::new(Recorded::default())).await;
    let url = server.base_url().join("dev/light/desc").unwrap();
    server.shutdown().await;

    assert!(reqwest::get(url).await.is_err());
}
