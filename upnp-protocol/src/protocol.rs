//! Handler traits and the wrappers that run them.

use soap_client::StreamResponseMessage;
use upnp_model::UpnpResponse;
use upnp_registry::Job;

use crate::error::Result;

/// Handles one inbound stream request on the calling thread.
///
/// `Ok(None)` means the request addressed nothing we serve.
pub trait ReceivingSync: Send {
    fn name(&self) -> &'static str;

    fn execute(&self) -> Result<Option<StreamResponseMessage>>;
}

/// A one-shot task: an outbound exchange or the handling of a datagram
pub trait AsyncProtocol: Send + 'static {
    fn name(&self) -> &'static str;

    fn execute(self: Box<Self>) -> Result<()>;
}

/// Run a receiving handler; a handler failure becomes a 500 response
pub fn run_sync(protocol: &dyn ReceivingSync) -> Option<StreamResponseMessage> {
    match protocol.execute() {
        Ok(response) => response,
        Err(e) if e.is_interrupted() => {
            tracing::debug!("{} interrupted: {}", protocol.name(), e);
            None
        }
        Err(e) => {
            tracing::error!("{} failed: {}", protocol.name(), e);
            Some(StreamResponseMessage::new(UpnpResponse::INTERNAL_SERVER_ERROR))
        }
    }
}

/// Run a one-shot protocol, logging interruption as routine and anything else as an error
pub fn run_async(protocol: Box<dyn AsyncProtocol>) {
    let name = protocol.name();
    match protocol.execute() {
        Ok(()) => tracing::trace!("{} finished", name),
        Err(e) if e.is_interrupted() => tracing::debug!("{} interrupted: {}", name, e),
        Err(e) => tracing::error!("{} failed: {}", name, e),
    }
}

/// Package a one-shot protocol as an executor job
pub fn into_job(protocol: Box<dyn AsyncProtocol>) -> Job {
    Box::new(move || run_async(protocol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProtocolError, RouterError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Failing(ProtocolError);

    impl ReceivingSync for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn execute(&self) -> Result<Option<StreamResponseMessage>> {
            match &self.0 {
                ProtocolError::Router(e) => Err(e.clone().into()),
                _ => Err(ProtocolError::Failed("boom".to_string())),
            }
        }
    }

    #[test]
    fn test_failure_becomes_internal_server_error() {
        let response = run_sync(&Failing(ProtocolError::Failed("boom".to_string())));
        assert_eq!(response.map(|r| r.status_code()), Some(500));
    }

    #[test]
    fn test_interruption_yields_no_response() {
        assert!(run_sync(&Failing(ProtocolError::Router(RouterError::Interrupted))).is_none());
    }

    struct Flag(Arc<AtomicBool>);

    impl AsyncProtocol for Flag {
        fn name(&self) -> &'static str {
            "flag"
        }

        fn execute(self: Box<Self>) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_job_runs_protocol() {
        let ran = Arc::new(AtomicBool::new(false));
        let job = into_job(Box::new(Flag(Arc::clone(&ran))));
        job();
        assert!(ran.load(Ordering::SeqCst));
    }
}
