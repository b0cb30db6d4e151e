use soap_client::{envelope, StreamRequestMessage, UpnpMethod};
use upnp_model::{header, ActionException, ActionInvocation, ErrorCode, UpnpResponse};
use url::Url;

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::AsyncProtocol;

/// SOAP action request to a remote service.
///
/// Every failure ends up on the invocation; only an interrupted router is an `Err`.
pub struct SendingAction {
    ctx: ProtocolContext,
    invocation: ActionInvocation,
    control_url: Url,
}

impl SendingAction {
    pub fn new(ctx: ProtocolContext, invocation: ActionInvocation, control_url: Url) -> Self {
        Self {
            ctx,
            invocation,
            control_url,
        }
    }

    /// Execute the invocation and return it with outputs or failure filled in,
    /// together with the HTTP status when a response arrived
    pub fn send(self) -> Result<(ActionInvocation, Option<UpnpResponse>)> {
        let Self {
            ctx,
            mut invocation,
            control_url,
        } = self;

        let request = StreamRequestMessage::new(UpnpMethod::Post, &control_url)
            .with_header(header::SOAPACTION, envelope::soap_action_header(&invocation))
            .with_header(header::USER_AGENT, ctx.server_token())
            .with_xml_body(envelope::write_action_request(&invocation));

        tracing::debug!("Sending action {} to {}", invocation.action().name, control_url);
        let Some(response) = ctx.send(&request)? else {
            invocation.set_failure(ActionException::new(
                ErrorCode::ActionFailed,
                "Connection error or no response received",
            ));
            return Ok((invocation, None));
        };

        let status = response.operation.clone();
        let carries_fault = status.status_code == UpnpResponse::INTERNAL_SERVER_ERROR && response.is_content_type_xml();
        if status.is_failed() && !carries_fault {
            invocation.set_failure(ActionException::new(
                ErrorCode::ActionFailed,
                format!("Non-recoverable remote execution failure: {}", status.response_details()),
            ));
            return Ok((invocation, Some(status)));
        }

        if let Err(e) = envelope::read_action_response(&response.body_string(), &mut invocation) {
            tracing::warn!("Unreadable action response from {}: {}", control_url, e);
            invocation.set_failure(ActionException::new(
                ErrorCode::ActionFailed,
                format!("Error reading SOAP response: {}", e.message),
            ));
        }
        Ok((invocation, Some(status)))
    }
}

impl AsyncProtocol for SendingAction {
    fn name(&self) -> &'static str {
        "SendingAction"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let (invocation, _) = self.send()?;
        match invocation.failure() {
            Some(failure) => tracing::warn!("Action {} failed: {}", invocation.action().name, failure),
            None => tracing::debug!("Action {} completed", invocation.action().name),
        }
        Ok(())
    }
}
