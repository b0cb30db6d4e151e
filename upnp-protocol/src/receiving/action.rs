use soap_client::{envelope, StreamRequestMessage, StreamResponseMessage};
use upnp_model::{header, Action, ActionException, ActionInvocation, ErrorCode, Service, UpnpResponse};
use upnp_registry::ResourceKind;

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::ReceivingSync;

/// SOAP control request for a local service
pub struct ReceivingAction {
    ctx: ProtocolContext,
    request: StreamRequestMessage,
}

impl ReceivingAction {
    pub fn new(ctx: ProtocolContext, request: StreamRequestMessage) -> Self {
        Self { ctx, request }
    }

    fn fault(&self, failure: &ActionException) -> StreamResponseMessage {
        tracing::debug!("Action on {} failed: {}", self.request.path(), failure);
        StreamResponseMessage::new(UpnpResponse::INTERNAL_SERVER_ERROR)
            .with_header(header::EXT, "")
            .with_header(header::SERVER, self.ctx.server_token())
            .with_xml_body(envelope::write_fault(failure))
    }
}

impl ReceivingSync for ReceivingAction {
    fn name(&self) -> &'static str {
        "ReceivingAction"
    }

    fn execute(&self) -> Result<Option<StreamResponseMessage>> {
        let Some(resource) = self.ctx.registry.get_resource(self.request.path()) else {
            return Ok(None);
        };
        let ResourceKind::ServiceControl { service: reference } = &resource.kind else {
            return Ok(None);
        };
        let Some(service) = self.ctx.registry.get_service(reference) else {
            return Ok(None);
        };

        if !self.request.is_content_type_xml() {
            tracing::warn!(
                "Rejecting action on {} with content type {:?}",
                reference,
                self.request.content_type()
            );
            return Ok(Some(StreamResponseMessage::new(UpnpResponse::UNSUPPORTED_MEDIA_TYPE)));
        }

        let (action_name, arguments) = match envelope::read_action_request(&self.request.body_string()) {
            Ok(parsed) => parsed,
            Err(e) => {
                let failure = ActionException::new(ErrorCode::ActionFailed, format!("Error reading request: {}", e.message));
                return Ok(Some(self.fault(&failure)));
            }
        };

        if let Some((_, header_action)) = self
            .request
            .headers
            .get(header::SOAPACTION)
            .and_then(envelope::parse_soap_action_header)
        {
            if header_action != action_name {
                tracing::debug!(
                    "SOAPACTION names {} but the body invokes {}",
                    header_action,
                    action_name
                );
            }
        }

        let Some(action) = service.action(&action_name) else {
            let failure = ActionException::new(ErrorCode::InvalidAction, format!("No action named {}", action_name));
            return Ok(Some(self.fault(&failure)));
        };

        let mut invocation = ActionInvocation::new(action.clone(), service.service_type.clone());
        for argument in arguments {
            if let Some(failure) = check_argument(&service, action, &argument.name, &argument.value) {
                return Ok(Some(self.fault(&failure)));
            }
            if let Err(failure) = invocation.set_input(&argument.name, argument.value) {
                return Ok(Some(self.fault(&failure)));
            }
        }
        if let Some(missing) = action
            .input_arguments()
            .find(|argument| invocation.input(&argument.name).is_none())
        {
            let failure = ActionException::new(
                ErrorCode::InvalidArgs,
                format!("Missing input argument {}", missing.name),
            );
            return Ok(Some(self.fault(&failure)));
        }

        match service.manager() {
            Some(manager) => manager.execute(&mut invocation),
            None => invocation.set_failure(ActionException::new(
                ErrorCode::ActionFailed,
                format!("Service {} has no implementation", reference),
            )),
        }

        if let Some(failure) = invocation.failure() {
            return Ok(Some(self.fault(failure)));
        }

        tracing::debug!("Executed {} on {}", action_name, reference);
        Ok(Some(
            StreamResponseMessage::ok()
                .with_header(header::EXT, "")
                .with_header(header::SERVER, self.ctx.server_token())
                .with_xml_body(envelope::write_action_response(&invocation)),
        ))
    }
}

/// Check an input value against the state variable its argument is related to
fn check_argument(service: &Service, action: &Action, name: &str, value: &str) -> Option<ActionException> {
    let argument = action.input_argument(name)?;
    let variable = service.state_variable(&argument.related_state_variable)?;
    let code = variable.value_error(value)?;
    Some(ActionException::new(
        code,
        format!("Invalid value '{}' for argument {} ({})", value, name, variable.datatype.descriptor_name()),
    ))
}
