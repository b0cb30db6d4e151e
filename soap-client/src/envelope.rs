//! SOAP 1.1 envelopes for UPnP control: action requests, responses and faults.

use quick_xml::escape::escape;
use upnp_model::{ActionArgumentValue, ActionException, ActionInvocation, ErrorCode};
use xmltree::{Element, XMLNode};

use crate::error::UnsupportedDataError;

const ENVELOPE_START: &str = r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>"#;
const ENVELOPE_END: &str = "</s:Body></s:Envelope>";

/// The value of the SOAPACTION header for an invocation
pub fn soap_action_header(invocation: &ActionInvocation) -> String {
    format!("\"{}#{}\"", invocation.service_type(), invocation.action().name)
}

/// Split a SOAPACTION header value into service type and action name
pub fn parse_soap_action_header(value: &str) -> Option<(String, String)> {
    let value = value.trim().trim_matches('"');
    let (service_type, action) = value.rsplit_once('#')?;
    if service_type.is_empty() || action.is_empty() {
        return None;
    }
    Some((service_type.to_string(), action.to_string()))
}

fn arguments_xml(values: &[&ActionArgumentValue]) -> String {
    values
        .iter()
        .map(|v| format!("<{name}>{value}</{name}>", name = v.name, value = escape(v.value.as_str())))
        .collect()
}

/// Request body carrying the invocation's input arguments
pub fn write_action_request(invocation: &ActionInvocation) -> String {
    format!(
        "{start}<u:{action} xmlns:u=\"{service_type}\">{arguments}</u:{action}>{end}",
        start = ENVELOPE_START,
        action = invocation.action().name,
        service_type = invocation.service_type(),
        arguments = arguments_xml(&invocation.ordered_inputs()),
        end = ENVELOPE_END,
    )
}

/// Response body: the output arguments, or a fault if the invocation failed
pub fn write_action_response(invocation: &ActionInvocation) -> String {
    if let Some(failure) = invocation.failure() {
        return write_fault(failure);
    }
    format!(
        "{start}<u:{action}Response xmlns:u=\"{service_type}\">{arguments}</u:{action}Response>{end}",
        start = ENVELOPE_START,
        action = invocation.action().name,
        service_type = invocation.service_type(),
        arguments = arguments_xml(&invocation.ordered_outputs()),
        end = ENVELOPE_END,
    )
}

/// Fault body carrying a UPnP error code and description
pub fn write_fault(failure: &ActionException) -> String {
    format!(
        "{start}<s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns=\"urn:schemas-upnp-org:control-1-0\"><errorCode>{code}</errorCode><errorDescription>{description}</errorDescription></UPnPError></detail></s:Fault>{end}",
        start = ENVELOPE_START,
        code = failure.code,
        description = escape(failure.description.as_str()),
        end = ENVELOPE_END,
    )
}

fn parse_body(body: &str) -> Result<Element, UnsupportedDataError> {
    let envelope = Element::parse(body.as_bytes())
        .map_err(|e| UnsupportedDataError::new(format!("Invalid SOAP XML: {}", e), body))?;
    envelope
        .get_child("Body")
        .cloned()
        .ok_or_else(|| UnsupportedDataError::new("Missing SOAP Body", body))
}

fn first_element(element: &Element) -> Option<&Element> {
    element.children.iter().find_map(XMLNode::as_element)
}

fn child_values(element: &Element) -> Vec<ActionArgumentValue> {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .map(|child| ActionArgumentValue {
            name: child.name.clone(),
            value: child.get_text().map(|t| t.into_owned()).unwrap_or_default(),
        })
        .collect()
}

/// Action name and argument values of an incoming request
pub fn read_action_request(body: &str) -> Result<(String, Vec<ActionArgumentValue>), UnsupportedDataError> {
    let soap_body = parse_body(body)?;
    let action = first_element(&soap_body)
        .ok_or_else(|| UnsupportedDataError::new("Empty SOAP Body, no action element", body))?;
    Ok((action.name.clone(), child_values(action)))
}

/// Apply a response body to the invocation: outputs on success, the failure on a fault
pub fn read_action_response(body: &str, invocation: &mut ActionInvocation) -> Result<(), UnsupportedDataError> {
    let soap_body = parse_body(body)?;
    if let Some(fault) = soap_body.get_child("Fault") {
        invocation.set_failure(fault_to_exception(fault));
        return Ok(());
    }

    let response_name = format!("{}Response", invocation.action().name);
    let response = soap_body
        .get_child(response_name.as_str())
        .ok_or_else(|| UnsupportedDataError::new(format!("Missing {} element", response_name), body))?;

    for value in child_values(response) {
        if let Err(e) = invocation.set_output(&value.name, value.value) {
            tracing::warn!("Ignoring unknown output argument in {}: {}", response_name, e);
        }
    }
    Ok(())
}

/// Read the UPnP error out of a fault body
pub fn read_fault(body: &str) -> Result<ActionException, UnsupportedDataError> {
    let soap_body = parse_body(body)?;
    soap_body
        .get_child("Fault")
        .map(fault_to_exception)
        .ok_or_else(|| UnsupportedDataError::new("Missing SOAP Fault", body))
}

fn fault_to_exception(fault: &Element) -> ActionException {
    let error = fault
        .get_child("detail")
        .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")));

    let code = error
        .and_then(|e| e.get_child("errorCode"))
        .and_then(|c| c.get_text())
        .and_then(|t| t.trim().parse::<u16>().ok());
    let description = error
        .and_then(|e| e.get_child("errorDescription"))
        .and_then(|c| c.get_text())
        .map(|t| t.into_owned());

    match (code, description) {
        (Some(code), Some(description)) => ActionException::with_code(code, description),
        (Some(code), None) => match ErrorCode::from_code(code) {
            Some(known) => ActionException::from_code(known),
            None => ActionException::with_code(code, "Unknown UPnP error"),
        },
        (None, _) => ActionException::new(ErrorCode::ActionFailed, "Received fault without UPnP error details"),
    }
}
