//! GENA header values and the event property-set body.

use quick_xml::escape::escape;
use upnp_model::StateVariableValue;
use url::Url;
use xmltree::{Element, XMLNode};

use crate::error::UnsupportedDataError;

/// `NT` value of subscribe requests and event messages
pub const NT_EVENT: &str = "upnp:event";
/// `NTS` value of event messages
pub const NTS_PROPCHANGE: &str = "upnp:propchange";
/// Duration used to represent `Second-infinite`
pub const INFINITE_TIMEOUT: u32 = u32::MAX;

/// Parse a `TIMEOUT` header such as `Second-1800` or `Second-infinite`
pub fn parse_timeout(value: &str) -> Option<u32> {
    let value = value.trim();
    let seconds = value
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("Second-"))
        .map(|_| &value[7..])?;
    if seconds.eq_ignore_ascii_case("infinite") {
        return Some(INFINITE_TIMEOUT);
    }
    seconds.trim().parse::<u32>().ok()
}

pub fn format_timeout(seconds: u32) -> String {
    if seconds == INFINITE_TIMEOUT {
        "Second-infinite".to_string()
    } else {
        format!("Second-{}", seconds)
    }
}

/// Format callback URLs as `<url1><url2>`
pub fn format_callback(urls: &[Url]) -> String {
    urls.iter().map(|url| format!("<{}>", url)).collect()
}

/// Parse a `CALLBACK` header, keeping only valid http URLs
pub fn parse_callback(value: &str) -> Vec<Url> {
    value
        .split('<')
        .filter_map(|part| part.split_once('>').map(|(url, _)| url.trim()))
        .filter(|url| !url.is_empty())
        .filter_map(|url| match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" => Some(parsed),
            Ok(parsed) => {
                tracing::warn!("Ignoring callback URL with unsupported scheme: {}", parsed);
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring invalid callback URL '{}': {}", url, e);
                None
            }
        })
        .collect()
}

/// Parse a `SEQ` header
pub fn parse_sequence(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

/// Event body for the given values
pub fn write_property_set(values: &[StateVariableValue]) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?><e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">"#,
    );
    for value in values {
        body.push_str(&format!(
            "<e:property><{name}>{value}</{name}></e:property>",
            name = value.name,
            value = escape(value.value.as_str())
        ));
    }
    body.push_str("</e:propertyset>");
    body
}

/// Values of an event body; properties without a value element are skipped
pub fn read_property_set(body: &str) -> Result<Vec<StateVariableValue>, UnsupportedDataError> {
    let root = Element::parse(body.as_bytes())
        .map_err(|e| UnsupportedDataError::new(format!("Invalid event XML: {}", e), body))?;
    if root.name != "propertyset" {
        return Err(UnsupportedDataError::new(
            format!("Expected propertyset element, found {}", root.name),
            body,
        ));
    }

    let mut values = Vec::new();
    for property in root
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|e| e.name == "property")
    {
        match property.children.iter().find_map(XMLNode::as_element) {
            Some(variable) => values.push(StateVariableValue::new(
                variable.name.clone(),
                variable.get_text().map(|t| t.into_owned()).unwrap_or_default(),
            )),
            None => tracing::warn!("Skipping event property without a state variable element"),
        }
    }
    Ok(values)
}
