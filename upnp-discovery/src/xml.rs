//! quick-xml helpers shared by the descriptor binders.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DescriptorBindingError;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Deserialize a descriptor document, ignoring element namespace prefixes
pub(crate) fn parse_document<T: DeserializeOwned>(xml: &str) -> Result<T, DescriptorBindingError> {
    let stripped = strip_namespace_prefixes(xml);
    quick_xml::de::from_str(&stripped).map_err(|e| DescriptorBindingError::Xml(e.to_string()))
}

/// Serialize a descriptor document with an XML declaration
pub(crate) fn write_document<T: Serialize>(document: &T) -> Result<String, DescriptorBindingError> {
    let body = quick_xml::se::to_string(document).map_err(|e| DescriptorBindingError::Xml(e.to_string()))?;
    Ok(format!("{}{}", XML_DECLARATION, body))
}

/// `<s:Envelope>` becomes `<Envelope>`; attributes, text, comments and CDATA are untouched
fn strip_namespace_prefixes(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let verbatim_end = if rest.starts_with("<![CDATA[") {
            Some(rest.find("]]>").map_or(rest.len(), |i| i + 3))
        } else if rest.starts_with("<?") || rest.starts_with("<!") {
            Some(rest.find('>').map_or(rest.len(), |i| i + 1))
        } else {
            None
        };
        if let Some(end) = verbatim_end {
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        let name_start = if rest.starts_with("</") { 2 } else { 1 };
        out.push_str(&rest[..name_start]);
        rest = &rest[name_start..];

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        out.push_str(name.rsplit(':').next().unwrap_or(name));
        rest = &rest[name_end..];
    }

    out.push_str(rest);
    out
}
