//! Header collections and response status shared by datagram and stream messages.

use std::fmt;

/// Header names used by SSDP, SOAP and GENA messages
pub mod header {
    pub const HOST: &str = "HOST";
    pub const NT: &str = "NT";
    pub const NTS: &str = "NTS";
    pub const USN: &str = "USN";
    pub const ST: &str = "ST";
    pub const MX: &str = "MX";
    pub const MAN: &str = "MAN";
    pub const EXT: &str = "EXT";
    pub const LOCATION: &str = "LOCATION";
    pub const CACHE_CONTROL: &str = "CACHE-CONTROL";
    pub const SERVER: &str = "SERVER";
    pub const USER_AGENT: &str = "USER-AGENT";
    pub const CONTENT_TYPE: &str = "CONTENT-TYPE";
    pub const SOAPACTION: &str = "SOAPACTION";
    pub const CALLBACK: &str = "CALLBACK";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const SID: &str = "SID";
    pub const SEQ: &str = "SEQ";
}

/// Content type for every XML body the stack sends
pub const CONTENT_TYPE_XML: &str = "text/xml; charset=\"utf-8\"";

/// True if the Content-Type header value names an XML media type
pub fn is_xml_content_type(value: &str) -> bool {
    let media_type = value.split(';').next().unwrap_or("").trim();
    media_type.eq_ignore_ascii_case("text/xml") || media_type.eq_ignore_ascii_case("application/xml")
}

/// Ordered, case-insensitive multimap of message headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every value of `name` with a single value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Overwrite headers with every header of `other`
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

/// Status line of a stream or datagram response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpResponse {
    pub status_code: u16,
    pub status_message: String,
}

impl UpnpResponse {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const METHOD_NOT_SUPPORTED: u16 = 405;
    pub const PRECONDITION_FAILED: u16 = 412;
    pub const UNSUPPORTED_MEDIA_TYPE: u16 = 415;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const NOT_IMPLEMENTED: u16 = 501;

    pub fn new(status_code: u16, status_message: impl Into<String>) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
        }
    }

    /// Response with the canonical reason phrase for `status_code`
    pub fn with_status(status_code: u16) -> Self {
        Self::new(status_code, reason_phrase(status_code))
    }

    pub fn is_failed(&self) -> bool {
        self.status_code >= 300
    }

    /// Status code and message, e.g. `412 Precondition Failed`
    pub fn response_details(&self) -> String {
        format!("{} {}", self.status_code, self.status_message)
    }
}

impl fmt::Display for UpnpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status_code, self.status_message)
    }
}

/// Canonical reason phrase for the status codes UPnP uses
pub fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Supported",
        412 => "Precondition Failed",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/xml");
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/xml"));
        assert!(headers.contains("content-type"));
    }

    #[test]
    fn test_headers_set_replaces_all_values() {
        let mut headers: Headers = vec![("CALLBACK", "<a>"), ("callback", "<b>")].into_iter().collect();
        assert_eq!(headers.get_all(header::CALLBACK).count(), 2);

        headers.set("Callback", "<c>");
        assert_eq!(headers.get_all(header::CALLBACK).collect::<Vec<_>>(), vec!["<c>"]);
    }

    #[test]
    fn test_headers_merge_overwrites() {
        let mut headers: Headers = vec![("USER-AGENT", "one")].into_iter().collect();
        let extra: Headers = vec![("user-agent", "two"), ("X-Extra", "1")].into_iter().collect();
        headers.merge(&extra);
        assert_eq!(headers.get(header::USER_AGENT), Some("two"));
        assert_eq!(headers.len(), 2);
    }

    #[rstest]
    #[case("text/xml", true)]
    #[case("text/xml; charset=\"utf-8\"", true)]
    #[case("TEXT/XML;charset=utf-8", true)]
    #[case("application/xml", true)]
    #[case("application/json", false)]
    #[case("", false)]
    fn test_is_xml_content_type(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_xml_content_type(value), expected);
    }

    #[test]
    fn test_response_status() {
        let response = UpnpResponse::with_status(UpnpResponse::PRECONDITION_FAILED);
        assert!(response.is_failed());
        assert_eq!(response.response_details(), "412 Precondition Failed");
        assert!(!UpnpResponse::with_status(UpnpResponse::OK).is_failed());
    }
}
