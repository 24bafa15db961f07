//! The response model a handler fills in.

use std::collections::BTreeMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::ConfigError;
use crate::negotiation::{Format, FormatTable};
use crate::web::BuildResponse;

const XML_ROOT: &str = "response";
const XML_ITEM: &str = "item";

/// Failure to serialize a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// JSON serialization failed.
    #[error("failed to serialize JSON response: {0}")]
    Json(#[from] serde_json::Error),
    /// XML serialization failed.
    #[error("failed to serialize XML response: {0}")]
    Xml(String),
    /// A key cannot be used as an XML element name.
    #[error("'{0}' is not a valid XML element name")]
    InvalidElementName(String),
}

/// Response under construction.
///
/// Created by the engine with the negotiated format and the route's success
/// status, handed to the handler, then serialized and passed to the transport.
///
/// # Examples
///
/// ```
/// use contract_core::{Format, FormatTable, Response};
/// use serde_json::json;
///
/// let mut response = Response::new(&FormatTable::default(), "application/xml", 201);
/// response.set_content(json!({"id": 7}));
/// response.set_location("/items/7");
///
/// assert_eq!(response.format(), Format::Xml);
/// let headers = response.headers();
/// assert_eq!(headers["Content-Type"], "application/xml");
/// assert_eq!(headers["Location"], "/items/7");
///
/// let body = String::from_utf8(response.serialize_content().unwrap()).unwrap();
/// assert_eq!(body, r#"<?xml version="1.0"?><response><id>7</id></response>"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    format: Format,
    media_type: String,
    status_code: u16,
    location: Option<String>,
    content_type: Option<String>,
    content: Option<Value>,
}

impl Response {
    /// Creates an empty response for `media_type`.
    ///
    /// `media_type` may be a raw Accept value. It is resolved through
    /// `formats`; a type the table does not know falls back to JSON and is
    /// announced as the table's canonical JSON type.
    pub fn new(formats: &FormatTable, media_type: &str, status_code: u16) -> Self {
        let (format, media_type) = formats.resolve(media_type);
        Self::with_format(format, media_type, status_code)
    }

    /// Creates an empty response for a media type already negotiated
    /// against the route's offered types.
    ///
    /// The format is resolved through `formats` as in [`Response::new`], but
    /// `Content-Type` announces `media_type` itself.
    ///
    /// ```
    /// use contract_core::{Format, FormatTable, Response};
    ///
    /// let mut response = Response::negotiated(&FormatTable::default(), "application/vnd.api+json", 200);
    /// response.set_content(serde_json::json!({"id": 1}));
    /// assert_eq!(response.format(), Format::Json);
    /// assert_eq!(response.headers()["Content-Type"], "application/vnd.api+json");
    /// ```
    pub fn negotiated(formats: &FormatTable, media_type: &str, status_code: u16) -> Self {
        let (format, _) = formats.resolve(media_type);
        Self::with_format(format, media_type.trim().to_string(), status_code)
    }

    fn with_format(format: Format, media_type: String, status_code: u16) -> Self {
        Self {
            format,
            media_type,
            status_code,
            location: None,
            content_type: None,
            content: None,
        }
    }

    /// Resolved format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// MIME type announced in `Content-Type`.
    pub fn media_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(&self.media_type)
    }

    /// Status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Content, if any.
    pub fn content(&self) -> Option<&Value> {
        self.content.as_ref()
    }

    /// `Location` value, if any.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Sets the content.
    pub fn set_content(&mut self, content: Value) {
        self.content = Some(content);
    }

    /// Sets the content from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn set_serialized<T: Serialize>(&mut self, content: &T) -> Result<(), ResponseError> {
        self.content = Some(serde_json::to_value(content)?);
        Ok(())
    }

    /// Sets the `Location` header.
    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = Some(location.into());
    }

    /// Overrides the `Content-Type` header.
    pub fn set_header_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    /// Overrides the status code.
    pub fn set_status_code(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    /// Assembles the response headers.
    ///
    /// `Content-Type` is set when there is content or an explicit override.
    /// `Location` is set only when the handler provided one.
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some(content_type) = &self.content_type {
            headers.insert("Content-Type".to_string(), content_type.clone());
        } else if self.content.is_some() {
            headers.insert("Content-Type".to_string(), self.media_type.clone());
        }
        if let Some(location) = &self.location {
            headers.insert("Location".to_string(), location.clone());
        }
        headers
    }

    /// Serializes the content in the resolved format. No content gives an empty body.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError`] if the content cannot be encoded.
    pub fn serialize_content(&self) -> Result<Vec<u8>, ResponseError> {
        let Some(content) = &self.content else {
            return Ok(Vec::new());
        };
        match self.format {
            Format::Json => Ok(serde_json::to_vec(content)?),
            Format::Xml => to_xml(content),
        }
    }

    /// Serializes the response and hands it to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError`] if the content cannot be encoded.
    pub fn into_transport<T>(self, transport: &T) -> Result<T::Response, ResponseError>
    where
        T: BuildResponse + ?Sized,
    {
        let content = self.serialize_content()?;
        Ok(transport.build_response(content, self.status_code, &self.headers()))
    }
}

/// Picks the single 2xx code out of a route's declared status codes.
///
/// # Errors
///
/// [`ConfigError::NoSuccessStatusCode`] if there is none,
/// [`ConfigError::AmbiguousSuccessStatusCode`] if there are several.
///
/// ```
/// use contract_core::resolve_success_status;
///
/// assert_eq!(resolve_success_status("/items", &[201, 400, 409]).unwrap(), 201);
/// assert!(resolve_success_status("/items", &[200, 201]).is_err());
/// ```
pub fn resolve_success_status(route: &str, codes: &[u16]) -> Result<u16, ConfigError> {
    let mut success: Vec<u16> = codes
        .iter()
        .copied()
        .filter(|code| (200..300).contains(code))
        .collect();
    success.sort_unstable();
    success.dedup();
    match success.len() {
        0 => Err(ConfigError::NoSuccessStatusCode {
            route: route.to_string(),
        }),
        1 => Ok(success[0]),
        _ => Err(ConfigError::AmbiguousSuccessStatusCode {
            route: route.to_string(),
            codes: success,
        }),
    }
}

fn xml_error(err: impl std::fmt::Display) -> ResponseError {
    ResponseError::Xml(err.to_string())
}

fn to_xml(content: &Value) -> Result<Vec<u8>, ResponseError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(xml_error)?;
    match content {
        Value::Array(items) => {
            writer
                .write_event(Event::Start(BytesStart::new(XML_ROOT)))
                .map_err(xml_error)?;
            for item in items {
                write_element(&mut writer, XML_ITEM, item)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(XML_ROOT)))
                .map_err(xml_error)?;
        }
        other => write_element(&mut writer, XML_ROOT, other)?,
    }
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), ResponseError> {
    if !is_element_name(name) {
        return Err(ResponseError::InvalidElementName(name.to_string()));
    }
    let text = match value {
        Value::Null => {
            return writer
                .write_event(Event::Empty(BytesStart::new(name)))
                .map_err(xml_error);
        }
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            // Repeated elements carry the array.
            for item in items {
                match item {
                    Value::Array(_) => {
                        writer
                            .write_event(Event::Start(BytesStart::new(name)))
                            .map_err(xml_error)?;
                        write_element(writer, XML_ITEM, item)?;
                        writer
                            .write_event(Event::End(BytesEnd::new(name)))
                            .map_err(xml_error)?;
                    }
                    _ => write_element(writer, name, item)?,
                }
            }
            return Ok(());
        }
        Value::Object(fields) => {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(xml_error)?;
            for (key, field) in fields {
                write_element(writer, key, field)?;
            }
            return writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_error);
        }
    };
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(&text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.to_ascii_lowercase().starts_with("xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn xml(content: Value) -> String {
        let mut response = Response::new(&FormatTable::default(), "text/xml", 200);
        response.set_content(content);
        String::from_utf8(response.serialize_content().unwrap()).unwrap()
    }

    #[test]
    fn unknown_media_type_falls_back_to_json() {
        let response = Response::new(&FormatTable::default(), "text/html", 200);
        assert_eq!(response.format(), Format::Json);
        assert_eq!(response.media_type(), "application/json");
    }

    #[test]
    fn negotiated_vendor_type_is_announced_as_is() {
        let mut response = Response::negotiated(&FormatTable::default(), "application/vnd.api+json", 200);
        response.set_content(json!({"id": 1}));
        assert_eq!(response.format(), Format::Json);
        assert_eq!(response.media_type(), "application/vnd.api+json");
        assert_eq!(response.headers()["Content-Type"], "application/vnd.api+json");
    }

    #[test]
    fn negotiated_known_type_keeps_its_family() {
        let response = Response::negotiated(&FormatTable::default(), "Application/XML", 200);
        assert_eq!(response.format(), Format::Xml);
        assert_eq!(response.media_type(), "Application/XML");
    }

    #[test]
    fn headers_without_content_are_empty() {
        let response = Response::new(&FormatTable::default(), "application/json", 204);
        assert!(response.headers().is_empty());
        assert!(response.serialize_content().unwrap().is_empty());
    }

    #[test]
    fn content_type_override_wins() {
        let mut response = Response::new(&FormatTable::default(), "application/json", 200);
        response.set_header_content_type("application/problem+json");
        response.set_content(json!({}));
        assert_eq!(response.headers()["Content-Type"], "application/problem+json");
        assert_eq!(response.media_type(), "application/problem+json");
    }

    #[test]
    fn json_content_is_serialized_directly() {
        let mut response = Response::new(&FormatTable::default(), "application/json", 200);
        response.set_serialized(&vec![1, 2]).unwrap();
        assert_eq!(response.serialize_content().unwrap(), b"[1,2]");
    }

    #[test]
    fn xml_arrays_become_repeated_elements() {
        assert_eq!(
            xml(json!({"empty": null, "ok": true, "tag": ["a", "b"]})),
            r#"<?xml version="1.0"?><response><empty/><ok>true</ok><tag>a</tag><tag>b</tag></response>"#
        );
    }

    #[test]
    fn xml_top_level_array_uses_items() {
        assert_eq!(
            xml(json!([{"code": 11, "message": "Bad"}])),
            r#"<?xml version="1.0"?><response><item><code>11</code><message>Bad</message></item></response>"#
        );
    }

    #[test]
    fn xml_text_is_escaped() {
        assert_eq!(
            xml(json!("a < b & c")),
            r#"<?xml version="1.0"?><response>a &lt; b &amp; c</response>"#
        );
    }

    #[test]
    fn invalid_element_names_are_rejected() {
        let mut response = Response::new(&FormatTable::default(), "text/xml", 200);
        response.set_content(json!({"1st": "x"}));
        assert!(matches!(
            response.serialize_content(),
            Err(ResponseError::InvalidElementName(name)) if name == "1st"
        ));
    }

    #[test]
    fn success_status_must_be_unique() {
        assert_eq!(resolve_success_status("/x", &[404, 204]).unwrap(), 204);
        assert!(matches!(
            resolve_success_status("/x", &[400]),
            Err(ConfigError::NoSuccessStatusCode { .. })
        ));
        assert!(matches!(
            resolve_success_status("/x", &[200, 201]),
            Err(ConfigError::AmbiguousSuccessStatusCode { codes, .. }) if codes == vec![200, 201]
        ));
    }
}
