//! In-memory transport for tests, demos and non-HTTP hosts.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::cast::{CastValue, ParamType, RawValue};

use super::{BuildResponse, Transport};

/// Transport over owned request facts.
///
/// Every write made through [`Transport`] is also recorded, so tests can
/// check what was committed and how often.
///
/// # Examples
///
/// ```
/// use contract_core::web::{MemoryTransport, Transport};
/// use contract_core::{CastValue, ParamType, RawValue};
///
/// let mut transport = MemoryTransport::builder()
///     .protocol("HTTPS")
///     .accept("application/json")
///     .parameter("id", "5")
///     .build();
///
/// assert_eq!(transport.parameter_value("id", ParamType::Integer), Some(RawValue::from("5")));
///
/// transport.set_parameter_value("id", CastValue::Integer(5));
/// assert_eq!(transport.parameter("id"), Some(&CastValue::Integer(5)));
/// assert_eq!(transport.parameter_writes().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    protocol: String,
    content_type: String,
    accept: String,
    parameters: HashMap<String, RawValue>,
    body: Vec<u8>,
    committed: HashMap<String, CastValue>,
    committed_body: Option<Value>,
    parameter_writes: Vec<(String, CastValue)>,
    body_writes: usize,
}

impl MemoryTransport {
    /// Starts a request over HTTP with no headers, parameters or body.
    pub fn builder() -> MemoryTransportBuilder {
        MemoryTransportBuilder {
            inner: MemoryTransport {
                protocol: "HTTP".to_string(),
                ..MemoryTransport::default()
            },
        }
    }

    /// Every parameter write, in order.
    pub fn parameter_writes(&self) -> &[(String, CastValue)] {
        &self.parameter_writes
    }

    /// Number of body writes.
    pub fn body_writes(&self) -> usize {
        self.body_writes
    }
}

/// Builder for [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryTransportBuilder {
    inner: MemoryTransport,
}

impl MemoryTransportBuilder {
    /// Sets the protocol.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.inner.protocol = protocol.into();
        self
    }

    /// Sets the `Content-Type`.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.inner.content_type = content_type.into();
        self
    }

    /// Sets the `Accept`.
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.inner.accept = accept.into();
        self
    }

    /// Adds a single-valued parameter.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner
            .parameters
            .insert(name.into(), RawValue::Text(value.into()));
        self
    }

    /// Adds a repeated parameter.
    pub fn parameter_list<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.inner
            .parameters
            .insert(name.into(), RawValue::List(values));
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.inner.body = body.into();
        self
    }

    /// Finishes the request.
    pub fn build(self) -> MemoryTransport {
        self.inner
    }
}

impl Transport for MemoryTransport {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn accept(&self) -> &str {
        &self.accept
    }

    fn parameter_value(&self, name: &str, _kind: ParamType) -> Option<RawValue> {
        self.parameters.get(name).cloned()
    }

    fn set_parameter_value(&mut self, name: &str, value: CastValue) {
        self.parameter_writes.push((name.to_string(), value.clone()));
        self.committed.insert(name.to_string(), value);
    }

    fn parameter(&self, name: &str) -> Option<&CastValue> {
        self.committed.get(name)
    }

    fn payload_body_value(&self) -> &[u8] {
        &self.body
    }

    fn set_payload_body_value(&mut self, value: Value) {
        self.body_writes += 1;
        self.committed_body = Some(value);
    }

    fn payload_body(&self) -> Option<&Value> {
        self.committed_body.as_ref()
    }
}

/// Response produced by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Serialized body.
    pub body: Vec<u8>,
}

impl MemoryResponse {
    /// Returns the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl BuildResponse for MemoryTransport {
    type Response = MemoryResponse;

    fn build_response(
        &self,
        content: Vec<u8>,
        status: u16,
        headers: &BTreeMap<String, String>,
    ) -> MemoryResponse {
        MemoryResponse {
            status,
            headers: headers.clone(),
            body: content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_defaults_to_http() {
        let transport = MemoryTransport::builder().build();
        assert_eq!(transport.protocol(), "HTTP");
        assert_eq!(transport.accept(), "");
        assert!(transport.payload_body_value().is_empty());
    }

    #[test]
    fn repeated_parameters_keep_every_value() {
        let transport = MemoryTransport::builder()
            .parameter_list("tag", ["a", "b"])
            .build();
        assert_eq!(
            transport.parameter_value("tag", ParamType::Array),
            Some(RawValue::List(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn committed_values_shadow_nothing_until_written() {
        let mut transport = MemoryTransport::builder().parameter("q", "x").build();
        assert_eq!(transport.parameter("q"), None);
        assert_eq!(transport.payload_body(), None);

        transport.set_payload_body_value(json!({"a": 1}));
        assert_eq!(transport.payload_body(), Some(&json!({"a": 1})));
        assert_eq!(transport.body_writes(), 1);
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let transport = MemoryTransport::builder().build();
        let response = transport.build_response(b"{}".to_vec(), 200, &headers);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.text(), "{}");
    }
}
