//! Adapter over the `http` crate's request and response types.

use std::collections::{BTreeMap, HashMap};

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderName, Request, Response, StatusCode};
use serde_json::Value;
use url::form_urlencoded;

use crate::cast::{CastValue, ParamType, RawValue};

use super::{BuildResponse, Transport};

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Transport over an `http::Request<Vec<u8>>`.
///
/// - protocol: `X-Forwarded-Proto`, else the URI scheme, else `HTTP`
/// - parameters: query string, then form body (for form-encoded requests),
///   then path parameters supplied by the router
/// - repeated keys are kept as a list
///
/// # Examples
///
/// ```
/// use contract_core::web::{HttpTransport, Transport};
/// use contract_core::{ParamType, RawValue};
///
/// let request = http::Request::builder()
///     .uri("https://api.example.com/items?tag=a&tag=b&page=2")
///     .header("accept", "application/json")
///     .body(Vec::new())
///     .unwrap();
///
/// let transport = HttpTransport::new(request);
/// assert_eq!(transport.protocol(), "https");
/// assert_eq!(transport.parameter_value("page", ParamType::Integer), Some(RawValue::from("2")));
/// assert_eq!(
///     transport.parameter_value("tag", ParamType::Array),
///     Some(RawValue::List(vec!["a".into(), "b".into()]))
/// );
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    request: Request<Vec<u8>>,
    query: HashMap<String, RawValue>,
    form: HashMap<String, RawValue>,
    path_params: HashMap<String, String>,
    committed: HashMap<String, CastValue>,
    committed_body: Option<Value>,
}

impl HttpTransport {
    /// Wraps a buffered request.
    pub fn new(request: Request<Vec<u8>>) -> Self {
        let query = request
            .uri()
            .query()
            .map(|query| collect_pairs(query.as_bytes()))
            .unwrap_or_default();

        let is_form = header_value(&request, &CONTENT_TYPE)
            .split(';')
            .next()
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE));
        let form = if is_form {
            collect_pairs(request.body())
        } else {
            HashMap::new()
        };

        Self {
            request,
            query,
            form,
            path_params: HashMap::new(),
            committed: HashMap::new(),
            committed_body: None,
        }
    }

    /// Adds the path parameters captured by the router.
    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    /// The wrapped request.
    pub fn request(&self) -> &Request<Vec<u8>> {
        &self.request
    }
}

fn collect_pairs(input: &[u8]) -> HashMap<String, RawValue> {
    let mut pairs: HashMap<String, RawValue> = HashMap::new();
    for (key, value) in form_urlencoded::parse(input) {
        let value = value.into_owned();
        match pairs.remove(key.as_ref()) {
            None => {
                pairs.insert(key.into_owned(), RawValue::Text(value));
            }
            Some(RawValue::Text(first)) => {
                pairs.insert(key.into_owned(), RawValue::List(vec![first, value]));
            }
            Some(RawValue::List(mut values)) => {
                values.push(value);
                pairs.insert(key.into_owned(), RawValue::List(values));
            }
        }
    }
    pairs
}

fn header_value<'r>(request: &'r Request<Vec<u8>>, name: &HeaderName) -> &'r str {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

impl Transport for HttpTransport {
    fn protocol(&self) -> &str {
        let forwarded = self
            .request
            .headers()
            .get(FORWARDED_PROTO)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        forwarded
            .or_else(|| self.request.uri().scheme_str())
            .unwrap_or("HTTP")
    }

    fn content_type(&self) -> &str {
        header_value(&self.request, &CONTENT_TYPE)
    }

    fn accept(&self) -> &str {
        header_value(&self.request, &ACCEPT)
    }

    fn parameter_value(&self, name: &str, _kind: ParamType) -> Option<RawValue> {
        self.query
            .get(name)
            .or_else(|| self.form.get(name))
            .cloned()
            .or_else(|| self.path_params.get(name).cloned().map(RawValue::Text))
    }

    fn set_parameter_value(&mut self, name: &str, value: CastValue) {
        self.committed.insert(name.to_string(), value);
    }

    fn parameter(&self, name: &str) -> Option<&CastValue> {
        self.committed.get(name)
    }

    fn payload_body_value(&self) -> &[u8] {
        self.request.body()
    }

    fn set_payload_body_value(&mut self, value: Value) {
        self.committed_body = Some(value);
    }

    fn payload_body(&self) -> Option<&Value> {
        self.committed_body.as_ref()
    }
}

impl BuildResponse for HttpTransport {
    type Response = Response<Vec<u8>>;

    fn build_response(
        &self,
        content: Vec<u8>,
        status: u16,
        headers: &BTreeMap<String, String>,
    ) -> Response<Vec<u8>> {
        let mut builder = Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match builder.body(content) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(status, error = %err, "failed to build response");
                let mut response = Response::new(Vec::new());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}
