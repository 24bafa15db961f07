//! Route contracts: the immutable per-route description every request is checked against.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cast::ParamType;
use crate::constraint::{ParamConstraint, Unconstrained};
use crate::error::ConfigError;
use crate::negotiation::essence;
use crate::payload::{XmlSchemaValidator, XsdSchema};
use crate::response::resolve_success_status;

/// HTTP method of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET method
    Get,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP DELETE method
    Delete,
    /// HTTP PATCH method
    Patch,
    /// HTTP HEAD method
    Head,
    /// HTTP OPTIONS method
    Options,
}

impl HttpMethod {
    /// Returns the upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(ConfigError::InvalidConfig(format!("unknown HTTP method '{other}'"))),
        }
    }
}

/// Where a parameter is read from. Only the transport interprets this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// Query string.
    #[default]
    Query,
    /// Path template placeholder.
    Path,
    /// Request header.
    Header,
    /// Form-encoded body field.
    Form,
}

/// One declared request parameter.
///
/// # Examples
///
/// ```
/// use contract_core::{ParamLocation, ParamType, ParameterSpec, StandardConstraints};
///
/// let spec = ParameterSpec::new("id", ParamLocation::Path, ParamType::Integer)
///     .constraint(StandardConstraints::new(ParamType::Integer).required().minimum(1.0));
/// assert_eq!(spec.name(), "id");
/// ```
#[derive(Clone)]
pub struct ParameterSpec {
    name: String,
    location: ParamLocation,
    kind: ParamType,
    constraint: Arc<dyn ParamConstraint>,
}

impl ParameterSpec {
    /// Declares a parameter with no constraint.
    pub fn new(name: impl Into<String>, location: ParamLocation, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            location,
            kind,
            constraint: Arc::new(Unconstrained),
        }
    }

    /// Sets the constraint asserted after the value is cast.
    pub fn constraint(mut self, constraint: impl ParamConstraint + 'static) -> Self {
        self.constraint = Arc::new(constraint);
        self
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source location.
    pub fn location(&self) -> ParamLocation {
        self.location
    }

    /// Declared type.
    pub fn kind(&self) -> ParamType {
        self.kind
    }

    pub(crate) fn constraint_ref(&self) -> &dyn ParamConstraint {
        self.constraint.as_ref()
    }
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A compiled payload body schema.
#[derive(Clone)]
pub enum PayloadSchema {
    /// JSON Schema, compiled once.
    Json {
        /// Compiled validator.
        validator: Arc<jsonschema::Validator>,
        /// Schema document it was compiled from.
        schema: Value,
    },
    /// XML Schema capability.
    Xml(Arc<dyn XmlSchemaValidator>),
}

impl fmt::Debug for PayloadSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSchema::Json { schema, .. } => f.debug_tuple("Json").field(schema).finish(),
            PayloadSchema::Xml(_) => f.write_str("Xml(..)"),
        }
    }
}

enum SchemaSource {
    Json(Value),
    XsdText(String),
    Xml(Arc<dyn XmlSchemaValidator>),
}

/// Immutable contract for one route.
///
/// Built once at registration through [`RouteContract::builder`], which
/// rejects contracts that could never be served correctly.
///
/// # Examples
///
/// ```
/// use contract_core::{HttpMethod, RouteContract};
///
/// let contract = RouteContract::builder("/items", HttpMethod::Post)
///     .request_content_types(["application/json"])
///     .response_content_types(["application/json"])
///     .status_codes([201, 400])
///     .json_schema("application/json", serde_json::json!({"type": "object"}))
///     .build()
///     .unwrap();
///
/// assert_eq!(contract.success_status(), 201);
/// assert!(contract.schema_for("application/json; charset=utf-8").is_some());
/// assert!(contract.schema_for("application/xml").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RouteContract {
    path: String,
    method: HttpMethod,
    resource: String,
    protocols: Vec<String>,
    request_content_types: Vec<String>,
    response_content_types: Vec<String>,
    status_codes: Vec<u16>,
    success_status: u16,
    parameters: Vec<ParameterSpec>,
    schemas: Vec<(String, PayloadSchema)>,
}

impl RouteContract {
    /// Starts a contract for `path` and `method`.
    pub fn builder(path: impl Into<String>, method: HttpMethod) -> RouteContractBuilder {
        RouteContractBuilder::new(path.into(), method)
    }

    /// Route path template.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Resource identifier used to resolve the handler.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Allowed protocols, in declaration order.
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Accepted request content types. Empty accepts any.
    pub fn request_content_types(&self) -> &[String] {
        &self.request_content_types
    }

    /// Offered response content types.
    pub fn response_content_types(&self) -> &[String] {
        &self.response_content_types
    }

    /// All declared status codes.
    pub fn status_codes(&self) -> &[u16] {
        &self.status_codes
    }

    /// The single declared 2xx status code.
    pub fn success_status(&self) -> u16 {
        self.success_status
    }

    /// Declared parameters, in declaration order.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Returns the body schema declared for `content_type`, if any.
    pub fn schema_for(&self, content_type: &str) -> Option<&PayloadSchema> {
        let wanted = essence(content_type);
        self.schemas
            .iter()
            .find(|(declared, _)| essence(declared).eq_ignore_ascii_case(wanted))
            .map(|(_, schema)| schema)
    }
}

/// Builder for [`RouteContract`].
pub struct RouteContractBuilder {
    path: String,
    method: HttpMethod,
    resource: Option<String>,
    protocols: Vec<String>,
    request_content_types: Vec<String>,
    response_content_types: Vec<String>,
    status_codes: Vec<u16>,
    parameters: Vec<ParameterSpec>,
    schemas: Vec<(String, SchemaSource)>,
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl RouteContractBuilder {
    fn new(path: String, method: HttpMethod) -> Self {
        Self {
            path,
            method,
            resource: None,
            protocols: vec!["HTTP".to_string(), "HTTPS".to_string()],
            request_content_types: Vec::new(),
            response_content_types: Vec::new(),
            status_codes: Vec::new(),
            parameters: Vec::new(),
            schemas: Vec::new(),
        }
    }

    /// Sets the resource identifier. Defaults to the path.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Replaces the allowed protocols. Defaults to HTTP and HTTPS.
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = strings(protocols);
        self
    }

    /// Sets the accepted request content types.
    pub fn request_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_content_types = strings(types);
        self
    }

    /// Sets the offered response content types.
    pub fn response_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_content_types = strings(types);
        self
    }

    /// Sets the declared status codes.
    pub fn status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.status_codes = codes.into_iter().collect();
        self
    }

    /// Appends a parameter.
    pub fn parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declares a JSON Schema for bodies sent as `content_type`.
    pub fn json_schema(mut self, content_type: impl Into<String>, schema: Value) -> Self {
        self.schemas.push((content_type.into(), SchemaSource::Json(schema)));
        self
    }

    /// Declares an XSD document for bodies sent as `content_type`.
    pub fn xml_schema(mut self, content_type: impl Into<String>, xsd: impl Into<String>) -> Self {
        self.schemas
            .push((content_type.into(), SchemaSource::XsdText(xsd.into())));
        self
    }

    /// Declares a custom XML Schema validator for `content_type`.
    pub fn schema_validator(
        mut self,
        content_type: impl Into<String>,
        validator: Arc<dyn XmlSchemaValidator>,
    ) -> Self {
        self.schemas
            .push((content_type.into(), SchemaSource::Xml(validator)));
        self
    }

    /// Validates and freezes the contract.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoSuccessStatusCode`] / [`ConfigError::AmbiguousSuccessStatusCode`]
    ///   unless exactly one 2xx code is declared
    /// - [`ConfigError::NoContentTypeDefined`] if no response content type is offered
    /// - [`ConfigError::DuplicateParameter`] if two parameters share a name
    /// - [`ConfigError::InvalidJsonSchema`] / [`ConfigError::InvalidXmlSchema`] if a schema does not compile
    pub fn build(self) -> Result<RouteContract, ConfigError> {
        let success_status = resolve_success_status(&self.path, &self.status_codes)?;

        if self.response_content_types.is_empty() {
            return Err(ConfigError::NoContentTypeDefined { route: self.path });
        }

        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert(parameter.name()) {
                return Err(ConfigError::DuplicateParameter {
                    route: self.path.clone(),
                    name: parameter.name().to_string(),
                });
            }
        }

        let schemas = self
            .schemas
            .into_iter()
            .map(|(content_type, source)| {
                let schema = compile_schema(&content_type, source)?;
                Ok((content_type, schema))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(RouteContract {
            resource: self.resource.unwrap_or_else(|| self.path.clone()),
            path: self.path,
            method: self.method,
            protocols: self.protocols,
            request_content_types: self.request_content_types,
            response_content_types: self.response_content_types,
            status_codes: self.status_codes,
            success_status,
            parameters: self.parameters,
            schemas,
        })
    }
}

fn compile_schema(content_type: &str, source: SchemaSource) -> Result<PayloadSchema, ConfigError> {
    match source {
        SchemaSource::Json(schema) => {
            let validator =
                jsonschema::validator_for(&schema).map_err(|err| ConfigError::InvalidJsonSchema {
                    content_type: content_type.to_string(),
                    reason: err.to_string(),
                })?;
            Ok(PayloadSchema::Json {
                validator: Arc::new(validator),
                schema,
            })
        }
        SchemaSource::XsdText(text) => {
            let schema = XsdSchema::parse(&text).map_err(|reason| ConfigError::InvalidXmlSchema {
                content_type: content_type.to_string(),
                reason,
            })?;
            Ok(PayloadSchema::Xml(Arc::new(schema)))
        }
        SchemaSource::Xml(validator) => Ok(PayloadSchema::Xml(validator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base(method: HttpMethod) -> RouteContractBuilder {
        RouteContract::builder("/items/{id}", method)
            .response_content_types(["application/json"])
            .status_codes([200, 404])
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
        assert!("BREW".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn defaults_are_applied() {
        let contract = base(HttpMethod::Get).build().unwrap();
        assert_eq!(contract.resource(), "/items/{id}");
        assert_eq!(contract.protocols(), ["HTTP".to_string(), "HTTPS".to_string()]);
        assert_eq!(contract.success_status(), 200);
        assert!(contract.request_content_types().is_empty());
    }

    #[test]
    fn ambiguous_success_status_is_rejected() {
        let err = base(HttpMethod::Post).status_codes([200, 201]).build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::AmbiguousSuccessStatusCode {
                route: "/items/{id}".to_string(),
                codes: vec![200, 201],
            }
        );
    }

    #[test]
    fn missing_success_status_is_rejected() {
        let err = base(HttpMethod::Get).status_codes([404]).build().unwrap_err();
        assert!(matches!(err, ConfigError::NoSuccessStatusCode { .. }));
    }

    #[test]
    fn missing_response_content_types_are_rejected() {
        let err = RouteContract::builder("/x", HttpMethod::Get)
            .status_codes([200])
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoContentTypeDefined { .. }));
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let err = base(HttpMethod::Get)
            .parameter(ParameterSpec::new("id", ParamLocation::Path, ParamType::Integer))
            .parameter(ParameterSpec::new("id", ParamLocation::Query, ParamType::String))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateParameter { name, .. } if name == "id"));
    }

    #[test]
    fn invalid_schemas_are_rejected() {
        let err = base(HttpMethod::Post)
            .json_schema("application/json", json!({"type": 12}))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJsonSchema { .. }));

        let err = base(HttpMethod::Post)
            .xml_schema("application/xml", "<nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidXmlSchema { .. }));
    }

    #[test]
    fn schema_lookup_ignores_case_and_parameters() {
        let contract = base(HttpMethod::Post)
            .json_schema("application/json", json!({"type": "object"}))
            .build()
            .unwrap();
        assert!(contract.schema_for("APPLICATION/JSON; charset=utf-8").is_some());
        assert!(contract.schema_for("text/plain").is_none());
    }

    #[test]
    fn parameter_debug_omits_constraint() {
        let spec = ParameterSpec::new("q", ParamLocation::Query, ParamType::String);
        let debug = format!("{spec:?}");
        assert!(debug.contains("\"q\""));
        assert!(debug.contains(".."));
    }
}
