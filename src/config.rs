//! Engine configuration and declarative route contracts.
//!
//! Both are plain serde types, read from TOML:
//!
//! ```toml
//! controller_namespace = "Shop"
//!
//! [[formats]]
//! format = "json"
//! mime_types = ["application/json"]
//!
//! [[routes]]
//! path = "/items/{id}"
//! method = "GET"
//! response_content_types = ["application/json"]
//! status_codes = [200, 404]
//!
//! [[routes.parameters]]
//! name = "id"
//! in = "path"
//! type = "integer"
//! required = true
//! minimum = 1
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cast::ParamType;
use crate::constraint::StandardConstraints;
use crate::contract::{HttpMethod, ParamLocation, ParameterSpec, RouteContract};
use crate::error::ConfigError;
use crate::negotiation::FormatTable;

const DEFAULT_NAMESPACE: &str = "Controllers";

/// Engine-wide settings, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix of controller identifiers in diagnostics.
    pub controller_namespace: String,
    /// MIME-family table used to pick response formats.
    pub formats: FormatTable,
    /// Routes to register with [`ContractEngine::add_configured_routes`](crate::ContractEngine::add_configured_routes).
    pub routes: Vec<ContractDef>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            controller_namespace: DEFAULT_NAMESPACE.to_string(),
            formats: FormatTable::default(),
            routes: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Reads a configuration from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] with the decoder diagnostic.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_core::{EngineConfig, Format};
    ///
    /// let config = EngineConfig::from_toml_str(r#"controller_namespace = "Shop""#).unwrap();
    /// assert_eq!(config.controller_namespace, "Shop");
    /// assert_eq!(config.formats.resolve("text/xml").0, Format::Xml);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::InvalidConfig(err.to_string()))
    }
}

fn default_protocols() -> Vec<String> {
    vec!["HTTP".to_string(), "HTTPS".to_string()]
}

/// Declarative form of a [`RouteContract`].
///
/// Schemas are keyed by content type. A JSON value is a JSON Schema; a
/// string is JSON Schema text, or XSD text when the content type is an XML type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDef {
    /// Route path template.
    pub path: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Resource identifier; the path when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Allowed protocols.
    #[serde(default = "default_protocols")]
    pub protocols: Vec<String>,
    /// Accepted request content types.
    #[serde(default)]
    pub request_content_types: Vec<String>,
    /// Offered response content types.
    #[serde(default)]
    pub response_content_types: Vec<String>,
    /// Declared status codes.
    #[serde(default)]
    pub status_codes: Vec<u16>,
    /// Parameters, in order.
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    /// Body schemas by content type.
    #[serde(default)]
    pub schemas: BTreeMap<String, Value>,
}

impl ContractDef {
    /// Reads one contract from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] with the decoder diagnostic.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::InvalidConfig(err.to_string()))
    }
}

/// Declarative form of a [`ParameterSpec`] with [`StandardConstraints`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name.
    pub name: String,
    /// Source location.
    #[serde(rename = "in", default)]
    pub location: ParamLocation,
    /// Declared type.
    #[serde(rename = "type")]
    pub kind: ParamType,
    /// Whether the parameter must be present.
    #[serde(default)]
    pub required: bool,
    /// Inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Minimum length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regex the value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl ParameterDef {
    /// Compiles the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] if the pattern is not a valid regex.
    pub fn to_spec(&self) -> Result<ParameterSpec, ConfigError> {
        let mut rules = StandardConstraints::new(self.kind);
        if self.required {
            rules = rules.required();
        }
        if let Some(minimum) = self.minimum {
            rules = rules.minimum(minimum);
        }
        if let Some(maximum) = self.maximum {
            rules = rules.maximum(maximum);
        }
        if let Some(min_length) = self.min_length {
            rules = rules.min_length(min_length);
        }
        if let Some(max_length) = self.max_length {
            rules = rules.max_length(max_length);
        }
        if let Some(pattern) = &self.pattern {
            rules = rules.pattern(pattern).map_err(|err| {
                ConfigError::InvalidConfig(format!("parameter '{}': {err}", self.name))
            })?;
        }
        if !self.allowed.is_empty() {
            rules = rules.one_of(self.allowed.iter().cloned());
        }
        Ok(ParameterSpec::new(self.name.clone(), self.location, self.kind).constraint(rules))
    }
}

impl RouteContract {
    /// Compiles a declarative contract.
    ///
    /// # Errors
    ///
    /// Everything [`RouteContractBuilder::build`](crate::RouteContractBuilder::build)
    /// rejects, plus invalid patterns and schema text that does not parse.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_core::{ContractDef, RouteContract};
    ///
    /// let def = ContractDef::from_toml_str(r#"
    ///     path = "/items"
    ///     method = "POST"
    ///     request_content_types = ["application/json"]
    ///     response_content_types = ["application/json"]
    ///     status_codes = [201, 400]
    ///
    ///     [schemas."application/json"]
    ///     type = "object"
    ///     required = ["name"]
    /// "#).unwrap();
    ///
    /// let contract = RouteContract::from_def(def).unwrap();
    /// assert_eq!(contract.success_status(), 201);
    /// assert!(contract.schema_for("application/json").is_some());
    /// ```
    pub fn from_def(def: ContractDef) -> Result<Self, ConfigError> {
        let mut builder = RouteContract::builder(def.path, def.method)
            .protocols(def.protocols)
            .request_content_types(def.request_content_types)
            .response_content_types(def.response_content_types)
            .status_codes(def.status_codes);
        if let Some(resource) = def.resource {
            builder = builder.resource(resource);
        }
        for parameter in &def.parameters {
            builder = builder.parameter(parameter.to_spec()?);
        }
        for (content_type, schema) in def.schemas {
            let is_xml = content_type.to_ascii_lowercase().contains("xml");
            builder = match (schema, is_xml) {
                (Value::String(xsd), true) => builder.xml_schema(content_type, xsd),
                (_, true) => {
                    return Err(ConfigError::InvalidXmlSchema {
                        content_type,
                        reason: "expected XSD text".to_string(),
                    })
                }
                (Value::String(text), false) => {
                    let schema = serde_json::from_str(&text).map_err(|err| {
                        ConfigError::InvalidJsonSchema {
                            content_type: content_type.clone(),
                            reason: err.to_string(),
                        }
                    })?;
                    builder.json_schema(content_type, schema)
                }
                (schema, false) => builder.json_schema(content_type, schema),
            };
        }
        builder.build()
    }
}

impl TryFrom<ContractDef> for RouteContract {
    type Error = ConfigError;

    fn try_from(def: ContractDef) -> Result<Self, Self::Error> {
        RouteContract::from_def(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::Format;

    const ROUTES: &str = r#"
        controller_namespace = "Shop"

        [[routes]]
        path = "/items/{id}"
        method = "GET"
        protocols = ["HTTPS"]
        response_content_types = ["application/json", "application/xml"]
        status_codes = [200, 404]

        [[routes.parameters]]
        name = "id"
        in = "path"
        type = "int"
        required = true
        minimum = 1

        [[routes.parameters]]
        name = "sort"
        type = "string"
        enum = ["asc", "desc"]

        [[routes]]
        path = "/items"
        method = "POST"
        request_content_types = ["application/xml"]
        response_content_types = ["application/xml"]
        status_codes = [201]

        [routes.schemas]
        "application/xml" = """
        <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:element name="item" type="xs:string"/>
        </xs:schema>
        """
    "#;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.controller_namespace, "Controllers");
    }

    #[test]
    fn custom_format_table_replaces_default() {
        let config = EngineConfig::from_toml_str(
            r#"
            [[formats]]
            format = "xml"
            mime_types = ["application/vnd.shop+xml"]
            "#,
        )
        .unwrap();
        assert_eq!(config.formats.families().len(), 1);
        assert_eq!(config.formats.resolve("application/vnd.shop+xml").0, Format::Xml);
    }

    #[test]
    fn routes_compile_from_toml() {
        let config = EngineConfig::from_toml_str(ROUTES).unwrap();
        assert_eq!(config.routes.len(), 2);

        let get = RouteContract::from_def(config.routes[0].clone()).unwrap();
        assert_eq!(get.protocols(), ["HTTPS".to_string()]);
        assert_eq!(get.parameters().len(), 2);
        assert_eq!(get.parameters()[0].kind(), ParamType::Integer);
        assert_eq!(get.parameters()[0].location(), ParamLocation::Path);
        assert_eq!(get.parameters()[1].location(), ParamLocation::Query);

        let post = RouteContract::try_from(config.routes[1].clone()).unwrap();
        assert_eq!(post.success_status(), 201);
        assert_eq!(post.protocols().len(), 2);
        assert!(post.schema_for("application/xml").is_some());
    }

    #[test]
    fn json_schema_may_be_given_as_text() {
        let def = ContractDef::from_toml_str(
            r#"
            path = "/x"
            method = "put"
            response_content_types = ["application/json"]
            status_codes = [204]
            [schemas]
            "application/json" = '{"type": "array"}'
            "#,
        );
        // Methods are upper-case on the wire.
        assert!(def.is_err());

        let def = ContractDef::from_toml_str(
            r#"
            path = "/x"
            method = "PUT"
            response_content_types = ["application/json"]
            status_codes = [204]
            [schemas]
            "application/json" = '{"type": "array"}'
            "#,
        )
        .unwrap();
        assert!(RouteContract::from_def(def).unwrap().schema_for("application/json").is_some());
    }

    #[test]
    fn bad_definitions_are_configuration_errors() {
        let mut def = ContractDef::from_toml_str(
            r#"
            path = "/x"
            method = "GET"
            response_content_types = ["application/json"]
            status_codes = [200]
            [[parameters]]
            name = "q"
            type = "string"
            pattern = "("
            "#,
        )
        .unwrap();
        assert!(matches!(
            RouteContract::from_def(def.clone()),
            Err(ConfigError::InvalidConfig(_))
        ));

        def.parameters.clear();
        def.schemas
            .insert("application/xml".to_string(), serde_json::json!({"type": "object"}));
        assert!(matches!(
            RouteContract::from_def(def),
            Err(ConfigError::InvalidXmlSchema { .. })
        ));

        assert!(matches!(
            EngineConfig::from_toml_str("controller_namespace = 3"),
            Err(ConfigError::InvalidConfig(_))
        ));
    }
}
