//! Payload body validation.
//!
//! The body is validated against the schema the contract declares for the
//! request content type. The content-type family is picked by substring:
//! anything mentioning `json` goes through [`json`], anything mentioning
//! `xml` goes through [`xml`]. Both paths hand back the same generic
//! [`serde_json::Value`] tree, so handlers see one shape whatever the wire
//! format was.

mod json;
mod xml;
mod xsd;

use serde_json::Value;

use crate::contract::PayloadSchema;
use crate::error::ContractError;
use crate::tainted::Tainted;
use crate::verified::Verified;

pub use xml::{xml_to_value, MAX_ELEMENT_DEPTH};
pub use xsd::{XmlIssue, XmlSchemaValidator, XsdSchema};

/// Validates a raw body against `schema`.
///
/// # Errors
///
/// - [`ContractError::UnsupportedMediaType`] if `content_type` is neither a
///   JSON nor an XML type, or names the other family than `schema`
/// - [`ContractError::InvalidBody`] with the parse error, or with every
///   schema violation found
///
/// # Examples
///
/// ```
/// use contract_core::{payload::check_body, HttpMethod, RouteContract, Tainted};
/// use serde_json::json;
///
/// let contract = RouteContract::builder("/items", HttpMethod::Post)
///     .response_content_types(["application/json"])
///     .status_codes([201])
///     .json_schema("application/json", json!({"type": "object", "required": ["id"]}))
///     .build()
///     .unwrap();
/// let schema = contract.schema_for("application/json").unwrap();
///
/// let body = check_body(schema, "application/json", Tainted::new(br#"{"id": 1}"#.to_vec())).unwrap();
/// assert_eq!(body.into_inner(), json!({"id": 1}));
///
/// let err = check_body(schema, "application/json", Tainted::new(b"{}".to_vec())).unwrap_err();
/// assert_eq!(err.status_code(), 400);
/// ```
pub fn check_body(
    schema: &PayloadSchema,
    content_type: &str,
    body: Tainted<Vec<u8>>,
) -> Result<Verified<Value>, ContractError> {
    let family = content_type.to_ascii_lowercase();
    let unsupported = || ContractError::UnsupportedMediaType {
        content_type: content_type.to_string(),
    };

    let value = if family.contains("json") {
        let PayloadSchema::Json { validator, .. } = schema else {
            return Err(unsupported());
        };
        json::validate(validator, body.peek()).map_err(ContractError::InvalidBody)?
    } else if family.contains("xml") {
        let PayloadSchema::Xml(validator) = schema else {
            return Err(unsupported());
        };
        xml::validate(validator.as_ref(), body.peek()).map_err(ContractError::InvalidBody)?
    } else {
        return Err(unsupported());
    };

    Ok(Verified::new_unchecked(value))
}
