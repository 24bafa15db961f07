use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde_json::Value;

use crate::error::{AggregatedFailure, ErrorCode, ValidationError};

/// Parses `body` and validates it against `validator`.
///
/// A parse failure is reported alone. Schema violations are all reported,
/// each as `"<property> property: <detail>"`.
pub(crate) fn validate(validator: &Validator, body: &[u8]) -> Result<Value, AggregatedFailure> {
    let instance: Value = serde_json::from_slice(body).map_err(|err| {
        AggregatedFailure::single(ValidationError::sentence(err.to_string(), ErrorCode::JsonParse))
    })?;

    let errors: Vec<ValidationError> = validator
        .iter_errors(&instance)
        .map(|err| {
            let mut property = property_path(&err.instance_path.to_string());
            if let ValidationErrorKind::Required { property: missing } = &err.kind {
                let missing = missing.as_str().map(str::to_string).unwrap_or_else(|| missing.to_string());
                property = join_property(&property, &missing);
            }
            ValidationError::normalized(
                format!("{property} property: {err}"),
                ErrorCode::JsonSchemaProperty,
            )
        })
        .collect();

    match AggregatedFailure::new(errors) {
        Some(failure) => Err(failure),
        None => Ok(instance),
    }
}

/// Turns a JSON pointer into a dotted property path: `/items/0/name` becomes `items[0].name`.
fn property_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .fold(String::new(), |path, segment| join_property(&path, &segment))
}

fn join_property(path: &str, segment: &str) -> String {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        format!("{path}[{segment}]")
    } else if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}
