use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Classification code identifying the stage that produced a [`ValidationError`].
///
/// Codes serialize as their numeric wire value so clients can switch on them
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request protocol is not allowed by the route.
    AccessDenied,
    /// No offered response content type matches the Accept header.
    NotAcceptable,
    /// The request content type is not accepted, or has no validator family.
    UnsupportedMediaType,
    /// A parameter could not be coerced to its declared type.
    InvalidCast,
    /// A required parameter is missing.
    Required,
    /// A parameter value does not have its declared type.
    InvalidType,
    /// A numeric parameter is outside its bounds.
    OutOfRange,
    /// A parameter is shorter or longer than allowed.
    InvalidLength,
    /// A parameter does not match its pattern.
    PatternMismatch,
    /// A parameter is not one of the enumerated values.
    NotInEnum,
    /// The JSON payload body could not be parsed.
    JsonParse,
    /// A JSON payload property violates the schema.
    JsonSchemaProperty,
    /// The XML payload body could not be parsed.
    XmlParse,
    /// The XML payload body violates the schema.
    XmlSchema,
    /// The handler reported a failure.
    Handler,
    /// Response construction failed.
    Internal,
    /// Application-defined code raised by a custom constraint.
    Custom(u16),
}

impl ErrorCode {
    /// Returns the numeric wire value.
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::AccessDenied => 1,
            ErrorCode::NotAcceptable => 2,
            ErrorCode::UnsupportedMediaType => 3,
            ErrorCode::InvalidCast => 10,
            ErrorCode::Required => 11,
            ErrorCode::InvalidType => 12,
            ErrorCode::OutOfRange => 13,
            ErrorCode::InvalidLength => 14,
            ErrorCode::PatternMismatch => 15,
            ErrorCode::NotInEnum => 16,
            ErrorCode::JsonParse => 50,
            ErrorCode::JsonSchemaProperty => 52,
            ErrorCode::XmlParse => 60,
            ErrorCode::XmlSchema => 62,
            ErrorCode::Handler => 90,
            ErrorCode::Internal => 99,
            ErrorCode::Custom(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

/// A single violation found while checking a request.
///
/// Messages are human-readable sentences. Use [`ValidationError::normalized`]
/// for messages assembled from validator output and [`ValidationError::sentence`]
/// for parser diagnostics that should keep their casing.
///
/// # Examples
///
/// ```
/// use contract_core::{ErrorCode, ValidationError};
///
/// let error = ValidationError::normalized("  NAME property: String TOO long ", ErrorCode::JsonSchemaProperty);
/// assert_eq!(error.message(), "Name property: string too long");
/// assert_eq!(error.code().as_u16(), 52);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    message: String,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
}

impl ValidationError {
    /// Creates an error with the message used verbatim.
    pub fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            code,
            line: None,
        }
    }

    /// Creates an error whose message is lower-cased, trimmed and capitalised.
    pub fn normalized(message: impl AsRef<str>, code: ErrorCode) -> Self {
        Self::new(
            capitalize(message.as_ref().to_lowercase().trim()),
            code,
        )
    }

    /// Creates an error whose message only gets its first letter capitalised.
    pub fn sentence(message: impl AsRef<str>, code: ErrorCode) -> Self {
        Self::new(capitalize(message.as_ref().trim()), code)
    }

    /// Attaches the source line the error refers to.
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the classification code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the source line, for XML errors.
    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}] line {}: {}", self.code, line, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Every independent violation found while evaluating one stage.
///
/// Never empty: the only constructors take at least one error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregatedFailure {
    errors: Vec<ValidationError>,
}

impl AggregatedFailure {
    /// Wraps a list of errors, returning `None` when the list is empty.
    pub fn new(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Wraps a single error.
    pub fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Returns the errors in the order they were found.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Returns the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consumes the failure and returns the errors.
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Appends every error of `other`.
    pub fn merge(&mut self, other: AggregatedFailure) {
        self.errors.extend(other.errors);
    }
}

impl fmt::Display for AggregatedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl From<ValidationError> for AggregatedFailure {
    fn from(error: ValidationError) -> Self {
        Self::single(error)
    }
}

/// A per-request contract violation.
///
/// Raised by the gate before the handler runs. Each variant maps to an HTTP
/// status via [`ContractError::status_code`].
#[derive(Debug, Clone, Error)]
pub enum ContractError {
    /// The request protocol is not in the route's protocol list.
    #[error("protocol '{protocol}' is not allowed")]
    AccessDenied {
        /// Protocol the request arrived over.
        protocol: String,
    },
    /// The Accept header matches no offered response content type.
    #[error("accept '{accept}' matches no response content type")]
    NotAcceptable {
        /// Accept value sent by the client.
        accept: String,
    },
    /// The request content type is not accepted by the route.
    #[error("content type '{content_type}' is not supported")]
    UnsupportedMediaType {
        /// Content type sent by the client.
        content_type: String,
    },
    /// One or more parameters failed coercion or their constraints.
    #[error("invalid parameters: {0}")]
    InvalidParameter(AggregatedFailure),
    /// The payload body failed parsing or schema validation.
    #[error("invalid body: {0}")]
    InvalidBody(AggregatedFailure),
    /// A configuration fault that slipped past registration.
    #[error("configuration fault: {0}")]
    Configuration(#[from] ConfigError),
}

impl ContractError {
    /// Returns the HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ContractError::AccessDenied { .. } => 403,
            ContractError::NotAcceptable { .. } => 406,
            ContractError::UnsupportedMediaType { .. } => 415,
            ContractError::InvalidParameter(_) | ContractError::InvalidBody(_) => 400,
            ContractError::Configuration(_) => 500,
        }
    }

    /// Returns the `{message, code}` entries for the error payload.
    pub fn errors(&self) -> Vec<ValidationError> {
        match self {
            ContractError::InvalidParameter(failure) | ContractError::InvalidBody(failure) => {
                failure.errors().to_vec()
            }
            ContractError::AccessDenied { .. } => {
                vec![ValidationError::sentence(self.to_string(), ErrorCode::AccessDenied)]
            }
            ContractError::NotAcceptable { .. } => {
                vec![ValidationError::sentence(self.to_string(), ErrorCode::NotAcceptable)]
            }
            ContractError::UnsupportedMediaType { .. } => vec![ValidationError::sentence(
                self.to_string(),
                ErrorCode::UnsupportedMediaType,
            )],
            ContractError::Configuration(_) => {
                vec![ValidationError::sentence(self.to_string(), ErrorCode::Internal)]
            }
        }
    }

    /// Returns the aggregated failure for parameter and body errors.
    pub fn failure(&self) -> Option<&AggregatedFailure> {
        match self {
            ContractError::InvalidParameter(failure) | ContractError::InvalidBody(failure) => {
                Some(failure)
            }
            _ => None,
        }
    }
}

/// A fatal fault in a route contract or engine configuration.
///
/// Detected when a route is registered; startup should abort on any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No declared status code is in the 2xx range.
    #[error("route {route} declares no 2xx status code")]
    NoSuccessStatusCode {
        /// Route path.
        route: String,
    },
    /// More than one declared status code is in the 2xx range.
    #[error("route {route} declares several 2xx status codes: {codes:?}")]
    AmbiguousSuccessStatusCode {
        /// Route path.
        route: String,
        /// The competing 2xx codes.
        codes: Vec<u16>,
    },
    /// The route offers no response content type.
    #[error("route {route} declares no response content type")]
    NoContentTypeDefined {
        /// Route path.
        route: String,
    },
    /// Two parameters share a name.
    #[error("route {route} declares parameter '{name}' more than once")]
    DuplicateParameter {
        /// Route path.
        route: String,
        /// Duplicated parameter name.
        name: String,
    },
    /// A JSON payload schema failed to compile.
    #[error("invalid JSON schema for '{content_type}': {reason}")]
    InvalidJsonSchema {
        /// Content type the schema is declared for.
        content_type: String,
        /// Compiler diagnostic.
        reason: String,
    },
    /// An XML payload schema failed to compile.
    #[error("invalid XML schema for '{content_type}': {reason}")]
    InvalidXmlSchema {
        /// Content type the schema is declared for.
        content_type: String,
        /// Compiler diagnostic.
        reason: String,
    },
    /// No controller is registered for the resource.
    #[error("controller {controller} not found")]
    HandlerNotFound {
        /// Resolved controller identifier.
        controller: String,
    },
    /// The controller has no action for the method.
    #[error("{controller}::{action} action not found")]
    ActionNotFound {
        /// Resolved controller identifier.
        controller: String,
        /// Resolved action identifier.
        action: String,
    },
    /// A declarative definition could not be read.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by an application handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// HTTP status to respond with.
    pub status: u16,
    /// Human-readable message.
    pub message: String,
}

impl HandlerError {
    /// Creates a handler error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
