use std::fmt;

use regex::Regex;

use crate::cast::{CastValue, ParamType, RawValue};
use crate::error::{AggregatedFailure, ErrorCode, ValidationError};

/// Constraint assertion for one parameter.
///
/// Invoked with the casted value and the raw value it came from, after a
/// successful cast. Every violation found goes into the returned failure;
/// the gate merges it with the failures of the other parameters.
///
/// Closures with the same signature implement this trait.
///
/// # Examples
///
/// ```
/// use contract_core::{AggregatedFailure, CastValue, ErrorCode, ParamConstraint, ValidationError};
///
/// let positive = |name: &str, value: &CastValue, _raw: Option<&contract_core::RawValue>| {
///     match value.as_i64() {
///         Some(n) if n > 0 => Ok(()),
///         _ => Err(AggregatedFailure::single(ValidationError::new(
///             format!("Parameter {name} must be positive"),
///             ErrorCode::OutOfRange,
///         ))),
///     }
/// };
///
/// assert!(positive.assert_value("id", &CastValue::Integer(5), None).is_ok());
/// assert!(positive.assert_value("id", &CastValue::Integer(0), None).is_err());
/// ```
pub trait ParamConstraint: Send + Sync {
    /// Checks `value` (and, where useful, `raw`) against the constraint.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    fn assert_value(
        &self,
        name: &str,
        value: &CastValue,
        raw: Option<&RawValue>,
    ) -> Result<(), AggregatedFailure>;
}

impl<F> ParamConstraint for F
where
    F: Fn(&str, &CastValue, Option<&RawValue>) -> Result<(), AggregatedFailure> + Send + Sync,
{
    fn assert_value(
        &self,
        name: &str,
        value: &CastValue,
        raw: Option<&RawValue>,
    ) -> Result<(), AggregatedFailure> {
        self(name, value, raw)
    }
}

/// A constraint that accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

impl ParamConstraint for Unconstrained {
    fn assert_value(
        &self,
        _name: &str,
        _value: &CastValue,
        _raw: Option<&RawValue>,
    ) -> Result<(), AggregatedFailure> {
        Ok(())
    }
}

/// The usual declarative parameter rules.
///
/// Checks, in order: presence (when required), declared type, numeric bounds,
/// length, pattern and enumeration. A missing optional parameter passes.
/// A value of the wrong type stops further checks for that parameter.
///
/// # Examples
///
/// ```
/// use contract_core::{CastValue, ParamConstraint, ParamType, StandardConstraints};
///
/// let rule = StandardConstraints::new(ParamType::Integer).required().minimum(1.0);
/// assert!(rule.assert_value("id", &CastValue::Integer(5), None).is_ok());
///
/// let failure = rule.assert_value("id", &CastValue::Integer(0), None).unwrap_err();
/// assert_eq!(failure.len(), 1);
/// ```
#[derive(Clone)]
pub struct StandardConstraints {
    kind: ParamType,
    required: bool,
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    allowed: Vec<String>,
}

impl StandardConstraints {
    /// Creates rules for an optional parameter of `kind`.
    pub fn new(kind: ParamType) -> Self {
        Self {
            kind,
            required: false,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
            allowed: Vec::new(),
        }
    }

    /// Marks the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the inclusive lower bound for numbers.
    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Sets the inclusive upper bound for numbers.
    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    /// Sets the minimum length of strings (characters) or arrays (items).
    pub fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    /// Sets the maximum length of strings (characters) or arrays (items).
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets a pattern that strings must match.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Restricts the raw value to one of `values`.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    fn check_bounds(&self, name: &str, value: &CastValue, errors: &mut Vec<ValidationError>) {
        let Some(number) = value.as_f64() else {
            return;
        };
        if let Some(minimum) = self.minimum {
            if number < minimum {
                errors.push(ValidationError::new(
                    format!("Parameter {name} must be greater than or equal to {minimum}"),
                    ErrorCode::OutOfRange,
                ));
            }
        }
        if let Some(maximum) = self.maximum {
            if number > maximum {
                errors.push(ValidationError::new(
                    format!("Parameter {name} must be less than or equal to {maximum}"),
                    ErrorCode::OutOfRange,
                ));
            }
        }
    }

    fn check_length(&self, name: &str, value: &CastValue, errors: &mut Vec<ValidationError>) {
        let length = match value {
            CastValue::String(text) => text.chars().count(),
            CastValue::Array(items) => items.len(),
            _ => return,
        };
        if let Some(min_length) = self.min_length {
            if length < min_length {
                errors.push(ValidationError::new(
                    format!("Parameter {name} must have a length of at least {min_length}"),
                    ErrorCode::InvalidLength,
                ));
            }
        }
        if let Some(max_length) = self.max_length {
            if length > max_length {
                errors.push(ValidationError::new(
                    format!("Parameter {name} must have a length of at most {max_length}"),
                    ErrorCode::InvalidLength,
                ));
            }
        }
    }
}

impl ParamConstraint for StandardConstraints {
    fn assert_value(
        &self,
        name: &str,
        value: &CastValue,
        raw: Option<&RawValue>,
    ) -> Result<(), AggregatedFailure> {
        let missing = value.is_null() || raw.is_some_and(RawValue::is_empty);
        if missing {
            if self.required {
                return Err(AggregatedFailure::single(ValidationError::new(
                    format!("Parameter {name} is required"),
                    ErrorCode::Required,
                )));
            }
            return Ok(());
        }

        if !value.matches(self.kind) {
            return Err(AggregatedFailure::single(ValidationError::new(
                format!("Parameter {name} must be of type {}", self.kind),
                ErrorCode::InvalidType,
            )));
        }

        let mut errors = Vec::new();
        self.check_bounds(name, value, &mut errors);
        self.check_length(name, value, &mut errors);

        if let (Some(pattern), CastValue::String(text)) = (&self.pattern, value) {
            if !pattern.is_match(text) {
                errors.push(ValidationError::new(
                    format!("Parameter {name} must match the pattern {}", pattern.as_str()),
                    ErrorCode::PatternMismatch,
                ));
            }
        }

        if !self.allowed.is_empty() {
            let text = match raw.and_then(RawValue::scalar) {
                Some(text) => text.to_string(),
                None => value.to_string(),
            };
            if !self.allowed.iter().any(|allowed| *allowed == text) {
                errors.push(ValidationError::new(
                    format!("Parameter {name} must be one of: {}", self.allowed.join(", ")),
                    ErrorCode::NotInEnum,
                ));
            }
        }

        match AggregatedFailure::new(errors) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for StandardConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardConstraints")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("minimum", &self.minimum)
            .field("maximum", &self.maximum)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("allowed", &self.allowed)
            .finish()
    }
}
