//! Parameter casting and constraint checks.

use crate::cast::{cast, CastValue};
use crate::contract::ParameterSpec;
use crate::error::{AggregatedFailure, ContractError};
use crate::tainted::Tainted;
use crate::verified::Verified;
use crate::web::Transport;

/// Casted parameter values waiting for the commit step, in declaration order.
pub type StagedParameters = Vec<(String, Verified<CastValue>)>;

/// Casts and checks every declared parameter.
///
/// Parameters are visited in declaration order. A value that cannot be cast
/// at all stops the batch immediately and is reported alone. Constraint
/// violations do not stop the batch: every parameter is checked and all
/// violations are reported together.
///
/// Nothing is written to `transport`.
///
/// # Errors
///
/// Returns [`ContractError::InvalidParameter`] with either the single cast
/// failure or every constraint violation found.
pub fn check_parameters<T>(
    parameters: &[ParameterSpec],
    transport: &T,
) -> Result<StagedParameters, ContractError>
where
    T: Transport + ?Sized,
{
    let mut staged = Vec::with_capacity(parameters.len());
    let mut failure: Option<AggregatedFailure> = None;

    for parameter in parameters {
        let raw = transport
            .parameter_value(parameter.name(), parameter.kind())
            .map(Tainted::new);
        let raw_copy = raw.clone();

        let value = cast(parameter.name(), raw, parameter.kind())
            .map_err(|err| ContractError::InvalidParameter(AggregatedFailure::single(err)))?;

        let raw_ref = raw_copy.as_ref().map(Tainted::peek);
        match parameter
            .constraint_ref()
            .assert_value(parameter.name(), &value, raw_ref)
        {
            Ok(()) => staged.push((parameter.name().to_string(), Verified::new_unchecked(value))),
            Err(violations) => match failure.as_mut() {
                Some(existing) => existing.merge(violations),
                None => failure = Some(violations),
            },
        }
    }

    match failure {
        Some(failure) => Err(ContractError::InvalidParameter(failure)),
        None => Ok(staged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::ParamType;
    use crate::constraint::StandardConstraints;
    use crate::contract::ParamLocation;
    use crate::error::ErrorCode;
    use crate::web::MemoryTransport;

    fn integer(name: &str, minimum: f64) -> ParameterSpec {
        ParameterSpec::new(name, ParamLocation::Query, ParamType::Integer)
            .constraint(StandardConstraints::new(ParamType::Integer).required().minimum(minimum))
    }

    fn codes(err: ContractError) -> Vec<ErrorCode> {
        err.errors().iter().map(|e| e.code()).collect()
    }

    #[test]
    fn valid_parameters_are_staged_in_order() {
        let transport = MemoryTransport::builder()
            .parameter("page", "2")
            .parameter("size", "20")
            .build();
        let staged = check_parameters(&[integer("page", 1.0), integer("size", 1.0)], &transport).unwrap();

        let names: Vec<&str> = staged.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["page", "size"]);
        assert_eq!(staged[1].1.as_ref(), &CastValue::Integer(20));
    }

    #[test]
    fn constraint_violations_are_aggregated() {
        let transport = MemoryTransport::builder()
            .parameter("page", "0")
            .build();
        let err = check_parameters(&[integer("page", 1.0), integer("size", 1.0)], &transport).unwrap_err();
        assert_eq!(codes(err), vec![ErrorCode::OutOfRange, ErrorCode::Required]);
    }

    #[test]
    fn cast_failure_preempts_later_violations() {
        let since = ParameterSpec::new("since", ParamLocation::Query, ParamType::Date);
        let transport = MemoryTransport::builder()
            .parameter("since", "not a date")
            .build();
        let err = check_parameters(&[since, integer("page", 1.0)], &transport).unwrap_err();
        assert_eq!(codes(err), vec![ErrorCode::InvalidCast]);
    }

    #[test]
    fn nothing_is_written_back() {
        let transport = MemoryTransport::builder().parameter("page", "3").build();
        check_parameters(&[integer("page", 1.0)], &transport).unwrap();
        assert!(transport.parameter_writes().is_empty());
    }
}
