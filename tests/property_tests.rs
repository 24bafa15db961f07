//! Property tests for the gate and the caster.
//!
//! These check the cross-module invariants: the commit step is all or
//! nothing, and casting never panics and agrees with the declared type.

use contract_core::web::{MemoryTransport, Transport};
use contract_core::{
    cast, CastValue, ContractGate, ErrorCode, HttpMethod, ParamLocation, ParamType, ParameterSpec,
    RawValue, RouteContract, StandardConstraints, Tainted,
};
use proptest::prelude::*;

fn bounded_contract(names: &[String]) -> RouteContract {
    names
        .iter()
        .fold(
            RouteContract::builder("/bounded", HttpMethod::Get)
                .response_content_types(["application/json"])
                .status_codes([200]),
            |builder, name| {
                builder.parameter(
                    ParameterSpec::new(name.clone(), ParamLocation::Query, ParamType::Integer).constraint(
                        StandardConstraints::new(ParamType::Integer)
                            .required()
                            .minimum(0.0)
                            .maximum(100.0),
                    ),
                )
            },
        )
        .build()
        .unwrap()
}

fn arb_param_type() -> impl Strategy<Value = ParamType> {
    prop_oneof![
        Just(ParamType::String),
        Just(ParamType::Integer),
        Just(ParamType::Number),
        Just(ParamType::Boolean),
        Just(ParamType::Date),
        Just(ParamType::Array),
    ]
}

proptest! {
    /// Property: parameters are committed exactly once each, or not at all.
    ///
    /// Every parameter is an integer bounded to 0..=100. The request passes
    /// if and only if every value is in range; on success each value is
    /// written once with its casted value, on failure nothing is written and
    /// one violation is reported per out-of-range value.
    #[test]
    fn proptest_commit_is_all_or_nothing(
        values in prop::collection::vec(-50i64..150, 1..6)
    ) {
        let names: Vec<String> = (0..values.len()).map(|i| format!("p{i}")).collect();
        let contract = bounded_contract(&names);

        let mut builder = MemoryTransport::builder().accept("application/json");
        for (name, value) in names.iter().zip(&values) {
            builder = builder.parameter(name.clone(), value.to_string());
        }
        let mut transport = builder.build();

        let out_of_range = values.iter().filter(|v| !(0..=100).contains(*v)).count();
        let result = ContractGate::new(&contract).enforce(&mut transport);

        if out_of_range == 0 {
            prop_assert!(result.is_ok());
            let expected: Vec<(String, CastValue)> = names
                .iter()
                .cloned()
                .zip(values.iter().map(|v| CastValue::Integer(*v)))
                .collect();
            prop_assert_eq!(transport.parameter_writes(), expected.as_slice());
        } else {
            let err = result.unwrap_err();
            prop_assert_eq!(err.errors().len(), out_of_range);
            prop_assert!(err.errors().iter().all(|e| e.code() == ErrorCode::OutOfRange));
            prop_assert!(transport.parameter_writes().is_empty());
        }
    }

    /// Property: casting never panics, and a successful cast of a present
    /// value either has the declared type or is the raw text unchanged.
    #[test]
    fn proptest_cast_agrees_with_declared_type(
        text in "\\PC{0,24}",
        kind in arb_param_type()
    ) {
        let result = cast("p", Some(Tainted::new(RawValue::from(text.clone()))), kind);
        match result {
            Ok(value) if text.is_empty() => {
                prop_assert!(value == CastValue::String(String::new()) || kind == ParamType::Array);
            }
            Ok(value) => {
                prop_assert!(value.matches(kind) || value == CastValue::String(text.clone()));
            }
            Err(err) => {
                prop_assert_eq!(kind, ParamType::Date);
                prop_assert_eq!(err.code(), ErrorCode::InvalidCast);
            }
        }
    }

    /// Property: integers survive a cast exactly.
    #[test]
    fn proptest_integer_cast_roundtrips(n in any::<i64>()) {
        let value = cast("n", Some(Tainted::new(RawValue::from(n.to_string()))), ParamType::Integer).unwrap();
        prop_assert_eq!(value, CastValue::Integer(n));
    }

    /// Property: the last value of a repeated scalar parameter wins.
    #[test]
    fn proptest_repeated_scalar_takes_last(values in prop::collection::vec(0u32..1000, 1..5)) {
        let raw = RawValue::List(values.iter().map(u32::to_string).collect());
        let value = cast("n", Some(Tainted::new(raw)), ParamType::Integer).unwrap();
        let last = values.last().copied().map(i64::from);
        prop_assert_eq!(value.as_i64(), last);
    }
}

#[test]
fn committed_values_are_visible_through_the_transport() {
    let names = vec!["a".to_string(), "b".to_string()];
    let contract = bounded_contract(&names);
    let mut transport = MemoryTransport::builder()
        .accept("application/json")
        .parameter("a", "1")
        .parameter("b", "2")
        .build();
    ContractGate::new(&contract).enforce(&mut transport).unwrap();
    assert_eq!(transport.parameter("a"), Some(&CastValue::Integer(1)));
    assert_eq!(transport.parameter("b"), Some(&CastValue::Integer(2)));
}
