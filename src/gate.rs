use serde_json::Value;

use crate::contract::RouteContract;
use crate::error::{ConfigError, ContractError};
use crate::logging::RouteLog;
use crate::negotiation::{matches_any, negotiate_accept};
use crate::params::{check_parameters, StagedParameters};
use crate::payload::check_body;
use crate::tainted::Tainted;
use crate::verified::Verified;
use crate::web::Transport;

/// Outcome of a successful [`ContractGate::enforce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// The offered response content type that satisfied `Accept`.
    pub media_type: String,
}

/// The contract enforcement gate.
///
/// `ContractGate` runs the checks of one route contract against one request,
/// in a fixed order:
///
/// 1. protocol (fail fast)
/// 2. `Accept` against the offered response content types (fail fast)
/// 3. `Content-Type` against the accepted request content types (fail fast)
/// 4. parameters (violations aggregated)
/// 5. payload body, when a schema is declared for the content type
/// 6. commit
///
/// Checked values are staged inside the gate and written to the transport
/// only once every check passed, so either all of them are applied or none.
/// A gate is consumed by [`enforce`](Self::enforce); create one per request.
///
/// # Examples
///
/// ```
/// use contract_core::web::{MemoryTransport, Transport};
/// use contract_core::{CastValue, ContractGate, HttpMethod, ParamLocation, ParamType, ParameterSpec, RouteContract};
///
/// let contract = RouteContract::builder("/items/{id}", HttpMethod::Get)
///     .protocols(["HTTPS"])
///     .response_content_types(["application/json"])
///     .status_codes([200])
///     .parameter(ParameterSpec::new("id", ParamLocation::Path, ParamType::Integer))
///     .build()
///     .unwrap();
///
/// let mut transport = MemoryTransport::builder()
///     .protocol("https")
///     .accept("application/json")
///     .parameter("id", "5")
///     .build();
///
/// let negotiated = ContractGate::new(&contract).enforce(&mut transport).unwrap();
/// assert_eq!(negotiated.media_type, "application/json");
/// assert_eq!(transport.parameter("id"), Some(&CastValue::Integer(5)));
/// ```
pub struct ContractGate<'c> {
    contract: &'c RouteContract,
    log: RouteLog<'c>,
    staged_parameters: StagedParameters,
    staged_body: Option<Verified<Value>>,
}

impl<'c> ContractGate<'c> {
    /// Creates a gate for one request against `contract`.
    pub fn new(contract: &'c RouteContract) -> Self {
        Self {
            contract,
            log: RouteLog::new(contract.path(), contract.method()),
            staged_parameters: Vec::new(),
            staged_body: None,
        }
    }

    /// Runs every check and, if all pass, commits the checked values.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error. Nothing is written to
    /// `transport` in that case.
    pub fn enforce<T>(mut self, transport: &mut T) -> Result<Negotiated, ContractError>
    where
        T: Transport + ?Sized,
    {
        let result = self.check(transport);
        match result {
            Ok(negotiated) => {
                self.commit(transport);
                Ok(negotiated)
            }
            Err(err) => {
                let codes: Vec<u16> = err.errors().iter().map(|e| e.code().as_u16()).collect();
                match &err {
                    ContractError::Configuration(_) => {
                        self.log.error(format_args!("contract fault: {err}"))
                    }
                    _ => self.log.warn(format_args!(
                        "request rejected with status {} codes {:?}",
                        err.status_code(),
                        codes
                    )),
                }
                Err(err)
            }
        }
    }

    fn check<T>(&mut self, transport: &T) -> Result<Negotiated, ContractError>
    where
        T: Transport + ?Sized,
    {
        self.check_protocol(transport)?;
        let negotiated = self.check_accept(transport)?;
        self.check_content_type(transport)?;
        self.staged_parameters = check_parameters(self.contract.parameters(), transport)?;
        self.staged_body = self.check_body(transport)?;
        Ok(negotiated)
    }

    fn check_protocol<T>(&self, transport: &T) -> Result<(), ContractError>
    where
        T: Transport + ?Sized,
    {
        let protocol = transport.protocol();
        if self
            .contract
            .protocols()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(protocol))
        {
            Ok(())
        } else {
            Err(ContractError::AccessDenied {
                protocol: protocol.to_string(),
            })
        }
    }

    fn check_accept<T>(&self, transport: &T) -> Result<Negotiated, ContractError>
    where
        T: Transport + ?Sized,
    {
        let offered = self.contract.response_content_types();
        if offered.is_empty() {
            return Err(ConfigError::NoContentTypeDefined {
                route: self.contract.path().to_string(),
            }
            .into());
        }
        let accept = transport.accept();
        negotiate_accept(accept, offered)
            .map(|media_type| Negotiated {
                media_type: media_type.to_string(),
            })
            .ok_or_else(|| ContractError::NotAcceptable {
                accept: accept.to_string(),
            })
    }

    fn check_content_type<T>(&self, transport: &T) -> Result<(), ContractError>
    where
        T: Transport + ?Sized,
    {
        let accepted = self.contract.request_content_types();
        let content_type = transport.content_type();
        if accepted.is_empty() || matches_any(content_type, accepted) {
            Ok(())
        } else {
            Err(ContractError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            })
        }
    }

    fn check_body<T>(&self, transport: &T) -> Result<Option<Verified<Value>>, ContractError>
    where
        T: Transport + ?Sized,
    {
        let content_type = transport.content_type();
        let Some(schema) = self.contract.schema_for(content_type) else {
            return Ok(None);
        };
        let body = Tainted::new(transport.payload_body_value().to_vec());
        check_body(schema, content_type, body).map(Some)
    }

    fn commit<T>(self, transport: &mut T)
    where
        T: Transport + ?Sized,
    {
        let mut written = 0;
        for (name, value) in self.staged_parameters {
            let value = value.into_inner();
            // Absent optional parameters stay absent.
            if value.is_null() {
                continue;
            }
            transport.set_parameter_value(&name, value);
            written += 1;
        }
        let has_body = self.staged_body.is_some();
        if let Some(body) = self.staged_body {
            transport.set_payload_body_value(body.into_inner());
        }
        self.log.debug(format_args!(
            "committed {written} parameters, body: {has_body}"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::{CastValue, ParamType};
    use crate::constraint::StandardConstraints;
    use crate::contract::{HttpMethod, ParamLocation, ParameterSpec};
    use crate::error::ErrorCode;
    use crate::web::MemoryTransport;
    use serde_json::json;

    fn contract() -> RouteContract {
        RouteContract::builder("/items", HttpMethod::Post)
            .protocols(["HTTPS"])
            .request_content_types(["application/json"])
            .response_content_types(["application/json"])
            .status_codes([201, 400])
            .parameter(
                ParameterSpec::new("page", ParamLocation::Query, ParamType::Integer)
                    .constraint(StandardConstraints::new(ParamType::Integer).minimum(1.0)),
            )
            .json_schema(
                "application/json",
                json!({"type": "object", "required": ["id"]}),
            )
            .build()
            .unwrap()
    }

    fn request() -> crate::web::MemoryTransportBuilder {
        MemoryTransport::builder()
            .protocol("HTTPS")
            .accept("application/json")
            .content_type("application/json")
            .body(r#"{"id": 1}"#)
    }

    fn assert_untouched(transport: &MemoryTransport) {
        assert!(transport.parameter_writes().is_empty());
        assert_eq!(transport.body_writes(), 0);
    }

    #[test]
    fn protocol_is_checked_first() {
        let contract = contract();
        let mut transport = request()
            .protocol("HTTP")
            .accept("text/csv")
            .parameter("page", "0")
            .build();
        let err = ContractGate::new(&contract).enforce(&mut transport).unwrap_err();
        assert!(matches!(err, ContractError::AccessDenied { .. }));
        assert_untouched(&transport);
    }

    #[test]
    fn accept_mismatch_stops_before_parameters() {
        let contract = contract();
        let mut transport = request()
            .accept("application/xml")
            .parameter("page", "0")
            .build();
        let err = ContractGate::new(&contract).enforce(&mut transport).unwrap_err();
        assert_eq!(err.status_code(), 406);
        assert_untouched(&transport);
    }

    #[test]
    fn missing_accept_is_not_acceptable() {
        let contract = contract();
        let mut transport = request().accept("").parameter("page", "2").build();
        let err = ContractGate::new(&contract).enforce(&mut transport).unwrap_err();
        assert!(matches!(err, ContractError::NotAcceptable { .. }));
        assert_untouched(&transport);
    }

    #[test]
    fn content_type_mismatch_is_unsupported() {
        let contract = contract();
        let mut transport = request().content_type("text/plain").build();
        let err = ContractGate::new(&contract).enforce(&mut transport).unwrap_err();
        assert_eq!(err.status_code(), 415);
    }

    #[test]
    fn parameter_failure_prevents_body_commit() {
        let contract = contract();
        let mut transport = request().parameter("page", "0").build();
        let err = ContractGate::new(&contract).enforce(&mut transport).unwrap_err();
        assert_eq!(err.errors()[0].code(), ErrorCode::OutOfRange);
        assert_untouched(&transport);
    }

    #[test]
    fn body_failure_prevents_parameter_commit() {
        let contract = contract();
        let mut transport = request().parameter("page", "2").body("{}").build();
        let err = ContractGate::new(&contract).enforce(&mut transport).unwrap_err();
        assert!(matches!(err, ContractError::InvalidBody(_)));
        assert_untouched(&transport);
    }

    #[test]
    fn success_commits_everything_once() {
        let contract = contract();
        let mut transport = request().parameter("page", "2").build();
        let negotiated = ContractGate::new(&contract).enforce(&mut transport).unwrap();
        assert_eq!(negotiated.media_type, "application/json");
        assert_eq!(
            transport.parameter_writes(),
            [("page".to_string(), CastValue::Integer(2))]
        );
        assert_eq!(transport.body_writes(), 1);
        assert_eq!(transport.payload_body(), Some(&json!({"id": 1})));
    }

    #[test]
    fn absent_optional_parameter_is_not_committed() {
        let contract = contract();
        let mut transport = request().build();
        ContractGate::new(&contract).enforce(&mut transport).unwrap();
        assert!(transport.parameter_writes().is_empty());
        assert_eq!(transport.parameter("page"), None);
    }

    #[test]
    fn body_is_skipped_without_schema() {
        let contract = RouteContract::builder("/ping", HttpMethod::Post)
            .response_content_types(["application/json"])
            .status_codes([204])
            .build()
            .unwrap();
        let mut transport = MemoryTransport::builder()
            .accept("application/json")
            .content_type("text/plain")
            .body("not json")
            .build();
        ContractGate::new(&contract).enforce(&mut transport).unwrap();
        assert_eq!(transport.body_writes(), 0);
    }
}
