//! Contract enforcement for HTTP routes.
//!
//! A route declares its contract once, at startup: allowed protocols,
//! request and response content types, parameters with their types and
//! constraints, body schemas and status codes. Every request is then
//! checked against it before the handler runs:
//! - **Ordered gate**: protocol, `Accept`, `Content-Type`, parameters, body
//! - **Staged commit**: checked values reach the handler only if every check passed
//! - **Shaped responses**: negotiated format, declared success status, JSON or XML body
//!
//! # Core Types
//!
//! - [`RouteContract`]: the immutable per-route contract
//! - [`ContractGate`]: runs the checks for one request and commits the result
//! - [`Tainted<T>`]: raw request data, unreadable outside the crate's checks
//! - [`Verified<T>`]: checked data, the only thing the commit step accepts
//! - [`Response`]: the response model a handler fills in
//! - [`ContractEngine`]: binds contracts to handlers from a [`HandlerRegistry`]
//! - [`web::Transport`]: what a hosting framework implements
//!
//! # Examples
//!
//! ```
//! use contract_core::web::{MemoryTransport, RouteTable, Transport};
//! use contract_core::{
//!     ContractEngine, EngineConfig, HandlerRegistry, HttpMethod, ParamLocation, ParamType,
//!     ParameterSpec, RouteContract, StandardConstraints,
//! };
//! use serde_json::json;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register("/items/{id}", HttpMethod::Get, |transport, response| {
//!     let id = transport.parameter("id").and_then(|id| id.as_i64());
//!     response.set_content(json!({ "id": id }));
//!     Ok(())
//! });
//! let engine = ContractEngine::new(EngineConfig::default(), registry);
//!
//! let contract = RouteContract::builder("/items/{id}", HttpMethod::Get)
//!     .protocols(["HTTPS"])
//!     .response_content_types(["application/json"])
//!     .status_codes([200, 404])
//!     .parameter(
//!         ParameterSpec::new("id", ParamLocation::Path, ParamType::Integer)
//!             .constraint(StandardConstraints::new(ParamType::Integer).required().minimum(1.0)),
//!     )
//!     .build()
//!     .expect("valid contract");
//!
//! let mut host = RouteTable::new();
//! let route = engine.add_route(contract, &mut host).expect("handler registered");
//!
//! let mut transport = MemoryTransport::builder()
//!     .protocol("HTTPS")
//!     .accept("application/json")
//!     .parameter("id", "5")
//!     .build();
//! let response = route.dispatch(&mut transport);
//!
//! assert_eq!(response.status, 200);
//! assert_eq!(response.header("Content-Type"), Some("application/json"));
//! assert_eq!(response.text(), r#"{"id":5}"#);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cast;
mod config;
mod constraint;
mod contract;
mod engine;
mod error;
mod gate;
mod logging;
pub mod negotiation;
mod params;
pub mod payload;
mod registry;
mod response;
mod tainted;
mod verified;
pub mod web;

pub use cast::{cast, parse_date, CastValue, ParamType, RawValue};
pub use config::{ContractDef, EngineConfig, ParameterDef};
pub use constraint::{ParamConstraint, StandardConstraints, Unconstrained};
pub use contract::{
    HttpMethod, ParamLocation, ParameterSpec, PayloadSchema, RouteContract, RouteContractBuilder,
};
pub use engine::{ContractEngine, Route};
pub use error::{
    AggregatedFailure, ConfigError, ContractError, ErrorCode, HandlerError, ValidationError,
};
pub use gate::{ContractGate, Negotiated};
pub use logging::RouteLog;
pub use negotiation::{Format, FormatFamily, FormatTable};
pub use params::{check_parameters, StagedParameters};
pub use registry::{action_identifier, controller_identifier, Handler, HandlerRegistry};
pub use response::{resolve_success_status, Response, ResponseError};
pub use tainted::Tainted;
pub use verified::Verified;
