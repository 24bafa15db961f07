use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::contract::RouteContract;
use crate::error::{ConfigError, ErrorCode, ValidationError};
use crate::gate::ContractGate;
use crate::logging::RouteLog;
use crate::negotiation::FormatTable;
use crate::registry::{Handler, HandlerRegistry};
use crate::response::Response;
use crate::web::{BuildResponse, RouteHost, Transport};

/// Registers route contracts and binds them to handlers.
///
/// Registration is where every configuration fault surfaces: a contract
/// that does not build, or a route with no registered handler, is rejected
/// here so startup can abort before serving traffic.
///
/// # Examples
///
/// ```
/// use contract_core::web::{MemoryTransport, RouteTable};
/// use contract_core::{ContractEngine, EngineConfig, HandlerRegistry, HttpMethod, RouteContract};
///
/// let mut registry = HandlerRegistry::new();
/// registry.register("/ping", HttpMethod::Get, |_transport, response| {
///     response.set_content(serde_json::json!("pong"));
///     Ok(())
/// });
///
/// let engine = ContractEngine::new(EngineConfig::default(), registry);
/// let mut host = RouteTable::new();
/// let contract = RouteContract::builder("/ping", HttpMethod::Get)
///     .response_content_types(["application/json"])
///     .status_codes([200])
///     .build()
///     .unwrap();
/// let route = engine.add_route(contract, &mut host).unwrap();
///
/// let mut transport = MemoryTransport::builder().accept("application/json").build();
/// let response = route.dispatch(&mut transport);
/// assert_eq!(response.status, 200);
/// assert_eq!(response.text(), r#""pong""#);
/// ```
#[derive(Debug)]
pub struct ContractEngine {
    config: EngineConfig,
    formats: Arc<FormatTable>,
    registry: HandlerRegistry,
}

impl ContractEngine {
    /// Creates an engine from its configuration and handlers.
    pub fn new(config: EngineConfig, registry: HandlerRegistry) -> Self {
        let formats = Arc::new(config.formats.clone());
        Self {
            config,
            formats,
            registry,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Binds `contract` to its handler and registers it with `host`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::HandlerNotFound`] or [`ConfigError::ActionNotFound`]
    /// if no handler is registered for the contract's resource and method.
    pub fn add_route<H>(&self, contract: RouteContract, host: &mut H) -> Result<Arc<Route>, ConfigError>
    where
        H: RouteHost + ?Sized,
    {
        let log = RouteLog::new(contract.path(), contract.method());
        let handler = self
            .registry
            .resolve(&self.config.controller_namespace, contract.resource(), contract.method())
            .inspect_err(|err| log.error(format_args!("registration failed: {err}")))?;

        log.info(format_args!(
            "registered with {} parameters, success status {}",
            contract.parameters().len(),
            contract.success_status()
        ));

        let path = contract.path().to_string();
        let method = contract.method();
        let route = Arc::new(Route {
            contract,
            handler,
            formats: Arc::clone(&self.formats),
        });
        host.register_route(&path, method, Arc::clone(&route));
        Ok(route)
    }

    /// Builds and registers every route declared in the configuration.
    ///
    /// # Errors
    ///
    /// Stops at the first route that fails to build or bind.
    pub fn add_configured_routes<H>(&self, host: &mut H) -> Result<Vec<Arc<Route>>, ConfigError>
    where
        H: RouteHost + ?Sized,
    {
        self.config
            .routes
            .iter()
            .cloned()
            .map(|def| {
                let contract = RouteContract::from_def(def)?;
                self.add_route(contract, host)
            })
            .collect()
    }
}

/// A registered route: its contract, handler and format table.
pub struct Route {
    contract: RouteContract,
    handler: Handler,
    formats: Arc<FormatTable>,
}

impl Route {
    /// The route contract.
    pub fn contract(&self) -> &RouteContract {
        &self.contract
    }

    /// Serves one request.
    ///
    /// Runs the gate; on success calls the handler with a response in the
    /// negotiated format and the route's success status. Every failure
    /// becomes an error payload, a list of `{message, code}` entries, with
    /// the mapped status. The handler never runs if a check failed.
    pub fn dispatch<T>(&self, transport: &mut T) -> T::Response
    where
        T: Transport + BuildResponse,
    {
        let log = RouteLog::new(self.contract.path(), self.contract.method());

        let negotiated = match ContractGate::new(&self.contract).enforce(transport) {
            Ok(negotiated) => negotiated,
            Err(err) => {
                // Nothing was negotiated yet, so the raw Accept picks the error format.
                let response = Response::new(&self.formats, transport.accept(), err.status_code());
                return error_response(&*transport, response, err.errors(), log);
            }
        };

        let mut response = Response::negotiated(
            &self.formats,
            &negotiated.media_type,
            self.contract.success_status(),
        );
        if let Err(err) = (self.handler)(&*transport, &mut response) {
            log.warn(format_args!("handler failed with status {}", err.status));
            let errors = vec![ValidationError::new(err.message, ErrorCode::Handler)];
            let response = Response::negotiated(&self.formats, &negotiated.media_type, err.status);
            return error_response(&*transport, response, errors, log);
        }

        match response.into_transport(&*transport) {
            Ok(built) => built,
            Err(err) => {
                log.error(format_args!("response serialization failed: {err}"));
                internal_error(&*transport)
            }
        }
    }
}

fn error_response<T>(
    transport: &T,
    mut response: Response,
    errors: Vec<ValidationError>,
    log: RouteLog<'_>,
) -> T::Response
where
    T: BuildResponse + ?Sized,
{
    let built = response
        .set_serialized(&errors)
        .and_then(|()| response.into_transport(transport));
    match built {
        Ok(built) => built,
        Err(err) => {
            log.error(format_args!("error response serialization failed: {err}"));
            internal_error(transport)
        }
    }
}

fn internal_error<T>(transport: &T) -> T::Response
where
    T: BuildResponse + ?Sized,
{
    let errors = [ValidationError::new("Internal server error", ErrorCode::Internal)];
    let body = serde_json::to_vec(&errors).unwrap_or_default();
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    transport.build_response(body, 500, &headers)
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}
