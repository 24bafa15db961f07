//! Transport boundary.
//!
//! The core never talks to an HTTP framework directly. A hosting framework
//! implements three small traits:
//!
//! - [`Transport`]: reads the facts of one request and receives the checked
//!   values the gate commits
//! - [`BuildResponse`]: turns serialized content, status and headers into
//!   the framework's response type
//! - [`RouteHost`]: accepts a registered [`Route`] for a path and method
//!
//! # Design Principles
//!
//! 1. **No Framework Dependencies**: the traits only use std, `serde_json`
//!    and crate types. [`HttpTransport`] is one adapter, over the `http` crate.
//!
//! 2. **Taint at Boundary**: the gate wraps every value read through
//!    [`Transport`] in [`Tainted`](crate::Tainted). Handlers only see what
//!    was committed.
//!
//! 3. **Explicit Context**: no global state. One transport value is one request.
//!
//! # Integration Model
//!
//! ```ignore
//! // At startup:
//! let mut host = RouteTable::new();
//! engine.add_route(contract, &mut host)?;
//!
//! // Per request:
//! let (route, path_params) = host.find(method, path)?;
//! let mut transport = HttpTransport::new(request).with_path_params(path_params);
//! let response = route.dispatch(&mut transport);
//! ```

mod adapter;
mod host;
mod http;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cast::{CastValue, ParamType, RawValue};
use crate::contract::HttpMethod;
use crate::engine::Route;

pub use adapter::{MemoryResponse, MemoryTransport, MemoryTransportBuilder};
pub use host::{match_path, RouteTable};
pub use self::http::HttpTransport;

/// Request facts read by the gate, and the sink for committed values.
///
/// Reads return raw client data; the gate never trusts them. Writes only
/// happen in the commit step, after every check passed.
pub trait Transport {
    /// Protocol the request arrived over, e.g. `HTTPS`.
    fn protocol(&self) -> &str;

    /// Request `Content-Type`, empty if absent.
    fn content_type(&self) -> &str;

    /// Request `Accept`, empty if absent.
    fn accept(&self) -> &str;

    /// Raw value of parameter `name`, if sent.
    fn parameter_value(&self, name: &str, kind: ParamType) -> Option<RawValue>;

    /// Replaces the value the handler sees for `name`.
    fn set_parameter_value(&mut self, name: &str, value: CastValue);

    /// Committed value of parameter `name`.
    fn parameter(&self, name: &str) -> Option<&CastValue>;

    /// Raw request body.
    fn payload_body_value(&self) -> &[u8];

    /// Replaces the body the handler sees.
    fn set_payload_body_value(&mut self, value: Value);

    /// Committed body.
    fn payload_body(&self) -> Option<&Value>;
}

/// Builds the framework-native response.
pub trait BuildResponse {
    /// Framework response type.
    type Response;

    /// Wraps serialized `content` with `status` and `headers`.
    fn build_response(
        &self,
        content: Vec<u8>,
        status: u16,
        headers: &BTreeMap<String, String>,
    ) -> Self::Response;
}

/// Accepts routes at registration time.
pub trait RouteHost {
    /// Registers `route` for `path` and `method`.
    fn register_route(&mut self, path: &str, method: HttpMethod, route: Arc<Route>);
}
