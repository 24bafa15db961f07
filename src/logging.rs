use std::fmt;

use crate::contract::HttpMethod;

/// A route-scoped logging interface.
///
/// `RouteLog` is created by the gate and the engine for one route. Every
/// event it emits carries the route path and method as `tracing` fields.
///
/// Request values never reach the log directly: raw input is held in
/// [`Tainted`](crate::Tainted), whose `Debug` output is redacted.
#[derive(Debug, Clone, Copy)]
pub struct RouteLog<'a> {
    route: &'a str,
    method: HttpMethod,
}

impl<'a> RouteLog<'a> {
    /// Creates a logger for `route`.
    pub fn new(route: &'a str, method: HttpMethod) -> Self {
        Self { route, method }
    }

    /// Returns the route path associated with this logger.
    pub fn route(&self) -> &str {
        self.route
    }

    /// Logs an info-level message with route and method.
    ///
    /// Use with `format_args!`:
    /// ```
    /// # use contract_core::{HttpMethod, RouteLog};
    /// let log = RouteLog::new("/items", HttpMethod::Get);
    /// log.info(format_args!("registered with {} parameters", 2));
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(route = %self.route, method = %self.method, "{}", args);
    }

    /// Logs a warning-level message with route and method.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(route = %self.route, method = %self.method, "{}", args);
    }

    /// Logs an error-level message with route and method.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(route = %self.route, method = %self.method, "{}", args);
    }

    /// Logs a debug-level message with route and method.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(route = %self.route, method = %self.method, "{}", args);
    }
}
