//! Explicit handler registry.
//!
//! Handlers are registered under a controller identifier and an action
//! identifier derived from the route's resource and method. Registration of
//! a route fails if nothing is registered under the derived names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::contract::HttpMethod;
use crate::error::{ConfigError, HandlerError};
use crate::response::Response;
use crate::web::Transport;

/// A request handler.
///
/// Called only after the gate committed the checked values, so
/// [`Transport::parameter`] and [`Transport::payload_body`] return checked data.
pub type Handler =
    Arc<dyn Fn(&dyn Transport, &mut Response) -> Result<(), HandlerError> + Send + Sync>;

/// Maps a resource path to a controller identifier.
///
/// Placeholders are dropped, every remaining segment gets an upper-case
/// first letter, and the segments are joined with `::`.
///
/// ```
/// use contract_core::controller_identifier;
///
/// assert_eq!(controller_identifier("/item/{id}/comment"), "Item::Comment");
/// assert_eq!(controller_identifier("/"), "");
/// ```
pub fn controller_identifier(resource: &str) -> String {
    resource
        .split('/')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| !(segment.starts_with('{') && segment.ends_with('}')))
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

/// Maps an HTTP method to an action identifier: `GET` becomes `getAction`.
pub fn action_identifier(method: HttpMethod) -> String {
    format!("{}Action", method.as_str().to_ascii_lowercase())
}

/// Registry of handlers by controller and action.
///
/// # Examples
///
/// ```
/// use contract_core::{HandlerRegistry, HttpMethod};
///
/// let mut registry = HandlerRegistry::new();
/// registry.register("/items/{id}", HttpMethod::Get, |_transport, response| {
///     response.set_content(serde_json::json!({"ok": true}));
///     Ok(())
/// });
///
/// assert!(registry.resolve("Controllers", "/items/{id}", HttpMethod::Get).is_ok());
/// assert!(registry.resolve("Controllers", "/items/{id}", HttpMethod::Delete).is_err());
/// assert!(registry.resolve("Controllers", "/orders", HttpMethod::Get).is_err());
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    controllers: HashMap<String, HashMap<String, Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for the controller and action derived from `resource` and `method`.
    pub fn register<F>(&mut self, resource: &str, method: HttpMethod, handler: F) -> &mut Self
    where
        F: Fn(&dyn Transport, &mut Response) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register_action(
            controller_identifier(resource),
            action_identifier(method),
            Arc::new(handler),
        )
    }

    /// Registers `handler` under explicit identifiers.
    pub fn register_action(
        &mut self,
        controller: impl Into<String>,
        action: impl Into<String>,
        handler: Handler,
    ) -> &mut Self {
        self.controllers
            .entry(controller.into())
            .or_default()
            .insert(action.into(), handler);
        self
    }

    /// Looks up the handler for `resource` and `method`.
    ///
    /// `namespace` only qualifies the identifiers in error messages.
    ///
    /// # Errors
    ///
    /// [`ConfigError::HandlerNotFound`] if no controller is registered,
    /// [`ConfigError::ActionNotFound`] if the controller lacks the action.
    pub fn resolve(
        &self,
        namespace: &str,
        resource: &str,
        method: HttpMethod,
    ) -> Result<Handler, ConfigError> {
        let controller = controller_identifier(resource);
        let action = action_identifier(method);
        let qualified = if namespace.is_empty() {
            controller.clone()
        } else if controller.is_empty() {
            namespace.to_string()
        } else {
            format!("{namespace}::{controller}")
        };

        let actions = self
            .controllers
            .get(&controller)
            .ok_or_else(|| ConfigError::HandlerNotFound {
                controller: qualified.clone(),
            })?;
        actions
            .get(&action)
            .cloned()
            .ok_or(ConfigError::ActionNotFound {
                controller: qualified,
                action,
            })
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .controllers
            .iter()
            .flat_map(|(controller, actions)| {
                actions.keys().map(move |action| format!("{controller}::{action}"))
            })
            .collect();
        entries.sort();
        f.debug_struct("HandlerRegistry")
            .field("actions", &entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &dyn Transport, _: &mut Response) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn controller_identifier_follows_convention() {
        assert_eq!(controller_identifier("/item/{id}/comment"), "Item::Comment");
        assert_eq!(controller_identifier("users//{user}/profile-image"), "Users::Profile-image");
        assert_eq!(controller_identifier("/{id}"), "");
    }

    #[test]
    fn action_identifier_follows_convention() {
        assert_eq!(action_identifier(HttpMethod::Get), "getAction");
        assert_eq!(action_identifier(HttpMethod::Delete), "deleteAction");
    }

    #[test]
    fn missing_controller_and_action_are_distinguished() {
        let mut registry = HandlerRegistry::new();
        registry.register("/item/{id}", HttpMethod::Get, noop);

        let err = registry
            .resolve("App", "/order", HttpMethod::Get)
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigError::HandlerNotFound {
                controller: "App::Order".to_string()
            }
        );

        let err = registry
            .resolve("App", "/item/{id}", HttpMethod::Put)
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigError::ActionNotFound {
                controller: "App::Item".to_string(),
                action: "putAction".to_string()
            }
        );
    }

    #[test]
    fn routes_sharing_a_controller_share_actions() {
        let mut registry = HandlerRegistry::new();
        registry
            .register("/item", HttpMethod::Post, noop)
            .register("/item/{id}", HttpMethod::Get, noop);
        assert!(registry.resolve("", "/item/{id}", HttpMethod::Post).is_ok());
        assert_eq!(
            format!("{registry:?}"),
            r#"HandlerRegistry { actions: ["Item::getAction", "Item::postAction"] }"#
        );
    }
}
