use std::collections::HashMap;
use std::sync::Arc;

use crate::contract::HttpMethod;
use crate::engine::Route;

use super::RouteHost;

/// In-memory route host: a flat list of path templates.
///
/// Lookup is linear and templates are matched segment by segment. A host
/// with a real router registers into that router instead.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<(String, HttpMethod, Arc<Route>)>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the route for `method` and `path`, with the captured path parameters.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<(Arc<Route>, HashMap<String, String>)> {
        self.routes
            .iter()
            .filter(|(_, registered, _)| *registered == method)
            .find_map(|(template, _, route)| {
                match_path(template, path).map(|params| (Arc::clone(route), params))
            })
    }
}

impl RouteHost for RouteTable {
    fn register_route(&mut self, path: &str, method: HttpMethod, route: Arc<Route>) {
        self.routes.push((path.to_string(), method, route));
    }
}

/// Matches `path` against a template such as `/items/{id}`.
///
/// Returns the captured placeholders, or `None` if the path does not match.
///
/// ```
/// use contract_core::web::match_path;
///
/// let params = match_path("/items/{id}/comments", "/items/42/comments").unwrap();
/// assert_eq!(params["id"], "42");
/// assert!(match_path("/items/{id}", "/items").is_none());
/// ```
pub fn match_path(template: &str, path: &str) -> Option<HashMap<String, String>> {
    let path = path.split('?').next().unwrap_or_default();
    let mut template_segments = template.split('/').filter(|s| !s.is_empty());
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());
    let mut params = HashMap::new();

    loop {
        match (template_segments.next(), path_segments.next()) {
            (None, None) => return Some(params),
            (Some(expected), Some(actual)) => {
                if let Some(name) = expected
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                {
                    params.insert(name.to_string(), actual.to_string());
                } else if expected != actual {
                    return None;
                }
            }
            _ => return None,
        }
    }
}
