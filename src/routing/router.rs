//! Route registration and lookup.
//!
//! # Responsibilities
//! - Register method+pattern pairs against handler names at setup time
//! - Resolve an incoming method+path to a handler name and captured params
//!
//! # Design Decisions
//! - Exact patterns live in a HashMap keyed `METHOD:path` (O(1) lookup)
//! - Parametric patterns (`:name` segments) are compiled once at
//!   registration into segment lists and scanned in registration order
//! - Exact match always wins over any parametric match
//! - Registration takes `&mut self`, matching takes `&self`; the router is
//!   immutable once shared

use std::collections::HashMap;

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Must equal this path component exactly.
    Literal(String),
    /// Matches any single path component, captured under this name.
    Param(String),
}

/// A registered parametric route.
#[derive(Debug, Clone)]
struct Route {
    method: String,
    handler: String,
    segments: Vec<Segment>,
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    /// Handler name the route was registered with.
    pub handler: String,
    /// Captured `:name` parameters, empty for exact routes.
    pub params: HashMap<String, String>,
}

/// Method+path router.
#[derive(Debug, Default)]
pub struct Router {
    /// Exact routes keyed `METHOD:path`.
    exact: HashMap<String, String>,
    /// Parametric routes in registration order.
    parametric: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern. Patterns containing `:name` segments match one
    /// path component per segment; all others are exact.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        pattern: impl Into<String>,
        handler: impl Into<String>,
    ) {
        let method = method.into().to_ascii_uppercase();
        let pattern = pattern.into();
        let handler = handler.into();

        if pattern.split('/').any(|s| s.starts_with(':')) {
            let segments = pattern
                .split('/')
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Param(name.to_string()),
                    None => Segment::Literal(s.to_string()),
                })
                .collect();
            tracing::debug!(method = %method, pattern = %pattern, handler = %handler, "Registered parametric route");
            self.parametric.push(Route { method, handler, segments });
        } else {
            tracing::debug!(method = %method, pattern = %pattern, handler = %handler, "Registered exact route");
            self.exact.insert(format!("{}:{}", method, pattern), handler);
        }
    }

    /// Resolve a method+path. Returns None when nothing matches (the caller
    /// answers 404).
    pub fn match_route(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let method = method.to_ascii_uppercase();

        if let Some(handler) = self.exact.get(&format!("{}:{}", method, path)) {
            return Some(RouteMatch {
                handler: handler.clone(),
                params: HashMap::new(),
            });
        }

        let components: Vec<&str> = path.split('/').collect();
        for route in &self.parametric {
            if route.method != method || route.segments.len() != components.len() {
                continue;
            }
            let mut params = HashMap::new();
            let matched = route.segments.iter().zip(&components).all(|(seg, comp)| match seg {
                Segment::Literal(lit) => lit == comp,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*comp).to_string());
                    true
                }
            });
            if matched {
                return Some(RouteMatch {
                    handler: route.handler.clone(),
                    params,
                });
            }
        }

        None
    }

    /// Number of registered routes (exact + parametric).
    pub fn len(&self) -> usize {
        self.exact.len() + self.parametric.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
