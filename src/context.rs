//! Per-request context handed explicitly to the controller and hooks.

use crate::policy::Principal;

/// Built once per request from the matched route; never shared between requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    /// Registered resource scope the route was mounted for.
    pub scope: String,
    pub principal: Option<Principal>,
}

impl RequestContext {
    pub fn new(scope: impl Into<String>) -> Self {
        RequestContext {
            scope: scope.into(),
            principal: None,
        }
    }

    pub fn with_principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }
}
