//! Per-resource route state: shared resources plus the scope the router was mounted for.

use crate::context::RequestContext;
use crate::directive::RawQuery;
use crate::error::ApiError;
use crate::extractors::BearerToken;
use crate::service::{ResourceController, Resources};
use crate::store::Storage;
use std::sync::Arc;

pub struct ResourceState<S: Storage> {
    pub resources: Arc<Resources<S>>,
    pub scope: Arc<str>,
}

impl<S: Storage> Clone for ResourceState<S> {
    fn clone(&self) -> Self {
        ResourceState {
            resources: self.resources.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<S: Storage> ResourceState<S> {
    pub fn new(resources: Arc<Resources<S>>, scope: &str) -> Self {
        ResourceState {
            resources,
            scope: Arc::from(scope),
        }
    }

    /// Authenticate, build the request context and hand out the scope's controller.
    pub async fn controller(
        &self,
        token: BearerToken,
        query: Vec<(String, String)>,
    ) -> Result<ResourceController<'_, S>, ApiError> {
        let principal = self.resources.authenticate(token.0.as_deref()).await?;
        let ctx = RequestContext::new(self.scope.as_ref()).with_principal(principal);
        let raw = RawQuery::from_pairs(query);
        self.resources.controller(ctx, &raw)
    }
}
