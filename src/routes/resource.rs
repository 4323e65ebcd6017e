//! Mount every registered resource scope as its own router.

use crate::config::{Operation, ResourceOptions};
use crate::error::{ApiError, ConfigError};
use crate::handlers::resource::{create, delete, list, read, update};
use crate::service::Resources;
use crate::state::ResourceState;
use crate::store::Storage;
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Route prefix for a scope: `/<namespace>/<scope>` or `/<scope>`.
pub fn resource_path(options: &ResourceOptions) -> String {
    match options.namespace.as_deref().map(|n| n.trim_matches('/')) {
        Some(ns) if !ns.is_empty() => format!("/{}/{}", ns, options.scope),
        _ => format!("/{}", options.scope),
    }
}

/// One router for all registered resources. Fails at boot when any scope is misconfigured.
pub fn resource_routes<S: Storage>(resources: Arc<Resources<S>>) -> Result<Router, ConfigError> {
    let mut app = Router::new();
    for options in resources.check()? {
        let path = resource_path(&options);
        tracing::info!(scope = %options.scope, path = %path, operations = ?options.operations, "mounting resource");
        app = app.nest(&path, scope_router(resources.clone(), &options));
    }
    Ok(app
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(resources.body_limit()))
        .layer(map_response(envelope_body_limit)))
}

/// The body limit layer answers oversized requests with plain text; rewrite it as an error envelope.
async fn envelope_body_limit(res: Response) -> Response {
    let is_json = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if res.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return ApiError::PayloadTooLarge.into_response();
    }
    res
}

fn scope_router<S: Storage>(resources: Arc<Resources<S>>, options: &ResourceOptions) -> Router {
    let state = ResourceState::new(resources, &options.scope);

    let mut index: MethodRouter<ResourceState<S>> = MethodRouter::new();
    let mut member: MethodRouter<ResourceState<S>> = MethodRouter::new();
    if options.allows(Operation::List) {
        index = index.get(list::<S>);
    }
    if options.allows(Operation::Create) {
        index = index.post(create::<S>);
    }
    if options.allows(Operation::Read) {
        member = member.get(read::<S>);
    }
    if options.allows(Operation::Update) {
        member = member.patch(update::<S>);
    }
    if options.allows(Operation::Delete) {
        member = member.delete(delete::<S>);
    }

    let mut router = Router::new();
    if options.allows(Operation::List) || options.allows(Operation::Create) {
        router = router.route("/", index);
    }
    if options.allows(Operation::Read) || options.allows(Operation::Update) || options.allows(Operation::Delete) {
        router = router.route("/:id", member);
    }
    router.with_state(state)
}
