//! Example consumer: serves the resources declared in `RESOURCE_CONFIG` over PostgreSQL.
//!
//! Run from repo root: `cargo run -p example-consumer`

use async_trait::async_trait;
use resource_sdk::{
    build_registry, common_routes, load_from_env, resource_routes, ApiError, Authenticator,
    LocalUploadStore, OwnerAuthorizer, PgStore, Principal, Resources,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Accepts a single static token from `API_TOKEN`; the principal id is the token's user.
struct EnvTokenAuthenticator {
    token: Option<String>,
    user: String,
}

#[async_trait]
impl Authenticator for EnvTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Option<Principal>, ApiError> {
        Ok(match &self.token {
            Some(expected) if expected == token => Some(Principal::new(self.user.clone())),
            _ => None,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/resources".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let config = load_from_env()?;
    let registry = build_registry(&config)?;
    let resources = Resources::new(registry, PgStore::new(pool))
        .with_uploads(LocalUploadStore::from_env())
        .with_authenticator(EnvTokenAuthenticator {
            token: std::env::var("API_TOKEN").ok(),
            user: std::env::var("API_USER").unwrap_or_else(|_| "1".into()),
        })
        .with_authorizer(OwnerAuthorizer {
            owner_field: std::env::var("OWNER_FIELD").unwrap_or_else(|_| "user_id".into()),
        });

    let app = resource_routes(Arc::new(resources))?.merge(common_routes());
    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
