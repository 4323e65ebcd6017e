//! Authentication and authorization seams.

use crate::config::ResourceOptions;
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::store::Record;
use async_trait::async_trait;
use std::fmt;

/// Authenticated caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Principal {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Mutations subject to policy checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Update => "update",
            Action::Delete => "delete",
        })
    }
}

/// Consulted before update/delete on resources with the policy flag set.
/// Return `ApiError::Forbidden` to deny.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        ctx: &RequestContext,
        action: Action,
        options: &ResourceOptions,
        record: &Record,
    ) -> Result<(), ApiError>;
}

/// Maps a bearer token to a principal. `Ok(None)` means the token is not recognized.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Option<Principal>, ApiError>;
}

/// Allows a mutation only when the record's `owner_field` equals the principal id.
#[derive(Clone, Debug)]
pub struct OwnerAuthorizer {
    pub owner_field: String,
}

#[async_trait]
impl Authorizer for OwnerAuthorizer {
    async fn authorize(
        &self,
        ctx: &RequestContext,
        action: Action,
        options: &ResourceOptions,
        record: &Record,
    ) -> Result<(), ApiError> {
        let owner = record.key_string(&self.owner_field);
        match (&ctx.principal, owner) {
            (Some(p), Some(owner)) if p.id == owner => Ok(()),
            _ => Err(ApiError::Forbidden(format!("{} {}", action, options.scope))),
        }
    }
}
