//! Lifecycle hooks bound to a resource controller.
//!
//! Every hook defaults to identity. Hooks that return `Result` short-circuit the
//! operation on `Err`; the error reaches the caller unchanged.

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::store::Record;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait ResourceHooks<Q: Send + 'static>: Send + Sync {
    /// List query after all directives are applied, before pagination.
    async fn fetching(&self, _ctx: &RequestContext, query: Q) -> Result<Q, ApiError> {
        Ok(query)
    }

    /// Read query after relations are applied, before the lookup.
    async fn reading(&self, _ctx: &RequestContext, query: Q) -> Result<Q, ApiError> {
        Ok(query)
    }

    async fn readed(&self, _ctx: &RequestContext, record: Record) -> Result<Record, ApiError> {
        Ok(record)
    }

    /// Runs after validation, before the record is persisted.
    async fn creating(&self, _ctx: &RequestContext, record: Record) -> Result<Record, ApiError> {
        Ok(record)
    }

    async fn created(&self, _ctx: &RequestContext, record: Record) -> Result<Record, ApiError> {
        Ok(record)
    }

    /// `record` already carries the payload; `payload` is what the client sent.
    async fn updating(
        &self,
        _ctx: &RequestContext,
        record: Record,
        _payload: &Map<String, Value>,
    ) -> Result<Record, ApiError> {
        Ok(record)
    }

    async fn updated(&self, _ctx: &RequestContext, record: Record) -> Result<Record, ApiError> {
        Ok(record)
    }

    async fn deleting(&self, _ctx: &RequestContext, record: Record) -> Result<Record, ApiError> {
        Ok(record)
    }

    async fn deleted(&self, _ctx: &RequestContext, record: Record) -> Result<Record, ApiError> {
        Ok(record)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl<Q: Send + 'static> ResourceHooks<Q> for DefaultHooks {}
