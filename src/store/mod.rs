//! Storage seam: the lifecycle controller drives any backend implementing `Storage`.

mod postgres;
mod record;

pub use postgres::PgStore;
pub use record::Record;

use crate::config::ModelBinding;
use crate::directive::QueryBuilder;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// One page of records plus pagination metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page {
    pub data: Vec<Record>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn last_page(&self) -> u32 {
        if self.total == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.limit.max(1)));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

#[async_trait]
pub trait Storage: Send + Sync + 'static {
    type Query: QueryBuilder + Send + 'static;

    /// Fresh base query over the model.
    fn query(&self, model: Arc<ModelBinding>) -> Self::Query;

    async fn paginate(&self, query: Self::Query, page: u32, limit: u32) -> Result<Page, ApiError>;

    async fn find(&self, query: Self::Query, id: &Value) -> Result<Option<Record>, ApiError>;

    /// Insert or update. On success the record holds the stored row and reports `exists()`.
    async fn save(&self, model: &ModelBinding, record: &mut Record) -> Result<(), ApiError>;

    /// `Ok(false)` when storage reported the delete as not performed.
    async fn delete(&self, model: &ModelBinding, record: &Record) -> Result<bool, ApiError>;
}
