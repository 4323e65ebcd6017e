//! PostgreSQL storage: runs `SqlQuery` statements on a pool and maps rows to records.

use crate::config::ModelBinding;
use crate::error::ApiError;
use crate::sql::{self, PgBindValue, QueryBuf, SqlQuery};
use crate::store::{Page, Record, Storage};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<PgRow>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        Ok(bind_all(&q.sql, &q.params).fetch_optional(&self.pool).await?)
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<PgRow>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        Ok(bind_all(&q.sql, &q.params).fetch_all(&self.pool).await?)
    }
}

fn bind_all<'q>(sql: &'q str, params: &[PgBindValue]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, p| query.bind(p.clone()))
}

#[async_trait]
impl Storage for PgStore {
    type Query = SqlQuery;

    fn query(&self, model: Arc<ModelBinding>) -> SqlQuery {
        SqlQuery::new(model)
    }

    async fn paginate(&self, query: SqlQuery, page: u32, limit: u32) -> Result<Page, ApiError> {
        let count = query.count();
        tracing::debug!(sql = %count.sql, params = ?count.params, "query");
        let total: i64 = bind_all(&count.sql, &count.params)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let rows = self.fetch_all(&query.select_page(page, limit)).await?;
        Ok(Page {
            data: rows.iter().map(|r| Record::stored(row_to_map(r))).collect(),
            total: u64::try_from(total).unwrap_or(0),
            page,
            limit,
        })
    }

    async fn find(&self, query: SqlQuery, id: &Value) -> Result<Option<Record>, ApiError> {
        let q = query.select_by_id(id)?;
        Ok(self
            .fetch_optional(&q)
            .await?
            .map(|r| Record::stored(row_to_map(&r))))
    }

    async fn save(&self, model: &ModelBinding, record: &mut Record) -> Result<(), ApiError> {
        let q = if record.exists() {
            let id = record
                .get(&model.primary_key)
                .cloned()
                .ok_or_else(|| ApiError::Storage(format!("{}: record without key", model.name)))?;
            sql::update(model, &id, &record.changes())
        } else {
            sql::insert(model, record.attributes())
        };
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| ApiError::NotFound(model.name.clone()))?;
        record.mark_persisted(row_to_map(&row));
        Ok(())
    }

    async fn delete(&self, model: &ModelBinding, record: &Record) -> Result<bool, ApiError> {
        let Some(id) = record.get(&model.primary_key) else {
            return Ok(false);
        };
        let q = sql::delete(model, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(&q.sql, &q.params).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}

fn row_to_map(row: &PgRow) -> Map<String, Value> {
    use sqlx::Column;
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.name())))
        .collect()
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
