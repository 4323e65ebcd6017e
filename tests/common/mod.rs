#![allow(dead_code)]

use async_trait::async_trait;
use resource_sdk::directive::SortDirection;
use resource_sdk::{
    build_registry, load_from_str, ApiError, Authenticator, FilterOperator, FilterValue,
    ModelBinding, OwnerAuthorizer, Page, Principal, QueryBuilder, Record, Resources, Storage,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "secret-token";
pub const OWNER_ID: i64 = 7;

pub const CONFIG: &str = r#"{
    "defaults": { "auth": false },
    "models": [
        { "name": "Author", "table": "authors",
          "columns": [ { "name": "id", "type": "bigserial", "has_default": true },
                       { "name": "name", "type": "text" } ] },
        { "name": "Post", "table": "posts",
          "columns": [ { "name": "id", "type": "bigserial", "has_default": true },
                       { "name": "title", "type": "text" },
                       { "name": "status", "type": "text" },
                       { "name": "author_id", "type": "bigint" },
                       { "name": "cover", "type": "text" },
                       { "name": "secret", "type": "text" } ],
          "hidden": ["secret"],
          "relations": [ { "name": "author", "model": "Author", "kind": "to_one",
                           "local_key": "author_id", "foreign_key": "id" } ],
          "scopes": { "published": { "condition": "\"status\" = 'published'" },
                      "by_author": { "condition": "\"author_id\" = ?::bigint" } },
          "validation": { "title": { "required": true, "max_length": 50 } },
          "uploads": { "fields": { "cover": "covers" } } }
    ],
    "resources": [
        { "name": "posts", "model": "Post",
          "filters": ["title", "status", "author_id"], "relations": ["author"],
          "scopes": ["published", "by_author"], "max_limit": 50 },
        { "name": "authors", "model": "Author", "filters": true },
        { "name": "guarded", "model": "Post", "auth": true, "policy": true },
        { "name": "readonly", "basename": "Post", "only": ["list", "read"] }
    ]
}"#;

pub fn map(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {}", other),
    }
}

/// Query double: records every builder call and evaluates `eq` filters in memory.
#[derive(Clone, Debug)]
pub struct MemoryQuery {
    pub model: Arc<ModelBinding>,
    pub calls: Vec<String>,
    eq: Vec<(String, String)>,
}

impl QueryBuilder for MemoryQuery {
    fn with_relations(&mut self, relations: &[String]) -> Result<(), ApiError> {
        self.calls.push(format!("with:{}", relations.join(",")));
        Ok(())
    }

    fn scope(&mut self, name: &str, args: &[String]) -> Result<(), ApiError> {
        if !self.model.scopes.contains_key(name) {
            return Err(ApiError::invalid_directive(format!("unknown scope: {}", name)));
        }
        self.calls.push(format!("scope:{}({})", name, args.join(",")));
        Ok(())
    }

    fn order_by(&mut self, field: &str, direction: SortDirection) -> Result<(), ApiError> {
        self.calls.push(format!("order:{}:{}", field, direction.as_sql()));
        Ok(())
    }

    fn filter(
        &mut self,
        field: &str,
        operator: FilterOperator,
        value: &FilterValue,
    ) -> Result<(), ApiError> {
        self.calls.push(format!("filter:{}:{}", field, operator));
        if let (FilterOperator::Eq, FilterValue::Single(v)) = (operator, value) {
            self.eq.push((field.to_string(), v.clone()));
        }
        Ok(())
    }

    fn limit(&mut self, limit: u32) {
        self.calls.push(format!("limit:{}", limit));
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl MemoryQuery {
    fn matches(&self, row: &Map<String, Value>) -> bool {
        self.eq
            .iter()
            .all(|(field, v)| row.get(field).map(as_text).as_deref() == Some(v.as_str()))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Vec<Map<String, Value>>>>,
    next_id: AtomicI64,
    pub saves: AtomicUsize,
    pub storage_calls: AtomicUsize,
    pub refuse_delete: AtomicBool,
    pub last_query: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn seed(&self, table: &str, mut row: Map<String, Value>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        row.insert("id".into(), json!(id));
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
        id
    }

    pub fn row(&self, table: &str, id: i64) -> Option<Map<String, Value>> {
        self.tables
            .lock()
            .unwrap()
            .get(table)?
            .iter()
            .find(|r| r.get("id") == Some(&json!(id)))
            .cloned()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn storage_calls(&self) -> usize {
        self.storage_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MemoryStore {
    type Query = MemoryQuery;

    fn query(&self, model: Arc<ModelBinding>) -> MemoryQuery {
        MemoryQuery {
            model,
            calls: Vec::new(),
            eq: Vec::new(),
        }
    }

    async fn paginate(&self, query: MemoryQuery, page: u32, limit: u32) -> Result<Page, ApiError> {
        self.storage_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = query.calls.clone();
        let tables = self.tables.lock().unwrap();
        let rows: Vec<&Map<String, Value>> = tables
            .get(&query.model.table_name)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).collect())
            .unwrap_or_default();
        let start = ((page - 1) * limit) as usize;
        Ok(Page {
            total: rows.len() as u64,
            data: rows
                .into_iter()
                .skip(start)
                .take(limit as usize)
                .map(|r| Record::stored(r.clone()))
                .collect(),
            page,
            limit,
        })
    }

    async fn find(&self, query: MemoryQuery, id: &Value) -> Result<Option<Record>, ApiError> {
        self.storage_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = query.calls.clone();
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .get(&query.model.table_name)
            .and_then(|rows| rows.iter().find(|r| r.get("id") == Some(id)))
            .map(|r| Record::stored(r.clone())))
    }

    async fn save(&self, model: &ModelBinding, record: &mut Record) -> Result<(), ApiError> {
        self.storage_calls.fetch_add(1, Ordering::SeqCst);
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(model.table_name.clone()).or_default();
        let mut attributes = record.attributes().clone();
        if record.exists() {
            let id = record.get("id").cloned();
            let row = rows
                .iter_mut()
                .find(|r| r.get("id") == id.as_ref())
                .ok_or_else(|| ApiError::NotFound(model.name.clone()))?;
            *row = attributes.clone();
        } else {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            attributes.insert("id".into(), json!(id));
            rows.push(attributes.clone());
        }
        record.mark_persisted(attributes);
        Ok(())
    }

    async fn delete(&self, model: &ModelBinding, record: &Record) -> Result<bool, ApiError> {
        self.storage_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_delete.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(model.table_name.clone()).or_default();
        let before = rows.len();
        rows.retain(|r| r.get("id") != record.get("id"));
        Ok(rows.len() < before)
    }
}

pub struct StaticAuthenticator;

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Option<Principal>, ApiError> {
        Ok((token == TOKEN).then(|| Principal::new(OWNER_ID.to_string())))
    }
}

pub fn resources() -> Resources<MemoryStore> {
    let config = load_from_str(CONFIG).unwrap();
    let registry = build_registry(&config).unwrap();
    Resources::new(registry, MemoryStore::default())
        .with_authenticator(StaticAuthenticator)
        .with_authorizer(OwnerAuthorizer {
            owner_field: "author_id".into(),
        })
}

pub fn seed_posts(store: &MemoryStore) -> Vec<i64> {
    vec![
        store.seed(
            "posts",
            map(json!({ "title": "Hello", "status": "draft", "author_id": OWNER_ID, "secret": "s1" })),
        ),
        store.seed(
            "posts",
            map(json!({ "title": "World", "status": "published", "author_id": 8, "secret": "s2" })),
        ),
        store.seed(
            "posts",
            map(json!({ "title": "Again", "status": "draft", "author_id": 8, "secret": "s3" })),
        ),
    ]
}
