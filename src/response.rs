//! Standard response envelope helpers and record serializers.

use crate::config::ModelBinding;
use crate::store::{Page, Record};
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessPage<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub last_page: u32,
}

impl From<&Page> for PageMeta {
    fn from(page: &Page) -> Self {
        PageMeta {
            total: page.total,
            page: page.page,
            limit: page.limit,
            last_page: page.last_page(),
        }
    }
}

#[derive(Serialize)]
pub struct SuccessFlag {
    pub success: bool,
    pub message: String,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { success: true, data }))
}

pub fn success_created<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { success: true, data }))
}

pub fn success_page<T: Serialize>(data: Vec<T>, meta: PageMeta) -> (StatusCode, Json<SuccessPage<T>>) {
    (
        StatusCode::OK,
        Json(SuccessPage {
            success: true,
            data,
            meta,
        }),
    )
}

pub fn success_flag(message: impl Into<String>) -> (StatusCode, Json<SuccessFlag>) {
    (
        StatusCode::OK,
        Json(SuccessFlag {
            success: true,
            message: message.into(),
        }),
    )
}

/// `{ success: false, code, message }` plus the keys of `extra` when it is an object.
pub fn error_body(code: Value, message: String, extra: Option<Value>) -> Value {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(false));
    body.insert("code".into(), code);
    body.insert("message".into(), Value::String(message));
    match extra {
        Some(Value::Object(fields)) => {
            for (k, v) in fields {
                body.entry(k).or_insert(v);
            }
        }
        Some(other) => {
            body.insert("detail".into(), other);
        }
        None => {}
    }
    Value::Object(body)
}

/// Turns a stored record into its wire shape. Selected per resource by name.
pub trait Serializer: Send + Sync {
    fn serialize(&self, record: &Record, model: &ModelBinding) -> Value;
}

/// Emits every attribute except the model's hidden columns.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSerializer;

impl Serializer for DefaultSerializer {
    fn serialize(&self, record: &Record, model: &ModelBinding) -> Value {
        let attributes = record
            .attributes()
            .iter()
            .filter(|(k, _)| !model.hidden.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PkType;
    use serde_json::json;

    #[test]
    fn error_body_merges_extra_keys() {
        let body = error_body(
            json!(5101),
            "validation failed".into(),
            Some(json!({ "validation": { "email": ["is required"] } })),
        );
        assert_eq!(
            body,
            json!({
                "success": false,
                "code": 5101,
                "message": "validation failed",
                "validation": { "email": ["is required"] }
            })
        );
    }

    #[test]
    fn extra_cannot_override_envelope_keys() {
        let body = error_body(json!(400), "bad".into(), Some(json!({ "success": true, "hint": 1 })));
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["hint"], json!(1));
    }

    #[test]
    fn default_serializer_strips_hidden() {
        let model = ModelBinding {
            name: "User".into(),
            schema_name: None,
            table_name: "users".into(),
            primary_key: "id".into(),
            pk_type: PkType::BigInt,
            columns: Vec::new(),
            hidden: ["password".to_string()].into_iter().collect(),
            includes: Vec::new(),
            scopes: Default::default(),
            validation: Default::default(),
            uploads: None,
        };
        let attrs = json!({ "id": 1, "email": "a@b.c", "password": "x" });
        let record = Record::stored(attrs.as_object().cloned().unwrap());
        assert_eq!(
            DefaultSerializer.serialize(&record, &model),
            json!({ "id": 1, "email": "a@b.c" })
        );
    }

    #[test]
    fn page_meta_counts_pages() {
        let page = Page {
            data: Vec::new(),
            total: 45,
            page: 2,
            limit: 20,
        };
        assert_eq!(
            PageMeta::from(&page),
            PageMeta {
                total: 45,
                page: 2,
                limit: 20,
                last_page: 3
            }
        );
    }
}
