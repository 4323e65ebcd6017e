//! Resolved runtime options: config validated and flattened, read-only after boot.

use crate::config::{Operation, RelationKind, ValidationRule};
use crate::directive::{AllowLists, DirectiveDefaults};
use crate::error::{ApiError, ConfigError};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Primary key type for parsing path ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type used for parameter casts.
    pub pg_type: String,
    pub nullable: bool,
    pub has_default: bool,
}

/// Relation loadable through `include=`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeSpec {
    pub name: String,
    pub kind: RelationKind,
    pub related_schema: Option<String>,
    pub related_table: String,
    pub related_columns: Vec<ColumnInfo>,
    /// Our column used in the join (our FK for to_one; usually our PK for to_many).
    pub our_key_column: String,
    /// Their column used in the join.
    pub their_key_column: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeSpec {
    pub condition: String,
    /// Number of `?` placeholders in `condition`.
    pub params: usize,
}

/// Validation rule with its `pattern` compiled once at boot.
#[derive(Clone, Debug)]
pub struct FieldRule {
    pub rule: ValidationRule,
    pub pattern: Option<Regex>,
}

impl FieldRule {
    pub fn compile(field: &str, rule: &ValidationRule) -> Result<Self, ConfigError> {
        let pattern = rule
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::Validation(format!("invalid pattern for '{}': {}", field, e)))?;
        Ok(FieldRule {
            rule: rule.clone(),
            pattern,
        })
    }
}

pub fn compile_rules(
    rules: &BTreeMap<String, ValidationRule>,
) -> Result<BTreeMap<String, FieldRule>, ConfigError> {
    rules
        .iter()
        .map(|(field, rule)| Ok((field.clone(), FieldRule::compile(field, rule)?)))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSpec {
    pub path: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl UploadSpec {
    /// Directory for a file field, or `None` when the model does not store that field.
    pub fn path_for(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str).or(self.path.as_deref())
    }
}

#[derive(Clone, Debug)]
pub struct ModelBinding {
    pub name: String,
    pub schema_name: Option<String>,
    pub table_name: String,
    pub primary_key: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub hidden: HashSet<String>,
    pub includes: Vec<IncludeSpec>,
    pub scopes: BTreeMap<String, ScopeSpec>,
    pub validation: BTreeMap<String, FieldRule>,
    /// `None`: the model has no upload capability.
    pub uploads: Option<UploadSpec>,
}

impl ModelBinding {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn include(&self, name: &str) -> Option<&IncludeSpec> {
        self.includes.iter().find(|i| i.name == name)
    }

    /// Path id -> key value typed per the primary key.
    pub fn parse_id(&self, id: &str) -> Result<Value, ApiError> {
        Ok(match self.pk_type {
            PkType::Uuid => {
                let u = uuid::Uuid::parse_str(id)
                    .map_err(|_| ApiError::BadRequest("invalid uuid".into()))?;
                Value::String(u.to_string())
            }
            PkType::BigInt | PkType::Int => {
                let n: i64 = id
                    .parse()
                    .map_err(|_| ApiError::BadRequest("invalid id".into()))?;
                Value::Number(n.into())
            }
            PkType::Text => Value::String(id.to_string()),
        })
    }
}

/// Options for one resource scope after overlaying registered config onto controller defaults.
#[derive(Clone, Debug)]
pub struct ResourceOptions {
    pub scope: String,
    pub model: Arc<ModelBinding>,
    pub serializer: String,
    pub policy: bool,
    pub auth: bool,
    pub defaults: DirectiveDefaults,
    pub allowed: AllowLists,
    pub operations: Vec<Operation>,
    pub controller: Option<String>,
    pub namespace: Option<String>,
}

impl ResourceOptions {
    pub fn allows(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Key used to look up the hooks bound to this resource.
    pub fn controller_key(&self) -> &str {
        self.controller.as_deref().unwrap_or(&self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_path_prefers_field_mapping() {
        let spec = UploadSpec {
            path: Some("files".into()),
            fields: BTreeMap::from([("avatar".to_string(), "avatars".to_string())]),
        };
        assert_eq!(spec.path_for("avatar"), Some("avatars"));
        assert_eq!(spec.path_for("cv"), Some("files"));
        let strict = UploadSpec {
            path: None,
            fields: BTreeMap::new(),
        };
        assert_eq!(strict.path_for("cv"), None);
    }
}
