//! Raw config types matching the JSON resource/model declarations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allow-list as written in config: `true` (anything), `false` (nothing) or a list of names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowListConfig {
    Flag(bool),
    Names(Vec<String>),
}

impl AllowListConfig {
    /// `false` and `[]` count as unset when overlaying onto defaults.
    pub fn is_empty(&self) -> bool {
        match self {
            AllowListConfig::Flag(flag) => !flag,
            AllowListConfig::Names(names) => names.is_empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ];
}

/// Options for one resource scope. Every field is optional; unset fields fall back to
/// the config-wide `defaults` block, then to the controller defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Scope name; also the route prefix.
    pub name: String,
    pub model: Option<String>,
    /// Fallback for `model` when it is not given.
    pub basename: Option<String>,
    pub serializer: Option<String>,
    pub policy: Option<bool>,
    pub auth: Option<bool>,
    pub default_relations: Option<Vec<String>>,
    /// Same syntax as the `scope` query directive.
    pub default_scopes: Option<String>,
    /// Same syntax as the `sort` query directive.
    pub default_sorting: Option<String>,
    pub default_limit: Option<u32>,
    pub max_limit: Option<u32>,
    pub relations: Option<AllowListConfig>,
    pub scopes: Option<AllowListConfig>,
    pub filters: Option<AllowListConfig>,
    /// Restrict the routes mounted for this resource.
    pub only: Option<Vec<Operation>>,
    /// Hooks binding; defaults to the scope name.
    pub controller: Option<String>,
    /// Route group prefix.
    pub namespace: Option<String>,
}

impl ResourceConfig {
    /// Fill unset fields from `base`; values set here win.
    pub fn merged_over(self, base: &ResourceConfig) -> ResourceConfig {
        ResourceConfig {
            name: self.name,
            model: self.model.or_else(|| base.model.clone()),
            basename: self.basename.or_else(|| base.basename.clone()),
            serializer: self.serializer.or_else(|| base.serializer.clone()),
            policy: self.policy.or(base.policy),
            auth: self.auth.or(base.auth),
            default_relations: self.default_relations.or_else(|| base.default_relations.clone()),
            default_scopes: self.default_scopes.or_else(|| base.default_scopes.clone()),
            default_sorting: self.default_sorting.or_else(|| base.default_sorting.clone()),
            default_limit: self.default_limit.or(base.default_limit),
            max_limit: self.max_limit.or(base.max_limit),
            relations: self.relations.or_else(|| base.relations.clone()),
            scopes: self.scopes.or_else(|| base.scopes.clone()),
            filters: self.filters.or_else(|| base.filters.clone()),
            only: self.only.or_else(|| base.only.clone()),
            controller: self.controller.or_else(|| base.controller.clone()),
            namespace: self.namespace.or_else(|| base.namespace.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    /// PostgreSQL type as used in casts, e.g. `varchar(255)`.
    pub fn pg_type(&self) -> String {
        match self {
            ColumnTypeConfig::Simple(s) => s.clone(),
            ColumnTypeConfig::Parameterized { name, params: Some(p) } if !p.is_empty() => {
                let params: Vec<String> = p.iter().map(u32::to_string).collect();
                format!("{}({})", name, params.join(","))
            }
            ColumnTypeConfig::Parameterized { name, .. } => name.clone(),
        }
    }

    pub fn base_name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s.as_str(),
            ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Column has a DB default (e.g. serial, NOW()); omitted from inserts when not provided.
    #[serde(default)]
    pub has_default: bool,
}

fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    "id".into()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// We hold the foreign key.
    ToOne,
    /// They hold the foreign key.
    ToMany,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    pub model: String,
    pub kind: RelationKind,
    /// Our column used in the join.
    pub local_key: String,
    /// Their column used in the join.
    pub foreign_key: String,
}

/// Named scope: a SQL condition with `?` placeholders bound to the scope's arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub condition: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory used for fields not listed in `fields`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub columns: Vec<ColumnConfig>,
    /// Columns never exposed by the default serializer.
    #[serde(default)]
    pub hidden: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeConfig>,
    #[serde(default)]
    pub validation: BTreeMap<String, ValidationRule>,
    /// Present when the model accepts file fields.
    #[serde(default)]
    pub uploads: Option<UploadConfig>,
}

/// Everything declared in one config document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FullConfig {
    /// Merged under every resource.
    pub defaults: ResourceConfig,
    pub models: Vec<ModelConfig>,
    pub resources: Vec<ResourceConfig>,
}
