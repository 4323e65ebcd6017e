//! Load config documents and resolve them into a `ResourceRegistry`.

use crate::config::registry::ResourceRegistry;
use crate::config::resolved::{
    compile_rules, ColumnInfo, IncludeSpec, ModelBinding, PkType, ScopeSpec, UploadSpec,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "RESOURCE_CONFIG";

pub fn load_from_str(json: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), "loading resource config");
    load_from_str(&text)
}

/// Load the file named by `RESOURCE_CONFIG`.
pub fn load_from_env() -> Result<FullConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .map_err(|_| ConfigError::Load(format!("{} not set", CONFIG_PATH_ENV)))?;
    load_from_path(path)
}

/// Validate, resolve every model and register every resource (merged over `defaults`).
pub fn build_registry(config: &FullConfig) -> Result<ResourceRegistry, ConfigError> {
    validate(config)?;
    let models_by_name: HashMap<&str, &ModelConfig> =
        config.models.iter().map(|m| (m.name.as_str(), m)).collect();

    let mut registry = ResourceRegistry::new();
    for m in &config.models {
        registry.add_model(resolve_model(m, &models_by_name)?);
    }
    for r in &config.resources {
        let merged = r.clone().merged_over(&config.defaults);
        registry.register(&r.name, merged)?;
    }
    Ok(registry)
}

fn resolve_model(
    m: &ModelConfig,
    models_by_name: &HashMap<&str, &ModelConfig>,
) -> Result<ModelBinding, ConfigError> {
    let pk_col = m
        .columns
        .iter()
        .find(|c| c.name == m.primary_key)
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "primary key column",
            id: format!("{}.{}", m.name, m.primary_key),
        })?;

    let mut includes = Vec::with_capacity(m.relations.len());
    for rel in &m.relations {
        let related = models_by_name
            .get(rel.model.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: rel.model.clone(),
            })?;
        includes.push(IncludeSpec {
            name: rel.name.clone(),
            kind: rel.kind,
            related_schema: related.schema.clone(),
            related_table: related.table.clone(),
            related_columns: column_infos(related)
                .into_iter()
                .filter(|c| !related.hidden.contains(&c.name))
                .collect(),
            our_key_column: rel.local_key.clone(),
            their_key_column: rel.foreign_key.clone(),
        });
    }

    let scopes = m
        .scopes
        .iter()
        .map(|(name, s)| {
            (
                name.clone(),
                ScopeSpec {
                    condition: s.condition.clone(),
                    params: s.condition.matches('?').count(),
                },
            )
        })
        .collect();

    Ok(ModelBinding {
        name: m.name.clone(),
        schema_name: m.schema.clone(),
        table_name: m.table.clone(),
        primary_key: m.primary_key.clone(),
        pk_type: infer_pk_type(&pk_col.type_),
        columns: column_infos(m),
        hidden: m.hidden.iter().cloned().collect::<HashSet<_>>(),
        includes,
        scopes,
        validation: compile_rules(&m.validation)?,
        uploads: m.uploads.as_ref().map(|u| UploadSpec {
            path: u.path.clone(),
            fields: u.fields.clone(),
        }),
    })
}

fn column_infos(m: &ModelConfig) -> Vec<ColumnInfo> {
    m.columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name.clone(),
            pg_type: cast_type(&c.type_),
            nullable: c.nullable,
            has_default: c.has_default,
        })
        .collect()
}

/// Serial pseudo-types are not valid in casts; map them to their integer types.
fn cast_type(ty: &ColumnTypeConfig) -> String {
    match ty.base_name().to_lowercase().as_str() {
        "bigserial" | "serial8" => "bigint".into(),
        "serial" | "serial4" => "integer".into(),
        "smallserial" | "serial2" => "smallint".into(),
        _ => ty.pg_type(),
    }
}

fn infer_pk_type(ty: &ColumnTypeConfig) -> PkType {
    let type_lower = ty.base_name().to_lowercase();
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}
