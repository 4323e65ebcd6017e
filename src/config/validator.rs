//! Config validation: referential integrity and limit consistency.

use crate::config::{FieldRule, FullConfig, ModelConfig, ResourceConfig};
use crate::directive::LIMIT_MAX;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut models: HashMap<&str, &ModelConfig> = HashMap::new();
    for m in &config.models {
        if models.insert(m.name.as_str(), m).is_some() {
            return Err(ConfigError::Validation(format!("duplicate model: {}", m.name)));
        }
    }

    for m in &config.models {
        validate_model(m, &models)?;
    }

    validate_limits("defaults", &config.defaults)?;
    let mut names = HashSet::new();
    for r in &config.resources {
        if r.name.is_empty() {
            return Err(ConfigError::Validation("resource without name".into()));
        }
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::DuplicateResource(r.name.clone()));
        }
        let model = r
            .model
            .as_deref()
            .or(r.basename.as_deref())
            .or(config.defaults.model.as_deref());
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            if !models.contains_key(model) {
                return Err(ConfigError::MissingReference {
                    kind: "model",
                    id: model.to_string(),
                });
            }
        }
        validate_limits(&r.name, r)?;
    }

    Ok(())
}

fn validate_model(m: &ModelConfig, models: &HashMap<&str, &ModelConfig>) -> Result<(), ConfigError> {
    let columns: HashSet<&str> = m.columns.iter().map(|c| c.name.as_str()).collect();
    if !columns.contains(m.primary_key.as_str()) {
        return Err(ConfigError::MissingReference {
            kind: "primary key column",
            id: format!("{}.{}", m.name, m.primary_key),
        });
    }
    for col in m.hidden.iter().chain(m.validation.keys()) {
        if !columns.contains(col.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", m.name, col),
            });
        }
    }
    for rel in &m.relations {
        let related = models.get(rel.model.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "model",
            id: rel.model.clone(),
        })?;
        if !columns.contains(rel.local_key.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", m.name, rel.local_key),
            });
        }
        if !related.columns.iter().any(|c| c.name == rel.foreign_key) {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", related.name, rel.foreign_key),
            });
        }
    }
    for (col, rule) in &m.validation {
        FieldRule::compile(&format!("{}.{}", m.name, col), rule)?;
    }
    for (name, scope) in &m.scopes {
        if name.is_empty() || name.contains(':') || name.contains(',') {
            return Err(ConfigError::Validation(format!("invalid scope name '{}' on {}", name, m.name)));
        }
        if scope.condition.trim().is_empty() {
            return Err(ConfigError::Validation(format!("scope '{}' on {} has no condition", name, m.name)));
        }
    }
    Ok(())
}

fn validate_limits(name: &str, r: &ResourceConfig) -> Result<(), ConfigError> {
    if let Some(max) = r.max_limit {
        if max == 0 || max > LIMIT_MAX {
            return Err(ConfigError::Validation(format!(
                "{}: max_limit must be within 1..={}",
                name, LIMIT_MAX
            )));
        }
    }
    if let (Some(limit), Some(max)) = (r.default_limit, r.max_limit) {
        if limit > max {
            return Err(ConfigError::Validation(format!(
                "{}: default_limit {} exceeds max_limit {}",
                name, limit, max
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;

    const BASE: &str = r#"{
        "models": [
            { "name": "User", "table": "users",
              "columns": [ { "name": "id", "type": "bigserial", "has_default": true },
                           { "name": "email", "type": "text" } ] }
        ],
        "resources": [ { "name": "users", "model": "User" } ]
    }"#;

    #[test]
    fn accepts_consistent_config() {
        let config = load_from_str(BASE).unwrap();
        validate(&config).unwrap();
    }

    #[test]
    fn rejects_unknown_model_reference() {
        let mut config = load_from_str(BASE).unwrap();
        config.resources[0].model = Some("Ghost".into());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "model", .. })
        ));
    }

    #[test]
    fn rejects_duplicate_resource() {
        let mut config = load_from_str(BASE).unwrap();
        config.resources.push(config.resources[0].clone());
        assert!(matches!(validate(&config), Err(ConfigError::DuplicateResource(_))));
    }

    #[test]
    fn rejects_limit_above_ceiling() {
        let mut config = load_from_str(BASE).unwrap();
        config.resources[0].max_limit = Some(LIMIT_MAX + 1);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_malformed_pattern() {
        let mut config = load_from_str(BASE).unwrap();
        config.models[0].validation.insert(
            "email".into(),
            serde_json::from_value(serde_json::json!({ "pattern": "([a-z" })).unwrap(),
        );
        match validate(&config) {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("User.email"), "{}", msg),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_hidden_unknown_column() {
        let mut config = load_from_str(BASE).unwrap();
        config.models[0].hidden.push("password".into());
        assert!(validate(&config).is_err());
    }
}
