//! Boot-time resource registry and per-request option resolution.
//!
//! The registry is filled once during startup and then shared behind an `Arc`; nothing
//! mutates it afterwards, so concurrent requests read it without locking.

use crate::config::resolved::{ModelBinding, ResourceOptions};
use crate::config::{AllowListConfig, Operation, ResourceConfig};
use crate::directive::parser::{parse_scope_list, parse_sorting};
use crate::directive::types::{DEFAULT_LIMIT, LIMIT_MAX};
use crate::directive::{AllowList, AllowLists, DirectiveDefaults};
use crate::error::ConfigError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Controller-level defaults beneath every registered resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerDefaults {
    pub model: Option<String>,
    pub serializer: String,
    pub policy: bool,
    pub auth: bool,
    pub default_limit: u32,
    pub filters: AllowListConfig,
    pub relations: AllowListConfig,
    pub scopes: AllowListConfig,
}

impl Default for ControllerDefaults {
    fn default() -> Self {
        ControllerDefaults {
            model: None,
            serializer: "default".into(),
            policy: false,
            auth: true,
            default_limit: DEFAULT_LIMIT,
            filters: AllowListConfig::Names(vec!["id".into()]),
            relations: AllowListConfig::Names(Vec::new()),
            scopes: AllowListConfig::Names(Vec::new()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, ResourceConfig>,
    models: HashMap<String, Arc<ModelBinding>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, model: ModelBinding) {
        self.models.insert(model.name.clone(), Arc::new(model));
    }

    pub fn register(&mut self, name: &str, mut config: ResourceConfig) -> Result<(), ConfigError> {
        if self.resources.contains_key(name) {
            return Err(ConfigError::DuplicateResource(name.to_string()));
        }
        config.name = name.to_string();
        tracing::info!(resource = %name, model = ?config.model, "resource registered");
        self.resources.insert(name.to_string(), config);
        Ok(())
    }

    pub fn config(&self, scope: &str) -> Option<&ResourceConfig> {
        self.resources.get(scope)
    }

    pub fn model(&self, name: &str) -> Option<&Arc<ModelBinding>> {
        self.models.get(name)
    }

    /// Registered scope names, sorted.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

/// Resolves a scope name to its `ResourceOptions`.
#[derive(Clone, Debug)]
pub struct RouteConfigResolver {
    registry: Arc<ResourceRegistry>,
}

impl RouteConfigResolver {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        RouteConfigResolver { registry }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Overlay the scope's non-empty fields onto `defaults`. Fails when no model is bound.
    pub fn resolve(&self, scope: &str, defaults: &ControllerDefaults) -> Result<ResourceOptions, ConfigError> {
        let config = self
            .registry
            .config(scope)
            .ok_or_else(|| ConfigError::UnknownScope(scope.to_string()))?;

        let model_name = non_empty(&config.model)
            .or(non_empty(&config.basename))
            .or(non_empty(&defaults.model))
            .ok_or_else(|| ConfigError::MissingModel(scope.to_string()))?;
        let model = self
            .registry
            .model(model_name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: model_name.to_string(),
            })?;

        let max_limit = config.max_limit.filter(|n| *n > 0).unwrap_or(LIMIT_MAX).min(LIMIT_MAX);
        let directive_defaults = DirectiveDefaults {
            relations: config
                .default_relations
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_default(),
            scopes: non_empty(&config.default_scopes)
                .map(parse_scope_list)
                .unwrap_or_default(),
            sorting: non_empty(&config.default_sorting)
                .map(parse_sorting)
                .unwrap_or_default(),
            limit: config
                .default_limit
                .filter(|n| *n > 0)
                .unwrap_or(defaults.default_limit),
            max_limit,
        };

        let allowed = AllowLists {
            filters: overlay_allow(&config.filters, &defaults.filters),
            relations: overlay_allow(&config.relations, &defaults.relations),
            scopes: overlay_allow(&config.scopes, &defaults.scopes),
        };

        Ok(ResourceOptions {
            scope: scope.to_string(),
            model,
            serializer: non_empty(&config.serializer)
                .unwrap_or(defaults.serializer.as_str())
                .to_string(),
            policy: config.policy.unwrap_or(false) || defaults.policy,
            auth: config.auth.unwrap_or(defaults.auth),
            defaults: directive_defaults,
            allowed,
            operations: config.only.clone().unwrap_or_else(|| Operation::ALL.to_vec()),
            controller: non_empty(&config.controller).map(str::to_string),
            namespace: non_empty(&config.namespace).map(str::to_string),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn overlay_allow(value: &Option<AllowListConfig>, default: &AllowListConfig) -> AllowList {
    match value {
        Some(v) if !v.is_empty() => to_allow_list(v),
        _ => to_allow_list(default),
    }
}

fn to_allow_list(config: &AllowListConfig) -> AllowList {
    match config {
        AllowListConfig::Flag(true) => AllowList::AllowAny,
        AllowListConfig::Flag(false) => AllowList::none(),
        AllowListConfig::Names(names) => AllowList::of(names.iter().cloned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_registry, load_from_str};
    use crate::directive::SortDirection;

    fn resolver(json: &str) -> RouteConfigResolver {
        let config = load_from_str(json).unwrap();
        RouteConfigResolver::new(Arc::new(build_registry(&config).unwrap()))
    }

    const CONFIG: &str = r#"{
        "defaults": { "auth": false },
        "models": [
            { "name": "Post", "table": "posts",
              "columns": [ { "name": "id", "type": "bigserial", "has_default": true },
                           { "name": "title", "type": "text" } ] }
        ],
        "resources": [
            { "name": "posts", "model": "Post", "filters": ["title"], "relations": true,
              "default_sorting": "-id", "default_scopes": "published", "max_limit": 50,
              "only": ["list", "read"] },
            { "name": "bare", "model": "Post", "filters": [], "policy": false },
            { "name": "orphan" }
        ]
    }"#;

    #[test]
    fn overlays_registered_options() {
        let options = resolver(CONFIG)
            .resolve("posts", &ControllerDefaults::default())
            .unwrap();
        assert_eq!(options.model.table_name, "posts");
        assert!(options.allowed.filters.permits("title"));
        assert!(!options.allowed.filters.permits("id"));
        assert_eq!(options.allowed.relations, AllowList::AllowAny);
        assert_eq!(options.defaults.sorting.get("id"), Some(SortDirection::Desc));
        assert_eq!(options.defaults.scopes[0].name, "published");
        assert_eq!(options.defaults.max_limit, 50);
        assert!(!options.auth);
        assert!(options.allows(Operation::Read));
        assert!(!options.allows(Operation::Delete));
    }

    #[test]
    fn empty_fields_keep_controller_defaults() {
        let options = resolver(CONFIG)
            .resolve("bare", &ControllerDefaults::default())
            .unwrap();
        assert!(options.allowed.filters.permits("id"));
        assert!(!options.allowed.scopes.permits("anything"));
        assert_eq!(options.defaults.limit, DEFAULT_LIMIT);
        assert_eq!(options.serializer, "default");
        assert_eq!(options.operations.len(), 5);
    }

    #[test]
    fn missing_model_is_a_config_error() {
        let err = resolver(CONFIG)
            .resolve("orphan", &ControllerDefaults::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingModel(ref s) if s == "orphan"));
    }

    #[test]
    fn controller_default_model_fills_the_gap() {
        let defaults = ControllerDefaults {
            model: Some("Post".into()),
            ..ControllerDefaults::default()
        };
        let options = resolver(CONFIG).resolve("orphan", &defaults).unwrap();
        assert_eq!(options.model.name, "Post");
    }

    #[test]
    fn unknown_scope() {
        assert!(matches!(
            resolver(CONFIG).resolve("nope", &ControllerDefaults::default()),
            Err(ConfigError::UnknownScope(_))
        ));
    }
}
