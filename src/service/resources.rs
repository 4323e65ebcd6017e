//! Application-wide resource wiring: storage, hooks, serializers and policy seams.
//!
//! Built once at boot and shared behind an `Arc`; per request it hands out a
//! `ResourceController` for the route's scope.

use crate::config::{ControllerDefaults, ResourceOptions, ResourceRegistry, RouteConfigResolver};
use crate::context::RequestContext;
use crate::directive::{parse_request, RawQuery};
use crate::error::{ApiError, ConfigError};
use crate::policy::{Authenticator, Authorizer, Principal};
use crate::response::{DefaultSerializer, Serializer};
use crate::service::controller::ResourceController;
use crate::service::hooks::{DefaultHooks, ResourceHooks};
use crate::store::Storage;
use crate::upload::UploadStore;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_SERIALIZER: &str = "default";

/// Default request body cap for create/update (10 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Hooks plus controller-level defaults registered under one controller key.
pub struct ControllerBinding<Q: Send + 'static> {
    pub hooks: Arc<dyn ResourceHooks<Q>>,
    pub defaults: ControllerDefaults,
}

impl<Q: Send + 'static> Clone for ControllerBinding<Q> {
    fn clone(&self) -> Self {
        ControllerBinding {
            hooks: self.hooks.clone(),
            defaults: self.defaults.clone(),
        }
    }
}

pub struct Resources<S: Storage> {
    resolver: RouteConfigResolver,
    storage: Arc<S>,
    fallback: ControllerBinding<S::Query>,
    controllers: HashMap<String, ControllerBinding<S::Query>>,
    serializers: HashMap<String, Arc<dyn Serializer>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    uploads: Option<Arc<dyn UploadStore>>,
    body_limit: usize,
}

impl<S: Storage> Resources<S> {
    pub fn new(registry: ResourceRegistry, storage: S) -> Self {
        let mut serializers: HashMap<String, Arc<dyn Serializer>> = HashMap::new();
        serializers.insert(DEFAULT_SERIALIZER.into(), Arc::new(DefaultSerializer));
        Resources {
            resolver: RouteConfigResolver::new(Arc::new(registry)),
            storage: Arc::new(storage),
            fallback: ControllerBinding {
                hooks: Arc::new(DefaultHooks),
                defaults: ControllerDefaults::default(),
            },
            controllers: HashMap::new(),
            serializers,
            authorizer: None,
            authenticator: None,
            uploads: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Defaults for resources without their own controller binding.
    pub fn with_defaults(mut self, defaults: ControllerDefaults) -> Self {
        self.fallback.defaults = defaults;
        self
    }

    /// Bind hooks under a controller key (the scope name unless the resource sets `controller`).
    pub fn with_hooks(self, key: impl Into<String>, hooks: impl ResourceHooks<S::Query> + 'static) -> Self {
        let defaults = self.fallback.defaults.clone();
        self.with_controller(key, hooks, defaults)
    }

    pub fn with_controller(
        mut self,
        key: impl Into<String>,
        hooks: impl ResourceHooks<S::Query> + 'static,
        defaults: ControllerDefaults,
    ) -> Self {
        self.controllers.insert(
            key.into(),
            ControllerBinding {
                hooks: Arc::new(hooks),
                defaults,
            },
        );
        self
    }

    pub fn with_serializer(mut self, name: impl Into<String>, serializer: impl Serializer + 'static) -> Self {
        self.serializers.insert(name.into(), Arc::new(serializer));
        self
    }

    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    pub fn with_uploads(mut self, uploads: impl UploadStore + 'static) -> Self {
        self.uploads = Some(Arc::new(uploads));
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn registry(&self) -> &ResourceRegistry {
        self.resolver.registry()
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    pub(crate) fn authorizer(&self) -> Option<&dyn Authorizer> {
        self.authorizer.as_deref()
    }

    pub(crate) fn uploads(&self) -> Option<&dyn UploadStore> {
        self.uploads.as_deref()
    }

    fn binding(&self, scope: &str) -> Result<&ControllerBinding<S::Query>, ConfigError> {
        let explicit = self
            .registry()
            .config(scope)
            .and_then(|c| c.controller.as_deref())
            .filter(|c| !c.is_empty());
        match explicit {
            Some(key) => self
                .controllers
                .get(key)
                .ok_or_else(|| ConfigError::UnknownController {
                    scope: scope.to_string(),
                    controller: key.to_string(),
                }),
            None => Ok(self.controllers.get(scope).unwrap_or(&self.fallback)),
        }
    }

    /// Resolve a scope's options and check every collaborator it names is registered.
    pub fn options(&self, scope: &str) -> Result<ResourceOptions, ConfigError> {
        let binding = self.binding(scope)?;
        let options = self.resolver.resolve(scope, &binding.defaults)?;
        if !self.serializers.contains_key(&options.serializer) {
            return Err(ConfigError::UnknownSerializer {
                scope: scope.to_string(),
                serializer: options.serializer.clone(),
            });
        }
        if options.policy && self.authorizer.is_none() {
            return Err(ConfigError::MissingReference {
                kind: "authorizer",
                id: scope.to_string(),
            });
        }
        if options.auth && self.authenticator.is_none() {
            return Err(ConfigError::MissingReference {
                kind: "authenticator",
                id: scope.to_string(),
            });
        }
        Ok(options)
    }

    /// Boot-time check over every registered scope.
    pub fn check(&self) -> Result<Vec<ResourceOptions>, ConfigError> {
        self.registry()
            .scopes()
            .map(|scope| self.options(scope))
            .collect()
    }

    /// Bearer token to principal. A missing or unknown token yields `None`.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Option<Principal>, ApiError> {
        match (token, &self.authenticator) {
            (Some(token), Some(auth)) => auth.authenticate(token).await,
            _ => Ok(None),
        }
    }

    /// Controller for the context's scope, with the query directives parsed up front.
    pub fn controller(
        &self,
        ctx: RequestContext,
        raw: &RawQuery,
    ) -> Result<ResourceController<'_, S>, ApiError> {
        let binding = self.binding(&ctx.scope)?;
        let options = self.options(&ctx.scope)?;
        if options.auth && ctx.principal.is_none() {
            return Err(ApiError::Unauthenticated);
        }
        let serializer = self
            .serializers
            .get(&options.serializer)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSerializer {
                scope: ctx.scope.clone(),
                serializer: options.serializer.clone(),
            })?;
        let directives = parse_request(raw, &options.defaults, &options.allowed)?;
        tracing::debug!(scope = %ctx.scope, directives = ?directives, "directives parsed");
        Ok(ResourceController::new(
            self,
            ctx,
            options,
            directives,
            binding.hooks.clone(),
            serializer,
        ))
    }
}
