//! Resource lifecycle: list, read, create, update, delete around storage and hooks.

use crate::config::ResourceOptions;
use crate::context::RequestContext;
use crate::directive::{QueryDirectives, ResourceQueryApplier};
use crate::error::ApiError;
use crate::policy::Action;
use crate::response::Serializer;
use crate::service::hooks::ResourceHooks;
use crate::service::payload::Payload;
use crate::service::resources::Resources;
use crate::service::validation::RequestValidator;
use crate::store::{Page, Record, Storage};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Per-request controller. Options and directives are fixed at construction.
pub struct ResourceController<'a, S: Storage> {
    resources: &'a Resources<S>,
    ctx: RequestContext,
    options: ResourceOptions,
    directives: QueryDirectives,
    hooks: Arc<dyn ResourceHooks<S::Query>>,
    serializer: Arc<dyn Serializer>,
}

impl<'a, S: Storage> ResourceController<'a, S> {
    pub(crate) fn new(
        resources: &'a Resources<S>,
        ctx: RequestContext,
        options: ResourceOptions,
        directives: QueryDirectives,
        hooks: Arc<dyn ResourceHooks<S::Query>>,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        ResourceController {
            resources,
            ctx,
            options,
            directives,
            hooks,
            serializer,
        }
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    pub fn directives(&self) -> &QueryDirectives {
        &self.directives
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn serialize(&self, record: &Record) -> Value {
        self.serializer.serialize(record, &self.options.model)
    }

    fn storage(&self) -> &S {
        self.resources.storage()
    }

    fn base_query(&self) -> S::Query {
        self.storage().query(self.options.model.clone())
    }

    fn applier(&self) -> ResourceQueryApplier<'_> {
        ResourceQueryApplier::new(&self.directives)
    }

    fn not_found(&self) -> ApiError {
        ApiError::NotFound(self.options.model.name.clone())
    }

    pub async fn list(&self) -> Result<Page, ApiError> {
        let mut query = self.base_query();
        self.applier().apply(&mut query)?;
        let query = self.hooks.fetching(&self.ctx, query).await?;
        self.applier().make_paginator(self.storage(), query).await
    }

    pub async fn read(&self, id: &str) -> Result<Record, ApiError> {
        let key = self.options.model.parse_id(id)?;
        self.read_key(&key).await
    }

    async fn read_key(&self, key: &Value) -> Result<Record, ApiError> {
        let mut query = self.base_query();
        self.applier().apply_relations(&mut query)?;
        let query = self.hooks.reading(&self.ctx, query).await?;
        let record = self
            .storage()
            .find(query, key)
            .await?
            .ok_or_else(|| self.not_found())?;
        self.hooks.readed(&self.ctx, record).await
    }

    /// Plain lookup for mutations: no relations, no read hooks.
    async fn find_for_write(&self, key: &Value) -> Result<Record, ApiError> {
        self.storage()
            .find(self.base_query(), key)
            .await?
            .ok_or_else(|| self.not_found())
    }

    pub async fn create(&self, payload: Payload) -> Result<Record, ApiError> {
        let attributes = self.absorb(payload).await;
        if attributes.is_empty() {
            return Err(ApiError::EmptyPayload);
        }
        let model = &self.options.model;
        let record = Record::new(attributes);
        RequestValidator::validate_create(record.attributes(), &model.validation)?;

        let mut record = self.hooks.creating(&self.ctx, record).await?;
        self.storage().save(model, &mut record).await?;
        let record = self.hooks.created(&self.ctx, record).await?;

        let key = record
            .get(&model.primary_key)
            .cloned()
            .ok_or_else(|| ApiError::Storage(format!("{}: saved record has no key", model.name)))?;
        tracing::info!(scope = %self.ctx.scope, id = %key, "resource created");
        self.read_key(&key).await
    }

    pub async fn update(&self, id: &str, payload: Payload) -> Result<Record, ApiError> {
        let model = &self.options.model;
        let key = model.parse_id(id)?;
        let mut record = self.find_for_write(&key).await?;
        self.authorize(Action::Update, &record).await?;

        let changes = self.absorb(payload).await;
        if changes.is_empty() {
            return self.read_key(&key).await;
        }
        record.fill(&changes);
        RequestValidator::validate_partial(&changes, &model.validation)?;

        let mut record = self.hooks.updating(&self.ctx, record, &changes).await?;
        self.storage().save(model, &mut record).await?;
        self.hooks.updated(&self.ctx, record).await?;
        tracing::info!(scope = %self.ctx.scope, id = %key, "resource updated");
        self.read_key(&key).await
    }

    pub async fn delete(&self, id: &str) -> Result<Record, ApiError> {
        let model = &self.options.model;
        let key = model.parse_id(id)?;
        let record = self.find_for_write(&key).await?;
        self.authorize(Action::Delete, &record).await?;

        let record = self.hooks.deleting(&self.ctx, record).await?;
        if !self.storage().delete(model, &record).await? {
            return Err(ApiError::DeleteFailed);
        }
        tracing::info!(scope = %self.ctx.scope, id = %key, "resource deleted");
        self.hooks.deleted(&self.ctx, record).await
    }

    async fn authorize(&self, action: Action, record: &Record) -> Result<(), ApiError> {
        if !self.options.policy {
            return Ok(());
        }
        match self.resources.authorizer() {
            Some(authorizer) => {
                authorizer
                    .authorize(&self.ctx, action, &self.options, record)
                    .await
            }
            None => Err(ApiError::Forbidden(format!("{} {}", action, self.options.scope))),
        }
    }

    /// Payload fields plus stored upload locations. Files that cannot be stored are dropped.
    async fn absorb(&self, payload: Payload) -> Map<String, Value> {
        let Payload { mut fields, files } = payload;
        for file in files {
            let dir = self
                .options
                .model
                .uploads
                .as_ref()
                .and_then(|u| u.path_for(&file.field));
            let (Some(dir), Some(store)) = (dir, self.resources.uploads()) else {
                tracing::warn!(scope = %self.ctx.scope, field = %file.field, "upload field not accepted, dropped");
                continue;
            };
            match store.store(dir, &file).await {
                Ok(location) => {
                    fields.insert(file.field.clone(), Value::String(location));
                }
                Err(e) => {
                    tracing::warn!(scope = %self.ctx.scope, field = %file.field, error = %e, "upload failed, field dropped");
                }
            }
        }
        fields
    }
}
