//! Resource handlers: list, create, read, update, delete.

use crate::error::ApiError;
use crate::extractors::{BearerToken, QueryPairs};
use crate::response::{success_created, success_flag, success_one, success_page, PageMeta};
use crate::service::Payload;
use crate::state::ResourceState;
use crate::store::Storage;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

pub async fn list<S: Storage>(
    State(state): State<ResourceState<S>>,
    token: BearerToken,
    QueryPairs(query): QueryPairs,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.controller(token, query).await?;
    let page = controller.list().await?;
    let data: Vec<Value> = page.data.iter().map(|r| controller.serialize(r)).collect();
    Ok(success_page(data, PageMeta::from(&page)))
}

pub async fn read<S: Storage>(
    State(state): State<ResourceState<S>>,
    token: BearerToken,
    Path(id): Path<String>,
    QueryPairs(query): QueryPairs,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.controller(token, query).await?;
    let record = controller.read(&id).await?;
    Ok(success_one(controller.serialize(&record)))
}

pub async fn create<S: Storage>(
    State(state): State<ResourceState<S>>,
    token: BearerToken,
    QueryPairs(query): QueryPairs,
    payload: Payload,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.controller(token, query).await?;
    let record = controller.create(payload).await?;
    Ok(success_created(controller.serialize(&record)))
}

pub async fn update<S: Storage>(
    State(state): State<ResourceState<S>>,
    token: BearerToken,
    Path(id): Path<String>,
    QueryPairs(query): QueryPairs,
    payload: Payload,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.controller(token, query).await?;
    let record = controller.update(&id, payload).await?;
    Ok(success_one(controller.serialize(&record)))
}

pub async fn delete<S: Storage>(
    State(state): State<ResourceState<S>>,
    token: BearerToken,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.controller(token, Vec::new()).await?;
    controller.delete(&id).await?;
    Ok(success_flag(""))
}
