// Copyright 2023 Remi Bernotavicius

use super::{json_body, AppState};
use crate::context::RequestContext;
use crate::database::models::{Ingredient, IngredientId, Tag, TagId};
use crate::ingredients::{self, IngredientCreate};
use crate::tags::{self, TagCreate};
use crate::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>> {
    Ok(Json(state.with_conn(tags::list_tags).await?))
}

pub async fn get_tag(State(state): State<AppState>, Path(id): Path<TagId>) -> Result<Json<Tag>> {
    let tag = state.with_conn(move |conn| tags::get_tag(conn, id)).await?;
    Ok(Json(tag))
}

pub async fn create_tag(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: std::result::Result<Json<TagCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Tag>)> {
    ctx.require_user()?;
    let new = json_body(payload)?;
    let tag = state
        .with_conn(move |conn| tags::create_tag(conn, &new))
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    name: Option<String>,
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<Vec<Ingredient>>> {
    let found = state
        .with_conn(move |conn| ingredients::list_ingredients(conn, query.name.as_deref()))
        .await?;
    Ok(Json(found))
}

pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<IngredientId>,
) -> Result<Json<Ingredient>> {
    let ingredient = state
        .with_conn(move |conn| ingredients::get_ingredient(conn, id))
        .await?;
    Ok(Json(ingredient))
}

pub async fn create_ingredient(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: std::result::Result<Json<IngredientCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Ingredient>)> {
    ctx.require_user()?;
    let new = json_body(payload)?;
    let ingredient = state
        .with_conn(move |conn| ingredients::create_ingredient(conn, &new))
        .await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}
