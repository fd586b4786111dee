// Copyright 2023 Remi Bernotavicius

use super::{json_body, AppState};
use crate::context::RequestContext;
use crate::database::models::{RecipeHandle, RecipeId};
use crate::error::ValidationErrors;
use crate::images::ImageStore;
use crate::pagination::{Page, PageRequest};
use crate::recipes::{self, RecipeFilter, RecipeView, RecipeWrite, WriteMode};
use crate::shopping_list::{self, DocumentFormat};
use crate::toggle::{self, Favorite, ShoppingCart};
use crate::{Error, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse as _, Response};
use axum::Json;
use std::str::FromStr as _;

type Pairs = Query<Vec<(String, String)>>;

pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Pairs,
) -> Result<Json<Page<RecipeView>>> {
    let page = PageRequest::from_query(&pairs, state.config.page_size)?;
    let filter = RecipeFilter::from_query(&pairs)?;
    let (results, count) = state
        .with_conn(move |conn| recipes::list_recipes(conn, &ctx, &filter, page))
        .await?;
    Ok(Json(Page::new(page, &uri, results, count)))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: std::result::Result<Json<RecipeWrite>, JsonRejection>,
) -> Result<(StatusCode, Json<RecipeView>)> {
    ctx.require_user()?;
    let recipe = json_body(payload)?.validate(WriteMode::Create)?;
    let images = state.images.clone();
    let view = state
        .with_conn(move |conn| {
            let upload = recipe.image.as_deref().ok_or_else(|| {
                Error::Validation(ValidationErrors::single("image", "an image is required"))
            })?;
            recipes::check_references(conn, &recipe)?;
            let id = with_stored_image(&*images, upload, |stored| {
                recipes::create_recipe(conn, &ctx, &recipe, stored)
            })?;
            recipes::get_recipe(conn, &ctx, id)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Stores `upload` and runs `write` with its reference, discarding the image again if `write`
/// fails.
fn with_stored_image<T>(
    images: &dyn ImageStore,
    upload: &str,
    write: impl FnOnce(&str) -> Result<T>,
) -> Result<T> {
    let stored = images.store(upload)?;
    write(&stored).inspect_err(|_| images.discard(&stored))
}

pub async fn retrieve(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<RecipeId>,
) -> Result<Json<RecipeView>> {
    let view = state
        .with_conn(move |conn| recipes::get_recipe(conn, &ctx, id))
        .await?;
    Ok(Json(view))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<RecipeId>,
    payload: std::result::Result<Json<RecipeWrite>, JsonRejection>,
) -> Result<Json<RecipeView>> {
    ctx.require_user()?;
    let recipe = json_body(payload)?.validate(WriteMode::Update)?;
    let images = state.images.clone();
    let view = state
        .with_conn(move |conn| {
            recipes::find_own_recipe(conn, &ctx, id)?;
            recipes::check_references(conn, &recipe)?;
            match recipe.image.as_deref() {
                Some(upload) => with_stored_image(&*images, upload, |stored| {
                    recipes::update_recipe(conn, &ctx, id, &recipe, Some(stored))
                })?,
                None => recipes::update_recipe(conn, &ctx, id, &recipe, None)?,
            }
            recipes::get_recipe(conn, &ctx, id)
        })
        .await?;
    Ok(Json(view))
}

pub async fn destroy(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<RecipeId>,
) -> Result<StatusCode> {
    state
        .with_conn(move |conn| recipes::delete_recipe(conn, &ctx, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn favorite(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<RecipeId>,
) -> Result<(StatusCode, Json<RecipeHandle>)> {
    let handle = state
        .with_conn(move |conn| toggle::add_recipe::<Favorite>(conn, &ctx, id))
        .await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

pub async fn unfavorite(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<RecipeId>,
) -> Result<StatusCode> {
    state
        .with_conn(move |conn| toggle::remove_recipe::<Favorite>(conn, &ctx, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<RecipeId>,
) -> Result<(StatusCode, Json<RecipeHandle>)> {
    let handle = state
        .with_conn(move |conn| toggle::add_recipe::<ShoppingCart>(conn, &ctx, id))
        .await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<RecipeId>,
) -> Result<StatusCode> {
    state
        .with_conn(move |conn| toggle::remove_recipe::<ShoppingCart>(conn, &ctx, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn document_format(pairs: &[(String, String)]) -> Result<DocumentFormat> {
    match pairs.iter().rev().find(|(k, _)| k == "format") {
        None => Ok(DocumentFormat::default()),
        Some((_, value)) => DocumentFormat::from_str(value).map_err(|_| {
            let known: Vec<_> = DocumentFormat::iter().map(|f| f.to_string()).collect();
            Error::Validation(ValidationErrors::single(
                "format",
                format!("expected one of {}, got {value:?}", known.join(", ")),
            ))
        }),
    }
}

pub async fn download_shopping_cart(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(pairs): Pairs,
) -> Result<Response> {
    ctx.require_user()?;
    let format = document_format(&pairs)?;
    let document = state
        .with_conn(move |conn| shopping_list::download(conn, &ctx, format))
        .await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(document.content_type),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static(format.attachment()),
            ),
        ],
        document.body,
    )
        .into_response())
}
