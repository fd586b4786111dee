// Copyright 2023 Remi Bernotavicius

use super::{json_body, recipes_limit, AppState};
use crate::context::RequestContext;
use crate::database::models::UserId;
use crate::pagination::{Page, PageRequest};
use crate::users::{self, SubscriptionView, UserCreate, UserView};
use crate::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

type Pairs = Query<Vec<(String, String)>>;

pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Pairs,
) -> Result<Json<Page<UserView>>> {
    let page = PageRequest::from_query(&pairs, state.config.page_size)?;
    let (results, count) = state
        .with_conn(move |conn| users::list_users(conn, &ctx, page))
        .await?;
    Ok(Json(Page::new(page, &uri, results, count)))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: std::result::Result<Json<UserCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<UserView>)> {
    let new = json_body(payload)?;
    let view = state
        .with_conn(move |conn| {
            let user = users::create_user(conn, &new)?;
            users::user_view(conn, &ctx, user)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn me(State(state): State<AppState>, ctx: RequestContext) -> Result<Json<UserView>> {
    let view = state.with_conn(move |conn| users::me(conn, &ctx)).await?;
    Ok(Json(view))
}

pub async fn retrieve(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<UserId>,
) -> Result<Json<UserView>> {
    let view = state
        .with_conn(move |conn| users::get_user(conn, &ctx, id))
        .await?;
    Ok(Json(view))
}

pub async fn subscriptions(
    State(state): State<AppState>,
    ctx: RequestContext,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Pairs,
) -> Result<Json<Page<SubscriptionView>>> {
    ctx.require_user()?;
    let page = PageRequest::from_query(&pairs, state.config.page_size)?;
    let limit = recipes_limit(&pairs)?;
    let (results, count) = state
        .with_conn(move |conn| users::list_subscriptions(conn, &ctx, page, limit))
        .await?;
    Ok(Json(Page::new(page, &uri, results, count)))
}

pub async fn subscribe(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<UserId>,
    Query(pairs): Pairs,
) -> Result<(StatusCode, Json<SubscriptionView>)> {
    let limit = recipes_limit(&pairs)?;
    let view = state
        .with_conn(move |conn| users::subscribe(conn, &ctx, id, limit))
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    state
        .with_conn(move |conn| users::unsubscribe(conn, &ctx, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
