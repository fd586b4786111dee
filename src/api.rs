// Copyright 2023 Remi Bernotavicius

use crate::config::Config;
use crate::database;
use crate::error::ValidationErrors;
use crate::images::{FsImageStore, ImageStore};
use crate::{Error, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::Request;
use axum::http::{header, HeaderName, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

mod auth;
mod catalog;
mod recipes;
mod users;

pub use auth::AUTHENTICATED_USER;

#[derive(Clone)]
pub struct AppState {
    pub pool: database::Pool,
    pub images: Arc<dyn ImageStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: database::Pool, config: Config) -> Self {
        let images = Arc::new(FsImageStore::new(&config.media_dir, &config.media_url));
        Self {
            pool,
            images,
            config: Arc::new(config),
        }
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut database::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await?
    }
}

/// Unwraps a JSON body, reporting a malformed one as a validation failure.
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        Error::Validation(ValidationErrors::single(
            "non_field_errors",
            rejection.body_text(),
        ))
    })
}

/// The optional `recipes_limit` query parameter of the subscription endpoints.
fn recipes_limit(pairs: &[(String, String)]) -> Result<Option<usize>> {
    match pairs.iter().rev().find(|(k, _)| k == "recipes_limit") {
        None => Ok(None),
        Some((_, value)) => value.parse().map(Some).map_err(|_| {
            Error::Validation(ValidationErrors::single(
                "recipes_limit",
                format!("expected a non-negative integer, got {value:?}"),
            ))
        }),
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed();
    if status.is_server_error() {
        log::warn!("{method} {path} -> {status} in {elapsed:?}");
    } else {
        log::info!("{method} {path} -> {status} in {elapsed:?}");
    }
    response
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users", get(users::list).post(users::create))
        .route("/users/me", get(users::me))
        .route("/users/subscriptions", get(users::subscriptions))
        .route("/users/{id}", get(users::retrieve))
        .route(
            "/users/{id}/subscribe",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/tags", get(catalog::list_tags).post(catalog::create_tag))
        .route("/tags/{id}", get(catalog::get_tag))
        .route(
            "/ingredients",
            get(catalog::list_ingredients).post(catalog::create_ingredient),
        )
        .route("/ingredients/{id}", get(catalog::get_ingredient))
        .route("/recipes", get(recipes::list).post(recipes::create))
        .route(
            "/recipes/download_shopping_cart",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/recipes/{id}",
            get(recipes::retrieve)
                .patch(recipes::update)
                .delete(recipes::destroy),
        )
        .route(
            "/recipes/{id}/favorite",
            post(recipes::favorite).delete(recipes::unfavorite),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        );

    let mut app = Router::new().nest("/api", api);
    if state.config.media_url.starts_with('/') {
        app = app.nest_service(
            &state.config.media_url,
            ServeDir::new(&state.config.media_dir),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(AUTHENTICATED_USER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    app.layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                log::info!("received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("failed to install the terminate handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub async fn serve(config: Config) -> Result<()> {
    let pool = database::establish_pool(&config.database_path, config.pool_size)?;
    std::fs::create_dir_all(&config.media_dir)?;
    log::info!(
        "using database {:?}, media in {:?}",
        config.database_path,
        config.media_dir
    );

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(pool, config);
    let listener = TcpListener::bind(address).await?;
    log::info!("listening on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("server stopped");
    Ok(())
}
