// Copyright 2023 Remi Bernotavicius

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field-level validation failures, keyed by the name of the offending field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for m in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {m}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("you cannot follow yourself")]
    SelfReference,

    #[error("authentication credentials were not provided or are invalid")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("migration error: {0}")]
    Migration(Box<dyn std::error::Error + Send + Sync>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::SelfReference => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_)
            | Self::Database(_)
            | Self::Pool(_)
            | Self::Migration(_)
            | Self::Io(_)
            | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// True when `e` is the store rejecting a duplicate row.
pub fn is_unique_violation(e: &diesel::result::Error) -> bool {
    matches!(
        e,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        )
    )
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!(errors.0),
            e if status.is_server_error() => {
                log::error!("{e}");
                json!({ "detail": "internal server error" })
            }
            e => json!({ "detail": e.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[test]
fn validation_errors_collect_per_field() {
    let mut errors = ValidationErrors::new();
    errors.add("tags", "must not be empty");
    errors.add("cooking_time", "must be at least 1");
    errors.add("tags", "duplicate tag 3");
    assert_eq!(
        errors.get("tags").unwrap(),
        ["must not be empty", "duplicate tag 3"]
    );
    assert_eq!(
        errors.to_string(),
        "cooking_time: must be at least 1; tags: must not be empty; tags: duplicate tag 3"
    );
    assert!(matches!(errors.into_result(), Err(Error::Validation(_))));
    assert!(ValidationErrors::new().into_result().is_ok());
}

#[test]
fn statuses() {
    assert_eq!(
        Error::Validation(ValidationErrors::single("name", "required")).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(Error::SelfReference.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        Error::Conflict("already in favorites".into()).status(),
        StatusCode::CONFLICT
    );
    assert_eq!(Error::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        Error::Forbidden("not yours".into()).status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(Error::not_found("recipe 4").status(), StatusCode::NOT_FOUND);
    assert_eq!(
        Error::Database(diesel::result::Error::RollbackTransaction).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
