// Copyright 2023 Remi Bernotavicius

use crate::config::MAX_PAGE_SIZE;
use crate::error::ValidationErrors;
use crate::Result;
use axum::http::Uri;
use serde::Serialize;

/// Keeps `(page - 1) * limit` inside an `i64` for every accepted limit.
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Which slice of a list the caller wants. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    /// Reads `page` and `limit` out of query pairs, leaving anything else alone.
    pub fn from_query(pairs: &[(String, String)], default_limit: i64) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        let mut page = 1;
        let mut limit = default_limit;
        for (key, value) in pairs {
            match key.as_str() {
                "page" => match value.parse::<i64>() {
                    Ok(p) if (1..=MAX_PAGE).contains(&p) => page = p,
                    _ => errors.add("page", format!("invalid page {value:?}")),
                },
                "limit" => match value.parse::<i64>() {
                    Ok(l) if (1..=MAX_PAGE_SIZE).contains(&l) => limit = l,
                    _ => errors.add(
                        "limit",
                        format!("limit must be between 1 and {MAX_PAGE_SIZE}"),
                    ),
                },
                _ => {}
            }
        }
        errors.into_result()?;
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, uri: &Uri, results: Vec<T>, count: i64) -> Self {
        let next = (request.offset().saturating_add(request.limit) < count)
            .then(|| page_link(uri, request.page + 1));
        let previous = (request.page > 1).then(|| page_link(uri, request.page - 1));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// `uri` with its `page` parameter replaced. The first page carries no `page` parameter at all.
fn page_link(uri: &Uri, page: i64) -> String {
    let mut params: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && *p != "page" && !p.starts_with("page="))
        .map(str::to_owned)
        .collect();
    if page > 1 {
        params.push(format!("page={page}"));
    }
    if params.is_empty() {
        uri.path().to_owned()
    } else {
        format!("{}?{}", uri.path(), params.join("&"))
    }
}
