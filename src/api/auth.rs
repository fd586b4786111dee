// Copyright 2023 Remi Bernotavicius

use super::AppState;
use crate::context::RequestContext;
use crate::users;
use crate::Error;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Set by the authenticating gateway in front of the service to the caller's email.
pub const AUTHENTICATED_USER: &str = "x-authenticated-user";

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHENTICATED_USER) else {
            return Ok(Self::anonymous());
        };
        let email = value
            .to_str()
            .map_err(|_| Error::Unauthenticated)?
            .trim()
            .to_owned();
        if email.is_empty() {
            return Err(Error::Unauthenticated);
        }

        let user = state
            .with_conn(move |conn| users::find_by_email(conn, &email))
            .await?;
        match user {
            Some(user) => Ok(Self::for_user(user)),
            None => {
                log::warn!("rejecting request for unknown user");
                Err(Error::Unauthenticated)
            }
        }
    }
}
