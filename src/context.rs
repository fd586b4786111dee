// Copyright 2023 Remi Bernotavicius

use crate::database::models::{Recipe, User, UserId};
use crate::{Error, Result};

/// Who is asking and when. Built once per request and handed to every operation explicitly.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub current_user: Option<User>,
    pub now: chrono::DateTime<chrono::Utc>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self {
            current_user: None,
            now: chrono::Utc::now(),
        }
    }

    pub fn for_user(user: User) -> Self {
        Self {
            current_user: Some(user),
            now: chrono::Utc::now(),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.current_user.as_ref().map(|u| u.id)
    }

    /// The current user, or `Unauthenticated` for anonymous requests.
    pub fn require_user(&self) -> Result<&User> {
        self.current_user.as_ref().ok_or(Error::Unauthenticated)
    }

    /// Only a recipe's author may change or delete it.
    pub fn require_author(&self, recipe: &Recipe) -> Result<&User> {
        let user = self.require_user()?;
        if user.id != recipe.author_id {
            return Err(Error::Forbidden(
                "only the author may modify this recipe".into(),
            ));
        }
        Ok(user)
    }
}
