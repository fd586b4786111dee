// Copyright 2023 Remi Bernotavicius

use crate::database::models::UserId;
use crate::database::schema::{favorites, recipe_tags, recipes, shopping_carts, tags};
use crate::error::ValidationErrors;
use crate::Result;
use diesel::sqlite::Sqlite;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;

/// Narrowing applied to the recipe list. Flags are scoped to the requester.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<UserId>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn parse_flag(errors: &mut ValidationErrors, field: &'static str, value: &str) -> bool {
    match value {
        "1" | "true" | "True" => true,
        "0" | "false" | "False" => false,
        _ => {
            errors.add(field, format!("expected 0, 1, true or false, got {value:?}"));
            false
        }
    }
}

impl RecipeFilter {
    /// Builds a filter from query pairs. `tags` may repeat; unrelated keys are ignored.
    pub fn from_query(pairs: &[(String, String)]) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        let mut filter = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "author" => match value.parse() {
                    Ok(id) => filter.author = Some(id),
                    Err(_) => errors.add("author", format!("invalid author id {value:?}")),
                },
                "tags" => {
                    if !filter.tags.contains(value) {
                        filter.tags.push(value.clone());
                    }
                }
                "is_favorited" => {
                    filter.is_favorited = parse_flag(&mut errors, "is_favorited", value)
                }
                "is_in_shopping_cart" => {
                    filter.is_in_shopping_cart =
                        parse_flag(&mut errors, "is_in_shopping_cart", value)
                }
                _ => {}
            }
        }
        errors.into_result()?;
        Ok(filter)
    }

    /// The filtered recipe query, or `None` when nothing can match, as with an anonymous
    /// requester asking for their favorites.
    pub fn query<'a>(&'a self, user: Option<UserId>) -> Option<recipes::BoxedQuery<'a, Sqlite>> {
        let mut query = recipes::table.into_boxed();

        if let Some(author) = self.author {
            query = query.filter(recipes::author_id.eq(author));
        }
        if !self.tags.is_empty() {
            query = query.filter(
                recipes::id.eq_any(
                    recipe_tags::table
                        .inner_join(tags::table)
                        .filter(tags::slug.eq_any(self.tags.iter().map(String::as_str)))
                        .select(recipe_tags::recipe_id),
                ),
            );
        }
        if self.is_favorited {
            let user = user?;
            query = query.filter(
                recipes::id.eq_any(
                    favorites::table
                        .filter(favorites::user_id.eq(user))
                        .select(favorites::recipe_id),
                ),
            );
        }
        if self.is_in_shopping_cart {
            let user = user?;
            query = query.filter(
                recipes::id.eq_any(
                    shopping_carts::table
                        .filter(shopping_carts::user_id.eq(user))
                        .select(shopping_carts::recipe_id),
                ),
            );
        }
        Some(query)
    }
}
