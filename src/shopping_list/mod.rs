// Copyright 2023 Remi Bernotavicius

use crate::context::RequestContext;
use crate::database;
use crate::database::models::{IngredientId, UserId};
use crate::Result;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;

mod render;

pub use render::{render, Document, DocumentFormat};

/// One line of a shopping list: an ingredient and how much of it every carted recipe needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub ingredient: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Sums the ingredient amounts of every recipe in `user`'s cart, one line per ingredient,
/// ordered by name, then unit, then id.
pub fn aggregate(conn: &mut database::Connection, user: UserId) -> Result<Vec<ShoppingListItem>> {
    use database::schema::{ingredient_amounts, ingredients, shopping_carts};

    let rows: Vec<(IngredientId, String, String, Option<i64>)> = ingredient_amounts::table
        .inner_join(ingredients::table)
        .filter(
            ingredient_amounts::recipe_id.eq_any(
                shopping_carts::table
                    .filter(shopping_carts::user_id.eq(user))
                    .select(shopping_carts::recipe_id),
            ),
        )
        .group_by((
            ingredients::id,
            ingredients::name,
            ingredients::measurement_unit,
        ))
        .select((
            ingredients::id,
            ingredients::name,
            ingredients::measurement_unit,
            diesel::dsl::sum(ingredient_amounts::amount),
        ))
        .order_by((
            ingredients::name.asc(),
            ingredients::measurement_unit.asc(),
            ingredients::id.asc(),
        ))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(ingredient, name, measurement_unit, total)| ShoppingListItem {
            ingredient,
            name,
            measurement_unit,
            total: total.unwrap_or_default(),
        })
        .collect())
}

/// The requester's shopping list rendered as a downloadable document.
pub fn download(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    format: DocumentFormat,
) -> Result<Document> {
    let user = ctx.require_user()?;
    let items = aggregate(conn, user.id)?;
    log::info!(
        "rendering {} shopping list lines for user {} as {format}",
        items.len(),
        user.id
    );
    Ok(render(format, &items, ctx.now.date_naive()))
}
