// Copyright 2023 Remi Bernotavicius

//! Fixtures shared by the unit tests.

use crate::context::RequestContext;
use crate::database;
use crate::database::models::{Ingredient, IngredientId, RecipeId, Tag, TagId, User, UserId};
use crate::ingredients::{self, IngredientCreate};
use crate::recipes::{self, RecipeWrite, WriteMode};
use crate::tags::{self, TagCreate};
use crate::users::{self, UserCreate};
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use serde_json::json;

pub const IMAGE: &str = "/media/recipes/test.png";
/// A PNG signature and IHDR tag as a `data:` URI, enough for format sniffing.
pub const PNG_UPLOAD: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUg==";

pub fn user(conn: &mut database::Connection, name: &str) -> User {
    users::create_user(
        conn,
        &UserCreate {
            email: format!("{name}@example.com"),
            username: name.into(),
            first_name: name.into(),
            last_name: "Tester".into(),
        },
    )
    .unwrap()
}

pub fn delete_user(conn: &mut database::Connection, user: UserId) {
    use database::schema::users as u;

    diesel::delete(u::table.filter(u::id.eq(user)))
        .execute(conn)
        .unwrap();
}

/// A tag whose name and slug are `slug`, with a color derived from the tag count.
pub fn tag(conn: &mut database::Connection, slug: &str) -> Tag {
    let existing: i64 = database::schema::tags::table
        .count()
        .get_result(conn)
        .unwrap();
    tags::create_tag(
        conn,
        &TagCreate {
            name: slug.into(),
            color: format!("#{:06x}", existing + 1),
            slug: slug.into(),
        },
    )
    .unwrap()
}

pub fn ingredient(conn: &mut database::Connection, name: &str, unit: &str) -> Ingredient {
    ingredients::create_ingredient(
        conn,
        &IngredientCreate {
            name: name.into(),
            measurement_unit: unit.into(),
        },
    )
    .unwrap()
}

pub fn recipe(
    conn: &mut database::Connection,
    author: &User,
    name: &str,
    lines: &[(IngredientId, i32)],
    recipe_tags: &[TagId],
) -> RecipeId {
    let write: RecipeWrite = serde_json::from_value(json!({
        "ingredients": lines
            .iter()
            .map(|(id, amount)| json!({"id": id, "amount": amount}))
            .collect::<Vec<_>>(),
        "tags": recipe_tags,
        "image": IMAGE,
        "name": name,
        "text": format!("How to make {name}."),
        "cooking_time": 10,
    }))
    .unwrap();
    let valid = write.validate(WriteMode::Create).unwrap();
    let ctx = RequestContext::for_user(author.clone());
    recipes::create_recipe(conn, &ctx, &valid, IMAGE).unwrap()
}

/// A recipe with one ingredient and one tag of its own.
pub fn simple_recipe(conn: &mut database::Connection, author: &User, name: &str) -> RecipeId {
    let slug = format!("{}-{}", author.username, name.to_lowercase().replace(' ', "-"));
    let tag = tag(conn, &slug);
    let ingredient = ingredient(conn, &format!("{slug} base"), "g");
    recipe(conn, author, name, &[(ingredient.id, 100)], &[tag.id])
}

pub fn count_favorites(conn: &mut database::Connection) -> i64 {
    database::schema::favorites::table
        .count()
        .get_result(conn)
        .unwrap()
}

/// An id no recipe has.
pub fn missing_recipe_id(conn: &mut database::Connection) -> RecipeId {
    use database::schema::recipes as r;

    let max: Option<i32> = r::table
        .select(diesel::dsl::max(r::id))
        .get_result(conn)
        .unwrap();
    (max.unwrap_or(0) + 1).to_string().parse().unwrap()
}
