// Copyright 2023 Remi Bernotavicius

use crate::context::RequestContext;
use crate::database;
use crate::database::models::{
    Ingredient, IngredientAmount, IngredientId, NewIngredientAmount, NewRecipe, Recipe, RecipeId,
    RecipeTag, Tag, TagId, User, UserId,
};
use crate::pagination::PageRequest;
use crate::users::UserView;
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::BelongingToDsl as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

mod filter;
mod validate;

pub use filter::RecipeFilter;
pub use validate::{IngredientLine, RecipeWrite, ValidRecipe, WriteMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientLineView {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// A recipe as seen by the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeView {
    pub id: RecipeId,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<IngredientLineView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

pub fn find_recipe(conn: &mut database::Connection, recipe: RecipeId) -> Result<Recipe> {
    use database::schema::recipes::dsl::*;

    recipes
        .select(Recipe::as_select())
        .filter(id.eq(recipe))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found(format!("recipe {recipe}")))
}

/// Every referenced ingredient and tag has to exist before anything is written.
pub fn check_references(conn: &mut database::Connection, recipe: &ValidRecipe) -> Result<()> {
    let wanted: BTreeSet<IngredientId> = recipe.ingredients.iter().map(|l| l.id).collect();
    let found: HashSet<IngredientId> = {
        use database::schema::ingredients::dsl::*;

        ingredients
            .select(id)
            .filter(id.eq_any(wanted.iter().copied()))
            .load(conn)?
            .into_iter()
            .collect()
    };
    if let Some(missing) = wanted.iter().find(|i| !found.contains(i)) {
        return Err(Error::not_found(format!("ingredient {missing}")));
    }

    let wanted: BTreeSet<TagId> = recipe.tags.iter().copied().collect();
    let found: HashSet<TagId> = {
        use database::schema::tags::dsl::*;

        tags.select(id)
            .filter(id.eq_any(wanted.iter().copied()))
            .load(conn)?
            .into_iter()
            .collect()
    };
    if let Some(missing) = wanted.iter().find(|t| !found.contains(t)) {
        return Err(Error::not_found(format!("tag {missing}")));
    }
    Ok(())
}

/// Swaps the recipe's ingredient lines and tags for the ones in `recipe`. Old rows are deleted
/// rather than merged. Callers run this inside a transaction.
fn replace_associations(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
    recipe: &ValidRecipe,
) -> Result<()> {
    {
        use database::schema::ingredient_amounts::dsl;

        diesel::delete(dsl::ingredient_amounts.filter(dsl::recipe_id.eq(recipe_id)))
            .execute(conn)?;
        let lines: Vec<_> = recipe
            .ingredients
            .iter()
            .map(|l| NewIngredientAmount {
                recipe_id,
                ingredient_id: l.id,
                amount: l.amount,
            })
            .collect();
        diesel::insert_into(dsl::ingredient_amounts)
            .values(&lines)
            .execute(conn)?;
    }
    {
        use database::schema::recipe_tags::dsl;

        diesel::delete(dsl::recipe_tags.filter(dsl::recipe_id.eq(recipe_id))).execute(conn)?;
        let rows: Vec<_> = recipe
            .tags
            .iter()
            .map(|&tag_id| RecipeTag { recipe_id, tag_id })
            .collect();
        diesel::insert_into(dsl::recipe_tags)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

/// Creates a recipe owned by the requester. `stored_image` is the reference the image store
/// handed back, not the uploaded payload.
pub fn create_recipe(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipe: &ValidRecipe,
    stored_image: &str,
) -> Result<RecipeId> {
    let author = ctx.require_user()?.id;
    let new_id = conn.immediate_transaction(|conn| {
        check_references(conn, recipe)?;

        let new_id: RecipeId = {
            use database::schema::recipes::dsl::*;

            diesel::insert_into(recipes)
                .values(NewRecipe {
                    author_id: author,
                    name: &recipe.name,
                    image: stored_image,
                    text: &recipe.text,
                    cooking_time: recipe.cooking_time,
                    created_at: ctx.now.naive_utc(),
                })
                .returning(id)
                .get_result(conn)?
        };
        replace_associations(conn, new_id, recipe)?;
        Ok::<_, Error>(new_id)
    })?;
    log::info!("user {author} created recipe {new_id}");
    Ok(new_id)
}

/// Loads a recipe for modification, refusing anyone but its author.
pub fn find_own_recipe(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipe: RecipeId,
) -> Result<Recipe> {
    ctx.require_user()?;
    let recipe = find_recipe(conn, recipe)?;
    ctx.require_author(&recipe)?;
    Ok(recipe)
}

/// Rewrites a recipe in full. A `None` image keeps the stored one.
pub fn update_recipe(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipe_id: RecipeId,
    recipe: &ValidRecipe,
    stored_image: Option<&str>,
) -> Result<()> {
    conn.immediate_transaction(|conn| {
        find_own_recipe(conn, ctx, recipe_id)?;
        check_references(conn, recipe)?;
        {
            use database::schema::recipes::dsl::*;

            diesel::update(recipes.filter(id.eq(recipe_id)))
                .set((
                    name.eq(&recipe.name),
                    text.eq(&recipe.text),
                    cooking_time.eq(recipe.cooking_time),
                    stored_image.map(|i| image.eq(i)),
                ))
                .execute(conn)?;
        }
        replace_associations(conn, recipe_id, recipe)
    })?;
    log::info!("recipe {recipe_id} updated");
    Ok(())
}

pub fn delete_recipe(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipe_id: RecipeId,
) -> Result<()> {
    use database::schema::recipes::dsl::*;

    find_own_recipe(conn, ctx, recipe_id)?;
    diesel::delete(recipes.filter(id.eq(recipe_id))).execute(conn)?;
    log::info!("recipe {recipe_id} deleted");
    Ok(())
}

pub fn get_recipe(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipe_id: RecipeId,
) -> Result<RecipeView> {
    let recipe = find_recipe(conn, recipe_id)?;
    let mut views = recipe_views(conn, ctx, vec![recipe])?;
    views
        .pop()
        .ok_or_else(|| Error::not_found(format!("recipe {recipe_id}")))
}

/// One page of recipes, newest first, plus the number of recipes matching `filter`.
pub fn list_recipes(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    filter: &RecipeFilter,
    page: PageRequest,
) -> Result<(Vec<RecipeView>, i64)> {
    use database::schema::recipes::dsl::*;

    let user = ctx.user_id();
    let Some(count_query) = filter.query(user) else {
        return Ok((vec![], 0));
    };
    let total: i64 = count_query.count().get_result(conn)?;

    let page_recipes = match filter.query(user) {
        Some(query) => query
            .select(Recipe::as_select())
            .order_by((created_at.desc(), id.desc()))
            .limit(page.limit)
            .offset(page.offset())
            .load(conn)?,
        None => vec![],
    };
    Ok((recipe_views(conn, ctx, page_recipes)?, total))
}

fn requester_marks(
    conn: &mut database::Connection,
    user: Option<UserId>,
    ids: &[RecipeId],
) -> Result<(HashSet<RecipeId>, HashSet<RecipeId>)> {
    use database::schema::{favorites, shopping_carts};

    let Some(user) = user else {
        return Ok(Default::default());
    };
    let favorited = favorites::table
        .select(favorites::recipe_id)
        .filter(favorites::user_id.eq(user))
        .filter(favorites::recipe_id.eq_any(ids.iter().copied()))
        .load(conn)?
        .into_iter()
        .collect();
    let in_cart = shopping_carts::table
        .select(shopping_carts::recipe_id)
        .filter(shopping_carts::user_id.eq(user))
        .filter(shopping_carts::recipe_id.eq_any(ids.iter().copied()))
        .load(conn)?
        .into_iter()
        .collect();
    Ok((favorited, in_cart))
}

/// Renders recipes for the requester, loading tags, ingredients, authors and the two flags in
/// one query each.
pub fn recipe_views(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipes: Vec<Recipe>,
) -> Result<Vec<RecipeView>> {
    use database::schema::{ingredients, recipe_tags, tags, users};

    if recipes.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<RecipeId> = recipes.iter().map(|r| r.id).collect();

    let mut lines: HashMap<RecipeId, Vec<IngredientLineView>> = HashMap::new();
    let amounts: Vec<(IngredientAmount, Ingredient)> = IngredientAmount::belonging_to(&recipes)
        .inner_join(ingredients::table)
        .select((IngredientAmount::as_select(), Ingredient::as_select()))
        .order_by(database::schema::ingredient_amounts::id.asc())
        .load(conn)?;
    for (amount, ingredient) in amounts {
        lines
            .entry(amount.recipe_id)
            .or_default()
            .push(IngredientLineView {
                id: ingredient.id,
                name: ingredient.name,
                measurement_unit: ingredient.measurement_unit,
                amount: amount.amount,
            });
    }

    let mut recipe_tag_map: HashMap<RecipeId, Vec<Tag>> = HashMap::new();
    let tag_rows: Vec<(RecipeId, Tag)> = recipe_tags::table
        .inner_join(tags::table)
        .select((recipe_tags::recipe_id, Tag::as_select()))
        .filter(recipe_tags::recipe_id.eq_any(ids.iter().copied()))
        .order_by(tags::id.asc())
        .load(conn)?;
    for (recipe_id, tag) in tag_rows {
        recipe_tag_map.entry(recipe_id).or_default().push(tag);
    }

    let author_ids: BTreeSet<UserId> = recipes.iter().map(|r| r.author_id).collect();
    let authors: Vec<User> = users::table
        .select(User::as_select())
        .filter(users::id.eq_any(author_ids.iter().copied()))
        .load(conn)?;
    let authors: HashMap<UserId, UserView> = crate::users::user_views(conn, ctx, authors)?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let (favorited, in_cart) = requester_marks(conn, ctx.user_id(), &ids)?;

    recipes
        .into_iter()
        .map(|r| {
            let author = authors
                .get(&r.author_id)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("user {}", r.author_id)))?;
            Ok(RecipeView {
                id: r.id,
                tags: recipe_tag_map.remove(&r.id).unwrap_or_default(),
                author,
                ingredients: lines.remove(&r.id).unwrap_or_default(),
                is_favorited: favorited.contains(&r.id),
                is_in_shopping_cart: in_cart.contains(&r.id),
                name: r.name,
                image: r.image,
                text: r.text,
                cooking_time: r.cooking_time,
            })
        })
        .collect()
}
