// Copyright 2023 Remi Bernotavicius

use derive_more::Display;
use diesel::associations::{Associations, Identifiable};
use diesel::deserialize::Queryable;
use diesel::expression::Selectable;
use diesel::prelude::Insertable;
use diesel_derive_newtype::DieselNewType;
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            DieselNewType,
            Debug,
            Display,
            Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Copy,
            Clone,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

id_type!(UserId);
id_type!(TagId);
id_type!(IngredientId);
id_type!(RecipeId);
id_type!(IngredientAmountId);

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::database::schema::users)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::database::schema::users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = crate::database::schema::tags)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::database::schema::tags)]
pub struct NewTag<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub slug: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = crate::database::schema::ingredients)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::database::schema::ingredients)]
pub struct NewIngredient<'a> {
    pub name: &'a str,
    pub measurement_unit: &'a str,
}

#[derive(Associations, Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(belongs_to(User, foreign_key = author_id))]
#[diesel(table_name = crate::database::schema::recipes)]
pub struct Recipe {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::database::schema::recipes)]
pub struct NewRecipe<'a> {
    pub author_id: UserId,
    pub name: &'a str,
    pub image: &'a str,
    pub text: &'a str,
    pub cooking_time: i32,
    pub created_at: chrono::NaiveDateTime,
}

/// The short form of a recipe, used in favorite/cart responses and subscriptions.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = crate::database::schema::recipes)]
pub struct RecipeHandle {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Associations, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(belongs_to(Recipe))]
#[diesel(belongs_to(Ingredient))]
#[diesel(table_name = crate::database::schema::ingredient_amounts)]
pub struct IngredientAmount {
    pub id: IngredientAmountId,
    pub recipe_id: RecipeId,
    pub ingredient_id: IngredientId,
    pub amount: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::database::schema::ingredient_amounts)]
pub struct NewIngredientAmount {
    pub recipe_id: RecipeId,
    pub ingredient_id: IngredientId,
    pub amount: i32,
}

#[derive(Associations, Queryable, Selectable, Identifiable, Insertable, Debug, Clone)]
#[diesel(belongs_to(Recipe))]
#[diesel(belongs_to(Tag))]
#[diesel(primary_key(recipe_id, tag_id))]
#[diesel(table_name = crate::database::schema::recipe_tags)]
pub struct RecipeTag {
    pub recipe_id: RecipeId,
    pub tag_id: TagId,
}
