// Copyright 2023 Remi Bernotavicius

use crate::database;
use crate::database::models::{Ingredient, IngredientId, NewIngredient};
use crate::error::{is_unique_violation, ValidationErrors};
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::EscapeExpressionMethods as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use diesel::TextExpressionMethods as _;
use serde::Deserialize;

const MAX_NAME_LEN: usize = 200;
const MAX_UNIT_LEN: usize = 25;

#[derive(Debug, Deserialize)]
pub struct IngredientCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub measurement_unit: String,
}

/// A LIKE pattern matching anything starting with `prefix`, with the wildcards in `prefix`
/// escaped by `\`.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// All ingredients by name. `name_prefix` keeps only names starting with it, ignoring ASCII case.
pub fn list_ingredients(
    conn: &mut database::Connection,
    name_prefix: Option<&str>,
) -> Result<Vec<Ingredient>> {
    use database::schema::ingredients::dsl::*;

    let mut query = ingredients
        .select(Ingredient::as_select())
        .order_by((name.asc(), measurement_unit.asc(), id.asc()))
        .into_boxed();
    if let Some(prefix) = name_prefix.filter(|p| !p.is_empty()) {
        query = query.filter(name.like(prefix_pattern(prefix)).escape('\\'));
    }
    Ok(query.load(conn)?)
}

pub fn get_ingredient(
    conn: &mut database::Connection,
    ingredient: IngredientId,
) -> Result<Ingredient> {
    use database::schema::ingredients::dsl::*;

    ingredients
        .select(Ingredient::as_select())
        .filter(id.eq(ingredient))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found(format!("ingredient {ingredient}")))
}

pub fn create_ingredient(
    conn: &mut database::Connection,
    new: &IngredientCreate,
) -> Result<Ingredient> {
    use database::schema::ingredients::dsl::*;

    let mut errors = ValidationErrors::new();
    for (field, value, max_len) in [
        ("name", &new.name, MAX_NAME_LEN),
        ("measurement_unit", &new.measurement_unit, MAX_UNIT_LEN),
    ] {
        if value.trim().is_empty() {
            errors.add(field, "this field may not be blank");
        } else if value.chars().count() > max_len {
            errors.add(
                field,
                format!("ensure this field has no more than {max_len} characters"),
            );
        }
    }
    errors.into_result()?;

    let ingredient = diesel::insert_into(ingredients)
        .values(NewIngredient {
            name: &new.name,
            measurement_unit: &new.measurement_unit,
        })
        .returning(Ingredient::as_returning())
        .get_result(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Validation(ValidationErrors::single(
                    "name",
                    "an ingredient with that name and measurement unit already exists",
                ))
            } else {
                e.into()
            }
        })?;
    log::info!(
        "created ingredient {} ({}, {})",
        ingredient.id,
        ingredient.name,
        ingredient.measurement_unit
    );
    Ok(ingredient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn names(found: Vec<Ingredient>) -> Vec<String> {
        found.into_iter().map(|i| i.name).collect()
    }

    #[test]
    fn prefix_filter_ignores_case() {
        let mut conn = database::test_connection();
        for (name, unit) in [
            ("Sugar", "g"),
            ("salt", "g"),
            ("Salt", "pinch"),
            ("Butter", "g"),
        ] {
            testing::ingredient(&mut conn, name, unit);
        }

        assert_eq!(
            names(list_ingredients(&mut conn, Some("SA")).unwrap()),
            ["Salt", "salt"]
        );
        assert_eq!(
            names(list_ingredients(&mut conn, Some("b")).unwrap()),
            ["Butter"]
        );
        assert_eq!(list_ingredients(&mut conn, None).unwrap().len(), 4);
        assert_eq!(list_ingredients(&mut conn, Some("")).unwrap().len(), 4);
    }

    #[test]
    fn wildcards_in_the_prefix_are_literal() {
        let mut conn = database::test_connection();
        testing::ingredient(&mut conn, "50% cream", "ml");
        testing::ingredient(&mut conn, "500 flour", "g");

        assert_eq!(
            names(list_ingredients(&mut conn, Some("50%")).unwrap()),
            ["50% cream"]
        );
        assert!(list_ingredients(&mut conn, Some("_"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn same_name_needs_a_different_unit() {
        let mut conn = database::test_connection();
        let new = IngredientCreate {
            name: "Milk".into(),
            measurement_unit: "ml".into(),
        };
        let milk = create_ingredient(&mut conn, &new).unwrap();
        assert_eq!(get_ingredient(&mut conn, milk.id).unwrap(), milk);

        assert!(matches!(
            create_ingredient(&mut conn, &new),
            Err(Error::Validation(_))
        ));
        create_ingredient(
            &mut conn,
            &IngredientCreate {
                name: "Milk".into(),
                measurement_unit: "cup".into(),
            },
        )
        .unwrap();
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut conn = database::test_connection();
        let Err(Error::Validation(errors)) = create_ingredient(
            &mut conn,
            &IngredientCreate {
                name: "".into(),
                measurement_unit: " ".into(),
            },
        ) else {
            panic!("expected a validation error");
        };
        assert!(errors.get("name").is_some());
        assert!(errors.get("measurement_unit").is_some());
    }

    #[test]
    fn unit_length_limit() {
        let mut conn = database::test_connection();
        create_ingredient(
            &mut conn,
            &IngredientCreate {
                name: "Salt".into(),
                measurement_unit: "u".repeat(25),
            },
        )
        .unwrap();

        let Err(Error::Validation(errors)) = create_ingredient(
            &mut conn,
            &IngredientCreate {
                name: "Pepper".into(),
                measurement_unit: "u".repeat(26),
            },
        ) else {
            panic!("expected a validation error");
        };
        assert_eq!(
            errors.get("measurement_unit").unwrap(),
            ["ensure this field has no more than 25 characters"]
        );
    }
}
