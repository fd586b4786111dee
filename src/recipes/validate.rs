// Copyright 2023 Remi Bernotavicius

use crate::database::models::{IngredientId, TagId};
use crate::error::ValidationErrors;
use crate::Result;
use serde::Deserialize;
use std::collections::HashSet;

pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientLine {
    pub id: IngredientId,
    pub amount: i32,
}

/// The write shape of a recipe, as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeWrite {
    #[serde(default)]
    pub ingredients: Vec<IngredientLine>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub image: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub cooking_time: i32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// A recipe payload that has passed every rule in [`RecipeWrite::validate`].
#[derive(Debug, Clone)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<String>,
    pub ingredients: Vec<IngredientLine>,
    pub tags: Vec<TagId>,
}

impl RecipeWrite {
    /// Checks every rule and reports all the broken ones together.
    pub fn validate(self, mode: WriteMode) -> Result<ValidRecipe> {
        let mut errors = ValidationErrors::new();

        if self.tags.is_empty() {
            errors.add("tags", "at least one tag is required");
        }
        let mut seen_tags = HashSet::new();
        for tag in &self.tags {
            if !seen_tags.insert(*tag) {
                errors.add("tags", format!("tag {tag} is listed more than once"));
            }
        }

        if self.ingredients.is_empty() {
            errors.add("ingredients", "at least one ingredient is required");
        }
        let mut seen_ingredients = HashSet::new();
        for line in &self.ingredients {
            if !seen_ingredients.insert(line.id) {
                errors.add(
                    "ingredients",
                    format!("ingredient {} is listed more than once", line.id),
                );
            }
            if line.amount <= 0 {
                errors.add(
                    "ingredients",
                    format!("amount of ingredient {} must be greater than 0", line.id),
                );
            }
        }

        if self.cooking_time < 1 {
            errors.add("cooking_time", "cooking time must be at least 1 minute");
        }

        if self.name.trim().is_empty() {
            errors.add("name", "this field may not be blank");
        } else if self.name.chars().count() > MAX_NAME_LEN {
            errors.add(
                "name",
                format!("ensure this field has no more than {MAX_NAME_LEN} characters"),
            );
        }
        if self.text.trim().is_empty() {
            errors.add("text", "this field may not be blank");
        }

        match (&self.image, mode) {
            (None, WriteMode::Create) => errors.add("image", "an image is required"),
            (Some(image), _) if image.trim().is_empty() => {
                errors.add("image", "this field may not be blank")
            }
            _ => {}
        }

        errors.into_result()?;
        Ok(ValidRecipe {
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
            image: self.image,
            ingredients: self.ingredients,
            tags: self.tags,
        })
    }
}
