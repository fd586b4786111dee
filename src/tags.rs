// Copyright 2023 Remi Bernotavicius

use crate::database;
use crate::database::models::{NewTag, Tag, TagId};
use crate::error::{is_unique_violation, ValidationErrors};
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use serde::Deserialize;

const MAX_NAME_LEN: usize = 150;
const MAX_SLUG_LEN: usize = 150;

#[derive(Debug, Deserialize)]
pub struct TagCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub slug: String,
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn list_tags(conn: &mut database::Connection) -> Result<Vec<Tag>> {
    use database::schema::tags::dsl::*;

    Ok(tags
        .select(Tag::as_select())
        .order_by((name.asc(), id.asc()))
        .load(conn)?)
}

pub fn get_tag(conn: &mut database::Connection, tag: TagId) -> Result<Tag> {
    use database::schema::tags::dsl::*;

    tags.select(Tag::as_select())
        .filter(id.eq(tag))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found(format!("tag {tag}")))
}

pub fn create_tag(conn: &mut database::Connection, new: &TagCreate) -> Result<Tag> {
    use database::schema::tags::dsl::*;

    let mut errors = ValidationErrors::new();
    if new.name.trim().is_empty() {
        errors.add("name", "this field may not be blank");
    } else if new.name.chars().count() > MAX_NAME_LEN {
        errors.add(
            "name",
            format!("ensure this field has no more than {MAX_NAME_LEN} characters"),
        );
    }
    if !is_hex_color(&new.color) {
        errors.add("color", "enter a color in the form #RRGGBB");
    }
    if !is_slug(&new.slug) {
        errors.add(
            "slug",
            "may contain only letters, digits, hyphens and underscores",
        );
    } else if new.slug.len() > MAX_SLUG_LEN {
        errors.add(
            "slug",
            format!("ensure this field has no more than {MAX_SLUG_LEN} characters"),
        );
    }

    // Colors are stored lowercase.
    let stored_color = new.color.to_lowercase();
    for (field, taken) in [
        (
            "name",
            diesel::select(diesel::dsl::exists(tags.filter(name.eq(&new.name))))
                .get_result::<bool>(conn)?,
        ),
        (
            "color",
            diesel::select(diesel::dsl::exists(tags.filter(color.eq(&stored_color))))
                .get_result::<bool>(conn)?,
        ),
        (
            "slug",
            diesel::select(diesel::dsl::exists(tags.filter(slug.eq(&new.slug))))
                .get_result::<bool>(conn)?,
        ),
    ] {
        if taken {
            errors.add(field, format!("a tag with that {field} already exists"));
        }
    }
    errors.into_result()?;

    let tag = diesel::insert_into(tags)
        .values(NewTag {
            name: &new.name,
            color: &stored_color,
            slug: &new.slug,
        })
        .returning(Tag::as_returning())
        .get_result(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("a tag with that name, color or slug already exists".into())
            } else {
                e.into()
            }
        })?;
    log::info!("created tag {} ({})", tag.id, tag.slug);
    Ok(tag)
}
