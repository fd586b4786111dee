// Copyright 2023 Remi Bernotavicius

use crate::context::RequestContext;
use crate::database;
use crate::database::models::{NewUser, RecipeHandle, User, UserId};
use crate::error::{is_unique_violation, ValidationErrors};
use crate::pagination::PageRequest;
use crate::toggle::{self, Follow};
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::ExpressionMethods as _;
use diesel::JoinOnDsl as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 150;

#[derive(Debug, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// A user as seen by the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

/// An author the requester follows, with a preview of their recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<RecipeHandle>,
    pub recipes_count: i64,
}

fn check_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    max_len: usize,
) {
    if value.trim().is_empty() {
        errors.add(field, "this field may not be blank");
    } else if value.chars().count() > max_len {
        errors.add(field, format!("ensure this field has no more than {max_len} characters"));
    }
}

fn validate_username(errors: &mut ValidationErrors, username: &str) {
    check_text(errors, "username", username, MAX_NAME_LEN);
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "may contain only letters, digits and @/./+/-/_ characters",
        );
    }
}

fn validate_email(errors: &mut ValidationErrors, email: &str) {
    check_text(errors, "email", email, MAX_EMAIL_LEN);
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => errors.add("email", "enter a valid email address"),
    }
}

pub fn create_user(conn: &mut database::Connection, new: &UserCreate) -> Result<User> {
    use database::schema::users::dsl::*;

    let mut errors = ValidationErrors::new();
    validate_email(&mut errors, &new.email);
    validate_username(&mut errors, &new.username);
    check_text(&mut errors, "first_name", &new.first_name, MAX_NAME_LEN);
    check_text(&mut errors, "last_name", &new.last_name, MAX_NAME_LEN);

    let email_taken: bool =
        diesel::select(diesel::dsl::exists(users.filter(email.eq(&new.email)))).get_result(conn)?;
    if email_taken {
        errors.add("email", "a user with that email already exists");
    }
    let username_taken: bool =
        diesel::select(diesel::dsl::exists(users.filter(username.eq(&new.username))))
            .get_result(conn)?;
    if username_taken {
        errors.add("username", "a user with that username already exists");
    }
    errors.into_result()?;

    let user = diesel::insert_into(users)
        .values(NewUser {
            email: &new.email,
            username: &new.username,
            first_name: &new.first_name,
            last_name: &new.last_name,
        })
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("a user with that email or username already exists".into())
            } else {
                e.into()
            }
        })?;
    log::info!("created user {} ({})", user.id, user.username);
    Ok(user)
}

pub fn find_user(conn: &mut database::Connection, user: UserId) -> Result<User> {
    use database::schema::users::dsl::*;

    users
        .select(User::as_select())
        .filter(id.eq(user))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found(format!("user {user}")))
}

/// Looks up the login identifier handed over by the authentication layer.
pub fn find_by_email(conn: &mut database::Connection, login: &str) -> Result<Option<User>> {
    use database::schema::users::dsl::*;

    Ok(users
        .select(User::as_select())
        .filter(email.eq(login))
        .get_result(conn)
        .optional()?)
}

pub fn list_users(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    page: PageRequest,
) -> Result<(Vec<UserView>, i64)> {
    use database::schema::users::dsl::*;

    let total = users.count().get_result(conn)?;
    let page_users = users
        .select(User::as_select())
        .order_by(id.asc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((user_views(conn, ctx, page_users)?, total))
}

pub fn get_user(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    user: UserId,
) -> Result<UserView> {
    let user = find_user(conn, user)?;
    user_view(conn, ctx, user)
}

pub fn me(conn: &mut database::Connection, ctx: &RequestContext) -> Result<UserView> {
    let user = ctx.require_user()?.clone();
    user_view(conn, ctx, user)
}

pub fn user_view(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    user: User,
) -> Result<UserView> {
    let is_subscribed = match ctx.user_id() {
        Some(me) if me != user.id => {
            toggle::membership::<Follow>(conn, me, user.id)? == toggle::Membership::Present
        }
        _ => false,
    };
    Ok(UserView::new(user, is_subscribed))
}

/// Renders many users at once, resolving `is_subscribed` with a single query.
pub fn user_views(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    users: Vec<User>,
) -> Result<Vec<UserView>> {
    let followed: HashSet<UserId> = match ctx.user_id() {
        Some(me) => {
            use database::schema::follows::dsl::*;

            follows
                .select(author_id)
                .filter(user_id.eq(me))
                .filter(author_id.eq_any(users.iter().map(|u| u.id)))
                .load(conn)?
                .into_iter()
                .collect()
        }
        None => HashSet::new(),
    };
    Ok(users
        .into_iter()
        .map(|u| {
            let subscribed = followed.contains(&u.id);
            UserView::new(u, subscribed)
        })
        .collect())
}

fn recipe_previews(
    conn: &mut database::Connection,
    authors: &[UserId],
    recipes_limit: Option<usize>,
) -> Result<HashMap<UserId, (Vec<RecipeHandle>, i64)>> {
    use database::schema::recipes::dsl::*;

    let rows: Vec<(UserId, RecipeHandle)> = recipes
        .select((author_id, RecipeHandle::as_select()))
        .filter(author_id.eq_any(authors.iter().copied()))
        .order_by((created_at.desc(), id.desc()))
        .load(conn)?;

    let mut previews: HashMap<UserId, (Vec<RecipeHandle>, i64)> = HashMap::new();
    for (author, recipe) in rows {
        let (shown, count) = previews.entry(author).or_default();
        if recipes_limit.map_or(true, |limit| shown.len() < limit) {
            shown.push(recipe);
        }
        *count += 1;
    }
    Ok(previews)
}

fn subscription_views(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    authors: Vec<User>,
    recipes_limit: Option<usize>,
) -> Result<Vec<SubscriptionView>> {
    let ids: Vec<UserId> = authors.iter().map(|a| a.id).collect();
    let mut previews = recipe_previews(conn, &ids, recipes_limit)?;
    Ok(user_views(conn, ctx, authors)?
        .into_iter()
        .map(|user| {
            let (recipes, recipes_count) = previews.remove(&user.id).unwrap_or_default();
            SubscriptionView {
                user,
                recipes,
                recipes_count,
            }
        })
        .collect())
}

/// The authors the requester follows, in the order they were followed.
pub fn list_subscriptions(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    page: PageRequest,
    recipes_limit: Option<usize>,
) -> Result<(Vec<SubscriptionView>, i64)> {
    use database::schema::{follows, users};

    let me = ctx.require_user()?.id;
    let total = follows::table
        .filter(follows::user_id.eq(me))
        .count()
        .get_result(conn)?;
    let authors = follows::table
        .inner_join(users::table.on(users::id.eq(follows::author_id)))
        .select(User::as_select())
        .filter(follows::user_id.eq(me))
        .order_by(follows::id.asc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((subscription_views(conn, ctx, authors, recipes_limit)?, total))
}

pub fn subscribe(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    author: UserId,
    recipes_limit: Option<usize>,
) -> Result<SubscriptionView> {
    let me = ctx.require_user()?.id;
    if me == author {
        return Err(Error::SelfReference);
    }
    let author = find_user(conn, author)?;
    toggle::add::<Follow>(conn, me, author.id)?.into_result::<Follow>()?;
    log::info!("user {me} subscribed to {}", author.id);

    let mut views = subscription_views(conn, ctx, vec![author], recipes_limit)?;
    views
        .pop()
        .ok_or_else(|| Error::not_found("subscription"))
}

pub fn unsubscribe(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    author: UserId,
) -> Result<()> {
    let me = ctx.require_user()?.id;
    if me == author {
        return Err(Error::SelfReference);
    }
    find_user(conn, author)?;
    toggle::remove::<Follow>(conn, me, author)?.into_result::<Follow>()?;
    log::info!("user {me} unsubscribed from {author}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn new_user(email: &str, username: &str) -> UserCreate {
        UserCreate {
            email: email.into(),
            username: username.into(),
            first_name: "First".into(),
            last_name: "Last".into(),
        }
    }

    #[test]
    fn create_and_find() {
        let mut conn = database::test_connection();
        let user = create_user(&mut conn, &new_user("cook@example.com", "cook")).unwrap();
        assert_eq!(find_user(&mut conn, user.id).unwrap(), user);
        assert_eq!(
            find_by_email(&mut conn, "cook@example.com").unwrap(),
            Some(user)
        );
        assert_eq!(find_by_email(&mut conn, "nobody@example.com").unwrap(), None);
    }

    #[test]
    fn duplicate_email_and_username_are_field_errors() {
        let mut conn = database::test_connection();
        create_user(&mut conn, &new_user("cook@example.com", "cook")).unwrap();

        let Err(Error::Validation(errors)) =
            create_user(&mut conn, &new_user("cook@example.com", "cook"))
        else {
            panic!("expected a validation error");
        };
        assert!(errors.get("email").is_some());
        assert!(errors.get("username").is_some());
    }

    #[test]
    fn malformed_user_is_rejected() {
        let mut conn = database::test_connection();
        let Err(Error::Validation(errors)) =
            create_user(&mut conn, &new_user("not-an-email", "bad name!"))
        else {
            panic!("expected a validation error");
        };
        assert!(errors.get("email").is_some());
        assert!(errors.get("username").is_some());
    }

    #[test]
    fn self_follow_is_always_rejected() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let ctx = RequestContext::for_user(alice.clone());

        assert!(matches!(
            subscribe(&mut conn, &ctx, alice.id, None),
            Err(Error::SelfReference)
        ));
        assert!(matches!(
            unsubscribe(&mut conn, &ctx, alice.id),
            Err(Error::SelfReference)
        ));
        assert!(matches!(
            subscribe(&mut conn, &ctx, alice.id, None),
            Err(Error::SelfReference)
        ));
    }

    #[test]
    fn follow_twice_is_a_conflict_not_a_self_reference() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");
        let ctx = RequestContext::for_user(alice.clone());

        let view = subscribe(&mut conn, &ctx, bob.id, None).unwrap();
        assert_eq!(view.user.id, bob.id);
        assert!(view.user.is_subscribed);

        assert!(matches!(
            subscribe(&mut conn, &ctx, bob.id, None),
            Err(Error::Conflict(_))
        ));
        unsubscribe(&mut conn, &ctx, bob.id).unwrap();
        assert!(matches!(
            unsubscribe(&mut conn, &ctx, bob.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn following_a_missing_author_is_not_found() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");
        testing::delete_user(&mut conn, bob.id);
        let ctx = RequestContext::for_user(alice);

        assert!(matches!(
            subscribe(&mut conn, &ctx, bob.id, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn is_subscribed_depends_on_requester() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");
        let carol = testing::user(&mut conn, "carol");
        subscribe(
            &mut conn,
            &RequestContext::for_user(alice.clone()),
            bob.id,
            None,
        )
        .unwrap();

        let as_alice = RequestContext::for_user(alice.clone());
        let as_carol = RequestContext::for_user(carol);
        assert!(get_user(&mut conn, &as_alice, bob.id).unwrap().is_subscribed);
        assert!(!get_user(&mut conn, &as_carol, bob.id).unwrap().is_subscribed);
        assert!(
            !get_user(&mut conn, &RequestContext::anonymous(), bob.id)
                .unwrap()
                .is_subscribed
        );
        assert!(!me(&mut conn, &as_alice).unwrap().is_subscribed);

        let (views, total) = list_users(&mut conn, &as_alice, PageRequest::new(1, 10)).unwrap();
        assert_eq!(total, 3);
        let subscribed: Vec<_> = views
            .iter()
            .filter(|v| v.is_subscribed)
            .map(|v| v.id)
            .collect();
        assert_eq!(subscribed, [bob.id]);
    }

    #[test]
    fn subscriptions_carry_limited_recipes_and_full_count() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");
        let carol = testing::user(&mut conn, "carol");
        for name in ["Soup", "Stew", "Salad"] {
            testing::simple_recipe(&mut conn, &bob, name);
        }
        let ctx = RequestContext::for_user(alice);
        subscribe(&mut conn, &ctx, bob.id, None).unwrap();
        subscribe(&mut conn, &ctx, carol.id, None).unwrap();

        let (views, total) =
            list_subscriptions(&mut conn, &ctx, PageRequest::new(1, 10), Some(2)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(views[0].user.id, bob.id);
        assert_eq!(views[0].recipes_count, 3);
        let names: Vec<_> = views[0].recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Salad", "Stew"]);
        assert_eq!(views[1].user.id, carol.id);
        assert_eq!(views[1].recipes_count, 0);
        assert!(views[1].recipes.is_empty());

        assert!(matches!(
            list_subscriptions(
                &mut conn,
                &RequestContext::anonymous(),
                PageRequest::new(1, 10),
                None
            ),
            Err(Error::Unauthenticated)
        ));
    }
}
