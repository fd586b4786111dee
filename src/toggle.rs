// Copyright 2023 Remi Bernotavicius

//! Add-or-remove join rows: favorites, shopping cart entries and follows.
//!
//! Each (user, target) pair is either absent or present. Adding moves absent to present and
//! removing moves present to absent; asking for the state the pair is already in is refused rather
//! than silently accepted. The unique index on each join table is what actually decides a race
//! between two concurrent adds, so a unique violation from the insert counts as "already present".

use crate::context::RequestContext;
use crate::database;
use crate::database::models::{RecipeHandle, RecipeId, UserId};
use crate::error::is_unique_violation;
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::BoolExpressionMethods as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::QueryResult;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Membership {
    Absent,
    Present,
}

/// What happened when a transition was requested.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied,
    AlreadyPresent,
    AlreadyAbsent,
}

/// A join table keyed by (user, target) with a unique index on the pair.
pub trait Relation {
    type Target: Copy;

    /// What the table holds, for log lines.
    const NAME: &'static str;
    /// Reported when adding a pair that is already present.
    const ALREADY_PRESENT: &'static str;
    /// Reported when removing a pair that is absent.
    const ABSENT: &'static str;

    fn insert(
        conn: &mut database::Connection,
        user: UserId,
        target: Self::Target,
    ) -> QueryResult<usize>;

    fn delete(
        conn: &mut database::Connection,
        user: UserId,
        target: Self::Target,
    ) -> QueryResult<usize>;

    fn exists(
        conn: &mut database::Connection,
        user: UserId,
        target: Self::Target,
    ) -> QueryResult<bool>;
}

pub fn membership<R: Relation>(
    conn: &mut database::Connection,
    user: UserId,
    target: R::Target,
) -> QueryResult<Membership> {
    Ok(if R::exists(conn, user, target)? {
        Membership::Present
    } else {
        Membership::Absent
    })
}

pub fn add<R: Relation>(
    conn: &mut database::Connection,
    user: UserId,
    target: R::Target,
) -> QueryResult<Transition> {
    match R::insert(conn, user, target) {
        Ok(_) => Ok(Transition::Applied),
        Err(e) if is_unique_violation(&e) => Ok(Transition::AlreadyPresent),
        Err(e) => Err(e),
    }
}

pub fn remove<R: Relation>(
    conn: &mut database::Connection,
    user: UserId,
    target: R::Target,
) -> QueryResult<Transition> {
    Ok(match R::delete(conn, user, target)? {
        0 => Transition::AlreadyAbsent,
        _ => Transition::Applied,
    })
}

impl Transition {
    /// Turns a refused transition into the error the caller sees.
    pub fn into_result<R: Relation>(self) -> Result<()> {
        match self {
            Self::Applied => Ok(()),
            Self::AlreadyPresent => Err(Error::Conflict(R::ALREADY_PRESENT.into())),
            Self::AlreadyAbsent => Err(Error::NotFound(R::ABSENT.into())),
        }
    }
}

macro_rules! recipe_relation {
    ($name:ident, $table:ident, $already_present:literal, $absent:literal) => {
        pub struct $name;

        impl Relation for $name {
            type Target = RecipeId;

            const NAME: &'static str = stringify!($table);
            const ALREADY_PRESENT: &'static str = $already_present;
            const ABSENT: &'static str = $absent;

            fn insert(
                conn: &mut database::Connection,
                user: UserId,
                recipe: RecipeId,
            ) -> QueryResult<usize> {
                use database::schema::$table::dsl::*;

                diesel::insert_into($table)
                    .values((user_id.eq(user), recipe_id.eq(recipe)))
                    .execute(conn)
            }

            fn delete(
                conn: &mut database::Connection,
                user: UserId,
                recipe: RecipeId,
            ) -> QueryResult<usize> {
                use database::schema::$table::dsl::*;

                diesel::delete($table.filter(user_id.eq(user).and(recipe_id.eq(recipe))))
                    .execute(conn)
            }

            fn exists(
                conn: &mut database::Connection,
                user: UserId,
                recipe: RecipeId,
            ) -> QueryResult<bool> {
                use database::schema::$table::dsl::*;

                diesel::select(diesel::dsl::exists(
                    $table.filter(user_id.eq(user).and(recipe_id.eq(recipe))),
                ))
                .get_result(conn)
            }
        }
    };
}

recipe_relation!(
    Favorite,
    favorites,
    "recipe is already in favorites",
    "recipe in favorites"
);
recipe_relation!(
    ShoppingCart,
    shopping_carts,
    "recipe is already in the shopping cart",
    "recipe in shopping cart"
);

pub struct Follow;

impl Relation for Follow {
    type Target = UserId;

    const NAME: &'static str = "follows";
    const ALREADY_PRESENT: &'static str = "you are already subscribed to this author";
    const ABSENT: &'static str = "subscription";

    fn insert(
        conn: &mut database::Connection,
        user: UserId,
        author: UserId,
    ) -> QueryResult<usize> {
        use database::schema::follows::dsl::*;

        diesel::insert_into(follows)
            .values((user_id.eq(user), author_id.eq(author)))
            .execute(conn)
    }

    fn delete(
        conn: &mut database::Connection,
        user: UserId,
        author: UserId,
    ) -> QueryResult<usize> {
        use database::schema::follows::dsl::*;

        diesel::delete(follows.filter(user_id.eq(user).and(author_id.eq(author)))).execute(conn)
    }

    fn exists(
        conn: &mut database::Connection,
        user: UserId,
        author: UserId,
    ) -> QueryResult<bool> {
        use database::schema::follows::dsl::*;

        diesel::select(diesel::dsl::exists(
            follows.filter(user_id.eq(user).and(author_id.eq(author))),
        ))
        .get_result(conn)
    }
}

fn recipe_handle(conn: &mut database::Connection, recipe: RecipeId) -> Result<RecipeHandle> {
    use database::schema::recipes::dsl::*;

    recipes
        .select(RecipeHandle::as_select())
        .filter(id.eq(recipe))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found(format!("recipe {recipe}")))
}

/// Puts `recipe` into the requester's favorites or cart, returning its short form.
pub fn add_recipe<R: Relation<Target = RecipeId>>(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipe: RecipeId,
) -> Result<RecipeHandle> {
    let user = ctx.require_user()?;
    let handle = recipe_handle(conn, recipe)?;
    add::<R>(conn, user.id, recipe)?.into_result::<R>()?;
    log::info!("user {} added recipe {recipe} to {}", user.id, R::NAME);
    Ok(handle)
}

pub fn remove_recipe<R: Relation<Target = RecipeId>>(
    conn: &mut database::Connection,
    ctx: &RequestContext,
    recipe: RecipeId,
) -> Result<()> {
    let user = ctx.require_user()?;
    recipe_handle(conn, recipe)?;
    remove::<R>(conn, user.id, recipe)?.into_result::<R>()?;
    log::info!("user {} removed recipe {recipe} from {}", user.id, R::NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn favorite_twice_conflicts_and_keeps_one_row() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let recipe = testing::simple_recipe(&mut conn, &alice, "Soup");
        let ctx = RequestContext::for_user(alice.clone());

        let handle = add_recipe::<Favorite>(&mut conn, &ctx, recipe).unwrap();
        assert_eq!(handle.id, recipe);
        assert_eq!(handle.name, "Soup");

        let err = add_recipe::<Favorite>(&mut conn, &ctx, recipe).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "{err:?}");
        assert_eq!(testing::count_favorites(&mut conn), 1);
    }

    #[test]
    fn removing_absent_pair_is_not_found() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let recipe = testing::simple_recipe(&mut conn, &alice, "Soup");
        let ctx = RequestContext::for_user(alice);

        let favorite = remove_recipe::<Favorite>(&mut conn, &ctx, recipe);
        assert!(matches!(favorite, Err(Error::NotFound(_))), "{favorite:?}");
        let cart = remove_recipe::<ShoppingCart>(&mut conn, &ctx, recipe);
        assert!(matches!(cart, Err(Error::NotFound(_))), "{cart:?}");
    }

    #[test]
    fn cart_round_trip_leaves_favorites_alone() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let recipe = testing::simple_recipe(&mut conn, &alice, "Soup");
        let ctx = RequestContext::for_user(alice.clone());

        add_recipe::<ShoppingCart>(&mut conn, &ctx, recipe).unwrap();
        assert_eq!(
            membership::<ShoppingCart>(&mut conn, alice.id, recipe).unwrap(),
            Membership::Present
        );
        assert_eq!(
            membership::<Favorite>(&mut conn, alice.id, recipe).unwrap(),
            Membership::Absent
        );

        remove_recipe::<ShoppingCart>(&mut conn, &ctx, recipe).unwrap();
        assert_eq!(
            membership::<ShoppingCart>(&mut conn, alice.id, recipe).unwrap(),
            Membership::Absent
        );
        assert!(matches!(
            remove_recipe::<ShoppingCart>(&mut conn, &ctx, recipe),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn missing_recipe_is_not_found() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let ctx = RequestContext::for_user(alice);
        let missing = testing::missing_recipe_id(&mut conn);

        assert!(matches!(
            add_recipe::<Favorite>(&mut conn, &ctx, missing),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn anonymous_cannot_toggle() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let recipe = testing::simple_recipe(&mut conn, &alice, "Soup");

        assert!(matches!(
            add_recipe::<Favorite>(&mut conn, &RequestContext::anonymous(), recipe),
            Err(Error::Unauthenticated)
        ));
    }

    #[test]
    fn raw_transitions() {
        let mut conn = database::test_connection();
        let alice = testing::user(&mut conn, "alice");
        let bob = testing::user(&mut conn, "bob");

        assert_eq!(
            add::<Follow>(&mut conn, alice.id, bob.id).unwrap(),
            Transition::Applied
        );
        assert_eq!(
            add::<Follow>(&mut conn, alice.id, bob.id).unwrap(),
            Transition::AlreadyPresent
        );
        assert_eq!(
            remove::<Follow>(&mut conn, alice.id, bob.id).unwrap(),
            Transition::Applied
        );
        assert_eq!(
            remove::<Follow>(&mut conn, alice.id, bob.id).unwrap(),
            Transition::AlreadyAbsent
        );
    }

    #[test]
    fn concurrent_favorites_leave_exactly_one_row() {
        use std::sync::{Arc, Barrier};

        const THREADS: usize = 4;

        let dir = tempfile::tempdir().unwrap();
        let pool =
            database::establish_pool(dir.path().join("data.sqlite"), THREADS as u32).unwrap();
        let (alice, recipe) = {
            let mut conn = pool.get().unwrap();
            let alice = testing::user(&mut conn, "alice");
            let recipe = testing::simple_recipe(&mut conn, &alice, "Soup");
            (alice, recipe)
        };

        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                let ctx = RequestContext::for_user(alice.clone());
                std::thread::spawn(move || {
                    let mut conn = pool.get().unwrap();
                    barrier.wait();
                    add_recipe::<Favorite>(&mut conn, &ctx, recipe).map(|_| ())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for e in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(e, Error::Conflict(_)), "{e:?}");
        }

        let mut conn = pool.get().unwrap();
        assert_eq!(testing::count_favorites(&mut conn), 1);
    }
}
