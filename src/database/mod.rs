// Copyright 2023 Remi Bernotavicius

use diesel::connection::SimpleConnection as _;
use diesel::r2d2::{ConnectionManager, CustomizeConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;
use std::time::Duration;

pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;
pub type Pool = diesel::r2d2::Pool<ConnectionManager<Connection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Applied to every connection the pool opens. SQLite leaves foreign keys off unless asked, and
/// all the cascading deletes depend on them.
#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<Connection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn establish_pool(path: impl AsRef<Path>, max_size: u32) -> crate::Result<Pool> {
    let path = path.as_ref();
    let url = path
        .to_str()
        .ok_or_else(|| crate::Error::Config(format!("database path {path:?} is not UTF-8")))?;

    let pool = Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(ConnectionManager::new(url))?;

    let mut conn = pool.get()?;
    conn.batch_execute("PRAGMA journal_mode = WAL;")?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

pub fn run_migrations(conn: &mut Connection) -> crate::Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(crate::Error::Migration)?;
    for version in applied {
        log::info!("applied migration {version}");
    }
    Ok(())
}

/// A fresh in-memory database with the schema applied.
#[cfg(test)]
pub fn test_connection() -> Connection {
    use diesel::Connection as _;

    let mut conn = Connection::establish(":memory:").unwrap();
    conn.batch_execute("PRAGMA foreign_keys = ON;").unwrap();
    run_migrations(&mut conn).unwrap();
    conn
}

#[test]
fn migrations() {
    let mut conn = test_connection();
    conn.revert_all_migrations(MIGRATIONS).unwrap();
    assert!(conn.run_pending_migrations(MIGRATIONS).unwrap().len() > 0);
    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
}

#[test]
fn pool_sets_connection_pragmas() {
    use diesel::RunQueryDsl as _;

    #[derive(diesel::QueryableByName)]
    struct ForeignKeys {
        #[diesel(sql_type = diesel::sql_types::Integer)]
        foreign_keys: i32,
    }

    #[derive(diesel::QueryableByName)]
    struct BusyTimeout {
        #[diesel(sql_type = diesel::sql_types::Integer)]
        timeout: i32,
    }

    let dir = tempfile::tempdir().unwrap();
    let pool = establish_pool(dir.path().join("data.sqlite"), 2).unwrap();
    let mut conn = pool.get().unwrap();
    let pragma: ForeignKeys = diesel::sql_query("PRAGMA foreign_keys")
        .get_result(&mut *conn)
        .unwrap();
    assert_eq!(pragma.foreign_keys, 1);

    let pragma: BusyTimeout = diesel::sql_query("PRAGMA busy_timeout")
        .get_result(&mut *conn)
        .unwrap();
    assert_eq!(pragma.timeout, 5000);
}
