//! Database layer
//!
//! Authors Haven stores everything in a relational database:
//! - SQLite (default, and what the test suite runs against)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration. Schema changes
//! live in [`migrations`]; each aggregate has a repository trait plus an
//! sqlx implementation in [`repositories`].
//!
//! # Usage
//!
//! ```ignore
//! use authors_haven::config::DatabaseConfig;
//! use authors_haven::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
