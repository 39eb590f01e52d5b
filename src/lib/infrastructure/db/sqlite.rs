//! SQLite module

use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

mod queue;

pub use queue::{QueueConfig, SqliteQueue};

/// Database connection
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    /// The database connection pool
    pub pool: SqlitePool,
}

impl SqliteDatabase {
    /// Create a new database connection, creating the file if absent
    pub async fn new(connection_string: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(connection_string)?.create_if_missing(true);

        Ok(Self {
            pool: SqlitePool::connect_with(options).await?,
        })
    }

    /// Returns the underlying database connection
    pub fn connection(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Database connection details
#[derive(Debug, Parser)]
pub struct DatabaseConnectionDetails {
    /// The database connection string
    #[arg(long, env = "DATABASE_URL")]
    pub connection_string: String,
}
