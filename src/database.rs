mod author;
mod book;

use crate::models::{Author, AuthorName, AuthorSummary, Bio, Book, BookTitle, Description};
use crate::repositories::HealthCheck;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!();

/// SQLite-backed implementation of every repository trait.
#[derive(Debug, Clone)]
pub struct Sqlite {
    pool: SqlitePool,
}

impl Sqlite {
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str(path)
            .with_context(|| format!("Invalid database path {path}"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(opts)
            .await
            .with_context(|| format!("Failed to open database at {path}"))?;

        Self::migrated(pool).await
    }

    /// Opens a private in-memory database. A single long-lived connection keeps the
    /// data alive for as long as the pool exists.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database options")?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .context("Failed to open in-memory database")?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> anyhow::Result<Self> {
        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::debug!("database migrations applied");

        Ok(Self { pool })
    }
}

#[async_trait]
impl HealthCheck for Sqlite {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| anyhow!(err).context("Database ping failed"))?;
        Ok(())
    }
}

impl<'r> FromRow<'r, SqliteRow> for Author {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id = try_get_uuid(row, "id")?;
        let name: &str = row.try_get("name")?;
        let bio: &str = row.try_get("bio")?;
        let created_at = row.try_get("created_at")?;
        let updated_at = row.try_get("updated_at")?;

        let name = AuthorName::new_unchecked(name);
        let bio = Bio::new_unchecked(bio);
        Ok(Self::new(id, name, bio, created_at, updated_at))
    }
}

impl<'r> FromRow<'r, SqliteRow> for Book {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id = try_get_uuid(row, "id")?;
        let title: &str = row.try_get("title")?;
        let author_id = try_get_uuid(row, "author_id")?;
        let description: &str = row.try_get("description")?;
        let published_at = row.try_get("published_at")?;
        let created_at = row.try_get("created_at")?;
        let updated_at = row.try_get("updated_at")?;

        let book = Self::new(
            id,
            BookTitle::new_unchecked(title),
            author_id,
            Description::new_unchecked(description),
            published_at,
            created_at,
            updated_at,
        );

        let author_name: Option<&str> = row.try_get("author_name")?;
        let author_bio: Option<&str> = row.try_get("author_bio")?;
        match author_name {
            Some(name) => {
                let summary = AuthorSummary::new(
                    author_id,
                    AuthorName::new_unchecked(name),
                    Bio::new_unchecked(author_bio.unwrap_or_default()),
                );
                Ok(book.with_author(summary))
            }
            None => Ok(book),
        }
    }
}

fn try_get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, sqlx::Error> {
    let raw: &str = row.try_get(column)?;
    Uuid::parse_str(raw).map_err(|err| sqlx::Error::ColumnDecode {
        index: column.into(),
        source: Box::new(err),
    })
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.is_foreign_key_violation();
    }

    false
}
