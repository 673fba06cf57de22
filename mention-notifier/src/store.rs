use crate::traits::DedupStore;
use crate::types::{NaturalKey, NotifierError, Result, SeenTable};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// SQLite-backed record of every item already announced, one table per
/// `SeenTable`. Rows are only ever inserted.
pub struct SeenStore {
    db: SqlitePool,
}

impl SeenStore {
    /// Opens (creating if needed) the SQLite file at `database_file`.
    /// A `sqlite:` URL is passed through untouched, which allows
    /// `sqlite::memory:` in tests.
    pub async fn open(database_file: &str) -> Result<Self> {
        let options = if database_file.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(database_file)?
        } else {
            SqliteConnectOptions::new().filename(database_file)
        };
        let options = options.create_if_missing(true);

        // A single connection keeps an in-memory database alive for the
        // whole run and matches the strictly sequential access pattern.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        info!("Opened dedup store: {}", database_file);
        Ok(Self { db })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::open("sqlite::memory:").await
    }

    pub async fn count(&self, table: &SeenTable) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", ident(table.name)?);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.db).await?;
        Ok(count)
    }

    /// Titles in insertion order, mostly for inspection and tests.
    pub async fn titles(&self, table: &SeenTable) -> Result<Vec<String>> {
        let sql = format!("SELECT title FROM {} ORDER BY id", ident(table.name)?);
        let titles: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.db).await?;
        Ok(titles)
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[async_trait]
impl DedupStore for SeenStore {
    async fn ensure_schema(&self, table: &SeenTable) -> Result<()> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {} {} NOT NULL UNIQUE,
                title TEXT NOT NULL DEFAULT ''
            )
            "#,
            ident(table.name)?,
            ident(table.key_column)?,
            table.key_kind.sql_type(),
        );
        sqlx::query(&sql).execute(&self.db).await?;

        debug!(table = table.name, "Ensured schema");
        Ok(())
    }

    async fn exists(&self, table: &SeenTable, key: &NaturalKey) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
            ident(table.name)?,
            ident(table.key_column)?
        );
        let query = sqlx::query(&sql);
        let query = match key {
            NaturalKey::Int(value) => query.bind(*value),
            NaturalKey::Text(value) => query.bind(value.as_str()),
        };
        let row = query.fetch_optional(&self.db).await?;
        Ok(row.is_some())
    }

    async fn insert(&self, table: &SeenTable, key: &NaturalKey, title: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}, title) VALUES (?, ?)",
            ident(table.name)?,
            ident(table.key_column)?
        );
        let query = sqlx::query(&sql);
        let query = match key {
            NaturalKey::Int(value) => query.bind(*value),
            NaturalKey::Text(value) => query.bind(value.as_str()),
        };
        query.bind(title).execute(&self.db).await?;
        Ok(())
    }
}

/// Table and column names come from constants, but are still checked before
/// being spliced into SQL.
fn ident(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(NotifierError::Config(format!("Invalid table identifier: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyKind;

    const QUESTIONS: SeenTable = SeenTable {
        name: "questions",
        key_column: "question_id",
        key_kind: KeyKind::Integer,
    };

    #[test]
    fn rejects_odd_identifiers() {
        assert!(ident("reddit_posts").is_ok());
        assert!(ident("posts; DROP TABLE x").is_err());
        assert!(ident("1posts").is_err());
        assert!(ident("").is_err());
    }

    #[tokio::test]
    async fn schema_is_idempotent() {
        let store = SeenStore::in_memory().await.unwrap();
        store.ensure_schema(&QUESTIONS).await.unwrap();
        store.ensure_schema(&QUESTIONS).await.unwrap();
        assert_eq!(store.count(&QUESTIONS).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn natural_key_is_unique() {
        let store = SeenStore::in_memory().await.unwrap();
        store.ensure_schema(&QUESTIONS).await.unwrap();

        let key = NaturalKey::Int(7);
        assert!(!store.exists(&QUESTIONS, &key).await.unwrap());
        store.insert(&QUESTIONS, &key, "How do I deploy?").await.unwrap();
        assert!(store.exists(&QUESTIONS, &key).await.unwrap());

        let second = store.insert(&QUESTIONS, &key, "How do I deploy?").await;
        assert!(matches!(second, Err(NotifierError::Database(_))));
        assert_eq!(store.count(&QUESTIONS).await.unwrap(), 1);
    }
}
