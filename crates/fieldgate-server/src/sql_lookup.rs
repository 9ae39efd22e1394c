// File: src/sql_lookup.rs
// Purpose: SQLite-backed uniqueness and existence lookups against the users table

use async_trait::async_trait;
use fieldgate_runtime::{ExternalLookup, LookupError, LookupQuery};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

const USERS_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Map a form field to the column it is checked against (Pure function)
///
/// Only whitelisted columns can be interpolated into SQL.
pub fn column_for(field: &str) -> Option<&'static str> {
    match field {
        "email" => Some("email"),
        "username" => Some("username"),
        _ => None,
    }
}

/// Build the COUNT query for a column (Pure function)
fn count_query(column: &str, exclude: bool) -> String {
    let mut sql = format!("SELECT COUNT(*) FROM users WHERE LOWER({}) = LOWER(?)", column);
    if exclude {
        sql.push_str(" AND CAST(id AS TEXT) != ?");
    }
    sql
}

#[derive(Debug, Clone)]
pub struct SqlLookup {
    pool: SqlitePool,
}

impl SqlLookup {
    /// Connect and make sure the users table exists.
    ///
    /// - `sqlite:fieldgate.db`
    /// - `sqlite::memory:` (single connection, so the table is shared)
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(USERS_SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a user, returning its id
    pub async fn create_user(&self, name: &str, email: &str, username: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (name, email, username) VALUES (?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(username)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl ExternalLookup for SqlLookup {
    async fn exists(&self, query: &LookupQuery) -> Result<bool, LookupError> {
        let column = column_for(&query.field).ok_or_else(|| LookupError::UnsupportedField(query.field.clone()))?;
        let sql = count_query(column, query.exclude_id.is_some());

        let mut statement = sqlx::query_scalar::<_, i64>(&sql).bind(query.value.as_str());
        if let Some(id) = &query.exclude_id {
            statement = statement.bind(id.as_str());
        }

        let count = statement
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        Ok(count > 0)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgate_core::LookupCheck;

    async fn lookup() -> SqlLookup {
        let lookup = SqlLookup::connect("sqlite::memory:").await.unwrap();
        lookup.create_user("Existing", "existing@example.com", "existinguser").await.unwrap();
        lookup
    }

    #[test]
    fn test_count_query() {
        assert_eq!(
            count_query("email", false),
            "SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER(?)"
        );
        assert!(count_query("email", true).ends_with("AND CAST(id AS TEXT) != ?"));
        assert_eq!(column_for("password"), None);
    }

    #[tokio::test]
    async fn test_exists_is_case_insensitive() {
        let lookup = lookup().await;
        let query = LookupQuery::new("email", "EXISTING@example.com", LookupCheck::Unique);
        assert!(lookup.exists(&query).await.unwrap());

        let query = LookupQuery::new("username", "someoneelse", LookupCheck::Unique);
        assert!(!lookup.exists(&query).await.unwrap());
    }

    #[tokio::test]
    async fn test_exclude_id_skips_own_record() {
        let lookup = lookup().await;
        let id = lookup.create_user("Ada", "ada@example.com", "ada").await.unwrap();

        let query = LookupQuery::new("username", "ada", LookupCheck::Unique).excluding(id.to_string());
        assert!(!lookup.exists(&query).await.unwrap());

        let query = LookupQuery::new("username", "existinguser", LookupCheck::Unique).excluding(id.to_string());
        assert!(lookup.exists(&query).await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_field() {
        let lookup = lookup().await;
        let query = LookupQuery::new("password", "x", LookupCheck::Exists);
        assert!(matches!(
            lookup.exists(&query).await,
            Err(LookupError::UnsupportedField(field)) if field == "password"
        ));
    }
}
