//! SQLite database layer (embedded, no external dependencies)
//!
//! Holds the identity store, the content store and the like ledger. The
//! ledger is the only component needing multi-statement atomicity: the
//! composite primary key on (news_id, user_id) is the source of truth for
//! "has this user already liked this item", and the denormalized `likes`
//! counter on the news row is adjusted in the same transaction that touches
//! the ledger, so readers never observe the two out of sync.

use anyhow::{Context, Result as AnyResult};
use newswire_types::{Error, NewsItem, Result, User};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn new(database_path: &str) -> AnyResult<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        if let Some(parent) = std::path::Path::new(database_path).parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        tracing::info!("Database initialization complete");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// In-memory database on a single connection, for tests. One connection
    /// also serializes transactions the way a request would hold one.
    #[cfg(test)]
    pub async fn in_memory() -> AnyResult<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;
        Self::run_migrations(&pool).await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> AnyResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                likes INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        // The composite primary key is the uniqueness constraint backing
        // the "at most one like per (item, user) pair" invariant.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS likes (
                news_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (news_id, user_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // User operations

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let result: std::result::Result<UserRow, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES (?1, ?2)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&*self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(store_err(e)),
        }
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users WHERE id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|r| r.into()))
    }

    // News operations

    pub async fn create_news(&self, author_id: i64, content: &str) -> Result<NewsItem> {
        if content.is_empty() {
            return Err(Error::validation("content is required"));
        }

        let row: NewsRow = sqlx::query_as(
            r#"
            INSERT INTO news (author_id, content, likes)
            VALUES (?1, ?2, 0)
            RETURNING id, author_id, content, likes, created_at
            "#,
        )
        .bind(author_id)
        .bind(content)
        .fetch_one(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.into())
    }

    pub async fn find_news_by_id(&self, id: i64) -> Result<Option<NewsItem>> {
        let row: Option<NewsRow> = sqlx::query_as(
            r#"
            SELECT id, author_id, content, likes, created_at
            FROM news WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|r| r.into()))
    }

    /// Top items by like count; ties resolve to the earlier-created item.
    pub async fn top_news(&self, limit: i64) -> Result<Vec<NewsItem>> {
        let rows: Vec<NewsRow> = sqlx::query_as(
            r#"
            SELECT id, author_id, content, likes, created_at
            FROM news
            ORDER BY likes DESC, id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    // Like ledger
    //
    // Both operations run on one pooled connection inside one transaction.
    // A sqlx transaction rolls back when dropped, so every early-return
    // path below is a full rollback.

    pub async fn add_like(&self, news_id: i64, user_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Insert first: the primary key violation, not a pre-check, is what
        // detects a duplicate like.
        let inserted = sqlx::query(
            r#"
            INSERT INTO likes (news_id, user_id) VALUES (?1, ?2)
            "#,
        )
        .bind(news_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(Error::AlreadyLiked(news_id));
            }
            Err(e) => return Err(store_err(e)),
        }

        let updated = sqlx::query(
            r#"
            UPDATE news SET likes = likes + 1 WHERE id = ?1
            "#,
        )
        .bind(news_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // No news row to increment: the item does not exist, and the edge
        // inserted above must not survive.
        if updated.rows_affected() != 1 {
            return Err(Error::NewsNotFound(news_id));
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    pub async fn remove_like(&self, news_id: i64, user_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM likes WHERE news_id = ?1 AND user_id = ?2
            "#,
        )
        .bind(news_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // Exactly one row must have matched; a zero-row delete means there
        // was no like to remove and the counter must not move.
        match deleted.rows_affected() {
            1 => {}
            0 => return Err(Error::NotLiked(news_id)),
            n => {
                return Err(Error::StoreUnavailable(format!(
                    "like ledger matched {} rows for one (news, user) pair",
                    n
                )))
            }
        }

        let updated = sqlx::query(
            r#"
            UPDATE news SET likes = likes - 1 WHERE id = ?1
            "#,
        )
        .bind(news_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if updated.rows_affected() != 1 {
            return Err(Error::NewsNotFound(news_id));
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    /// Ledger cardinality for one item, for asserting counter fidelity.
    #[cfg(test)]
    pub async fn count_likes(&self, news_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM likes WHERE news_id = ?1
            "#,
        )
        .bind(news_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(count)
    }
}

fn store_err(e: sqlx::Error) -> Error {
    Error::StoreUnavailable(e.to_string())
}

// Helper structs for sqlx query_as

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NewsRow {
    id: i64,
    author_id: i64,
    content: String,
    likes: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<NewsRow> for NewsItem {
    fn from(r: NewsRow) -> Self {
        NewsItem {
            id: r.id,
            author_id: r.author_id,
            content: r.content,
            likes: r.likes,
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Arc<Database> {
        Arc::new(Database::in_memory().await.unwrap())
    }

    async fn seed_news(db: &Database, content: &str) -> NewsItem {
        let author = db.create_user("author", "hash").await;
        let author_id = match author {
            Ok(user) => user.id,
            // Tests seed several items; the author only needs to exist once.
            Err(Error::DuplicateUsername(_)) => {
                db.find_user_by_username("author").await.unwrap().unwrap().id
            }
            Err(e) => panic!("seeding author failed: {}", e),
        };
        db.create_news(author_id, content).await.unwrap()
    }

    #[tokio::test]
    async fn creates_and_finds_user() {
        let db = test_db().await;
        let user = db.create_user("alice", "hash-a").await.unwrap();
        assert!(user.id > 0);
        assert_eq!(user.username, "alice");

        let by_name = db.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.password_hash, "hash-a");

        let by_id = db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(db.find_user_by_username("bob").await.unwrap().is_none());
        assert!(db.find_user_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_duplicate_username() {
        let db = test_db().await;
        db.create_user("alice", "hash-a").await.unwrap();
        let err = db.create_user("alice", "hash-b").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateUsername(name) if name == "alice"));
    }

    #[tokio::test]
    async fn concurrent_registrations_admit_one_winner() {
        let db = test_db().await;
        let mut handles = Vec::new();
        for i in 0..4 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.create_user("carol", &format!("hash-{}", i)).await
            }));
        }

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(Error::DuplicateUsername(_)) => duplicates += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(duplicates, 3);
    }

    #[tokio::test]
    async fn rejects_empty_content() {
        let db = test_db().await;
        let err = db.create_news(1, "").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn new_items_start_with_zero_likes() {
        let db = test_db().await;
        let item = seed_news(&db, "hello").await;
        assert_eq!(item.likes, 0);

        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.content, "hello");
        assert_eq!(found.likes, 0);
    }

    #[tokio::test]
    async fn add_like_increments_counter_once() {
        let db = test_db().await;
        let item = seed_news(&db, "liked").await;

        db.add_like(item.id, 42).await.unwrap();
        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.likes, 1);
        assert_eq!(db.count_likes(item.id).await.unwrap(), 1);

        let err = db.add_like(item.id, 42).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyLiked(id) if id == item.id));

        // Rejected duplicate moved nothing.
        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.likes, 1);
        assert_eq!(db.count_likes(item.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_like_roundtrip() {
        let db = test_db().await;
        let item = seed_news(&db, "toggled").await;

        db.add_like(item.id, 7).await.unwrap();
        db.remove_like(item.id, 7).await.unwrap();

        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.likes, 0);
        assert_eq!(db.count_likes(item.id).await.unwrap(), 0);

        // Removing again is a conflict, and the counter must not go negative.
        let err = db.remove_like(item.id, 7).await.unwrap_err();
        assert!(matches!(err, Error::NotLiked(id) if id == item.id));
        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.likes, 0);
    }

    #[tokio::test]
    async fn remove_without_like_never_decrements() {
        let db = test_db().await;
        let item = seed_news(&db, "untouched").await;

        let err = db.remove_like(item.id, 99).await.unwrap_err();
        assert!(matches!(err, Error::NotLiked(_)));

        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.likes, 0);
    }

    #[tokio::test]
    async fn like_on_missing_item_rolls_back_edge() {
        let db = test_db().await;

        let err = db.add_like(12345, 1).await.unwrap_err();
        assert!(matches!(err, Error::NewsNotFound(12345)));

        // The edge insert succeeded inside the transaction; the rollback
        // must have erased it.
        assert_eq!(db.count_likes(12345).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_same_pair_likes_admit_one_winner() {
        let db = test_db().await;
        let item = seed_news(&db, "contested").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let news_id = item.id;
            handles.push(tokio::spawn(async move { db.add_like(news_id, 42).await }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(Error::AlreadyLiked(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);

        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.likes, 1);
        assert_eq!(db.count_likes(item.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_distinct_users_all_count() {
        let db = test_db().await;
        let item = seed_news(&db, "popular").await;

        let mut handles = Vec::new();
        for user_id in 1..=10 {
            let db = db.clone();
            let news_id = item.id;
            handles.push(tokio::spawn(async move { db.add_like(news_id, user_id).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let found = db.find_news_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(found.likes, 10);
        assert_eq!(db.count_likes(item.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn top_news_orders_by_likes_then_insertion() {
        let db = test_db().await;
        let first = seed_news(&db, "five likes").await;
        let second = seed_news(&db, "three likes, earlier").await;
        let third = seed_news(&db, "three likes, later").await;
        let fourth = seed_news(&db, "no likes").await;

        for user_id in 1..=5 {
            db.add_like(first.id, user_id).await.unwrap();
        }
        for user_id in 1..=3 {
            db.add_like(second.id, user_id).await.unwrap();
            db.add_like(third.id, user_id).await.unwrap();
        }

        let top = db.top_news(3).await.unwrap();
        let ids: Vec<i64> = top.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
        assert_eq!(top[0].likes, 5);

        // The limit bounds the result; the zero-like item is cut off.
        assert!(!ids.contains(&fourth.id));

        let all = db.top_news(10).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].id, fourth.id);
    }
}
