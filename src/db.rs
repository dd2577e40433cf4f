use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedFollow {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A follow joined with the names of both sides.
#[derive(Debug, Clone, FromRow)]
pub struct FeedFollowDetails {
    pub id: i64,
    pub user_name: String,
    pub feed_name: String,
    pub feed_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedWithOwner {
    pub name: String,
    pub url: String,
    pub owner: String,
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> sqlx::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                last_fetched_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, feed_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched
            ON feeds(last_fetched_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_user(&self, name: &str) -> sqlx::Result<User> {
        let now = timestamp(Utc::now());
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_user(&self, name: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_users(&self) -> sqlx::Result<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    /// Removes every user along with the feeds they own and all follows.
    pub async fn delete_all_users(&self) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM feed_follows")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM feeds").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
        tx.commit().await
    }

    pub async fn create_feed(&self, name: &str, url: &str, user_id: i64) -> sqlx::Result<Feed> {
        let now = timestamp(Utc::now());
        sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_feed_by_url(&self, url: &str) -> sqlx::Result<Option<Feed>> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_feeds(&self) -> sqlx::Result<Vec<FeedWithOwner>> {
        sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT feeds.name AS name, feeds.url AS url, users.name AS owner
            FROM feeds
            JOIN users ON users.id = feeds.user_id
            ORDER BY feeds.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// The feed fetched longest ago, never-fetched feeds first, ties by id.
    pub async fn next_feed_to_fetch(&self) -> sqlx::Result<Option<Feed>> {
        sqlx::query_as::<_, Feed>(
            r#"
            SELECT * FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
    }

    /// Returns `None` when no feed has this id.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> sqlx::Result<Option<Feed>> {
        let at = timestamp(at);
        sqlx::query_as::<_, Feed>(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&at)
        .bind(&at)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> sqlx::Result<FeedFollowDetails> {
        let now = timestamp(Utc::now());
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query_as::<_, FeedFollowDetails>(
            r#"
            SELECT feed_follows.id AS id,
                   users.name AS user_name,
                   feeds.name AS feed_name,
                   feeds.url AS feed_url,
                   feed_follows.created_at AS created_at
            FROM feed_follows
            JOIN users ON users.id = feed_follows.user_id
            JOIN feeds ON feeds.id = feed_follows.feed_id
            WHERE feed_follows.id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_feed_follows_for_user(
        &self,
        user_id: i64,
    ) -> sqlx::Result<Vec<FeedFollowDetails>> {
        sqlx::query_as::<_, FeedFollowDetails>(
            r#"
            SELECT feed_follows.id AS id,
                   users.name AS user_name,
                   feeds.name AS feed_name,
                   feeds.url AS feed_url,
                   feed_follows.created_at AS created_at
            FROM feed_follows
            JOIN users ON users.id = feed_follows.user_id
            JOIN feeds ON feeds.id = feed_follows.feed_id
            WHERE feed_follows.user_id = ?
            ORDER BY feed_follows.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Deletes the user's follow of the feed at `url`. An empty result means
    /// there was nothing to delete.
    pub async fn delete_feed_follow_by_url(
        &self,
        user_id: i64,
        url: &str,
    ) -> sqlx::Result<Vec<FeedFollow>> {
        sqlx::query_as::<_, FeedFollow>(
            r#"
            DELETE FROM feed_follows
            WHERE user_id = ?
              AND feed_id IN (SELECT id FROM feeds WHERE url = ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(url)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    async fn create_user_with_feeds(db: &Database, urls: &[&str]) -> (User, Vec<Feed>) {
        let user = db.create_user("owner").await.unwrap();
        let mut feeds = Vec::new();
        for (i, url) in urls.iter().enumerate() {
            feeds.push(
                db.create_feed(&format!("Feed {}", i + 1), url, user.id)
                    .await
                    .unwrap(),
            );
        }
        (user, feeds)
    }

    // Database initialization tests
    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_creation() {
            let db = Database::new("sqlite::memory:").await;
            assert!(db.is_ok());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            let result = db.initialize().await;
            assert!(result.is_ok());
        }
    }

    mod user_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_and_get_user() {
            let db = create_test_db().await;

            let created = db.create_user("alice").await.unwrap();
            let fetched = db.get_user("alice").await.unwrap();

            assert_eq!(created.name, "alice");
            assert_eq!(fetched, Some(created));
        }

        #[tokio::test]
        async fn test_get_missing_user() {
            let db = create_test_db().await;
            assert!(db.get_user("nobody").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_duplicate_user_is_unique_violation() {
            let db = create_test_db().await;
            db.create_user("alice").await.unwrap();

            let err = db.create_user("alice").await.unwrap_err();
            assert!(is_unique_violation(&err));
        }

        #[tokio::test]
        async fn test_get_users_sorted_by_name() {
            let db = create_test_db().await;
            db.create_user("carol").await.unwrap();
            db.create_user("alice").await.unwrap();
            db.create_user("bob").await.unwrap();

            let names: Vec<String> = db
                .get_users()
                .await
                .unwrap()
                .into_iter()
                .map(|u| u.name)
                .collect();
            assert_eq!(names, vec!["alice", "bob", "carol"]);
        }

        #[tokio::test]
        async fn test_delete_all_users_cascades() {
            let db = create_test_db().await;
            let (user, feeds) = create_user_with_feeds(&db, &["https://a.com/rss"]).await;
            db.create_feed_follow(user.id, feeds[0].id).await.unwrap();

            db.delete_all_users().await.unwrap();

            assert!(db.get_users().await.unwrap().is_empty());
            assert!(db.get_feeds().await.unwrap().is_empty());
            assert!(db
                .get_feed_follows_for_user(user.id)
                .await
                .unwrap()
                .is_empty());
        }
    }

    mod feed_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_feed_starts_unfetched() {
            let db = create_test_db().await;
            let (user, feeds) = create_user_with_feeds(&db, &["https://a.com/rss"]).await;

            assert_eq!(feeds[0].user_id, user.id);
            assert!(feeds[0].last_fetched_at.is_none());
        }

        #[tokio::test]
        async fn test_duplicate_feed_url_is_unique_violation() {
            let db = create_test_db().await;
            let (user, _) = create_user_with_feeds(&db, &["https://a.com/rss"]).await;

            let err = db
                .create_feed("Again", "https://a.com/rss", user.id)
                .await
                .unwrap_err();
            assert!(is_unique_violation(&err));
        }

        #[tokio::test]
        async fn test_get_feeds_includes_owner() {
            let db = create_test_db().await;
            create_user_with_feeds(&db, &["https://a.com/rss", "https://b.com/rss"]).await;

            let feeds = db.get_feeds().await.unwrap();
            assert_eq!(feeds.len(), 2);
            assert_eq!(feeds[0].name, "Feed 1");
            assert_eq!(feeds[0].owner, "owner");
            assert_eq!(feeds[1].url, "https://b.com/rss");
        }

        #[tokio::test]
        async fn test_get_feed_by_url() {
            let db = create_test_db().await;
            create_user_with_feeds(&db, &["https://a.com/rss"]).await;

            let feed = db.get_feed_by_url("https://a.com/rss").await.unwrap();
            assert_eq!(feed.unwrap().name, "Feed 1");
            assert!(db
                .get_feed_by_url("https://missing.com/rss")
                .await
                .unwrap()
                .is_none());
        }
    }

    mod scheduling_tests {
        use super::*;
        use chrono::Duration;

        #[tokio::test]
        async fn test_no_feeds_means_nothing_to_fetch() {
            let db = create_test_db().await;
            assert!(db.next_feed_to_fetch().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_never_fetched_sorts_first_then_oldest() {
            let db = create_test_db().await;
            let (_, feeds) = create_user_with_feeds(
                &db,
                &["https://a.com/rss", "https://b.com/rss", "https://c.com/rss"],
            )
            .await;
            let t1 = Utc::now() - Duration::hours(2);
            let t2 = Utc::now() - Duration::hours(1);

            // a: t2, b: t1, c: never
            db.mark_feed_fetched(feeds[0].id, t2).await.unwrap();
            db.mark_feed_fetched(feeds[1].id, t1).await.unwrap();

            let next = db.next_feed_to_fetch().await.unwrap().unwrap();
            assert_eq!(next.id, feeds[2].id);

            db.mark_feed_fetched(next.id, Utc::now()).await.unwrap();

            let next = db.next_feed_to_fetch().await.unwrap().unwrap();
            assert_eq!(next.id, feeds[1].id);
        }

        #[tokio::test]
        async fn test_ties_broken_by_id() {
            let db = create_test_db().await;
            let (_, feeds) =
                create_user_with_feeds(&db, &["https://a.com/rss", "https://b.com/rss"]).await;

            let next = db.next_feed_to_fetch().await.unwrap().unwrap();
            assert_eq!(next.id, feeds[0].id);
        }

        #[tokio::test]
        async fn test_mark_feed_fetched_sets_timestamp() {
            let db = create_test_db().await;
            let (_, feeds) = create_user_with_feeds(&db, &["https://a.com/rss"]).await;
            let at = Utc::now();

            let feed = db.mark_feed_fetched(feeds[0].id, at).await.unwrap().unwrap();

            assert_eq!(feed.last_fetched_at, Some(timestamp(at)));
            assert_eq!(feed.updated_at, timestamp(at));
        }

        #[tokio::test]
        async fn test_mark_missing_feed_returns_none() {
            let db = create_test_db().await;
            let result = db.mark_feed_fetched(999, Utc::now()).await.unwrap();
            assert!(result.is_none());
        }

        #[test]
        fn test_timestamp_is_fixed_width() {
            let whole = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc);
            let fractional = whole + Duration::milliseconds(5);

            assert_eq!(timestamp(whole), "2024-01-01T00:00:00.000000Z");
            assert!(timestamp(whole) < timestamp(fractional));
        }
    }

    mod follow_tests {
        use super::*;

        #[tokio::test]
        async fn test_follow_and_list() {
            let db = create_test_db().await;
            let (user, feeds) = create_user_with_feeds(&db, &["https://a.com/rss"]).await;

            let follow = db.create_feed_follow(user.id, feeds[0].id).await.unwrap();
            assert_eq!(follow.user_name, "owner");
            assert_eq!(follow.feed_name, "Feed 1");

            let follows = db.get_feed_follows_for_user(user.id).await.unwrap();
            assert_eq!(follows.len(), 1);
            assert_eq!(follows[0].feed_url, "https://a.com/rss");
        }

        #[tokio::test]
        async fn test_duplicate_follow_is_unique_violation() {
            let db = create_test_db().await;
            let (user, feeds) = create_user_with_feeds(&db, &["https://a.com/rss"]).await;
            db.create_feed_follow(user.id, feeds[0].id).await.unwrap();

            let err = db
                .create_feed_follow(user.id, feeds[0].id)
                .await
                .unwrap_err();
            assert!(is_unique_violation(&err));
        }

        #[tokio::test]
        async fn test_unfollow_removes_only_that_feed() {
            let db = create_test_db().await;
            let (user, feeds) =
                create_user_with_feeds(&db, &["https://a.com/rss", "https://b.com/rss"]).await;
            db.create_feed_follow(user.id, feeds[0].id).await.unwrap();
            db.create_feed_follow(user.id, feeds[1].id).await.unwrap();

            let deleted = db
                .delete_feed_follow_by_url(user.id, "https://a.com/rss")
                .await
                .unwrap();
            assert_eq!(deleted.len(), 1);
            assert_eq!(deleted[0].feed_id, feeds[0].id);

            let remaining = db.get_feed_follows_for_user(user.id).await.unwrap();
            assert_eq!(remaining.len(), 1);
            assert_eq!(remaining[0].feed_url, "https://b.com/rss");
        }

        #[tokio::test]
        async fn test_unfollow_not_followed_is_empty() {
            let db = create_test_db().await;
            let (user, _) = create_user_with_feeds(&db, &["https://a.com/rss"]).await;

            let deleted = db
                .delete_feed_follow_by_url(user.id, "https://a.com/rss")
                .await
                .unwrap();
            assert!(deleted.is_empty());
        }
    }
}
