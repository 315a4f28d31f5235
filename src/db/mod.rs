mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use user::{NewUser, User, UserProfile, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    first_name TEXT NOT NULL DEFAULT '',
                    last_name TEXT NOT NULL DEFAULT '',
                    is_active INTEGER NOT NULL DEFAULT 1,
                    is_staff INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// True if the error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            username,
            email,
            password_hash: "hash",
            first_name: "First",
            last_name: "Last",
            is_staff: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.users().create(&new_user("alice", "a@x.com")).await.unwrap();

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.first_name, "First");
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.created_at.is_empty());
    }

    #[tokio::test]
    async fn test_users_has_only_unique_indexes() {
        let db = Database::open(":memory:").await.unwrap();

        // UNIQUE columns come with SQLite's autoindexes; nothing else is needed
        let explicit: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'index' AND tbl_name = 'users' AND sql IS NOT NULL",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(explicit, 0);

        let auto: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'index' AND tbl_name = 'users' AND sql IS NULL",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(auto, 2);
    }

    #[tokio::test]
    async fn test_find_by_login_matches_username_or_email() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db.users().create(&new_user("alice", "a@x.com")).await.unwrap();

        let by_name = db.users().find_by_login("alice").await.unwrap().unwrap();
        let by_email = db.users().find_by_login("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(by_email.id, id);

        assert!(db.users().find_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_username_or_email() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().create(&new_user("alice", "a@x.com")).await.unwrap();

        let users = db.users();
        assert!(users.exists_username_or_email("alice", "new@x.com").await.unwrap());
        assert!(users.exists_username_or_email("bob", "a@x.com").await.unwrap());
        assert!(!users.exists_username_or_email("bob", "b@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create(&new_user("alice", "a@x.com")).await.unwrap();
        let err = db
            .users()
            .create(&new_user("alice", "other@x.com"))
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_save_and_flags() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db.users().create(&new_user("alice", "a@x.com")).await.unwrap();

        let mut user = db.users().get_by_id(id).await.unwrap().unwrap();
        user.first_name = "Alicia".to_string();
        assert!(db.users().save(&user).await.unwrap());

        db.users().set_active(id, false).await.unwrap();
        db.users().set_staff(id, true).await.unwrap();

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.first_name, "Alicia");
        assert!(!user.is_active);
        assert!(user.is_staff);
    }

    #[tokio::test]
    async fn test_delete_list_count() {
        let db = Database::open(":memory:").await.unwrap();
        let a = db.users().create(&new_user("alice", "a@x.com")).await.unwrap();
        db.users().create(&new_user("bob", "b@x.com")).await.unwrap();

        assert_eq!(db.users().count().await.unwrap(), 2);
        assert!(db.users().delete(a).await.unwrap());
        assert!(!db.users().delete(a).await.unwrap());

        let users = db.users().list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "bob");
    }
}
