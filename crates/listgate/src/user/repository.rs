//! User repository for database operations.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::error::UserError;
use super::models::{NewUser, User};

/// Persistence seam for users.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Lookup is case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Fails with [`UserError::AlreadyRegistered`] when the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, UserError>;
}

/// SQLite-backed [`IdentityStore`].
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        format!("usr_{}", nanoid::nanoid!(12))
    }
}

#[async_trait]
impl IdentityStore for UserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, password_hash, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, password_hash, created_at
            FROM users
            WHERE email = ? COLLATE NOCASE
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert(&self, user: NewUser) -> Result<User, UserError> {
        let id = Self::generate_id();
        debug!("Creating user {}", id);

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, password_hash)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            let unique = err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if unique {
                return Err(UserError::AlreadyRegistered(user.email));
            }
            return Err(anyhow::Error::new(err)
                .context("Failed to insert user")
                .into());
        }

        let created = self.find_by_id(&id).await?;
        created.ok_or_else(|| anyhow!("User {} missing after insert", id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            display_name: "Ada".to_string(),
            password_hash: "$2b$04$notarealhash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());

        let user = repo.insert(new_user("ada@example.com")).await.unwrap();
        assert!(user.id.starts_with("usr_"));
        assert_eq!(user.display_name, "Ada");

        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");

        let by_email = repo
            .find_by_email("ADA@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(repo.find_by_id("usr_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_reported() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());

        repo.insert(new_user("ada@example.com")).await.unwrap();
        let err = repo
            .insert(new_user("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::AlreadyRegistered(email) if email == "ada@example.com"));
    }
}
