use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sqlx::PgPool;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{Snippet, User},
    password::{compute_password_hash, verify_password_hash},
};

/// Name of the unique constraint on `users.email`.
const USERS_EMAIL_CONSTRAINT: &str = "users_uc_email";

/// RepositoryError
///
/// The first three variants are domain outcomes handlers turn into 404s or form
/// feedback. Everything else is infrastructure and ends up as a generic 500.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("no matching record found")]
    NoRecord,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Repository Trait
///
/// The persistence contract the handlers and the authentication middleware are
/// written against. `Send + Sync + async_trait` make `Arc<dyn Repository>`
/// shareable across Axum's request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Snippets ---
    // Stores a snippet that expires `expires_days` from now; returns its id.
    async fn insert(&self, title: &str, content: &str, expires_days: i32)
    -> Result<Uuid, RepositoryError>;
    // Fails with `NoRecord` for unknown and expired snippets alike.
    async fn get(&self, id: Uuid) -> Result<Snippet, RepositoryError>;
    // Newest unexpired snippets first.
    async fn list_latest(&self, limit: i64) -> Result<Vec<Snippet>, RepositoryError>;

    // --- Users ---
    // Fails with `DuplicateEmail` when the address is taken.
    async fn user_insert(&self, name: &str, email: &str, password: &str)
    -> Result<(), RepositoryError>;
    // Fails with `InvalidCredentials` for an unknown email or a wrong password.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, RepositoryError>;
    async fn user_exists(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production implementation of `Repository`, backed by a sqlx connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i32,
    ) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        let created = Utc::now();
        let expires = created + TimeDelta::days(i64::from(expires_days));

        sqlx::query(
            "INSERT INTO snippets (id, title, content, created, expires) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(created)
        .bind(expires)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Snippet, RepositoryError> {
        sqlx::query_as::<_, Snippet>(
            r#"SELECT id, title, content, created, expires
                FROM snippets
                WHERE id = $1 AND expires > NOW()"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NoRecord)
    }

    async fn list_latest(&self, limit: i64) -> Result<Vec<Snippet>, RepositoryError> {
        let snippets = sqlx::query_as::<_, Snippet>(
            r#"SELECT id, title, content, created, expires
                FROM snippets
                WHERE expires > NOW()
                ORDER BY created DESC
                LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(snippets)
    }

    async fn user_insert(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), RepositoryError> {
        let password = password.to_string();
        // Argon2 is CPU-bound; keep it off the async workers.
        let hashed_password = tokio::task::spawn_blocking(move || compute_password_hash(&password))
            .await
            .map_err(|e| RepositoryError::Task(e.to_string()))??;

        let result = sqlx::query(
            r#"INSERT INTO users (id, name, email, hashed_password, created)
                VALUES ($1, $2, $3, $4, NOW())"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation()
                    && db_err.constraint() == Some(USERS_EMAIL_CONSTRAINT) =>
            {
                Err(RepositoryError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, hashed_password, created FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::InvalidCredentials)?;

        let User {
            id,
            hashed_password,
            ..
        } = user;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password_hash(&hashed_password, &password))
            .await
            .map_err(|e| RepositoryError::Task(e.to_string()))??;

        Ok(id)
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT true FROM users WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

// --- Fixture Implementation (For Tests) ---

/// Id of the single snippet `MockRepository` knows about.
pub const MOCK_SNIPPET_ID: Uuid = Uuid::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
/// Id returned by every `MockRepository::insert`.
pub const MOCK_INSERTED_ID: Uuid = Uuid::from_u128(0x2222_2222_2222_2222_2222_2222_2222_2222);
/// Id of the only account `MockRepository` can authenticate.
pub const MOCK_USER_ID: Uuid = Uuid::from_u128(0x3333_3333_3333_3333_3333_3333_3333_3333);
pub const MOCK_USER_EMAIL: &str = "alice@example.com";
pub const MOCK_USER_PASSWORD: &str = "pa$$word";
/// Signing up with this address always reports a duplicate.
pub const MOCK_DUPLICATE_EMAIL: &str = "dupe@example.com";

/// MockRepository
///
/// A fixed-fixture implementation of `Repository` for handler and pipeline tests.
/// It never touches a database.
#[derive(Default)]
pub struct MockRepository {
    /// When true, `user_exists` returns a simulated infrastructure failure.
    pub should_fail: bool,
    user_removed: AtomicBool,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Makes the fixture account disappear, as if deleted by another process.
    pub fn remove_user(&self) {
        self.user_removed.store(true, Ordering::SeqCst);
    }

    pub fn snippet() -> Snippet {
        let created = Utc::now();
        Snippet {
            id: MOCK_SNIPPET_ID,
            title: "An old silent pond".to_string(),
            content: "An old silent pond...".to_string(),
            created,
            expires: created + TimeDelta::days(7),
        }
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn insert(
        &self,
        _title: &str,
        _content: &str,
        _expires_days: i32,
    ) -> Result<Uuid, RepositoryError> {
        Ok(MOCK_INSERTED_ID)
    }

    async fn get(&self, id: Uuid) -> Result<Snippet, RepositoryError> {
        if id == MOCK_SNIPPET_ID {
            Ok(Self::snippet())
        } else {
            Err(RepositoryError::NoRecord)
        }
    }

    async fn list_latest(&self, _limit: i64) -> Result<Vec<Snippet>, RepositoryError> {
        Ok(vec![Self::snippet()])
    }

    async fn user_insert(
        &self,
        _name: &str,
        email: &str,
        _password: &str,
    ) -> Result<(), RepositoryError> {
        match email {
            MOCK_DUPLICATE_EMAIL => Err(RepositoryError::DuplicateEmail),
            _ => Ok(()),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, RepositoryError> {
        if email == MOCK_USER_EMAIL && password == MOCK_USER_PASSWORD {
            Ok(MOCK_USER_ID)
        } else {
            Err(RepositoryError::InvalidCredentials)
        }
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, RepositoryError> {
        if self.should_fail {
            return Err(RepositoryError::Task(
                "Mock Repository Error: Simulation requested".to_string(),
            ));
        }
        Ok(id == MOCK_USER_ID && !self.user_removed.load(Ordering::SeqCst))
    }
}
