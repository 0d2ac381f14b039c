use chrono::{TimeDelta, Utc};
use serial_test::serial;
use snippetbox::repository::{PostgresRepository, Repository, RepositoryError};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the pool for one test against the database named by `DATABASE_URL`.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Inserts a snippet directly, with full control over both timestamps.
async fn create_test_snippet(
    pool: &PgPool,
    title: &str,
    age_minutes: i64,
    expires_in_days: i64,
) -> Uuid {
    let id = Uuid::new_v4();
    let created = Utc::now() - TimeDelta::minutes(age_minutes);
    let expires = Utc::now() + TimeDelta::days(expires_in_days);

    sqlx::query(
        "INSERT INTO snippets (id, title, content, created, expires) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(title)
    .bind("content")
    .bind(created)
    .bind(expires)
    .execute(pool)
    .await
    .expect("Failed to create test snippet");

    id
}

fn unique_email() -> String {
    format!("{}@example.com", Uuid::new_v4())
}

// --- Snippets ---

#[tokio::test]
#[serial]
async fn insert_then_get_returns_the_snippet() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let id = repo
        .insert("O snail", "Climb Mount Fuji,\nBut slowly, slowly!", 7)
        .await
        .unwrap();
    let snippet = repo.get(id).await.unwrap();

    assert_eq!(snippet.id, id);
    assert_eq!(snippet.title, "O snail");
    assert_eq!(snippet.content, "Climb Mount Fuji,\nBut slowly, slowly!");
    assert_eq!(snippet.expires - snippet.created, TimeDelta::days(7));
}

#[tokio::test]
#[serial]
async fn get_hides_expired_and_unknown_snippets() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let expired = create_test_snippet(&ctx.pool, "gone", 60, -1).await;

    assert!(matches!(repo.get(expired).await, Err(RepositoryError::NoRecord)));
    assert!(matches!(
        repo.get(Uuid::new_v4()).await,
        Err(RepositoryError::NoRecord)
    ));
}

#[tokio::test]
#[serial]
async fn list_latest_returns_newest_live_snippets_first() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    sqlx::query("DELETE FROM snippets")
        .execute(&ctx.pool)
        .await
        .unwrap();

    // Twelve live snippets, the newest has age 0.
    let mut live = Vec::new();
    for age in 0..12 {
        live.push(create_test_snippet(&ctx.pool, &format!("live {age}"), age, 7).await);
    }
    let expired = create_test_snippet(&ctx.pool, "expired but newest", -5, -1).await;

    let latest = repo.list_latest(10).await.unwrap();
    let ids: Vec<Uuid> = latest.iter().map(|s| s.id).collect();

    assert_eq!(ids, live[..10].to_vec());
    assert!(!ids.contains(&expired));
}

// --- Users ---

#[tokio::test]
#[serial]
async fn duplicate_email_is_reported() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let email = unique_email();

    repo.user_insert("Alice", &email, "pa$$word123").await.unwrap();
    let second = repo.user_insert("Other Alice", &email, "different1").await;

    assert!(matches!(second, Err(RepositoryError::DuplicateEmail)));
}

#[tokio::test]
#[serial]
async fn authenticate_checks_email_and_password() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let email = unique_email();

    repo.user_insert("Alice", &email, "pa$$word123").await.unwrap();

    let id = repo.authenticate(&email, "pa$$word123").await.unwrap();
    assert!(repo.user_exists(id).await.unwrap());

    assert!(matches!(
        repo.authenticate(&email, "wrong password").await,
        Err(RepositoryError::InvalidCredentials)
    ));
    assert!(matches!(
        repo.authenticate(&unique_email(), "pa$$word123").await,
        Err(RepositoryError::InvalidCredentials)
    ));
}

#[tokio::test]
#[serial]
async fn user_exists_is_false_for_unknown_ids() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    assert!(!repo.user_exists(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
#[serial]
async fn stored_password_is_hashed() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let email = unique_email();

    repo.user_insert("Alice", &email, "pa$$word123").await.unwrap();

    let hashed: String = sqlx::query_scalar("SELECT hashed_password FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();

    assert!(hashed.starts_with("$argon2id$"));
    assert!(!hashed.contains("pa$$word123"));
}
