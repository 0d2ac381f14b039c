//! Typed access to the values this application keeps in the session.
//!
//! Every key has one wrapper type so the string constants and the stored value
//! types live in a single place.

use std::time::Duration;

use rand::{Rng, distr::Alphanumeric};
use time::OffsetDateTime;
use tower_sessions::{
    Expiry, Session, SessionManagerLayer, SessionStore, cookie::SameSite,
};
use uuid::Uuid;

use crate::error::AppError;

/// Session key for the id of the logged-in user.
pub const SESSION_USER_ID_KEY: &str = "snippetbox:auth:user_id";
/// Session key for the one-shot flash message.
pub const SESSION_FLASH_KEY: &str = "snippetbox:flash";
/// Session key for the per-session CSRF token.
pub const SESSION_CSRF_KEY: &str = "snippetbox:csrf";
/// Session key for the absolute deadline, as a unix timestamp in seconds.
pub const SESSION_DEADLINE_KEY: &str = "snippetbox:deadline";

const CSRF_TOKEN_LEN: usize = 32;

/// Builds the session layer shared by the dynamic and protected route groups.
///
/// Cookies are `Secure` and `HttpOnly`. The layer default is replaced on every
/// request by the session's fixed deadline (see [`SessionDeadline::apply`]); the
/// inactivity expiry here only applies to sessions that never got one.
pub fn session_layer<S>(store: S, lifetime: Duration) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_secure(true)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(to_time_duration(lifetime)))
}

fn to_time_duration(d: Duration) -> time::Duration {
    time::Duration::seconds(i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// SessionUserId
///
/// Marks a session as belonging to an authenticated user.
pub struct SessionUserId;

impl SessionUserId {
    pub async fn insert(session: &Session, user_id: Uuid) -> Result<(), AppError> {
        session.insert(SESSION_USER_ID_KEY, user_id).await?;
        Ok(())
    }

    pub async fn get(session: &Session) -> Result<Option<Uuid>, AppError> {
        Ok(session.get(SESSION_USER_ID_KEY).await?)
    }

    pub async fn remove(session: &Session) -> Result<Option<Uuid>, AppError> {
        Ok(session.remove(SESSION_USER_ID_KEY).await?)
    }
}

/// SessionFlash
///
/// A message shown once on the next rendered page.
pub struct SessionFlash;

impl SessionFlash {
    pub async fn insert(session: &Session, message: &str) -> Result<(), AppError> {
        session.insert(SESSION_FLASH_KEY, message).await?;
        Ok(())
    }

    /// Returns the pending message and clears it.
    pub async fn pop(session: &Session) -> Result<Option<String>, AppError> {
        Ok(session.remove(SESSION_FLASH_KEY).await?)
    }
}

/// SessionCsrf
///
/// The token forms must echo back in their `csrf_token` field.
pub struct SessionCsrf;

impl SessionCsrf {
    pub async fn get(session: &Session) -> Result<Option<String>, AppError> {
        Ok(session.get(SESSION_CSRF_KEY).await?)
    }

    /// Returns the session's token, minting one on first use.
    pub async fn get_or_create(session: &Session) -> Result<String, AppError> {
        if let Some(token) = Self::get(session).await? {
            return Ok(token);
        }

        let token = generate_token();
        session.insert(SESSION_CSRF_KEY, &token).await?;

        Ok(token)
    }
}

/// SessionDeadline
///
/// The absolute end of a session, fixed when the session is first seen. The
/// store record and the cookie both expire at this instant no matter how often
/// the session is saved afterwards.
pub struct SessionDeadline;

impl SessionDeadline {
    /// Loads (or records) the deadline and pins the session's expiry to it.
    ///
    /// Must run on every request: tower-sessions rebuilds each `Session` with
    /// the layer's default expiry.
    pub async fn apply(session: &Session, lifetime: Duration) -> Result<OffsetDateTime, AppError> {
        let stored = session
            .get::<i64>(SESSION_DEADLINE_KEY)
            .await?
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());

        let deadline = match stored {
            Some(deadline) => deadline,
            None => {
                let ts = (OffsetDateTime::now_utc() + to_time_duration(lifetime)).unix_timestamp();
                session.insert(SESSION_DEADLINE_KEY, ts).await?;
                OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH)
            }
        };

        session.set_expiry(Some(Expiry::AtDateTime(deadline)));
        Ok(deadline)
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(CSRF_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::{MemoryStore, Session};

    use super::*;

    fn session_test_setup() -> Session {
        let store = Arc::new(MemoryStore::default());
        Session::new(None, store, None)
    }

    #[tokio::test]
    async fn csrf_token_is_stable_within_a_session() {
        let session = session_test_setup();

        let first = SessionCsrf::get_or_create(&session).await.unwrap();
        let second = SessionCsrf::get_or_create(&session).await.unwrap();

        assert_eq!(first.len(), CSRF_TOKEN_LEN);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn deadline_pins_an_absolute_expiry() {
        let session = session_test_setup();
        assert!(session.expiry().is_none());

        let deadline = SessionDeadline::apply(&session, Duration::from_secs(12 * 60 * 60))
            .await
            .unwrap();

        assert!(matches!(session.expiry(), Some(Expiry::AtDateTime(at)) if at == deadline));
        assert!(deadline > OffsetDateTime::now_utc() + time::Duration::hours(11));
    }

    #[tokio::test]
    async fn deadline_is_not_extended_by_later_requests() {
        let session = session_test_setup();
        let lifetime = Duration::from_secs(60);

        let first = SessionDeadline::apply(&session, lifetime).await.unwrap();
        // A later request starts from the layer default again.
        session.set_expiry(Some(Expiry::OnInactivity(time::Duration::hours(12))));
        let second = SessionDeadline::apply(&session, Duration::from_secs(600))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert!(matches!(session.expiry(), Some(Expiry::AtDateTime(at)) if at == first));
    }

    #[tokio::test]
    async fn tokens_differ_between_sessions() {
        let a = SessionCsrf::get_or_create(&session_test_setup())
            .await
            .unwrap();
        let b = SessionCsrf::get_or_create(&session_test_setup())
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn flash_is_popped_once() {
        let session = session_test_setup();
        SessionFlash::insert(&session, "Snippet successfully created!")
            .await
            .unwrap();

        assert_eq!(
            SessionFlash::pop(&session).await.unwrap().as_deref(),
            Some("Snippet successfully created!")
        );
        assert_eq!(SessionFlash::pop(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn user_id_round_trip() {
        let session = session_test_setup();
        let id = Uuid::new_v4();

        SessionUserId::insert(&session, id).await.unwrap();
        assert_eq!(SessionUserId::get(&session).await.unwrap(), Some(id));
        assert_eq!(SessionUserId::remove(&session).await.unwrap(), Some(id));
        assert_eq!(SessionUserId::get(&session).await.unwrap(), None);
    }
}
