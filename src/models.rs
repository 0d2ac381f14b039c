use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validator::{self, EMAIL_RX, Validator};

// --- Core Records (Mapped to Database) ---

/// Snippet
///
/// A short piece of text stored in the `snippets` table. A snippet stops being
/// visible once `expires` is in the past.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Snippet {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// User
///
/// An account record from the `users` table. Only the repository ever reads
/// `hashed_password`; it is never serialized into templates.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created: DateTime<Utc>,
}

// --- Form Payloads (Input Schemas) ---

/// Expiry choices offered by the create form, in days.
pub const PERMITTED_EXPIRES: [i32; 3] = [1, 7, 365];

/// SnippetCreateForm
///
/// Body of `POST /snippet/create`. Missing fields default to empty values so
/// they surface as validation messages instead of extractor rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetCreateForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub expires: i32,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl Default for SnippetCreateForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: 365,
            validator: Validator::default(),
        }
    }
}

/// Reads a form number without rejecting the request. Anything that is not an
/// integer becomes 0, which no permitted-value check accepts.
fn lenient_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse().unwrap_or(0))
}

impl SnippetCreateForm {
    pub fn validate(&mut self) {
        let v = &mut self.validator;
        v.check_field(
            validator::not_blank(&self.title),
            "title",
            "This field cannot be blank",
        );
        v.check_field(
            validator::max_chars(&self.title, 100),
            "title",
            "This field cannot be more than 100 characters long",
        );
        v.check_field(
            validator::not_blank(&self.content),
            "content",
            "This field cannot be blank",
        );
        v.check_field(
            validator::permitted_value(self.expires, &PERMITTED_EXPIRES),
            "expires",
            "This field must equal 1, 7 or 365",
        );
    }
}

/// UserSignupForm
///
/// Body of `POST /user/signup`. The password is never echoed back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserSignupForm {
    pub fn validate(&mut self) {
        let v = &mut self.validator;
        v.check_field(
            validator::not_blank(&self.name),
            "name",
            "This field cannot be blank",
        );
        v.check_field(
            validator::not_blank(&self.email),
            "email",
            "This field cannot be blank",
        );
        v.check_field(
            validator::matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(
            validator::not_blank(&self.password),
            "password",
            "This field cannot be blank",
        );
        v.check_field(
            validator::min_chars(&self.password, 8),
            "password",
            "This field must be at least 8 characters long",
        );
    }
}

/// UserLoginForm
///
/// Body of `POST /user/login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserLoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserLoginForm {
    pub fn validate(&mut self) {
        let v = &mut self.validator;
        v.check_field(
            validator::not_blank(&self.email),
            "email",
            "This field cannot be blank",
        );
        v.check_field(
            validator::matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(
            validator::not_blank(&self.password),
            "password",
            "This field cannot be blank",
        );
    }
}
