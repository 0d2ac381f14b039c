//! Form validation helpers.
//!
//! Each form embeds a [`Validator`] which collects per-field messages and
//! form-wide messages. Templates read both maps back when a form is re-rendered.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

/// Loose RFC 5322 email pattern, good enough to catch typos.
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"#,
    )
    .expect("email regex is valid")
});

#[derive(Debug, Clone, Default, Serialize)]
pub struct Validator {
    pub non_field_errors: Vec<String>,
    pub field_errors: BTreeMap<String, String>,
}

impl Validator {
    /// True when no error of either kind was recorded.
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    pub fn add_non_field_error(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    /// Records `message` for `key` unless the field already has an error.
    pub fn add_field_error(&mut self, key: &str, message: impl Into<String>) {
        self.field_errors
            .entry(key.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn permitted_value<T: PartialEq>(value: T, permitted: &[T]) -> bool {
    permitted.contains(&value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}
