//! HTML rendering.
//!
//! All templates are compiled into the binary and loaded into one
//! `minijinja::Environment` at startup, so a broken template stops the server
//! from booting instead of failing on first request.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Datelike, Utc};
use minijinja::{Environment, UndefinedBehavior, Value};
use serde::Serialize;
use tower_sessions::Session;

use crate::{
    auth::AuthContext,
    csrf::CsrfToken,
    error::AppError,
    models::Snippet,
    session::SessionFlash,
};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../ui/html/base.html")),
    ("partials/nav.html", include_str!("../ui/html/partials/nav.html")),
    ("home.html", include_str!("../ui/html/pages/home.html")),
    ("view.html", include_str!("../ui/html/pages/view.html")),
    ("create.html", include_str!("../ui/html/pages/create.html")),
    ("signup.html", include_str!("../ui/html/pages/signup.html")),
    ("login.html", include_str!("../ui/html/pages/login.html")),
];

/// Formats an RFC 3339 timestamp as e.g. `02 Jan 2006 at 15:04` (UTC).
/// Missing or unparsable input renders as an empty string.
pub fn human_date(value: Option<String>) -> String {
    value
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| {
            t.with_timezone(&Utc)
                .format("%d %b %Y at %H:%M")
                .to_string()
        })
        .unwrap_or_default()
}

/// Templates
///
/// Cheap to clone; the environment itself is shared.
#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        // Pages probe optional values like `form.validator.field_errors.title`.
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        env.add_filter("human_date", human_date);

        Ok(Self { env: Arc::new(env) })
    }

    pub fn render(&self, name: &str, data: &TemplateData) -> Result<Html<String>, AppError> {
        let html = self.env.get_template(name)?.render(data)?;
        Ok(Html(html))
    }

    /// Renders with an explicit status, used for re-displaying invalid forms.
    pub fn render_with_status(
        &self,
        status: StatusCode,
        name: &str,
        data: &TemplateData,
    ) -> Result<Response, AppError> {
        Ok((status, self.render(name, data)?).into_response())
    }
}

/// TemplateData
///
/// The context every page is rendered with.
#[derive(Debug, Default, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
}

impl TemplateData {
    pub fn with_snippet(mut self, snippet: Snippet) -> Self {
        self.snippet = Some(snippet);
        self
    }

    pub fn with_snippets(mut self, snippets: Vec<Snippet>) -> Self {
        self.snippets = snippets;
        self
    }

    pub fn with_form<F: Serialize>(mut self, form: &F) -> Self {
        self.form = Some(Value::from_serialize(form));
        self
    }
}

/// PageContext
///
/// Everything a handler needs to start a page: the session (for the flash
/// message) plus what the middleware put in the request extensions.
pub struct PageContext {
    session: Option<Session>,
    auth: AuthContext,
    csrf: CsrfToken,
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            session: parts.extensions.get::<Session>().cloned(),
            auth: parts
                .extensions
                .get::<AuthContext>()
                .copied()
                .unwrap_or_default(),
            csrf: parts.extensions.get::<CsrfToken>().cloned().unwrap_or_default(),
        })
    }
}

impl PageContext {
    /// Builds the base template data, consuming any pending flash message.
    pub async fn template_data(&self) -> Result<TemplateData, AppError> {
        let flash = match &self.session {
            Some(session) => SessionFlash::pop(session).await?,
            None => None,
        };

        Ok(TemplateData {
            current_year: Utc::now().year(),
            flash,
            is_authenticated: self.auth.is_authenticated(),
            csrf_token: self.csrf.0.clone(),
            ..TemplateData::default()
        })
    }
}
