use crate::{
    AppState,
    error::AppError,
    models::{SnippetCreateForm, UserLoginForm, UserSignupForm},
    repository::RepositoryError,
    session::{SessionFlash, SessionUserId},
    templates::PageContext,
};
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

/// Number of snippets shown on the home page.
const LATEST_SNIPPETS: i64 = 10;

// --- Snippets ---

/// home
///
/// [Dynamic Route] Lists the newest unexpired snippets.
pub async fn home(State(state): State<AppState>, page: PageContext) -> Result<Html<String>, AppError> {
    let snippets = state.repo.list_latest(LATEST_SNIPPETS).await?;
    let data = page.template_data().await?.with_snippets(snippets);
    state.templates.render("home.html", &data)
}

/// snippet_view
///
/// [Dynamic Route] Shows one snippet. Malformed ids get the same 404 as unknown
/// or expired ones.
pub async fn snippet_view(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound)?;
    let snippet = state.repo.get(id).await?;

    let data = page.template_data().await?.with_snippet(snippet);
    state.templates.render("view.html", &data)
}

/// snippet_create
///
/// [Protected Route] Shows the empty creation form.
pub async fn snippet_create(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Html<String>, AppError> {
    let data = page
        .template_data()
        .await?
        .with_form(&SnippetCreateForm::default());
    state.templates.render("create.html", &data)
}

/// snippet_create_post
///
/// [Protected Route] Validates and stores a snippet, then redirects to it.
pub async fn snippet_create_post(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    Form(mut form): Form<SnippetCreateForm>,
) -> Result<Response, AppError> {
    form.validate();
    if !form.validator.valid() {
        let data = page.template_data().await?.with_form(&form);
        return state
            .templates
            .render_with_status(StatusCode::UNPROCESSABLE_ENTITY, "create.html", &data);
    }

    let id = state
        .repo
        .insert(&form.title, &form.content, form.expires)
        .await?;

    SessionFlash::insert(&session, "Snippet successfully created!").await?;
    Ok(Redirect::to(&format!("/snippet/view/{id}")).into_response())
}

// --- Users ---

/// user_signup
///
/// [Dynamic Route] Shows the signup form.
pub async fn user_signup(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Html<String>, AppError> {
    let data = page
        .template_data()
        .await?
        .with_form(&UserSignupForm::default());
    state.templates.render("signup.html", &data)
}

/// user_signup_post
///
/// [Dynamic Route] Creates an account. A taken email address is reported on the
/// form itself rather than as an error page.
pub async fn user_signup_post(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    Form(mut form): Form<UserSignupForm>,
) -> Result<Response, AppError> {
    form.validate();

    if form.validator.valid() {
        match state
            .repo
            .user_insert(&form.name, &form.email, &form.password)
            .await
        {
            Ok(()) => {
                SessionFlash::insert(&session, "Your signup was successful. Please log in.").await?;
                return Ok(Redirect::to("/user/login").into_response());
            }
            Err(RepositoryError::DuplicateEmail) => {
                form.validator
                    .add_field_error("email", "Email address is already in use");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let data = page.template_data().await?.with_form(&form);
    state
        .templates
        .render_with_status(StatusCode::UNPROCESSABLE_ENTITY, "signup.html", &data)
}

/// user_login
///
/// [Dynamic Route] Shows the login form.
pub async fn user_login(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Html<String>, AppError> {
    let data = page
        .template_data()
        .await?
        .with_form(&UserLoginForm::default());
    state.templates.render("login.html", &data)
}

/// user_login_post
///
/// [Dynamic Route] Checks credentials and marks the session as authenticated.
/// The session id is rotated first so a pre-login id cannot be reused.
pub async fn user_login_post(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    Form(mut form): Form<UserLoginForm>,
) -> Result<Response, AppError> {
    form.validate();

    if form.validator.valid() {
        match state.repo.authenticate(&form.email, &form.password).await {
            Ok(user_id) => {
                session.cycle_id().await?;
                SessionUserId::insert(&session, user_id).await?;
                tracing::info!(%user_id, "user logged in");
                return Ok(Redirect::to("/snippet/create").into_response());
            }
            Err(RepositoryError::InvalidCredentials) => {
                form.validator
                    .add_non_field_error("Email or password is incorrect");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let data = page.template_data().await?.with_form(&form);
    state
        .templates
        .render_with_status(StatusCode::UNPROCESSABLE_ENTITY, "login.html", &data)
}

/// user_logout_post
///
/// [Protected Route] Drops the authenticated user from the session.
pub async fn user_logout_post(session: Session) -> Result<Response, AppError> {
    session.cycle_id().await?;
    SessionUserId::remove(&session).await?;
    SessionFlash::insert(&session, "You've been logged out successfully!").await?;

    Ok(Redirect::to("/").into_response())
}

// --- Misc ---

/// ping
///
/// [Public Route] Liveness probe.
pub async fn ping() -> &'static str {
    "OK"
}
