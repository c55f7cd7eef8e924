use axum::{
    extract::{FromRequestParts, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form,
};
use bookex_dal::user::{User, UserRepository};
use http::{request::Parts, StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, info, warn};

use crate::{
    error::{ApiError, ApiResult},
    repository_from_request,
    state::AppState,
    validate::Garde,
    view::PageContext,
};

const SESSION_USER_KEY: &str = "user";
const LOGIN_PATH: &str = "/login";
const INVALID_LOGIN_MESSAGE: &str = "Please enter a correct username and password.";

repository_from_request!(UserRepository);

pub(crate) async fn session_from_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Session> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| ApiError::Internal(anyhow::anyhow!("Session not available: {msg}")))
}

/// Current visitor, anonymous if not logged in
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn current_user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).await?;
        let user = session.get::<User>(SESSION_USER_KEY).await?;
        Ok(Viewer(user))
    }
}

/// Logged in user, anonymous visitor is redirected to login page
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Viewer(user) = Viewer::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match user {
            Some(user) => Ok(AuthUser(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|p| p.as_str())
                    .unwrap_or("/");
                debug!("Anonymous access to {next}, redirecting to login");
                Err(Redirect::to(&login_url(next)).into_response())
            }
        }
    }
}

pub fn login_url(next: &str) -> String {
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={next}")
}

/// Only local absolute paths are followed after login
pub fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

#[derive(Debug, Deserialize)]
pub struct NextParam {
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub next: String,
    pub error: Option<&'static str>,
}

#[derive(Debug, Deserialize, garde::Validate)]
pub struct LoginForm {
    #[garde(length(min = 1, max = 150))]
    pub username: String,
    #[garde(length(min = 1, max = 255))]
    pub password: String,
    #[garde(skip)]
    #[serde(default)]
    pub next: String,
}

pub async fn login_form(ctx: PageContext, Query(params): Query<NextParam>) -> impl IntoResponse {
    ctx.page(LoginView {
        next: params.next,
        error: None,
    })
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    user_registry: UserRepository,
    Garde(Form(credentials)): Garde<Form<LoginForm>>,
) -> ApiResult<Response> {
    let user = match user_registry
        .check_password(&credentials.username, &credentials.password)
        .await
    {
        Ok(user) => user,
        Err(bookex_dal::Error::InvalidCredentials) => {
            debug!("Failed login of {}", credentials.username);
            let ctx = PageContext::load(&state, &session).await?;
            let page = ctx.page(LoginView {
                next: credentials.next,
                error: Some(INVALID_LOGIN_MESSAGE),
            });
            return Ok((StatusCode::UNAUTHORIZED, page).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    // new id for authenticated session, data like cart are kept
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, &user).await?;
    info!("User {} logged in", user.username);

    Ok(Redirect::to(safe_next(&credentials.next)).into_response())
}

pub async fn logout(session: Session) -> impl IntoResponse {
    session
        .flush()
        .await
        .unwrap_or_else(|e| warn!("Failed to delete session: {e}"));
    Redirect::to("/")
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(LOGIN_PATH, get(login_form).post(login))
        .route("/logout", get(logout))
}
