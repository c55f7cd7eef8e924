//! View models - every page is rendered as JSON carrying site menu and pending messages

use axum::{
    extract::FromRequestParts,
    response::{IntoResponse, Response},
    Json,
};
use bookex_dal::menu::{MainMenu, MenuRepository};
use http::request::Parts;
use serde::Serialize;
use tower_sessions::Session;

use crate::{
    auth::session_from_parts,
    error::{ApiError, ApiResult},
    messages,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub menu: Vec<MainMenu>,
    pub messages: Vec<String>,
    #[serde(flatten)]
    pub content: T,
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Shared context of rendered pages, extracting it consumes pending flash messages
pub struct PageContext {
    menu: Vec<MainMenu>,
    messages: Vec<String>,
}

impl PageContext {
    pub async fn load(state: &AppState, session: &Session) -> ApiResult<Self> {
        let menu = MenuRepository::new(state.pool().clone()).list().await?;
        let messages = messages::take(session).await?;
        Ok(PageContext { menu, messages })
    }

    pub fn page<T: Serialize>(self, content: T) -> Page<T> {
        Page {
            menu: self.menu,
            messages: self.messages,
            content,
        }
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).await?;
        PageContext::load(state, &session).await
    }
}

/// Static page with title only
#[derive(Debug, Serialize)]
pub struct TitleView {
    pub title: &'static str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Validation errors shown with re-rendered form
#[derive(Debug, Serialize, Default)]
#[serde(transparent)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn append(&mut self, other: FormErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl From<garde::Report> for FormErrors {
    fn from(report: garde::Report) -> Self {
        let mut errors = FormErrors::default();
        for (path, error) in report.iter() {
            errors.add(path.to_string(), error.message());
        }
        errors
    }
}
