use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form,
};
use bookex_dal::user::{CreateUser, UserRepository};
use garde::Validate as _;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, info};

use crate::{
    auth::NextParam,
    error::ApiResult,
    state::AppState,
    view::{FormErrors, PageContext, TitleView},
};

const SUCCESS_PATH: &str = "/register/success";

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
    #[serde(default)]
    pub next: String,
}

impl RegisterForm {
    fn to_create_user(&self) -> Result<CreateUser, FormErrors> {
        let mut errors = FormErrors::default();
        let user = CreateUser {
            username: self.username.trim().to_string(),
            password: self.password1.clone(),
        };
        if let Err(report) = user.validate() {
            for (path, error) in report.iter() {
                let field = match path.to_string().as_str() {
                    "password" => "password1".to_string(),
                    other => other.to_string(),
                };
                errors.add(field, error.message());
            }
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        if errors.is_empty() {
            Ok(user)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterView {
    pub next: String,
    pub username: String,
    pub errors: FormErrors,
}

pub async fn register_form(ctx: PageContext, Query(params): Query<NextParam>) -> impl IntoResponse {
    ctx.page(RegisterView {
        next: params.next,
        username: String::new(),
        errors: FormErrors::default(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    user_registry: UserRepository,
    Form(form): Form<RegisterForm>,
) -> ApiResult<Response> {
    let errors = match form.to_create_user() {
        Ok(new_user) => match user_registry.create(new_user).await {
            Ok(user) => {
                info!("Registered user {} ({})", user.username, user.id);
                return Ok(Redirect::to(SUCCESS_PATH).into_response());
            }
            Err(bookex_dal::Error::AlreadyExists(_)) => {
                let mut errors = FormErrors::default();
                errors.add("username", "A user with that username already exists.");
                errors
            }
            Err(e) => return Err(e.into()),
        },
        Err(errors) => errors,
    };

    debug!("Invalid registration: {errors:?}");
    let ctx = PageContext::load(&state, &session).await?;
    let page = ctx.page(RegisterView {
        next: form.next,
        username: form.username,
        errors,
    });
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

pub async fn register_success(ctx: PageContext) -> impl IntoResponse {
    ctx.page(TitleView {
        title: "Registration successful",
    })
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/register", get(register_form).post(register))
        .route(SUCCESS_PATH, get(register_success))
}
