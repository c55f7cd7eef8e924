pub mod auth;
pub mod books;
pub mod cart;
pub mod comments;
pub mod error;
pub mod favorites;
pub mod messages;
pub mod ratings;
pub mod register;
pub mod search;
pub mod state;
pub mod validate;
pub mod view;

use state::AppState;

#[macro_export]
macro_rules! repository_from_request {
    ($repo:ty) => {
        impl axum::extract::FromRequestParts<$crate::state::AppState> for $repo {
            type Rejection = http::StatusCode;

            fn from_request_parts(
                _parts: &mut http::request::Parts,
                state: &$crate::state::AppState,
            ) -> impl std::future::Future<Output = std::result::Result<Self, Self::Rejection>>
                   + core::marker::Send {
                futures::future::ready(std::result::Result::Ok(<$repo>::new(state.pool().clone())))
            }
        }
    };
}

/// All application pages and actions, needs session layer on top
pub fn router(upload_limit_mb: usize) -> axum::Router<AppState> {
    axum::Router::new()
        .merge(books::router(upload_limit_mb))
        .merge(search::router())
        .merge(cart::router())
        .merge(comments::router())
        .merge(ratings::router())
        .merge(favorites::router())
        .merge(register::router())
        .merge(auth::router())
}
