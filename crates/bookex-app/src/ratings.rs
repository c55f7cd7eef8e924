use axum::{
    extract::Path,
    response::{IntoResponse, Redirect},
    routing::post,
    Form,
};
use bookex_dal::{
    book::BookRepository,
    rating::{is_valid_stars, RatingOutcome, RatingRepository},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::debug;

use crate::{
    auth::AuthUser, books::detail_path, error::ApiResult, messages::flash,
    repository_from_request, state::AppState,
};

repository_from_request!(RatingRepository);

#[derive(Debug, Deserialize)]
pub struct RatingForm {
    #[serde(default)]
    pub stars: String,
}

impl RatingForm {
    /// Anything not parsable counts as 0, which is out of range
    pub fn stars(&self) -> i64 {
        self.stars.trim().parse().unwrap_or(0)
    }
}

pub async fn rate_book(
    AuthUser(user): AuthUser,
    Path(book_id): Path<i64>,
    session: Session,
    books: BookRepository,
    ratings: RatingRepository,
    Form(form): Form<RatingForm>,
) -> ApiResult<impl IntoResponse> {
    let book = books.get(book_id).await?;
    let stars = form.stars();
    if is_valid_stars(stars) {
        let message = match ratings.upsert(book.id, user.id, stars).await? {
            RatingOutcome::Created(_) => format!("Rated {stars} stars!"),
            RatingOutcome::Updated(_) => format!("Updated rating to {stars} stars!"),
        };
        flash(&session, message).await?;
    } else {
        debug!("Ignoring rating {stars} of book {book_id}");
    }
    Ok(Redirect::to(&detail_path(book_id)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/rate/{id}", post(rate_book))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(stars: &str) -> RatingForm {
        RatingForm {
            stars: stars.to_string(),
        }
    }

    #[test]
    fn test_stars_parsing() {
        assert_eq!(form("4").stars(), 4);
        assert_eq!(form(" 5 ").stars(), 5);
        assert_eq!(form("").stars(), 0);
        assert_eq!(form("five").stars(), 0);
        assert_eq!(form("4.5").stars(), 0);
        assert_eq!(form("6").stars(), 6);
    }
}
