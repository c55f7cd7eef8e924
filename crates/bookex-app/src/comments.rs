use axum::{
    extract::Path,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form,
};
use bookex_dal::{
    book::BookRepository,
    comment::{CommentRepository, MAX_COMMENT_LENGTH},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{
    auth::AuthUser, books::detail_path, error::ApiResult, messages::flash,
    repository_from_request, state::AppState,
};

repository_from_request!(CommentRepository);

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub comment_text: String,
}

/// Trimmed text if it can be stored as comment
fn comment_text(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_COMMENT_LENGTH {
        None
    } else {
        Some(text)
    }
}

pub async fn add_comment(
    AuthUser(user): AuthUser,
    Path(book_id): Path<i64>,
    session: Session,
    books: BookRepository,
    comments: CommentRepository,
    Form(form): Form<CommentForm>,
) -> ApiResult<impl IntoResponse> {
    let book = books.get(book_id).await?;
    match comment_text(&form.comment_text) {
        Some(text) => {
            let comment = comments.create(book.id, user.id, text).await?;
            debug!("User {} commented book {}: {}", user.id, book.id, comment.id);
            flash(&session, "Comment added successfully!").await?;
        }
        None => debug!("Ignoring empty or too long comment for book {book_id}"),
    }
    Ok(Redirect::to(&detail_path(book_id)))
}

/// Only author can delete comment, others are sent home
pub async fn delete_comment(
    AuthUser(user): AuthUser,
    Path(comment_id): Path<i64>,
    session: Session,
    comments: CommentRepository,
) -> ApiResult<impl IntoResponse> {
    let comment = comments.get(comment_id).await?;
    if comment.user_id != user.id {
        warn!(
            "User {} tried to delete comment {comment_id} of user {}",
            user.id, comment.user_id
        );
        return Ok(Redirect::to("/"));
    }
    comments.delete_owned(comment_id, user.id).await?;
    flash(&session, "Comment deleted!").await?;
    Ok(Redirect::to(&detail_path(comment.book_id)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/comment/add/{id}", post(add_comment))
        .route("/comment/delete/{id}", get(delete_comment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_text() {
        assert_eq!(comment_text("  Great book \n"), Some("Great book"));
        assert_eq!(comment_text("   "), None);
        assert_eq!(comment_text(""), None);

        let longest = "ž".repeat(MAX_COMMENT_LENGTH);
        assert_eq!(comment_text(&longest), Some(longest.as_str()));
        let too_long = "a".repeat(MAX_COMMENT_LENGTH + 1);
        assert_eq!(comment_text(&too_long), None);
    }
}
