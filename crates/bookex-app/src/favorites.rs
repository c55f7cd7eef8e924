use axum::{
    extract::Path,
    response::{IntoResponse, Redirect},
    routing::get,
};
use bookex_dal::{
    book::BookRepository,
    favorite::{FavoriteRepository, FavoriteToggle},
};
use tower_sessions::Session;

use crate::{
    auth::AuthUser,
    books::{detail_path, BooksView},
    error::ApiResult,
    messages::flash,
    repository_from_request,
    state::AppState,
    view::PageContext,
};

repository_from_request!(FavoriteRepository);

pub async fn toggle_favorite(
    AuthUser(user): AuthUser,
    Path(book_id): Path<i64>,
    session: Session,
    books: BookRepository,
    favorites: FavoriteRepository,
) -> ApiResult<impl IntoResponse> {
    let book = books.get(book_id).await?;
    let message = match favorites.toggle(user.id, book.id).await? {
        FavoriteToggle::Added => "Added to favorites!",
        FavoriteToggle::Removed => "Removed from favorites!",
    };
    flash(&session, message).await?;
    Ok(Redirect::to(&detail_path(book_id)))
}

/// Most recently favorited first
pub async fn list_favorites(
    AuthUser(user): AuthUser,
    ctx: PageContext,
    favorites: FavoriteRepository,
) -> ApiResult<impl IntoResponse> {
    let books = favorites.list_books(user.id).await?;
    Ok(ctx.page(BooksView { books }))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/favorite/toggle/{id}", get(toggle_favorite))
        .route("/favorites", get(list_favorites))
}
