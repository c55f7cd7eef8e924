use axum::{extract::Query, response::IntoResponse, routing::get};
use bookex_dal::book::{BookRepository, BookWithRating};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiResult, state::AppState, view::PageContext};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchView {
    pub q: String,
    pub results: Vec<BookWithRating>,
}

pub async fn search(
    ctx: PageContext,
    repository: BookRepository,
    Query(query): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let q = query.q.trim().to_string();
    let results = repository.search(&q).await?;
    debug!("Search for {q:?} found {} books", results.len());
    Ok(ctx.page(SearchView { q, results }))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/search", get(search))
}
