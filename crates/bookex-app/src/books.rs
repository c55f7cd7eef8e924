use std::str::FromStr as _;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use bookex_dal::{
    book::{Book, BookRepository, BookWithRating, CreateBook},
    comment::{CommentRepository, CommentWithUser},
    favorite::FavoriteRepository,
    rating::{Rating, RatingRepository},
};
use bookex_store::{picture_path, Store as _};
use bytes::Bytes;
use garde::Validate as _;
use http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, error, info};

use crate::{
    auth::Viewer,
    error::ApiResult,
    repository_from_request,
    state::AppState,
    view::{FormErrors, PageContext, TitleView},
};

repository_from_request!(BookRepository);

pub const BOOKS_PATH: &str = "/displaybooks";

pub fn detail_path(book_id: i64) -> String {
    format!("/book_detail/{book_id}")
}

pub async fn index(ctx: PageContext) -> impl IntoResponse {
    ctx.page(TitleView {
        title: "Book Exchange",
    })
}

pub async fn aboutus(ctx: PageContext) -> impl IntoResponse {
    ctx.page(TitleView { title: "About us" })
}

#[derive(Debug, Serialize)]
pub struct BooksView {
    pub books: Vec<BookWithRating>,
}

pub async fn displaybooks(
    ctx: PageContext,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    let books = repository.list().await?;
    Ok(ctx.page(BooksView { books }))
}

/// Books submitted by current user, nothing for anonymous visitor
pub async fn mybooks(
    ctx: PageContext,
    viewer: Viewer,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    let books = match viewer.user_id() {
        Some(user_id) => repository.list_by_owner(user_id).await?,
        None => vec![],
    };
    Ok(ctx.page(BooksView { books }))
}

#[derive(Debug, Serialize)]
pub struct BookDetailView {
    pub book: Book,
    pub picture_url: Option<String>,
    pub avg_rating: f64,
    pub comments: Vec<CommentWithUser>,
    pub user_rating: Option<Rating>,
    pub is_favorited: bool,
}

#[allow(clippy::too_many_arguments)]
pub async fn book_detail(
    State(state): State<AppState>,
    session: Session,
    viewer: Viewer,
    Path(id): Path<i64>,
    books: BookRepository,
    comments: CommentRepository,
    ratings: RatingRepository,
    favorites: FavoriteRepository,
) -> ApiResult<impl IntoResponse> {
    let BookWithRating { book, avg_rating } = books.get_with_rating(id).await?;
    let comments = comments.list_for_book(id).await?;
    let (user_rating, is_favorited) = match viewer.user_id() {
        Some(user_id) => (
            ratings.get_for_user(id, user_id).await?,
            favorites.is_favorite(user_id, id).await?,
        ),
        None => (None, false),
    };
    let picture_url = book
        .picture
        .as_ref()
        .map(|p| format!("{}/{p}", state.config().media_url));

    // loaded last, so messages are not lost when book is missing
    let ctx = PageContext::load(&state, &session).await?;
    Ok(ctx.page(BookDetailView {
        book,
        picture_url,
        avg_rating,
        comments,
        user_rating,
        is_favorited,
    }))
}

#[derive(Debug, Serialize)]
pub struct BookDeletedView {
    pub deleted_id: i64,
}

/// Deletes any book, no ownership check
pub async fn book_delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    info!("Deleted book {id}");
    let ctx = PageContext::load(&state, &session).await?;
    Ok(ctx.page(BookDeletedView { deleted_id: id }))
}

/// Submitted values of book form, as entered
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BookFormValues {
    pub name: String,
    pub web: String,
    pub price: String,
}

impl BookFormValues {
    fn to_create_book(&self) -> Result<CreateBook, FormErrors> {
        let mut errors = FormErrors::default();
        let price = Decimal::from_str(self.price.trim()).unwrap_or_else(|_| {
            errors.add("price", "Enter a number.");
            Decimal::ZERO
        });
        let web = self.web.trim();
        let book = CreateBook {
            name: self.name.trim().to_string(),
            web: (!web.is_empty()).then(|| normalize_web(web)),
            price,
            picture: None,
            owner_id: None,
        };
        if let Err(report) = book.validate() {
            errors.append(report.into());
        }
        if errors.is_empty() {
            Ok(book)
        } else {
            Err(errors)
        }
    }
}

/// Link entered without scheme is taken as http
fn normalize_web(web: &str) -> String {
    match url::Url::parse(web) {
        Err(url::ParseError::RelativeUrlWithoutBase) => format!("http://{web}"),
        _ => web.to_string(),
    }
}

const INVALID_PICTURE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Name for storing uploaded picture, None if data is not a readable image.
/// Extension is replaced when it does not match detected format, so pictures are served as images.
fn picture_file_name(file_name: &str, data: &[u8]) -> Option<String> {
    let reader = image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    let format = reader.format()?;
    reader.into_dimensions().ok()?;

    let extensions = format.extensions_str();
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) =>
        {
            Some(file_name.to_string())
        }
        Some((stem, _)) if !stem.is_empty() => Some(format!("{stem}.{}", extensions.first()?)),
        _ => Some(format!("{file_name}.{}", extensions.first()?)),
    }
}

#[derive(Debug, Serialize)]
pub struct PostBookView {
    pub form: BookFormValues,
    pub errors: FormErrors,
}

pub async fn postbook_form(ctx: PageContext) -> impl IntoResponse {
    ctx.page(PostBookView {
        form: BookFormValues::default(),
        errors: FormErrors::default(),
    })
}

pub async fn postbook(
    State(state): State<AppState>,
    viewer: Viewer,
    session: Session,
    repository: BookRepository,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut values = BookFormValues::default();
    let mut picture: Option<(String, Bytes)> = None;
    let mut invalid_picture = false;
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => values.name = field.text().await?,
            "web" => values.web = field.text().await?,
            "price" => values.price = field.text().await?,
            "picture" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                // browser sends empty part when no file is chosen
                if !file_name.is_empty() && !data.is_empty() {
                    match picture_file_name(&file_name, &data) {
                        Some(name) => picture = Some((name, data)),
                        None => {
                            debug!("Uploaded file {file_name} is not an image");
                            invalid_picture = true;
                        }
                    }
                }
            }
            other => debug!("Ignoring form field {other}"),
        }
    }

    let mut new_book = match (values.to_create_book(), invalid_picture) {
        (Ok(book), false) => book,
        (result, invalid_picture) => {
            let mut errors = result.err().unwrap_or_default();
            if invalid_picture {
                errors.add("picture", INVALID_PICTURE_MESSAGE);
            }
            debug!("Invalid book form: {errors:?}");
            let ctx = PageContext::load(&state, &session).await?;
            let page = ctx.page(PostBookView {
                form: values,
                errors,
            });
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    if let Some((file_name, data)) = picture {
        let dest_path = picture_path(&file_name)?;
        let info = state.store().store_data(&dest_path, &data).await?;
        debug!(
            "Stored picture {file_name} as {:?}, size {}",
            info.final_path, info.size
        );
        new_book.picture = Some(info.final_path.into());
    }
    new_book.owner_id = viewer.user_id();

    let book = repository.create(new_book).await?;
    if let Some(picture) = book.picture.as_deref() {
        if let Err(e) = repository.set_pic_path(book.id, picture).await {
            error!("Failed to set picture path of book {}: {e}", book.id);
        }
    }
    info!("Created book {} ({})", book.id, book.name);

    Ok(Redirect::to(BOOKS_PATH).into_response())
}

pub fn router(upload_limit_mb: usize) -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(index))
        .route("/aboutus", get(aboutus))
        .route(
            "/postbook",
            get(postbook_form)
                .post(postbook)
                .layer(DefaultBodyLimit::max(1024 * 1024 * upload_limit_mb)),
        )
        .route(BOOKS_PATH, get(displaybooks))
        .route("/mybooks", get(mybooks))
        .route("/book_detail/{id}", get(book_detail))
        .route("/book_delete/{id}", get(book_delete))
}
