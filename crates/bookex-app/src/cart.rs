//! Shopping cart kept in session, maps book id to quantity

use std::collections::BTreeMap;

use axum::{
    extract::Path,
    response::{IntoResponse, Redirect},
    routing::get,
};
use bookex_dal::book::{Book, BookRepository};
use http::{header::REFERER, HeaderMap};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::debug;

use crate::{error::ApiResult, state::AppState, view::PageContext};

const SESSION_CART_KEY: &str = "cart";
const CART_PATH: &str = "/cart";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart(BTreeMap<String, i64>);

impl Cart {
    /// Increments quantity, first add sets it to 1
    pub fn add(&mut self, book_id: impl Into<String>) -> i64 {
        let qty = self.0.entry(book_id.into()).or_insert(0);
        *qty += 1;
        *qty
    }

    pub fn remove(&mut self, book_id: &str) -> Option<i64> {
        self.0.remove(book_id)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn quantity(&self, book_id: &str) -> Option<i64> {
        self.0.get(book_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Numeric keys only, anything else cannot be a book
    pub fn book_ids(&self) -> Vec<i64> {
        self.0.keys().filter_map(|k| k.parse().ok()).collect()
    }
}

async fn load_cart(session: &Session) -> ApiResult<Cart> {
    let cart = session
        .get::<Cart>(SESSION_CART_KEY)
        .await?
        .unwrap_or_default();
    Ok(cart)
}

async fn save_cart(session: &Session, cart: &Cart) -> ApiResult<()> {
    session.insert(SESSION_CART_KEY, cart).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CartRow {
    pub book: Book,
    pub qty: i64,
    pub line: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub rows: Vec<CartRow>,
    pub total: Decimal,
}

impl CartView {
    /// Pairs cart entries with found books, entries without book are skipped
    pub fn new(cart: &Cart, books: Vec<Book>) -> Self {
        let rows: Vec<CartRow> = books
            .into_iter()
            .filter_map(|book| {
                let qty = cart.quantity(&book.id.to_string())?;
                let line = book.price * Decimal::from(qty);
                Some(CartRow { book, qty, line })
            })
            .collect();
        let total = rows.iter().map(|r| r.line).sum();
        CartView { rows, total }
    }
}

pub async fn cart_view(
    ctx: PageContext,
    session: Session,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    let cart = load_cart(&session).await?;
    let books = repository.get_many(&cart.book_ids()).await?;
    Ok(ctx.page(CartView::new(&cart, books)))
}

/// Goes back to referring page, or to cart
pub async fn cart_add(
    session: Session,
    Path(book_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let mut cart = load_cart(&session).await?;
    let qty = cart.add(book_id.to_string());
    save_cart(&session, &cart).await?;
    debug!("Cart has {qty} of book {book_id}");

    let back = headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(CART_PATH);
    Ok(Redirect::to(back))
}

pub async fn cart_remove(
    session: Session,
    Path(book_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut cart = load_cart(&session).await?;
    cart.remove(&book_id.to_string());
    save_cart(&session, &cart).await?;
    Ok(Redirect::to(CART_PATH))
}

pub async fn cart_clear(session: Session) -> ApiResult<impl IntoResponse> {
    save_cart(&session, &Cart::default()).await?;
    Ok(Redirect::to(CART_PATH))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(CART_PATH, get(cart_view))
        .route("/cart/add/{id}", get(cart_add))
        .route("/cart/remove/{id}", get(cart_remove))
        .route("/cart/clear", get(cart_clear))
}
