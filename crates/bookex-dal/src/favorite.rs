use crate::{
    book::{AVG_RATING_COLUMN, BOOK_COLUMNS, BookWithRating},
    error::Result,
};
use futures::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FavoriteToggle {
    Added,
    Removed,
}

pub type FavoriteRepository = FavoriteRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct FavoriteRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> FavoriteRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn is_favorite(&self, user_id: i64, book_id: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM favorite WHERE user_id = ? AND book_id = ?")
                .bind(user_id)
                .bind(book_id)
                .fetch_optional(&self.executor)
                .await?;
        Ok(found.is_some())
    }

    /// User's favorite books, most recently added first
    pub async fn list_books(&self, user_id: i64) -> Result<Vec<BookWithRating>> {
        let sql = format!(
            "SELECT {BOOK_COLUMNS}, {AVG_RATING_COLUMN}
            FROM favorite f JOIN book b ON f.book_id = b.id
            WHERE f.user_id = ?
            ORDER BY f.added_at DESC, f.id DESC"
        );
        let records = sqlx::query_as::<_, BookWithRating>(&sql)
            .bind(user_id)
            .fetch(&self.executor)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(records)
    }
}

impl FavoriteRepository {
    /// Removes the favorite if present, adds it otherwise - in one transaction
    pub async fn toggle(&self, user_id: i64, book_id: i64) -> Result<FavoriteToggle> {
        let mut tx = self.executor.begin().await?;
        let removed = sqlx::query("DELETE FROM favorite WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let outcome = if removed > 0 {
            FavoriteToggle::Removed
        } else {
            sqlx::query(
                "INSERT INTO favorite (user_id, book_id) VALUES (?, ?)
                ON CONFLICT (user_id, book_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(book_id)
            .execute(&mut *tx)
            .await?;
            FavoriteToggle::Added
        };
        tx.commit().await?;
        debug!("Favorite of book {book_id} for user {user_id}: {outcome:?}");
        Ok(outcome)
    }
}
