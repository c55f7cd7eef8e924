use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::Pool;

pub const MIN_STARS: i64 = 1;
pub const MAX_STARS: i64 = 5;

pub fn is_valid_stars(stars: i64) -> bool {
    (MIN_STARS..=MAX_STARS).contains(&stars)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub stars: i64,
    /// 1 for newly created rating, incremented on each update
    pub version: i64,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RatingOutcome {
    Created(Rating),
    Updated(Rating),
}

impl RatingOutcome {
    pub fn rating(&self) -> &Rating {
        match self {
            RatingOutcome::Created(rating) | RatingOutcome::Updated(rating) => rating,
        }
    }
}

pub type RatingRepository = RatingRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct RatingRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> RatingRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Creates rating of the book by the user or replaces its stars, in one statement.
    /// Stars out of range are refused by the database.
    pub async fn upsert(&self, book_id: i64, user_id: i64, stars: i64) -> Result<RatingOutcome> {
        let rating = sqlx::query_as::<_, Rating>(
            "INSERT INTO rating (book_id, user_id, stars) VALUES (?, ?, ?)
            ON CONFLICT (book_id, user_id) DO UPDATE
            SET stars = excluded.stars, version = rating.version + 1
            RETURNING id, book_id, user_id, stars, version, created_at",
        )
        .bind(book_id)
        .bind(user_id)
        .bind(stars)
        .fetch_one(&self.executor)
        .await?;

        if rating.version == 1 {
            Ok(RatingOutcome::Created(rating))
        } else {
            Ok(RatingOutcome::Updated(rating))
        }
    }

    pub async fn get_for_user(&self, book_id: i64, user_id: i64) -> Result<Option<Rating>> {
        let rating = sqlx::query_as::<_, Rating>(
            "SELECT id, book_id, user_id, stars, version, created_at
            FROM rating WHERE book_id = ? AND user_id = ?",
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(&self.executor)
        .await?;
        Ok(rating)
    }

    /// Mean of all stars given to the book, 0 if there are none
    pub async fn average(&self, book_id: i64) -> Result<f64> {
        let avg: f64 = sqlx::query_scalar(
            "SELECT COALESCE(AVG(stars), 0.0) FROM rating WHERE book_id = ?",
        )
        .bind(book_id)
        .fetch_one(&self.executor)
        .await?;
        Ok(avg)
    }
}
