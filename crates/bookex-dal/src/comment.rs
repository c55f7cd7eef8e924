use crate::{Error, error::Result};
use futures::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use sqlx::Pool;

pub const MAX_COMMENT_LENGTH: usize = 500;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: time::PrimitiveDateTime,
}

/// Comment with author's name, as shown on book detail
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct CommentWithUser {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub created_at: time::PrimitiveDateTime,
}

pub type CommentRepository = CommentRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct CommentRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> CommentRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, book_id: i64, user_id: i64, text: &str) -> Result<Comment> {
        let result = sqlx::query("INSERT INTO comment (book_id, user_id, text) VALUES (?, ?, ?)")
            .bind(book_id)
            .bind(user_id)
            .bind(text)
            .execute(&self.executor)
            .await?;

        let id = result.last_insert_rowid();
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Comment> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, book_id, user_id, text, created_at FROM comment WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Comment".to_string()))
    }

    /// Newest first
    pub async fn list_for_book(&self, book_id: i64) -> Result<Vec<CommentWithUser>> {
        let records = sqlx::query_as::<_, CommentWithUser>(
            "SELECT c.id, c.book_id, c.user_id, u.username, c.text, c.created_at
            FROM comment c JOIN users u ON c.user_id = u.id
            WHERE c.book_id = ?
            ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(book_id)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    /// Deletes comment only if it belongs to the user, returns true if deleted
    pub async fn delete_owned(&self, id: i64, user_id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM comment WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.executor)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
