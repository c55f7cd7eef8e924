use crate::{ChosenRow, Error, error::Result};
use futures::TryStreamExt as _;
use garde::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, QueryBuilder, Row};

/// Price has two decimal places, at most eight digits in total
const PRICE_SCALE: u32 = 2;
const PRICE_LIMIT: i64 = 1_000_000;

fn valid_price(price: &Decimal, _ctx: &()) -> garde::Result {
    if price.normalize().scale() > PRICE_SCALE {
        return Err(garde::Error::new("at most 2 decimal places allowed"));
    }
    if price.abs() >= Decimal::from(PRICE_LIMIT) {
        return Err(garde::Error::new("at most 8 digits allowed"));
    }
    Ok(())
}

/// Schemes allowed for book web link, others could run script when the link is followed
const WEB_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps"];

fn valid_web(web: &Option<String>, _ctx: &()) -> garde::Result {
    let Some(web) = web else {
        return Ok(());
    };
    let url = url::Url::parse(web).map_err(|_| garde::Error::new("Enter a valid URL."))?;
    if WEB_SCHEMES.contains(&url.scheme()) && url.has_host() {
        Ok(())
    } else {
        Err(garde::Error::new("Enter a valid URL."))
    }
}

pub(crate) fn price_to_cents(price: Decimal) -> i64 {
    let mut price = price.round_dp(PRICE_SCALE);
    price.rescale(PRICE_SCALE);
    price.mantissa() as i64
}

pub(crate) fn price_from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, PRICE_SCALE)
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateBook {
    #[garde(length(min = 1, max = 200))]
    pub name: String,
    #[garde(custom(valid_web), length(max = 300))]
    pub web: Option<String>,
    #[garde(custom(valid_price))]
    pub price: Decimal,
    #[garde(length(min = 1, max = 300))]
    pub picture: Option<String>,
    #[garde(skip)]
    pub owner_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub name: String,
    /// empty when not provided
    pub web: String,
    pub price: Decimal,
    pub publish_date: time::Date,
    pub picture: Option<String>,
    /// denormalized copy of `picture`
    pub pic_path: String,
    pub owner_id: Option<i64>,
}

impl sqlx::FromRow<'_, ChosenRow> for Book {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(Book {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            web: row.try_get("web")?,
            price: price_from_cents(row.try_get("price_cents")?),
            publish_date: row.try_get("publish_date")?,
            picture: row.try_get("picture")?,
            pic_path: row.try_get("pic_path")?,
            owner_id: row.try_get("owner_id")?,
        })
    }
}

/// Book annotated with average of its ratings, 0 when not rated yet
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookWithRating {
    #[serde(flatten)]
    pub book: Book,
    pub avg_rating: f64,
}

impl sqlx::FromRow<'_, ChosenRow> for BookWithRating {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(BookWithRating {
            book: Book::from_row(row)?,
            avg_rating: row.try_get("avg_rating")?,
        })
    }
}

pub(crate) const BOOK_COLUMNS: &str =
    "b.id, b.name, b.web, b.price_cents, b.publish_date, b.picture, b.pic_path, b.owner_id";

pub(crate) const AVG_RATING_COLUMN: &str =
    "COALESCE((SELECT AVG(r.stars) FROM rating r WHERE r.book_id = b.id), 0.0) AS avg_rating";

pub type BookRepository = BookRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct BookRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> BookRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateBook) -> Result<Book> {
        let result = sqlx::query(
            "INSERT INTO book (name, web, price_cents, publish_date, picture, owner_id)
            VALUES (?, ?, ?, date('now'), ?, ?)",
        )
        .bind(&payload.name)
        .bind(payload.web.as_deref().unwrap_or_default())
        .bind(price_to_cents(payload.price))
        .bind(&payload.picture)
        .bind(payload.owner_id)
        .execute(&self.executor)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id).await
    }

    pub async fn set_pic_path(&self, id: i64, pic_path: &str) -> Result<()> {
        let res = sqlx::query("UPDATE book SET pic_path = ? WHERE id = ?")
            .bind(pic_path)
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Book".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM book b WHERE b.id = ?");
        sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Book".to_string()))
    }

    pub async fn get_with_rating(&self, id: i64) -> Result<BookWithRating> {
        let sql = format!("SELECT {BOOK_COLUMNS}, {AVG_RATING_COLUMN} FROM book b WHERE b.id = ?");
        sqlx::query_as::<_, BookWithRating>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Book".to_string()))
    }

    /// All books ordered by name
    pub async fn list(&self) -> Result<Vec<BookWithRating>> {
        let sql =
            format!("SELECT {BOOK_COLUMNS}, {AVG_RATING_COLUMN} FROM book b ORDER BY b.name, b.id");
        let records = sqlx::query_as::<_, BookWithRating>(&sql)
            .fetch(&self.executor)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(records)
    }

    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<BookWithRating>> {
        let sql = format!(
            "SELECT {BOOK_COLUMNS}, {AVG_RATING_COLUMN} FROM book b
            WHERE b.owner_id = ? ORDER BY b.name, b.id"
        );
        let records = sqlx::query_as::<_, BookWithRating>(&sql)
            .bind(owner_id)
            .fetch(&self.executor)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(records)
    }

    /// Case insensitive substring search in name or web, blank query matches nothing
    pub async fn search(&self, query: &str) -> Result<Vec<BookWithRating>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(vec![]);
        }
        // filtered here, SQLite LIKE folds case of ASCII letters only
        let records = self
            .list()
            .await?
            .into_iter()
            .filter(|b| {
                b.book.name.to_lowercase().contains(&query)
                    || b.book.web.to_lowercase().contains(&query)
            })
            .collect();
        Ok(records)
    }

    /// Books with given ids, missing ids are skipped
    pub async fn get_many(&self, ids: &[i64]) -> Result<Vec<Book>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut builder = QueryBuilder::<crate::ChosenDB>::new(format!(
            "SELECT {BOOK_COLUMNS} FROM book b WHERE b.id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY b.name, b.id");
        let records = builder
            .build_query_as::<Book>()
            .fetch(&self.executor)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(records)
    }

    /// Comments, ratings and favorites of the book go with it
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM book WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Book".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    fn book(price: &str, web: Option<&str>) -> CreateBook {
        CreateBook {
            name: "The Hobbit".to_string(),
            web: web.map(String::from),
            price: Decimal::from_str(price).unwrap(),
            picture: None,
            owner_id: None,
        }
    }

    #[test]
    fn test_price_cents() {
        assert_eq!(price_to_cents(Decimal::from_str("12.5").unwrap()), 1250);
        assert_eq!(price_to_cents(Decimal::from_str("7").unwrap()), 700);
        assert_eq!(price_to_cents(Decimal::from_str("0.99").unwrap()), 99);
        assert_eq!(price_from_cents(1250).to_string(), "12.50");
    }

    #[test]
    fn test_book_validation() {
        assert!(book("12.50", None).validate().is_ok());
        assert!(book("12.50", Some("https://tolkien.co.uk")).validate().is_ok());
        assert!(book("12.50", Some("not an url")).validate().is_err());
        assert!(book("12.50", Some("ftp://ftp.tolkien.co.uk/maps")).validate().is_ok());
        assert!(
            book("12.50", Some("javascript:alert(document.cookie)"))
                .validate()
                .is_err()
        );
        assert!(
            book("12.50", Some("data:text/html,<script>alert(1)</script>"))
                .validate()
                .is_err()
        );
        assert!(book("12.50", Some("mailto:bilbo@shire")).validate().is_err());
        assert!(book("12.505", None).validate().is_err());
        assert!(book("1000000", None).validate().is_err());
        assert!(book("999999.99", None).validate().is_ok());
    }
}
