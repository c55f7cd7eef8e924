use std::str::FromStr as _;

use bookex_dal::{
    book::{BookRepository, CreateBook},
    comment::CommentRepository,
    favorite::{FavoriteRepository, FavoriteToggle},
    menu::{CreateMenuItem, MenuRepository},
    rating::{RatingOutcome, RatingRepository},
    user::{CreateUser, UserRepository},
};
use futures::TryStreamExt as _;
use rust_decimal::Decimal;
use sqlx::Executor;

const TEST_DATA: &str = r#"
INSERT INTO users (id, username, password) VALUES (1, 'frodo', 'x');
INSERT INTO users (id, username, password) VALUES (2, 'sam', 'x');

INSERT INTO book (id, name, web, price_cents, owner_id)
VALUES (1, 'The Hobbit', 'https://www.tolkien.co.uk/hobbit', 1250, 1);
INSERT INTO book (id, name, web, price_cents, owner_id)
VALUES (2, 'Dune', 'https://dunenovels.com', 999, 2);
INSERT INTO book (id, name, web, price_cents, owner_id)
VALUES (3, 'Silmarillion by TOLKIEN', '', 2000, NULL);
"#;

/// Rows of given table belonging to book
async fn count_for_book(conn: &sqlx::Pool<sqlx::Sqlite>, table: &str, book_id: i64) -> i64 {
    sqlx::query_scalar(&format!("SELECT count(*) FROM {table} WHERE book_id = ?"))
        .bind(book_id)
        .fetch_one(conn)
        .await
        .unwrap()
}

async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    const DB_URL: &str = "sqlite::memory:";
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    bookex_dal::migrate(&conn).await.unwrap();

    conn.execute_many(TEST_DATA)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    conn
}

#[tokio::test]
async fn test_book_create_and_list() {
    let conn = init_db().await;
    let repo = BookRepository::new(conn);

    let new_book = CreateBook {
        name: "Anathem".to_string(),
        web: None,
        price: Decimal::from_str("15.5").unwrap(),
        picture: Some("books/anathem.jpg".to_string()),
        owner_id: Some(1),
    };
    let book = repo.create(new_book).await.unwrap();
    assert_eq!(book.name, "Anathem");
    assert_eq!(book.web, "");
    assert_eq!(book.price.to_string(), "15.50");
    assert_eq!(book.pic_path, "");
    assert_eq!(book.publish_date, time::OffsetDateTime::now_utc().date());

    repo.set_pic_path(book.id, "books/anathem.jpg").await.unwrap();
    let book = repo.get(book.id).await.unwrap();
    assert_eq!(book.pic_path, "books/anathem.jpg");

    let all = repo.list().await.unwrap();
    let names: Vec<_> = all.iter().map(|b| b.book.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Anathem", "Dune", "Silmarillion by TOLKIEN", "The Hobbit"]
    );
    assert!(all.iter().all(|b| b.avg_rating == 0.0));

    let mine = repo.list_by_owner(1).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].book.name, "Anathem");
}

#[tokio::test]
async fn test_book_not_found() {
    let conn = init_db().await;
    let repo = BookRepository::new(conn);
    assert!(matches!(
        repo.get(42).await,
        Err(bookex_dal::Error::RecordNotFound(_))
    ));
    assert!(matches!(
        repo.delete(42).await,
        Err(bookex_dal::Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_search() {
    let conn = init_db().await;
    let repo = BookRepository::new(conn);

    assert!(repo.search("").await.unwrap().is_empty());
    assert!(repo.search("   ").await.unwrap().is_empty());

    let found = repo.search("tolkien").await.unwrap();
    let ids: Vec<_> = found.iter().map(|b| b.book.id).collect();
    // name match for 3, web match for 1, ordered by name
    assert_eq!(ids, vec![3, 1]);

    let found = repo.search("DUNE").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].book.id, 2);

    assert!(repo.search("100%").await.unwrap().is_empty());

    let book = repo
        .create(CreateBook {
            name: "Válka s mloky".to_string(),
            web: None,
            price: Decimal::from_str("9.90").unwrap(),
            picture: None,
            owner_id: None,
        })
        .await
        .unwrap();
    for query in ["válka", "VÁLKA", "s MLOKY"] {
        let found = repo.search(query).await.unwrap();
        assert_eq!(found.len(), 1, "query {query}");
        assert_eq!(found[0].book.id, book.id);
    }
}

#[tokio::test]
async fn test_get_many() {
    let conn = init_db().await;
    let repo = BookRepository::new(conn);
    assert!(repo.get_many(&[]).await.unwrap().is_empty());
    let books = repo.get_many(&[1, 2, 77]).await.unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn test_rating_upsert() {
    let conn = init_db().await;
    let repo = RatingRepository::new(conn.clone());

    let outcome = repo.upsert(1, 1, 3).await.unwrap();
    assert!(matches!(outcome, RatingOutcome::Created(_)));
    assert_eq!(outcome.rating().stars, 3);

    let outcome = repo.upsert(1, 1, 5).await.unwrap();
    assert!(matches!(outcome, RatingOutcome::Updated(_)));
    assert_eq!(outcome.rating().stars, 5);

    assert_eq!(count_for_book(&conn, "rating", 1).await, 1);
    let rating = repo.get_for_user(1, 1).await.unwrap().unwrap();
    assert_eq!(rating.stars, 5);
    assert!(repo.get_for_user(1, 2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rating_range_enforced_by_db() {
    let conn = init_db().await;
    let repo = RatingRepository::new(conn.clone());

    repo.upsert(1, 1, 4).await.unwrap();
    assert!(repo.upsert(1, 1, 6).await.is_err());
    assert!(repo.upsert(1, 2, 0).await.is_err());

    assert_eq!(count_for_book(&conn, "rating", 1).await, 1);
    assert_eq!(repo.get_for_user(1, 1).await.unwrap().unwrap().stars, 4);
}

#[tokio::test]
async fn test_average_rating() {
    let conn = init_db().await;
    let repo = RatingRepository::new(conn.clone());
    let books = BookRepository::new(conn);

    assert_eq!(repo.average(1).await.unwrap(), 0.0);
    repo.upsert(1, 1, 4).await.unwrap();
    repo.upsert(1, 2, 5).await.unwrap();
    assert_eq!(repo.average(1).await.unwrap(), 4.5);

    let book = books.get_with_rating(1).await.unwrap();
    assert_eq!(book.avg_rating, 4.5);
    let listed = books.list().await.unwrap();
    let hobbit = listed.iter().find(|b| b.book.id == 1).unwrap();
    assert_eq!(hobbit.avg_rating, 4.5);
    let dune = listed.iter().find(|b| b.book.id == 2).unwrap();
    assert_eq!(dune.avg_rating, 0.0);
}

#[tokio::test]
async fn test_favorite_toggle() {
    let conn = init_db().await;
    let repo = FavoriteRepository::new(conn.clone());

    assert_eq!(repo.toggle(1, 1).await.unwrap(), FavoriteToggle::Added);
    assert!(repo.is_favorite(1, 1).await.unwrap());
    assert_eq!(count_for_book(&conn, "favorite", 1).await, 1);

    assert_eq!(repo.toggle(1, 1).await.unwrap(), FavoriteToggle::Removed);
    assert!(!repo.is_favorite(1, 1).await.unwrap());
    assert_eq!(count_for_book(&conn, "favorite", 1).await, 0);
}

#[tokio::test]
async fn test_favorites_newest_first() {
    let conn = init_db().await;
    let repo = FavoriteRepository::new(conn.clone());
    let ratings = RatingRepository::new(conn);

    repo.toggle(1, 2).await.unwrap();
    repo.toggle(1, 1).await.unwrap();
    repo.toggle(2, 3).await.unwrap();
    ratings.upsert(1, 2, 2).await.unwrap();

    let books = repo.list_books(1).await.unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.book.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(books[0].avg_rating, 2.0);
}

#[tokio::test]
async fn test_comments() {
    let conn = init_db().await;
    let repo = CommentRepository::new(conn.clone());

    let first = repo.create(1, 1, "Great start").await.unwrap();
    let second = repo.create(1, 2, "Too many songs").await.unwrap();

    let comments = repo.list_for_book(1).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].id, second.id);
    assert_eq!(comments[0].username, "sam");
    assert_eq!(comments[1].id, first.id);

    // not an owner
    assert!(!repo.delete_owned(first.id, 2).await.unwrap());
    assert_eq!(count_for_book(&conn, "comment", 1).await, 2);

    assert!(repo.delete_owned(first.id, 1).await.unwrap());
    assert_eq!(count_for_book(&conn, "comment", 1).await, 1);
}

#[tokio::test]
async fn test_book_delete_cascades() {
    let conn = init_db().await;
    let books = BookRepository::new(conn.clone());
    let comments = CommentRepository::new(conn.clone());
    let ratings = RatingRepository::new(conn.clone());
    let favorites = FavoriteRepository::new(conn.clone());

    comments.create(1, 2, "Mine!").await.unwrap();
    ratings.upsert(1, 2, 5).await.unwrap();
    favorites.toggle(2, 1).await.unwrap();

    books.delete(1).await.unwrap();

    for table in ["comment", "rating", "favorite"] {
        assert_eq!(count_for_book(&conn, table, 1).await, 0);
    }
    assert!(favorites.list_books(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_users() {
    let conn = init_db().await;
    let repo = UserRepository::new(conn);

    let user = repo
        .create(CreateUser {
            username: "gandalf".to_string(),
            password: "you-shall-not-pass".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(user.username, "gandalf");

    let duplicate = repo
        .create(CreateUser {
            username: "gandalf".to_string(),
            password: "another-password".to_string(),
        })
        .await;
    assert!(matches!(duplicate, Err(bookex_dal::Error::AlreadyExists(_))));

    let checked = repo
        .check_password("gandalf", "you-shall-not-pass")
        .await
        .unwrap();
    assert_eq!(checked, user);
    assert!(matches!(
        repo.check_password("gandalf", "wrong").await,
        Err(bookex_dal::Error::InvalidCredentials)
    ));
    assert!(matches!(
        repo.check_password("saruman", "whatever").await,
        Err(bookex_dal::Error::InvalidCredentials)
    ));
    assert_eq!(repo.list(10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_menu() {
    let conn = init_db().await;
    let repo = MenuRepository::new(conn);

    repo.create(CreateMenuItem {
        item: "Home".to_string(),
        link: "/".to_string(),
    })
    .await
    .unwrap();
    repo.create(CreateMenuItem {
        item: "Books".to_string(),
        link: "/displaybooks".to_string(),
    })
    .await
    .unwrap();
    let duplicate = repo
        .create(CreateMenuItem {
            item: "Home".to_string(),
            link: "/home".to_string(),
        })
        .await;
    assert!(matches!(duplicate, Err(bookex_dal::Error::AlreadyExists(_))));

    let menu = repo.list().await.unwrap();
    assert_eq!(menu.len(), 2);
    assert_eq!(menu[0].item, "Home");
    repo.delete(menu[0].id).await.unwrap();
    assert_eq!(repo.list().await.unwrap().len(), 1);
}
