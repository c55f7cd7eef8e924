use crate::{Error, error::Result};
use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateMenuItem {
    #[garde(length(min = 1, max = 300))]
    pub item: String,
    #[garde(length(min = 1, max = 300))]
    pub link: String,
}

/// Entry of the site navigation, shared by all views
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MainMenu {
    pub id: i64,
    pub item: String,
    pub link: String,
}

pub type MenuRepository = MenuRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct MenuRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MenuRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateMenuItem) -> Result<MainMenu> {
        let result = sqlx::query("INSERT INTO main_menu (item, link) VALUES (?, ?)")
            .bind(&payload.item)
            .bind(&payload.link)
            .execute(&self.executor)
            .await
            .map_err(|e| Error::from_insert(e, "Menu item"))?;

        let id = result.last_insert_rowid();
        Ok(MainMenu {
            id,
            item: payload.item,
            link: payload.link,
        })
    }

    pub async fn list(&self) -> Result<Vec<MainMenu>> {
        let records =
            sqlx::query_as::<_, MainMenu>("SELECT id, item, link FROM main_menu ORDER BY id")
                .fetch(&self.executor)
                .try_collect::<Vec<_>>()
                .await?;
        Ok(records)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM main_menu WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Menu item".to_string()))
        } else {
            Ok(())
        }
    }
}
