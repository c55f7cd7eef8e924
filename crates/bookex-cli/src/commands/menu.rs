use clap::{Parser, Subcommand};
use garde::Validate as _;

use bookex_dal::menu::{CreateMenuItem, MenuRepository};

use crate::{commands::Executor, config::BackendConfig};

#[derive(Parser, Debug)]
pub struct MenuCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[command(subcommand)]
    action: MenuAction,
}

#[derive(Subcommand, Debug)]
pub enum MenuAction {
    /// Adds item to site menu
    Add {
        #[arg(short, long, help = "Shown text, must be unique")]
        item: String,
        #[arg(short, long, help = "Target URL, must be unique")]
        link: String,
    },
    /// Lists site menu items in order
    List,
    /// Removes menu item by id
    Delete { id: i64 },
}

impl Executor for MenuCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = self.backend.connect().await?;
        let repository = MenuRepository::new(pool);
        match self.action {
            MenuAction::Add { item, link } => {
                let new_item = CreateMenuItem { item, link };
                new_item.validate()?;
                let record = repository.create(new_item).await?;
                println!("Added menu item {} with id {}", record.item, record.id);
            }
            MenuAction::List => {
                for record in repository.list().await? {
                    println!("{}\t{}\t{}", record.id, record.item, record.link);
                }
            }
            MenuAction::Delete { id } => {
                repository.delete(id).await?;
                println!("Deleted menu item {id}");
            }
        }
        Ok(())
    }
}
