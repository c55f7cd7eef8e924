use std::collections::HashSet;

use bookex_dal::book::BookRepository;
use bookex_store::StorePrefix;
use clap::Parser;
use tokio::fs;
use tracing::info;

use crate::{commands::Executor, config::BackendConfig};

/// Deletes stored pictures no book refers to
#[derive(Parser, Debug)]
pub struct CleanupCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(long, help = "Only print files which would be deleted")]
    dry_run: bool,
}

impl Executor for CleanupCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = self.backend.connect().await?;
        let referenced: HashSet<String> = BookRepository::new(pool)
            .list()
            .await?
            .into_iter()
            .filter_map(|b| b.book.picture)
            .collect();

        let prefix = StorePrefix::Books.as_str();
        let pictures_dir = self.backend.files_dir().join(prefix);
        if !pictures_dir.is_dir() {
            info!("No pictures directory {pictures_dir:?}");
            return Ok(());
        }

        let mut unreferenced = 0;
        let mut files = fs::read_dir(&pictures_dir).await?;
        while let Some(file) = files.next_entry().await? {
            if !file.file_type().await?.is_file() {
                continue;
            }
            let store_path = format!("{prefix}/{}", file.file_name().to_string_lossy());
            if referenced.contains(&store_path) {
                continue;
            }
            unreferenced += 1;
            if self.dry_run {
                println!("Would delete {:?}", file.path());
            } else {
                fs::remove_file(file.path()).await?;
                println!("Deleted {:?}", file.path());
            }
        }
        info!("Found {unreferenced} unreferenced pictures");

        Ok(())
    }
}
