use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::{
    cleanup::CleanupCmd, create_user::CreateUserCmd, menu::MenuCmd, Executor,
};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "CLI for bookex - manages users, site menu and stored pictures directly in bookex data directory."
)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    CreateUser(CreateUserCmd),
    Menu(MenuCmd),
    Cleanup(CleanupCmd),
}

impl Executor for Command {
    async fn run(self) -> anyhow::Result<()> {
        match self {
            Command::CreateUser(cmd) => cmd.run().await,
            Command::Menu(cmd) => cmd.run().await,
            Command::Cleanup(cmd) => cmd.run().await,
        }
    }
}

/// Location of server data, same defaults as server uses
#[derive(Args, Debug, Clone)]
pub struct BackendConfig {
    #[arg(
        long,
        env = "BOOKEX_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db, default is sqlite://[data-dir]/bookex.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "BOOKEX_DATA_DIR",
        help = "Data directory (database, uploaded pictures), default is system default like ~/.local/share/bookex",
        default_value_t = default_data_dir()
    )]
    data_dir: String,

    #[arg(
        long,
        env = "BOOKEX_FILES_DIR",
        help = "Directory for uploaded pictures, default data_dir/media"
    )]
    files_dir: Option<PathBuf>,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("bookex"))
        .unwrap_or_else(|| PathBuf::from("bookex"))
        .to_string_lossy()
        .to_string()
}

impl BackendConfig {
    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/bookex.db", self.data_dir))
    }

    pub fn files_dir(&self) -> PathBuf {
        self.files_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.data_dir).join("media"))
    }

    /// Opens database, schema is migrated to current version
    pub async fn connect(&self) -> anyhow::Result<bookex_dal::Pool> {
        if self.database_url.is_none() {
            tokio::fs::create_dir_all(&self.data_dir).await?;
        }
        let pool = bookex_dal::new_pool(&self.database_url()).await?;
        bookex_dal::migrate(&pool).await?;
        Ok(pool)
    }
}
