use std::{path::PathBuf, time::Duration};

use crate::error::Result;
use bookex_app::state::AppConfig;
pub use clap::Parser;

pub const MEDIA_PATH: &str = "/media";

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "BOOKEX_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "BOOKEX_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

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

    #[arg(
        long,
        env = "BOOKEX_UPLOAD_LIMIT_MB",
        default_value = "10",
        help = "Maximum upload size in MB"
    )]
    pub upload_limit_mb: usize,

    #[arg(
        long,
        env = "BOOKEX_SESSION_EXPIRY",
        default_value = "14days",
        help = "Session expires after this inactivity, in human friendly format (e.g. 1d, 1h, 1m, 1s - or combined)",
        value_parser = humantime::parse_duration
    )]
    pub session_expiry: Duration,

    #[arg(
        long,
        env = "BOOKEX_SECURE_COOKIE",
        help = "Send session cookie over HTTPS only"
    )]
    pub secure_cookie: bool,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("bookex"))
        .unwrap_or_else(|| PathBuf::from("bookex"))
        .to_string_lossy()
        .to_string()
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.files_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("media"))
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/bookex.db", self.data_dir))
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            upload_limit_mb: config.upload_limit_mb,
            media_url: MEDIA_PATH.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config =
            ServerConfig::try_parse_from(["bookex-server", "--data-dir", "/tmp/bookex-test"])
                .unwrap();
        assert_eq!(config.database_url(), "sqlite:///tmp/bookex-test/bookex.db");
        assert_eq!(config.files_dir(), PathBuf::from("/tmp/bookex-test/media"));
        assert_eq!(config.session_expiry, Duration::from_secs(14 * 24 * 3600));
        assert!(!config.secure_cookie);
    }

    #[test]
    fn test_explicit_values() {
        let config = ServerConfig::try_parse_from([
            "bookex-server",
            "--port",
            "8080",
            "--files-dir",
            "/srv/pictures",
            "--database-url",
            "sqlite::memory:",
            "--session-expiry",
            "1h 30m",
            "--secure-cookie",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.files_dir(), PathBuf::from("/srv/pictures"));
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.session_expiry, Duration::from_secs(5400));
        assert!(config.secure_cookie);
    }
}
