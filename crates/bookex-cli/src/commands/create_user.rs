use clap::Parser;
use garde::Validate as _;

use crate::{commands::Executor, config::BackendConfig};

#[derive(Parser, Debug)]
pub struct CreateUserCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(short, long, help = "User name, letters, digits and @/./+/-/_ only")]
    pub username: String,
    #[arg(
        short,
        long,
        env = "BOOKEX_USER_PASSWORD",
        help = "User password, at least 8 characters"
    )]
    pub password: String,
}

impl Executor for CreateUserCmd {
    async fn run(self) -> anyhow::Result<()> {
        let new_user = bookex_dal::user::CreateUser {
            username: self.username,
            password: self.password,
        };
        new_user.validate()?;

        let pool = self.backend.connect().await?;
        let repository = bookex_dal::user::UserRepository::new(pool);
        let user = repository.create(new_user).await?;
        println!("Created user {} with id {}", user.username, user.id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use crate::config::{CliConfig, Command};

    use super::*;

    fn command(data_dir: &str, username: &str, password: &str) -> CreateUserCmd {
        let config = CliConfig::try_parse_from([
            "bookex-cli",
            "create-user",
            "--data-dir",
            data_dir,
            "--username",
            username,
            "--password",
            password,
        ])
        .unwrap();
        match config.command {
            Command::CreateUser(cmd) => cmd,
            _ => panic!("Unexpected command"),
        }
    }

    #[tokio::test]
    async fn test_create_user() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let data_dir = tmp_dir.path().join("data");
        let data_dir = data_dir.to_str().unwrap();

        let cmd = command(data_dir, "admin", "admin-password");
        let backend = cmd.backend.clone();
        cmd.run().await.unwrap();

        let pool = backend.connect().await.unwrap();
        let users = bookex_dal::user::UserRepository::new(pool);
        let user = users
            .check_password("admin", "admin-password")
            .await
            .unwrap();
        assert_eq!(user.username, "admin");

        let duplicate = command(data_dir, "admin", "other-password").run().await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_invalid_user() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let data_dir = tmp_dir.path().to_str().unwrap();
        assert!(command(data_dir, "admin", "short").run().await.is_err());
        assert!(
            command(data_dir, "not valid", "long-enough")
                .run()
                .await
                .is_err()
        );
    }
}
