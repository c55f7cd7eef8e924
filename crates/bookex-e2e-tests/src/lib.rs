use anyhow::{Result, anyhow};
use bookex_dal::{
    Pool,
    menu::{CreateMenuItem, MenuRepository},
    user::{CreateUser, UserRepository},
};
use bookex_server::{
    build_state,
    config::{Parser, ServerConfig},
    run::run_graceful_with_state,
};
use futures::FutureExt as _;
use rand::Rng as _;
use reqwest::{StatusCode, Url, redirect::Policy};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tracing::{debug, info};

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, std::time::Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix(format!("{}_", test_name))?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?.to_string();
    let args = &[
        "bookex-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--upload-limit-mb",
        "1",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

/// Stops server when dropped
pub struct ServerGuard {
    #[allow(dead_code)]
    shutdown: oneshot::Sender<()>,
}

pub fn base_url(config: &ServerConfig) -> Result<Url> {
    let url = format!("http://127.0.0.1:{}/", config.port).parse()?;
    Ok(url)
}

/// Client keeping session cookie and not following redirects, so they can be checked
pub fn new_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()?;
    Ok(client)
}

pub struct TestEnv {
    pub client: reqwest::Client,
    pub base_url: Url,
    pub pool: Pool,
    pub config: ServerConfig,
    _server: ServerGuard,
    _config_guard: ConfigGuard,
}

impl TestEnv {
    /// Server URL for absolute path, including query if any
    pub fn url(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone())
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<i64> {
        let user = UserRepository::new(self.pool.clone())
            .create(CreateUser {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        Ok(user.id)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.login_client(&self.client, username, password).await
    }

    /// Logs in with another client, for tests with more users
    pub async fn login_client(
        &self,
        client: &reqwest::Client,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let response = client
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        if response.status() != StatusCode::SEE_OTHER {
            return Err(anyhow!("Login failed with status {}", response.status()));
        }
        Ok(())
    }

    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let response = self.client.get(self.url(path)).send().await?;
        if response.status() != StatusCode::OK {
            return Err(anyhow!("GET {path} failed with status {}", response.status()));
        }
        Ok(response.json().await?)
    }

    /// Creates book with multipart form, as browser would
    pub async fn post_book(
        &self,
        name: &str,
        price: &str,
        picture: Option<(&str, &[u8])>,
    ) -> Result<reqwest::Response> {
        let mut form = reqwest::multipart::Form::new()
            .text("name", name.to_string())
            .text("web", "")
            .text("price", price.to_string());
        if let Some((file_name, data)) = picture {
            let part = reqwest::multipart::Part::bytes(data.to_vec())
                .file_name(file_name.to_string())
                .mime_str("image/jpeg")?;
            form = form.part("picture", part);
        }
        let response = self
            .client
            .post(self.url("/postbook"))
            .multipart(form)
            .send()
            .await?;
        Ok(response)
    }
}

pub async fn spawn_server(config: ServerConfig) -> Result<(ServerGuard, Pool)> {
    let state = build_state(&config).await?;
    let pool = state.pool().clone();
    let (shutdown, stopped) = oneshot::channel::<()>();
    let server_config = config.clone();
    tokio::spawn(async move {
        if let Err(e) =
            run_graceful_with_state(server_config, state, stopped.map(|_| ())).await
        {
            tracing::error!("Server error: {e}");
        }
    });

    let health_url = base_url(&config)?.join("health")?;
    let client = reqwest::Client::new();
    for _ in 0..50 {
        match client.get(health_url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Server is ready on port {}", config.port);
                return Ok((ServerGuard { shutdown }, pool));
            }
            Ok(response) => debug!("Server not ready: {}", response.status()),
            Err(e) => debug!("Server not ready: {e}"),
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    Err(anyhow!("Server did not start"))
}

pub const MENU: &[(&str, &str)] = &[("Home", "/"), ("Books", "/displaybooks")];

/// Starts server on fresh data directory with site menu filled in
pub async fn launch_env(test_name: &str) -> Result<TestEnv> {
    let (config, config_guard) = test_config(test_name)?;
    let (server, pool) = spawn_server(config.clone()).await?;

    let menu = MenuRepository::new(pool.clone());
    for (item, link) in MENU {
        menu.create(CreateMenuItem {
            item: item.to_string(),
            link: link.to_string(),
        })
        .await?;
    }

    Ok(TestEnv {
        client: new_client()?,
        base_url: base_url(&config)?,
        pool,
        config,
        _server: server,
        _config_guard: config_guard,
    })
}
