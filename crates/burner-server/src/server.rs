use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use directories::ProjectDirs;
use rand::RngCore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    auth::require_admin,
    handlers::{create_secret, delete_secret, get_secret, health, read_secret, stats},
    secret::{validate::DEFAULT_MAX_SECRET_LEN, Limits, SecretService},
    store::RedbStore,
    AppState,
};

const SALT_FILE: &str = "burner.salt";
const DB_FILE: &str = "burner.db";

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    /// Service salt ($BURNER_SALT). Ignored when `salt_file` is set.
    pub salt: Option<String>,
    /// File holding the service salt ($BURNER_SALT_FILE).
    pub salt_file: Option<PathBuf>,
    /// Bearer token for delete and stats ($BURNER_ADMIN_TOKEN).
    pub admin_token: Option<String>,
    pub cors_origins: Option<String>,
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("BURNER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("BURNER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_dir: std::env::var("BURNER_DATA_DIR").ok().map(PathBuf::from),
            salt: std::env::var("BURNER_SALT").ok(),
            salt_file: std::env::var("BURNER_SALT_FILE").ok().map(PathBuf::from),
            admin_token: std::env::var("BURNER_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            cors_origins: std::env::var("BURNER_CORS_ORIGINS").ok(),
            limits: limits_from_env(),
        }
    }
}

fn limits_from_env() -> Limits {
    let secs = |name: &str| {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
    };
    let defaults = Limits::default();
    Limits {
        max_secret_len: std::env::var("BURNER_MAX_SECRET_LEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SECRET_LEN),
        min_ttl: secs("BURNER_MIN_TTL_SECS").unwrap_or(defaults.min_ttl),
        max_ttl: secs("BURNER_MAX_TTL_SECS").or(defaults.max_ttl),
    }
}

/// Read a secret value from a file, trimming surrounding whitespace.
/// Fails if the file cannot be read or is empty after trimming.
pub fn read_key_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read key file: {}", path.display()))?;
    let key = content.trim().to_string();
    if key.is_empty() {
        anyhow::bail!("key file is empty: {}", path.display());
    }
    Ok(key)
}

/// Resolve the service salt: `salt_file` (preferred), then `salt`, then a
/// salt generated once and persisted in the data directory.
///
/// The salt is part of every derived key, so losing or changing it makes all
/// stored secrets unreadable.
pub fn resolve_salt(cfg: &ServerConfig, data_dir: &Path) -> Result<String> {
    if let Some(path) = &cfg.salt_file {
        if cfg.salt.is_some() {
            warn!("both BURNER_SALT and BURNER_SALT_FILE are set; using file");
        }
        return read_key_file(path);
    }
    match cfg.salt.as_deref() {
        Some("") => anyhow::bail!("BURNER_SALT must not be empty"),
        Some(salt) => Ok(salt.to_owned()),
        None => load_or_create_salt(data_dir),
    }
}

fn load_or_create_salt(data_dir: &Path) -> Result<String> {
    let path = data_dir.join(SALT_FILE);
    if path.exists() {
        return read_key_file(&path);
    }
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let salt = hex::encode(bytes);
    std::fs::write(&path, &salt).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "generated new service salt");
    Ok(salt)
}

/// Resolve the data directory: the configured one (`BURNER_DATA_DIR`), else the
/// platform data dir (`~/.local/share/burner/`, etc.). Created if missing.
pub fn resolve_data_dir(data_dir: Option<&Path>) -> Result<PathBuf> {
    let path = match data_dir {
        Some(d) => d.to_path_buf(),
        None => ProjectDirs::from("", "", "burner")
            .context("could not determine platform data directory")?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&path)
        .with_context(|| format!("create data dir {}", path.display()))?;
    Ok(path)
}

/// All routes with their auth layers, without transport concerns.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/healthcheck", get(health))
        .route("/secrets", post(create_secret))
        .route("/secrets/{id}", get(get_secret).post(read_secret));

    let admin = Router::new()
        .route("/secrets/{id}", delete(delete_secret))
        .route("/stats", get(stats))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new().merge(public).merge(admin).with_state(state)
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_deref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let salt = resolve_salt(&cfg, &data_dir)?;
    let store = RedbStore::open(&data_dir.join(DB_FILE)).context("open store")?;

    if cfg.admin_token.is_none() {
        warn!("BURNER_ADMIN_TOKEN is not set; delete and stats routes will refuse every request");
    }

    info!(
        max_secret_len = cfg.limits.max_secret_len,
        min_ttl_secs = cfg.limits.min_ttl.as_secs(),
        max_ttl_secs = ?cfg.limits.max_ttl.map(|d| d.as_secs()),
        "secret limits"
    );

    let state = AppState {
        secrets: SecretService::new(Arc::new(store), salt, cfg.limits),
        admin_token: cfg.admin_token.map(Arc::from),
    };

    let app = router(state)
        .layer(build_cors(cfg.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "burner server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}
