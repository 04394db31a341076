use std::path::Path;

use serde::{Deserialize, Serialize};

/// Operating mode. `release` is production: secrets are mandatory and
/// internal error details are never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Debug,
    Release,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Debug => "debug",
            Mode::Release => "release",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub allowed_origins: Vec<String>,
    pub max_body_size: usize,
    pub trust_proxy_headers: bool,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.mode == Mode::Release
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub bcrypt_cost: u32,
    pub bootstrap_admin_password: Option<String>,
}

// Secrets stay out of debug output.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("bootstrap_admin_password", &self.bootstrap_admin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests: usize,
    pub window_seconds: u64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub enable_security_log: bool,
    pub security_log_dir: String,
    pub slow_request_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Minimum signing secret length accepted in release mode.
pub const MIN_SECRET_LEN: usize = 32;

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => panic!("Failed to deserialize default config: {}", e),
            },
            Err(e) => panic!("Failed to parse default config: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: scandata.toml (in CWD)
        .add_source(::config::File::with_name("scandata").required(false));

    if let Ok(custom_path) = std::env::var("SCANDATA_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("SCANDATA")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.allowed_origins")
            .try_parsing(true),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    if cfg.server.max_body_size == 0 {
        return Err(anyhow::anyhow!("server.max_body_size must be > 0"));
    }

    // Auth
    if cfg.auth.jwt_expiry_hours <= 0 {
        return Err(anyhow::anyhow!("auth.jwt_expiry_hours must be > 0"));
    }
    if !(4..=31).contains(&cfg.auth.bcrypt_cost) {
        return Err(anyhow::anyhow!("auth.bcrypt_cost must be in 4..=31"));
    }
    if cfg.server.is_production() && cfg.auth.jwt_secret.len() < MIN_SECRET_LEN {
        return Err(anyhow::anyhow!(
            "auth.jwt_secret must be set to at least {} bytes in release mode",
            MIN_SECRET_LEN
        ));
    }
    if let Some(pw) = &cfg.auth.bootstrap_admin_password {
        if pw.len() < 6 {
            return Err(anyhow::anyhow!("auth.bootstrap_admin_password must be at least 6 characters"));
        }
    }

    // Rate limiting
    if cfg.rate_limit.requests == 0 {
        return Err(anyhow::anyhow!("rate_limit.requests must be > 0"));
    }
    if cfg.rate_limit.window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.window_seconds must be > 0"));
    }
    if cfg.rate_limit.sweep_interval_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.sweep_interval_seconds must be > 0"));
    }

    Ok(())
}

/// Fills in a random per-process signing secret when none is configured.
///
/// Only reachable outside release mode (`validate` rejects an empty secret there).
/// Returns `true` when a secret was generated so the caller can warn that tokens
/// will not survive a restart.
pub fn ensure_signing_secret(cfg: &mut AppConfig) -> bool {
    if !cfg.auth.jwt_secret.is_empty() {
        return false;
    }
    cfg.auth.jwt_secret = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
    true
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
