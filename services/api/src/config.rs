//! Service configuration.
//!
//! Values come from `SHOVEL_*` environment variables; a YAML file named by
//! `SHOVEL_CONFIG` overrides whatever it sets.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

const DEFAULT_BIND: &str = "0.0.0.0:8787";
const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9187";
const DEFAULT_JWT_ISSUER: &str = "shovel-heroes";
const DEFAULT_JWT_LEEWAY_SECS: u64 = 30;
const DEFAULT_LIST_LIMIT: u32 = 200;
const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PG_TIMEOUT_MS: u64 = 5000;
const DEFAULT_PG_RLS_ROLE: &str = "shovel_rls";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_pg_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_pg_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// NOLOGIN role every scoped transaction switches to with `SET LOCAL ROLE`.
    ///
    /// The pool user owns the tables and is exempt from row policies, so this
    /// role is what makes them apply. It is provisioned at connect.
    #[serde(default = "default_pg_rls_role")]
    pub rls_role: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub auth: AuthConfig,
    pub list_limit: u32,
}

#[derive(Debug, Deserialize)]
struct ApiConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<StorageBackend>,
    postgres: Option<PostgresConfig>,
    jwt_secret: Option<String>,
    jwt_issuer: Option<String>,
    jwt_leeway_secs: Option<u64>,
    list_limit: Option<u32>,
}

fn default_pg_max_connections() -> u32 {
    DEFAULT_PG_MAX_CONNECTIONS
}

fn default_pg_timeout_ms() -> u64 {
    DEFAULT_PG_TIMEOUT_MS
}

fn default_pg_rls_role() -> String {
    DEFAULT_PG_RLS_ROLE.to_string()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|err| anyhow::anyhow!("parse {key}: {err}")),
        Err(_) => Ok(default),
    }
}

/// Accept plain SQL identifiers only; the role name is spliced into `SET LOCAL ROLE`.
pub fn is_valid_role_ident(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }
    value.len() <= 63
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("SHOVEL_BIND", DEFAULT_BIND)
            .parse()
            .with_context(|| "parse SHOVEL_BIND")?;
        let metrics_bind = env_or("SHOVEL_METRICS_BIND", DEFAULT_METRICS_BIND)
            .parse()
            .with_context(|| "parse SHOVEL_METRICS_BIND")?;
        let storage: StorageBackend = env_or("SHOVEL_STORAGE", "memory").parse()?;
        let postgres = match std::env::var("SHOVEL_DATABASE_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_parse(
                    "SHOVEL_PG_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                connect_timeout_ms: env_parse(
                    "SHOVEL_PG_CONNECT_TIMEOUT_MS",
                    DEFAULT_PG_TIMEOUT_MS,
                )?,
                acquire_timeout_ms: env_parse(
                    "SHOVEL_PG_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_TIMEOUT_MS,
                )?,
                rls_role: env_or("SHOVEL_PG_RLS_ROLE", DEFAULT_PG_RLS_ROLE),
            }),
            Err(_) => None,
        };
        let auth = AuthConfig {
            jwt_secret: std::env::var("SHOVEL_JWT_SECRET").unwrap_or_default(),
            jwt_issuer: env_or("SHOVEL_JWT_ISSUER", DEFAULT_JWT_ISSUER),
            leeway_secs: env_parse("SHOVEL_JWT_LEEWAY_SECS", DEFAULT_JWT_LEEWAY_SECS)?,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            auth,
            list_limit: env_parse("SHOVEL_LIST_LIMIT", DEFAULT_LIST_LIMIT)?,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("SHOVEL_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read SHOVEL_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: ApiConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse api config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value;
        }
        if let Some(value) = override_cfg.postgres {
            self.postgres = Some(value);
        }
        if let Some(value) = override_cfg.jwt_secret {
            self.auth.jwt_secret = value;
        }
        if let Some(value) = override_cfg.jwt_issuer {
            self.auth.jwt_issuer = value;
        }
        if let Some(value) = override_cfg.jwt_leeway_secs {
            self.auth.leeway_secs = value;
        }
        if let Some(value) = override_cfg.list_limit {
            self.list_limit = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            bail!("SHOVEL_JWT_SECRET is required");
        }
        if self.list_limit == 0 {
            bail!("list_limit must be positive");
        }
        if self.storage == StorageBackend::Postgres && self.postgres.is_none() {
            bail!("SHOVEL_DATABASE_URL is required when storage is postgres");
        }
        if let Some(pg) = self.postgres.as_ref() {
            if !is_valid_role_ident(&pg.rls_role) {
                bail!("invalid rls_role identifier: {}", pg.rls_role);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    fn clear_env() -> Vec<EnvGuard> {
        [
            "SHOVEL_BIND",
            "SHOVEL_METRICS_BIND",
            "SHOVEL_STORAGE",
            "SHOVEL_DATABASE_URL",
            "SHOVEL_PG_MAX_CONNECTIONS",
            "SHOVEL_PG_CONNECT_TIMEOUT_MS",
            "SHOVEL_PG_ACQUIRE_TIMEOUT_MS",
            "SHOVEL_PG_RLS_ROLE",
            "SHOVEL_JWT_SECRET",
            "SHOVEL_JWT_ISSUER",
            "SHOVEL_JWT_LEEWAY_SECS",
            "SHOVEL_LIST_LIMIT",
            "SHOVEL_CONFIG",
        ]
        .into_iter()
        .map(EnvGuard::unset)
        .collect()
    }

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        let _guards = clear_env();
        let config = ApiConfig::from_env().expect("config");
        assert_eq!(config.bind_addr, DEFAULT_BIND.parse().expect("addr"));
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.postgres.is_none());
        assert_eq!(config.auth.jwt_issuer, "shovel-heroes");
        assert_eq!(config.list_limit, 200);
        assert!(config.validate().is_err(), "secret is required");
    }

    #[test]
    #[serial]
    fn postgres_settings_read_from_env() {
        let _guards = clear_env();
        let _g1 = EnvGuard::set("SHOVEL_STORAGE", "postgres");
        let _g2 = EnvGuard::set("SHOVEL_DATABASE_URL", "postgres://localhost/shovel");
        let _g3 = EnvGuard::set("SHOVEL_PG_MAX_CONNECTIONS", "4");
        let _g4 = EnvGuard::set("SHOVEL_PG_RLS_ROLE", "shovel_app");
        let _g5 = EnvGuard::set("SHOVEL_JWT_SECRET", "s3cret");
        let config = ApiConfig::from_env_or_yaml().expect("config");
        let pg = config.postgres.expect("postgres");
        assert_eq!(pg.max_connections, 4);
        assert_eq!(pg.acquire_timeout_ms, DEFAULT_PG_TIMEOUT_MS);
        assert_eq!(pg.rls_role, "shovel_app");
    }

    #[test]
    #[serial]
    fn invalid_number_is_reported() {
        let _guards = clear_env();
        let _g = EnvGuard::set("SHOVEL_LIST_LIMIT", "lots");
        let err = ApiConfig::from_env().expect_err("bad limit");
        assert!(err.to_string().contains("SHOVEL_LIST_LIMIT"));
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        let _guards = clear_env();
        let _g = EnvGuard::set("SHOVEL_JWT_SECRET", "from-env");
        let mut config = ApiConfig::from_env().expect("config");
        config
            .apply_yaml(
                r#"
bind_addr: "127.0.0.1:9000"
storage: postgres
postgres:
  url: "postgres://db/shovel"
  rls_role: shovel_app
jwt_issuer: "relief"
list_limit: 50
"#,
            )
            .expect("yaml");
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().expect("addr"));
        assert_eq!(config.storage, StorageBackend::Postgres);
        let pg = config.postgres.as_ref().expect("postgres");
        assert_eq!(pg.max_connections, DEFAULT_PG_MAX_CONNECTIONS);
        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.auth.jwt_issuer, "relief");
        assert_eq!(config.list_limit, 50);
        config.validate().expect("valid");
    }

    #[test]
    fn postgres_storage_requires_url() {
        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".parse().expect("bind"),
            metrics_bind: "127.0.0.1:0".parse().expect("metrics"),
            storage: StorageBackend::Postgres,
            postgres: None,
            auth: AuthConfig {
                jwt_secret: "secret".to_string(),
                jwt_issuer: "shovel-heroes".to_string(),
                leeway_secs: 0,
            },
            list_limit: 10,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn postgres_defaults_to_restricted_role() {
        let _guards = clear_env();
        let _g1 = EnvGuard::set("SHOVEL_STORAGE", "postgres");
        let _g2 = EnvGuard::set("SHOVEL_DATABASE_URL", "postgres://localhost/shovel");
        let _g3 = EnvGuard::set("SHOVEL_JWT_SECRET", "s3cret");
        let config = ApiConfig::from_env_or_yaml().expect("config");
        let pg = config.postgres.expect("postgres");
        assert_eq!(pg.rls_role, DEFAULT_PG_RLS_ROLE);

        let yaml: PostgresConfig =
            serde_yaml::from_str("url: \"postgres://db/shovel\"").expect("yaml");
        assert_eq!(yaml.rls_role, DEFAULT_PG_RLS_ROLE);
    }

    #[test]
    #[serial]
    fn blank_rls_role_is_rejected() {
        let _guards = clear_env();
        let _g1 = EnvGuard::set("SHOVEL_STORAGE", "postgres");
        let _g2 = EnvGuard::set("SHOVEL_DATABASE_URL", "postgres://localhost/shovel");
        let _g3 = EnvGuard::set("SHOVEL_PG_RLS_ROLE", "");
        let _g4 = EnvGuard::set("SHOVEL_JWT_SECRET", "s3cret");
        let err = ApiConfig::from_env_or_yaml().expect_err("blank role");
        assert!(err.to_string().contains("rls_role"));
    }

    #[test]
    fn role_identifier_validation() {
        assert!(is_valid_role_ident("shovel_app"));
        assert!(is_valid_role_ident("_rls1"));
        assert!(!is_valid_role_ident("Shovel"));
        assert!(!is_valid_role_ident("app; DROP TABLE users"));
        assert!(!is_valid_role_ident("1role"));
        assert!(!is_valid_role_ident(""));
    }
}
