use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::http::RetryConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub upstream: UpstreamConfig,
    pub jwt: JwtConfig,
    pub shared_secret: Option<Secret<String>>,
    pub passthrough_prefixes: Vec<String>,
    pub service_index: ServiceIndexConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Origin every non-local request is forwarded to, without a trailing slash.
    pub url: String,
    pub api_prefix: String,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub expiry_minutes: i64,
    /// PEM key files; a fresh pair is generated when either is unset.
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceIndexConfig {
    pub enabled: bool,
    pub service_id: String,
}

impl UpstreamConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.max_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = ProxyConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-proxy"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_env_opt("OTLP_ENDPOINT"),
            upstream: UpstreamConfig {
                url: get_env("UPSTREAM_URL", Some("http://localhost:5001"), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
                api_prefix: get_env("UPSTREAM_API_PREFIX", Some("/api/galaxy"), is_prod)?,
                max_attempts: parse_env("UPSTREAM_MAX_ATTEMPTS", "5", is_prod)?,
                retry_backoff_ms: parse_env("UPSTREAM_RETRY_BACKOFF_MS", "1000", is_prod)?,
                timeout_secs: parse_env("UPSTREAM_TIMEOUT_SECS", "300", is_prod)?,
            },
            jwt: JwtConfig {
                issuer: get_env("JWT_ISSUER", Some("ansible-issuer"), is_prod)?,
                audience: get_env("JWT_AUDIENCE", Some("ansible-services"), is_prod)?,
                expiry_minutes: parse_env("JWT_EXPIRY_MINUTES", "60", is_prod)?,
                private_key_path: get_env_opt("JWT_PRIVATE_KEY_PATH"),
                public_key_path: get_env_opt("JWT_PUBLIC_KEY_PATH"),
            },
            shared_secret: get_env_opt("ANSIBLE_BASE_SHARED_SECRET").map(Secret::new),
            passthrough_prefixes: parse_prefixes(&get_env(
                "PASSTHROUGH_PREFIXES",
                Some("/v2,/token"),
                is_prod,
            )?),
            service_index: ServiceIndexConfig {
                enabled: get_env("SERVICE_INDEX_ENABLED", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
                service_id: get_env(
                    "SERVICE_ID",
                    Some("00000000-0000-0000-0000-000000000000"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests and embedding: development defaults, no env lookups.
    pub fn for_upstream(upstream_url: &str) -> Self {
        Self {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "identity-proxy".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            upstream: UpstreamConfig {
                url: upstream_url.trim_end_matches('/').to_string(),
                api_prefix: "/api/galaxy".to_string(),
                max_attempts: 5,
                retry_backoff_ms: 1000,
                timeout_secs: 300,
            },
            jwt: JwtConfig {
                issuer: "ansible-issuer".to_string(),
                audience: "ansible-services".to_string(),
                expiry_minutes: 60,
                private_key_path: None,
                public_key_path: None,
            },
            shared_secret: None,
            passthrough_prefixes: parse_prefixes("/v2,/token"),
            service_index: ServiceIndexConfig {
                enabled: false,
                service_id: "00000000-0000-0000-0000-000000000000".to_string(),
            },
        }
    }

    pub fn shared_secret(&self) -> Option<&str> {
        self.shared_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
    }

    /// Whether `path` bypasses identity substitution.
    pub fn is_passthrough(&self, path: &str) -> bool {
        self.passthrough_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.upstream.max_attempts == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPSTREAM_MAX_ATTEMPTS must be at least 1"
            )));
        }

        if !self.upstream.url.starts_with("http://") && !self.upstream.url.starts_with("https://")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPSTREAM_URL must be an http(s) origin, got '{}'",
                self.upstream.url
            )));
        }

        if self.jwt.private_key_path.is_some() != self.jwt.public_key_path.is_some() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_PRIVATE_KEY_PATH and JWT_PUBLIC_KEY_PATH must be set together"
            )));
        }

        if self.environment == Environment::Prod {
            tracing::error!(
                "identity-proxy compares plaintext passwords and must not run in a shared environment"
            );
        }

        Ok(())
    }
}

fn parse_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if let Some(def) = default {
                Ok(def.to_string())
            } else if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
