use std::env;
use std::fmt;
use std::fs::File;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

use crate::tickets::i18n::{CatalogTranslator, Locale};
use crate::tickets::policy::{PolicyError, StatusPolicyTable};
use crate::tickets::settings::WorkflowSettings;

const DEV_LINK_SECRET: &str = "rental-repairs-dev-secret";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let workflow = WorkflowConfig::from_env(environment)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Link signing, expiry windows, locale and optional table overrides.
#[derive(Clone)]
pub struct WorkflowConfig {
    pub public_base_url: String,
    pub link_secret: String,
    pub link_ttl_hours: i64,
    pub invitation_ttl_days: i64,
    pub offer_request_ttl_days: i64,
    pub default_locale: Locale,
    pub status_policy_csv: Option<PathBuf>,
    pub translations_csv: Option<PathBuf>,
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("public_base_url", &self.public_base_url)
            .field("link_secret", &"<redacted>")
            .field("link_ttl_hours", &self.link_ttl_hours)
            .field("invitation_ttl_days", &self.invitation_ttl_days)
            .field("offer_request_ttl_days", &self.offer_request_ttl_days)
            .field("default_locale", &self.default_locale)
            .field("status_policy_csv", &self.status_policy_csv)
            .field("translations_csv", &self.translations_csv)
            .finish()
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            link_secret: DEV_LINK_SECRET.to_string(),
            link_ttl_hours: 72,
            invitation_ttl_days: 14,
            offer_request_ttl_days: 21,
            default_locale: Locale::De,
            status_policy_csv: None,
            translations_csv: None,
        }
    }
}

impl WorkflowConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let link_secret = match env::var("APP_LINK_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingLinkSecret)
            }
            _ => defaults.link_secret,
        };

        let default_locale = match env::var("APP_DEFAULT_LOCALE") {
            Ok(raw) => Locale::parse(&raw).ok_or(ConfigError::InvalidLocale(raw))?,
            Err(_) => defaults.default_locale,
        };

        Ok(Self {
            public_base_url: env::var("APP_PUBLIC_BASE_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            link_secret,
            link_ttl_hours: bounded("APP_LINK_TTL_HOURS", defaults.link_ttl_hours, MAX_LINK_TTL_HOURS)?,
            invitation_ttl_days: bounded(
                "APP_INVITATION_TTL_DAYS",
                defaults.invitation_ttl_days,
                MAX_TTL_DAYS,
            )?,
            offer_request_ttl_days: bounded(
                "APP_OFFER_REQUEST_TTL_DAYS",
                defaults.offer_request_ttl_days,
                MAX_TTL_DAYS,
            )?,
            default_locale,
            status_policy_csv: env::var_os("APP_STATUS_POLICY_CSV").map(PathBuf::from),
            translations_csv: env::var_os("APP_TRANSLATIONS_CSV").map(PathBuf::from),
        })
    }

    pub fn settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            public_base_url: self.public_base_url.clone(),
            link_secret: self.link_secret.as_bytes().to_vec(),
            link_ttl: Duration::try_hours(self.link_ttl_hours).unwrap_or(Duration::MAX),
            invitation_ttl: Duration::try_days(self.invitation_ttl_days).unwrap_or(Duration::MAX),
            offer_request_ttl: Duration::try_days(self.offer_request_ttl_days)
                .unwrap_or(Duration::MAX),
            default_locale: self.default_locale,
        }
    }

    /// Built-in table unless `APP_STATUS_POLICY_CSV` points at an override.
    pub fn status_policy(&self) -> Result<StatusPolicyTable, PolicyError> {
        match &self.status_policy_csv {
            Some(path) => StatusPolicyTable::from_csv_reader(File::open(path)?),
            None => Ok(StatusPolicyTable::standard()),
        }
    }

    pub fn translator(&self) -> Result<CatalogTranslator, PolicyError> {
        match &self.translations_csv {
            Some(path) => CatalogTranslator::from_csv_reader(File::open(path)?),
            None => Ok(CatalogTranslator::standard()),
        }
    }
}

const MAX_LINK_TTL_HOURS: i64 = 24 * 365;
const MAX_TTL_DAYS: i64 = 365;

fn bounded(key: &'static str, default: i64, max: i64) -> Result<i64, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if (1..=max).contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidDuration {
            key,
            value: raw,
            max,
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDuration {
        key: &'static str,
        value: String,
        max: i64,
    },
    InvalidLocale(String),
    MissingLinkSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDuration { key, value, max } => {
                write!(f, "{key} must be an integer from 1 to {max}, got '{value}'")
            }
            ConfigError::InvalidLocale(value) => {
                write!(f, "APP_DEFAULT_LOCALE must be 'de' or 'en', got '{value}'")
            }
            ConfigError::MissingLinkSecret => {
                write!(f, "APP_LINK_SECRET is required in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDuration { .. }
            | ConfigError::InvalidLocale(_)
            | ConfigError::MissingLinkSecret => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_PUBLIC_BASE_URL",
            "APP_LINK_SECRET",
            "APP_LINK_TTL_HOURS",
            "APP_INVITATION_TTL_DAYS",
            "APP_OFFER_REQUEST_TTL_DAYS",
            "APP_DEFAULT_LOCALE",
            "APP_STATUS_POLICY_CSV",
            "APP_TRANSLATIONS_CSV",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.workflow.public_base_url, "http://localhost:3000");
        assert_eq!(config.workflow.default_locale, Locale::De);

        let settings = config.workflow.settings();
        assert_eq!(settings.link_ttl, Duration::hours(72));
        assert_eq!(settings.invitation_ttl, Duration::days(14));
        assert_eq!(settings.offer_request_ttl, Duration::days(21));
    }

    #[test]
    fn oversized_ttl_fields_saturate_instead_of_panicking() {
        let config = WorkflowConfig {
            link_ttl_hours: i64::MAX,
            invitation_ttl_days: i64::MAX,
            ..WorkflowConfig::default()
        };
        let settings = config.settings();
        assert_eq!(settings.link_ttl, Duration::MAX);
        assert_eq!(settings.invitation_ttl, Duration::MAX);
        assert_eq!(settings.offer_request_ttl, Duration::days(21));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn production_requires_a_link_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        match AppConfig::load() {
            Err(ConfigError::MissingLinkSecret) => {}
            other => panic!("expected missing secret, got {other:?}"),
        }

        env::set_var("APP_LINK_SECRET", "prod-secret");
        let config = AppConfig::load().expect("config loads with secret");
        assert_eq!(config.workflow.link_secret, "prod-secret");
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_ttls_and_unknown_locales() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_LINK_TTL_HOURS", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidDuration { key, .. }) => assert_eq!(key, "APP_LINK_TTL_HOURS"),
            other => panic!("expected invalid duration, got {other:?}"),
        }

        reset_env();
        env::set_var("APP_LINK_TTL_HOURS", "10000000000");
        match AppConfig::load() {
            Err(ConfigError::InvalidDuration { key, max, .. }) => {
                assert_eq!(key, "APP_LINK_TTL_HOURS");
                assert_eq!(max, 24 * 365);
            }
            other => panic!("expected invalid duration, got {other:?}"),
        }

        reset_env();
        env::set_var("APP_INVITATION_TTL_DAYS", "366");
        match AppConfig::load() {
            Err(ConfigError::InvalidDuration { key, .. }) => {
                assert_eq!(key, "APP_INVITATION_TTL_DAYS")
            }
            other => panic!("expected invalid duration, got {other:?}"),
        }

        reset_env();
        env::set_var("APP_DEFAULT_LOCALE", "fr");
        match AppConfig::load() {
            Err(ConfigError::InvalidLocale(value)) => assert_eq!(value, "fr"),
            other => panic!("expected invalid locale, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn parses_region_tagged_locale_and_trims_base_url() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DEFAULT_LOCALE", "en-GB");
        env::set_var("APP_PUBLIC_BASE_URL", "https://repairs.example/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.workflow.default_locale, Locale::En);
        assert_eq!(config.workflow.public_base_url, "https://repairs.example");
        reset_env();
    }
}
