//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use service::{
    domain::{listing, user},
    infra::postgres,
    task::{purge_past_meals, sweep_expired_pending},
};
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Service configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Listings configuration.
    pub listing: Listing,

    /// Verification policy applied to users.
    pub verification: user::VerificationPolicy,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            listing: Listing { pending_timeout },
            verification,
            tasks:
                Tasks {
                    sweep_expired_pending: sweep,
                    purge_past_meals: purge,
                },
        } = value;

        let sweep_default = sweep_expired_pending::Config::default();
        let purge_default = purge_past_meals::Config::default();
        Self {
            pending_timeout,
            verification,
            sweep_expired_pending: sweep_expired_pending::Config {
                interval: sweep.interval.unwrap_or(sweep_default.interval),
                timeout: sweep.timeout.unwrap_or(sweep_default.timeout),
            },
            purge_past_meals: purge_past_meals::Config {
                interval: purge.interval.unwrap_or(purge_default.interval),
                timeout: purge.timeout.unwrap_or(purge_default.timeout),
            },
        }
    }
}

/// Listings configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Listing {
    /// Time a pending buyer has before the listing goes back on sale.
    #[default(listing::DEFAULT_PENDING_TIMEOUT)]
    #[serde(with = "humantime_serde")]
    pub pending_timeout: time::Duration,
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tasks {
    /// `SweepExpiredPending` task configuration.
    pub sweep_expired_pending: Task,

    /// `PurgePastMeals` task configuration.
    pub purge_past_meals: Task,
}

/// Service task configuration.
///
/// Omitted values fall back to the defaults of the particular task.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[serde(with = "humantime_serde")]
    pub interval: Option<time::Duration>,

    /// Maximum duration of a single task execution.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<time::Duration>,
}

/// Postgres configuration.
#[derive(Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default(SecretString::from("postgres"))]
    pub password: SecretString,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,

    /// Maximum number of pooled connections.
    #[default(16)]
    pub pool_size: usize,
}

impl From<Postgres> for postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
            pool_size,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password.expose_secret().to_owned()),
            dbname: Some(dbname),
            pool: Some(postgres::PoolConfig::new(pool_size)),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use config::{builder::DefaultState, ConfigBuilder, File, FileFormat};
    use secrecy::ExposeSecret as _;
    use service::domain::user::verification::Method;

    use super::Config;

    fn parse(toml: &str) -> Config {
        ConfigBuilder::<DefaultState>::default()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn falls_back_to_defaults() {
        let conf: service::Config = parse("").service.into();

        assert_eq!(conf.pending_timeout, Duration::from_secs(5 * 60));
        assert_eq!(conf.verification.method, Method::PhoneOnly);
        assert_eq!(conf.verification.country_code, 98);
        assert_eq!(
            conf.sweep_expired_pending.interval,
            Duration::from_secs(30),
        );
        assert_eq!(
            conf.purge_past_meals.interval,
            Duration::from_secs(60 * 60),
        );
    }

    #[test]
    fn reads_service_section() {
        let conf = parse(
            r#"
            [service.listing]
            pending_timeout = "10m"

            [service.verification]
            method = "PHONE_AND_NATIONAL_ID"

            [service.tasks.sweep_expired_pending]
            interval = "1m"
            "#,
        );
        let service: service::Config = conf.service.into();

        assert_eq!(service.pending_timeout, Duration::from_secs(10 * 60));
        assert_eq!(service.verification.method, Method::PhoneAndNationalId);
        assert_eq!(
            service.sweep_expired_pending.interval,
            Duration::from_secs(60),
        );
        assert_eq!(
            service.sweep_expired_pending.timeout,
            Duration::from_secs(10),
        );
    }

    #[test]
    fn keeps_postgres_password_secret() {
        let conf = parse(
            r#"
            [postgres]
            password = "hunter2"
            pool_size = 4
            "#,
        );

        assert!(!format!("{:?}", conf.postgres).contains("hunter2"));
        assert_eq!(conf.postgres.password.expose_secret(), "hunter2");

        let pg: service::infra::postgres::Config = conf.postgres.into();
        assert_eq!(pg.password.as_deref(), Some("hunter2"));
        assert_eq!(pg.pool.map(|p| p.max_size), Some(4));
    }
}
