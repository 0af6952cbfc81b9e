use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::engine::{CompetitionId, DeliveryClassification, LevelRule, StaticTables};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the ranking service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: AppEnvironment::parse(&env_or("PRODRANK_ENV", "development")),
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig {
                log_level: env_or("PRODRANK_LOG_LEVEL", "info"),
            },
            engine: EngineConfig::from_env()?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("PRODRANK_HOST", "127.0.0.1");
        let port = env_or("PRODRANK_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        Ok(Self { host, port })
    }

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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Scoring configuration for the serve path. Percent overrides and the level
/// curve feed the `StaticTables` the service is built with; the default
/// competition scopes ranking requests that carry no competition of their
/// own.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub default_competition: Option<CompetitionId>,
    pub percent_overrides: BTreeMap<DeliveryClassification, i64>,
    pub level_curve: Option<Vec<LevelRule>>,
}

const PERCENT_VARS: [(&str, DeliveryClassification); 4] = [
    ("PRODRANK_PERCENT_EARLY", DeliveryClassification::Early),
    ("PRODRANK_PERCENT_ON_TIME", DeliveryClassification::OnTime),
    ("PRODRANK_PERCENT_LATE", DeliveryClassification::Late),
    ("PRODRANK_PERCENT_REWORK", DeliveryClassification::Rework),
];

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_competition = env_nonempty("PRODRANK_COMPETITION").map(CompetitionId);

        let mut percent_overrides = BTreeMap::new();
        for (var, classification) in PERCENT_VARS {
            if let Some(raw) = env_nonempty(var) {
                let percent = raw
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidPercent { var })?;
                percent_overrides.insert(classification, percent);
            }
        }

        let level_curve = match env_nonempty("PRODRANK_LEVEL_CURVE") {
            Some(raw) => Some(parse_level_curve(&raw)?),
            None => None,
        };

        Ok(Self {
            default_competition,
            percent_overrides,
            level_curve,
        })
    }

    /// Materialize the scoring tables: built-in defaults, then the
    /// configured overrides on top.
    pub fn tables(&self) -> StaticTables {
        let mut tables = StaticTables::default();
        for (classification, percent) in &self.percent_overrides {
            tables.set_percentage(*classification, *percent);
        }
        if let Some(curve) = &self.level_curve {
            tables.set_level_rules(curve.clone());
        }
        tables
    }
}

/// `PRODRANK_LEVEL_CURVE` holds comma-separated XP thresholds; position N
/// (from 1) is the XP required for level N. `"0,200,400"` defines levels
/// 1 through 3.
fn parse_level_curve(raw: &str) -> Result<Vec<LevelRule>, ConfigError> {
    raw.split(',')
        .enumerate()
        .map(|(index, part)| {
            part.trim()
                .parse::<u32>()
                .map(|xp_required| LevelRule {
                    level: index as u32 + 1,
                    xp_required,
                })
                .map_err(|_| ConfigError::InvalidLevelCurve {
                    value: raw.to_string(),
                })
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPercent { var: &'static str },
    InvalidLevelCurve { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => {
                write!(f, "invalid PRODRANK_PORT: expected a TCP port number")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "invalid PRODRANK_HOST: expected an IP address or 'localhost'")
            }
            ConfigError::InvalidPercent { var } => {
                write!(f, "invalid {}: expected an integer percent", var)
            }
            ConfigError::InvalidLevelCurve { value } => {
                write!(
                    f,
                    "invalid PRODRANK_LEVEL_CURVE '{}': expected comma-separated XP thresholds",
                    value
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
