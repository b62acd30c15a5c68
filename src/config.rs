use crate::bidding::BiddingRules;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
    pub migrations_path: String,
}

/// Which storage adapter backs the repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "local" => Ok(StorageBackend::Memory),
            _ => Err(format!(
                "Invalid STORAGE_BACKEND: {}. Must be one of: [\"postgres\", \"memory\"]",
                s
            )),
        }
    }
}

/// JWT signing configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
}

/// Background case expiry settings
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    pub case_expiry_hours: i64,
    pub sweep_interval_secs: u64,
}

impl ExpiryConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageBackend,
    pub auth: AuthConfig,
    pub bidding: BiddingRules,
    pub expiry: ExpiryConfig,
    pub log_level: String,
    pub log_format: String,
    pub http_port: u16,
    pub ws_port: Option<u16>,
    pub environment: String,
    pub audit_log_dir: String,
}

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        Self::from_env_with_url(url)
    }

    fn from_env_with_url(url: String) -> Result<Self, String> {
        let max_connections = env_parse::<u32>("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let acquire_timeout_secs = env_parse::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30);
        let idle_timeout_secs = env_parse::<u64>("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600); // 10 minutes
        let max_lifetime_secs = env_parse::<u64>("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800); // 30 minutes
        let test_before_acquire = env_parse::<bool>("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true);
        let migrations_path =
            env::var("DATABASE_MIGRATIONS_PATH").unwrap_or_else(|_| "./migrations".to_string());

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
            migrations_path,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/majstor".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
            migrations_path: "./migrations".to_string(),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let storage = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StorageBackend>()?;

        // The in-memory adapter never touches DATABASE_URL
        let database = match storage {
            StorageBackend::Postgres => DatabaseConfig::from_env()?,
            StorageBackend::Memory => match env::var("DATABASE_URL") {
                Ok(url) => DatabaseConfig::from_env_with_url(url)?,
                Err(_) => DatabaseConfig::default(),
            },
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
        let http_port = env_parse::<u16>("HTTP_PORT").unwrap_or(8080);
        let ws_port = env_parse::<u16>("WS_PORT");
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let audit_log_dir = env::var("AUDIT_LOG_DIR").unwrap_or_else(|_| "./logs".to_string());

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_FORMAT: {}. Must be one of: {:?}",
                log_format, valid_log_formats
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }
        let environment = environment.to_lowercase();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if secret.len() >= 16 => secret,
            Ok(_) => return Err("JWT_SECRET must be at least 16 characters".to_string()),
            Err(_) if environment == "production" => {
                return Err("JWT_SECRET is required in production".to_string())
            }
            Err(_) => DEV_JWT_SECRET.to_string(),
        };
        let token_expiry_hours = env_parse::<i64>("JWT_EXPIRY_HOURS").unwrap_or(24);
        if token_expiry_hours <= 0 {
            return Err("JWT_EXPIRY_HOURS must be greater than 0".to_string());
        }

        let defaults = BiddingRules::default();
        let bidding = BiddingRules {
            max_bidders: env_parse::<i32>("BID_MAX_BIDDERS").unwrap_or(defaults.max_bidders),
            default_cost: env_parse::<i64>("BID_DEFAULT_COST").unwrap_or(defaults.default_cost),
            loser_refund_percent: env_parse::<i64>("BID_LOSER_REFUND_PERCENT")
                .unwrap_or(defaults.loser_refund_percent),
            signup_bonus: env_parse::<i64>("PROVIDER_SIGNUP_BONUS").unwrap_or(defaults.signup_bonus),
            ..defaults
        };
        bidding.validate()?;

        let expiry = ExpiryConfig {
            case_expiry_hours: env_parse::<i64>("CASE_EXPIRY_HOURS").unwrap_or(168), // 7 days
            sweep_interval_secs: env_parse::<u64>("CASE_SWEEP_INTERVAL_SECS").unwrap_or(300),
        };
        if expiry.case_expiry_hours <= 0 {
            return Err("CASE_EXPIRY_HOURS must be greater than 0".to_string());
        }
        if expiry.sweep_interval_secs == 0 {
            return Err("CASE_SWEEP_INTERVAL_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            database,
            storage,
            auth: AuthConfig {
                jwt_secret,
                token_expiry_hours,
            },
            bidding,
            expiry,
            log_level: log_level.to_lowercase(),
            log_format: log_format.to_lowercase(),
            http_port,
            ws_port,
            environment,
            audit_log_dir,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            storage: StorageBackend::Memory,
            auth: AuthConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                token_expiry_hours: 24,
            },
            bidding: BiddingRules::default(),
            expiry: ExpiryConfig {
                case_expiry_hours: 168,
                sweep_interval_secs: 300,
            },
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            http_port: 8080,
            ws_port: None,
            environment: "development".to_string(),
            audit_log_dir: "./logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
        assert_eq!(config.migrations_path, "./migrations");
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(!config.is_production());
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("postgres".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert_eq!("Local".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("mongo".parse::<StorageBackend>().is_err());
    }
}
