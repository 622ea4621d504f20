use std::env;
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
}

/// Spot price feed configuration
#[derive(Debug, Clone)]
pub struct SpotConfig {
    pub api_url: String,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub spot: SpotConfig,
    pub log_level: String,
    pub environment: String,
    /// Price lock lifetime; clamped to the 10-30s window
    pub lock_ttl_secs: u64,
    /// Market poller interval (spot refresh + best ask recompute)
    pub poll_interval_secs: u64,
    /// Maintenance sweep interval (lock expiry, history retention)
    pub sweep_interval_secs: u64,
    pub history_retention_days: i64,
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let acquire_timeout_secs = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_secs = env::var("DATABASE_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(600); // 10 minutes

        let max_lifetime_secs = env::var("DATABASE_MAX_LIFETIME_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1800); // 30 minutes

        let test_before_acquire = env::var("DATABASE_TEST_BEFORE_ACQUIRE")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(true);

        // Validate configuration
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
            url: "postgresql://localhost/troy".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl SpotConfig {
    pub fn from_env() -> Self {
        let api_url = env::var("SPOT_API_URL")
            .unwrap_or_else(|_| "https://api.metals.live/v1/spot".to_string());

        let cache_ttl_secs = env::var("SPOT_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(300); // 5 minutes

        let request_timeout_secs = env::var("SPOT_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(5);

        Self {
            api_url,
            cache_ttl_secs,
            request_timeout_secs,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.metals.live/v1/spot".to_string(),
            cache_ttl_secs: 300,
            request_timeout_secs: 5,
        }
    }
}

/// Bounds on the advisory price lock lifetime
const MIN_LOCK_TTL_SECS: u64 = 10;
const MAX_LOCK_TTL_SECS: u64 = 30;

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let spot = SpotConfig::from_env();

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let lock_ttl_secs = env::var("PRICE_LOCK_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(15)
            .clamp(MIN_LOCK_TTL_SECS, MAX_LOCK_TTL_SECS);

        let poll_interval_secs = env::var("MARKET_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        let sweep_interval_secs = env::var("MAINTENANCE_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        let history_retention_days = env::var("HISTORY_RETENTION_DAYS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(365);

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if poll_interval_secs == 0 {
            return Err("MARKET_POLL_INTERVAL_SECS must be greater than 0".to_string());
        }

        if history_retention_days <= 0 {
            return Err("HISTORY_RETENTION_DAYS must be greater than 0".to_string());
        }

        Ok(Self {
            database,
            spot,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
            lock_ttl_secs,
            poll_interval_secs,
            sweep_interval_secs,
            history_retention_days,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            spot: SpotConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            lock_ttl_secs: 15,
            poll_interval_secs: 60,
            sweep_interval_secs: 60,
            history_retention_days: 365,
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
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.lock_ttl_secs, 15);
        assert_eq!(config.history_retention_days, 365);
        assert!(config.is_development());
        assert!(!config.is_production());
    }

    #[test]
    fn test_lock_ttl_within_bounds() {
        let config = AppConfig::default();
        assert!(config.lock_ttl_secs >= MIN_LOCK_TTL_SECS);
        assert!(config.lock_ttl_secs <= MAX_LOCK_TTL_SECS);
    }
}
