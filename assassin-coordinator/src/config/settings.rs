//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Game rule knobs.
    pub game: GameSettings,
    /// Chain RPC configuration.
    pub rpc: RpcSettings,
    /// Settlement contract configuration.
    pub contract: ContractSettings,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// API server configuration.
    pub api: ApiSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `COORDINATOR_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("game.checkin_duration_seconds", 1800)?
            .set_default("game.pregame_duration_seconds", 300)?
            .set_default("game.zone_grace_seconds", 60)?
            .set_default("game.kill_proximity_meters", 50.0)?
            .set_default("game.heartbeat_proximity_meters", 50.0)?
            .set_default("game.heartbeat_interval_seconds", 600)?
            .set_default("game.heartbeat_disable_threshold", 3)?
            .set_default("game.ble_required", true)?
            .set_default("rpc.url", "http://localhost:8545")?
            .set_default("rpc.ws_url", "ws://localhost:8546")?
            .set_default("rpc.poll_interval_ms", 2000)?
            .set_default("contract.address", "0x0000000000000000000000000000000000000001")?
            .set_default("contract.operator_private_key", "")?
            .set_default("database.path", "coordinator.db")?
            .set_default("api.host", "0.0.0.0")?
            .set_default("api.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (COORDINATOR_ prefix)
            .add_source(
                Environment::with_prefix("COORDINATOR")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.game.pregame_duration_seconds == 0 {
            errors.push("game.pregame_duration_seconds must be non-zero".into());
        }
        if self.game.heartbeat_interval_seconds == 0 {
            errors.push("game.heartbeat_interval_seconds must be non-zero".into());
        }
        if self.game.kill_proximity_meters <= 0.0 {
            errors.push("game.kill_proximity_meters must be positive".into());
        }
        if self.game.heartbeat_proximity_meters <= 0.0 {
            errors.push("game.heartbeat_proximity_meters must be positive".into());
        }

        if self.rpc.url.is_empty() {
            errors.push("rpc.url cannot be empty".into());
        }
        if self.rpc.poll_interval_ms == 0 {
            errors.push("rpc.poll_interval_ms must be non-zero".into());
        }

        if self.contract.address.is_empty() {
            errors.push("contract.address cannot be empty".into());
        }

        if self.database.path.is_empty() {
            errors.push("database.path cannot be empty".into());
        }

        if self.api.port == 0 {
            errors.push("api.port must be non-zero".into());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Game rule configuration.
///
/// `checkin_duration_seconds` is advisory: the real check-in window runs
/// until `requiredCheckedIn` is met or the expiry deadline passes,
/// whichever comes first. Clients use it for countdown display.
#[derive(Debug, Clone, Deserialize)]
pub struct GameSettings {
    /// Advisory check-in window length.
    pub checkin_duration_seconds: u64,
    /// Length of the pregame countdown.
    pub pregame_duration_seconds: u64,
    /// Grace period before an out-of-zone player is eliminated.
    pub zone_grace_seconds: u64,
    /// GPS proximity threshold for kills.
    pub kill_proximity_meters: f64,
    /// GPS proximity threshold for heartbeat scans.
    pub heartbeat_proximity_meters: f64,
    /// A player must be heartbeat-refreshed within this window.
    pub heartbeat_interval_seconds: u64,
    /// Alive count at or below which heartbeat timeouts stop.
    pub heartbeat_disable_threshold: u32,
    /// Whether Bluetooth proof is mandatory for kill/heartbeat/check-in.
    pub ble_required: bool,
}

impl GameSettings {
    /// Get the pregame countdown as a `Duration`.
    #[must_use]
    pub const fn pregame_duration(&self) -> Duration {
        Duration::from_secs(self.pregame_duration_seconds)
    }

    /// Get the heartbeat window as a `Duration`.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSettings {
    /// HTTP RPC endpoint URL.
    pub url: String,
    /// WebSocket RPC endpoint URL (reserved for subscription transport).
    pub ws_url: String,
    /// Event polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl RpcSettings {
    /// Get the polling interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Settlement contract configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractSettings {
    /// Deployed settlement contract address (0x-hex).
    pub address: String,
    /// Operator private key (0x-hex). MUST be set in production config.
    pub operator_private_key: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file path.
    pub path: String,
}

/// API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl ApiSettings {
    /// Get the socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn create_valid_settings() -> Settings {
        Settings {
            game: GameSettings {
                checkin_duration_seconds: 1800,
                pregame_duration_seconds: 300,
                zone_grace_seconds: 60,
                kill_proximity_meters: 50.0,
                heartbeat_proximity_meters: 50.0,
                heartbeat_interval_seconds: 600,
                heartbeat_disable_threshold: 3,
                ble_required: true,
            },
            rpc: RpcSettings {
                url: "http://localhost:8545".into(),
                ws_url: "ws://localhost:8546".into(),
                poll_interval_ms: 2000,
            },
            contract: ContractSettings {
                address: "0x0000000000000000000000000000000000000001".into(),
                operator_private_key: String::new(),
            },
            database: DatabaseSettings {
                path: "coordinator.db".into(),
            },
            api: ApiSettings {
                host: "0.0.0.0".into(),
                port: 8080,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "json".into(),
            },
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(create_valid_settings().validate().is_ok());
    }

    #[test]
    fn validation_catches_zero_pregame() {
        let mut settings = create_valid_settings();
        settings.game.pregame_duration_seconds = 0;
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("pregame_duration_seconds")));
    }

    #[test]
    fn validation_catches_empty_db_path() {
        let mut settings = create_valid_settings();
        settings.database.path = String::new();
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("database.path")));
    }

    #[test]
    fn durations() {
        let settings = create_valid_settings();
        assert_eq!(settings.game.pregame_duration(), Duration::from_secs(300));
        assert_eq!(settings.rpc.poll_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn api_socket_addr() {
        let settings = create_valid_settings();
        assert_eq!(settings.api.socket_addr(), "0.0.0.0:8080");
    }
}
