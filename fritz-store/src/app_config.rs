use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reservations: ReservationConfig,
    #[serde(default)]
    pub fares: FareSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    /// Holds never expire when unset.
    #[serde(default)]
    pub hold_ttl_seconds: Option<u64>,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_lock_timeout() -> u64 { 5_000 }
fn default_sweep_interval() -> u64 { 30 }

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout(),
            hold_ttl_seconds: None,
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FareSettings {
    #[serde(default = "default_rounding_unit")]
    pub rounding_unit: i64,
}

fn default_rounding_unit() -> i64 { fritz_catalog::DEFAULT_ROUNDING_UNIT }

impl Default for FareSettings {
    fn default() -> Self {
        Self { rounding_unit: default_rounding_unit() }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. FRITZ__DATABASE__URL=postgres://...
            .add_source(config::Environment::with_prefix("FRITZ").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let cfg: Config = config::Config::builder()
            .set_override("server.port", 8080)
            .unwrap()
            .set_override("database.url", "postgres://localhost/fritz")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.reservations.lock_timeout_ms, 5_000);
        assert!(cfg.reservations.hold_ttl_seconds.is_none());
        assert_eq!(cfg.fares.rounding_unit, 1000);
    }
}
