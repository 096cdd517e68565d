//! Runtime configuration read from the environment (and `.env` via dotenv).

use crate::error::{Error, Result};
use crate::models::CapacityPolicy;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "IPAM_DB_PATH";
pub const ENV_CAPACITY_POLICY: &str = "IPAM_CAPACITY_POLICY";
pub const ENV_AUDIT_LIMIT: &str = "IPAM_AUDIT_LIMIT";
pub const ENV_LOG_CONFIG: &str = "IPAM_LOG_CONFIG";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// JSON store file.
    pub db_path: PathBuf,
    pub capacity_policy: CapacityPolicy,
    /// Default page size for audit and history listings.
    pub audit_limit: usize,
    /// log4rs configuration file.
    pub log_config: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("ipam.json"),
            capacity_policy: CapacityPolicy::default(),
            audit_limit: 100,
            log_config: PathBuf::from("log4rs.yml"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(path) = get(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(policy) = get(ENV_CAPACITY_POLICY) {
            config.capacity_policy = policy.parse()?;
        }
        if let Some(limit) = get(ENV_AUDIT_LIMIT) {
            config.audit_limit = limit.trim().parse().map_err(|_| {
                Error::Validation(format!("{ENV_AUDIT_LIMIT} must be a number, got {limit}"))
            })?;
        }
        if let Some(path) = get(ENV_LOG_CONFIG) {
            config.log_config = PathBuf::from(path);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.capacity_policy, CapacityPolicy::Conventional);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/ipam/store.json"),
            (ENV_CAPACITY_POLICY, "point-to-point"),
            (ENV_AUDIT_LIMIT, "25"),
            (ENV_LOG_CONFIG, " "),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/ipam/store.json"));
        assert_eq!(config.capacity_policy, CapacityPolicy::PointToPoint);
        assert_eq!(config.audit_limit, 25);
        assert_eq!(config.log_config, PathBuf::from("log4rs.yml"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[(ENV_AUDIT_LIMIT, "lots")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_CAPACITY_POLICY, "loose")])).is_err());
    }
}
