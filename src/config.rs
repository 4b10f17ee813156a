// Runtime configuration shared by the CLI and the server.
// Environment variables first, CLI flags override on top.

use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "EQUIPMENT_DB";
pub const BIND_ADDR_ENV: &str = "EQUIPMENT_ADDR";

pub const DEFAULT_DB_PATH: &str = "equipment.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite file holding the registry snapshot
    pub db_path: PathBuf,

    /// Listen address for the API server
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Config {
            db_path: non_empty(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind_addr: non_empty(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        }
    }

    pub fn with_db_path(mut self, db_path: Option<PathBuf>) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: Option<String>) -> Self {
        if let Some(addr) = bind_addr {
            self.bind_addr = addr;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.db_path, PathBuf::from("equipment.db"));
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_env_values() {
        let env: HashMap<&str, &str> = [
            (DB_PATH_ENV, "/var/lib/equipment/registry.db"),
            (BIND_ADDR_ENV, "0.0.0.0:8080"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/var/lib/equipment/registry.db"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_blank_env_falls_back() {
        let config = Config::from_lookup(|_| Some("  ".to_string()));

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flag_overrides() {
        let config = Config::default()
            .with_db_path(Some(PathBuf::from("other.db")))
            .with_bind_addr(None);

        assert_eq!(config.db_path, PathBuf::from("other.db"));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }
}
