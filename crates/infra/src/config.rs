//! Process configuration read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_ADMIN_ADDR: &str = "0.0.0.0:8087";
pub const DEFAULT_CHECKPOINT_DIR: &str = "./conf/jobs";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} requires {requires}")]
    Missing {
        var: &'static str,
        requires: &'static str,
    },
}

/// Where job checkpoints are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointBackendKind {
    File,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub admin_addr: SocketAddr,
    pub checkpoint_dir: PathBuf,
    pub checkpoint_backend: CheckpointBackendKind,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub product_key_prefix: String,
    pub price_key_prefix: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let admin_addr_raw =
            get("INDEXSYNC_ADMIN_ADDR").unwrap_or_else(|| DEFAULT_ADMIN_ADDR.to_string());
        let admin_addr = admin_addr_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "INDEXSYNC_ADMIN_ADDR",
                value: admin_addr_raw.clone(),
                reason: e.to_string(),
            })?;

        let database_url = get("DATABASE_URL");
        let checkpoint_backend = match get("INDEXSYNC_CHECKPOINT_BACKEND").as_deref() {
            None | Some("file") => CheckpointBackendKind::File,
            Some("postgres") if database_url.is_some() => CheckpointBackendKind::Postgres,
            Some("postgres") => {
                return Err(ConfigError::Missing {
                    var: "INDEXSYNC_CHECKPOINT_BACKEND=postgres",
                    requires: "DATABASE_URL",
                });
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "INDEXSYNC_CHECKPOINT_BACKEND",
                    value: other.to_string(),
                    reason: "expected `file` or `postgres`".to_string(),
                });
            }
        };

        Ok(Self {
            admin_addr,
            checkpoint_dir: get("INDEXSYNC_CHECKPOINT_DIR")
                .unwrap_or_else(|| DEFAULT_CHECKPOINT_DIR.to_string())
                .into(),
            checkpoint_backend,
            database_url,
            redis_url: get("REDIS_URL"),
            product_key_prefix: get("INDEXSYNC_PRODUCT_KEY_PREFIX")
                .unwrap_or_else(|| "product".to_string()),
            price_key_prefix: get("INDEXSYNC_PRICE_KEY_PREFIX")
                .unwrap_or_else(|| "stockprice".to_string()),
        })
    }

    /// Whether the process reads from a real database.
    pub fn is_persistent(&self) -> bool {
        self.database_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.admin_addr, "0.0.0.0:8087".parse().unwrap());
        assert_eq!(config.checkpoint_dir, PathBuf::from("./conf/jobs"));
        assert_eq!(config.checkpoint_backend, CheckpointBackendKind::File);
        assert_eq!(config.product_key_prefix, "product");
        assert_eq!(config.price_key_prefix, "stockprice");
        assert!(!config.is_persistent());
    }

    #[test]
    fn postgres_checkpoints_need_a_database() {
        let err = ServiceConfig::from_lookup(lookup(&[("INDEXSYNC_CHECKPOINT_BACKEND", "postgres")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { requires: "DATABASE_URL", .. }));

        let config = ServiceConfig::from_lookup(lookup(&[
            ("INDEXSYNC_CHECKPOINT_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/catalog"),
        ]))
        .unwrap();
        assert_eq!(config.checkpoint_backend, CheckpointBackendKind::Postgres);
        assert!(config.is_persistent());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("INDEXSYNC_ADMIN_ADDR", "not-an-addr")])),
            Err(ConfigError::Invalid { var: "INDEXSYNC_ADMIN_ADDR", .. })
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("INDEXSYNC_CHECKPOINT_BACKEND", "etcd")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("INDEXSYNC_PRODUCT_KEY_PREFIX", "  "),
            ("INDEXSYNC_CHECKPOINT_DIR", "/var/lib/indexsync"),
        ]))
        .unwrap();
        assert_eq!(config.product_key_prefix, "product");
        assert_eq!(config.checkpoint_dir, PathBuf::from("/var/lib/indexsync"));
    }
}
