//! Server settings read from the environment.

use std::net::SocketAddr;

use crate::error::AppError;

/// Which event store backs the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store; contents are lost on restart.
    Memory,
    /// `PostgreSQL` store at the given connection URL.
    Postgres {
        /// Connection string, from `DATABASE_URL`.
        database_url: String,
    },
}

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Interface to bind, from `HOST` (default `0.0.0.0`).
    pub host: String,
    /// Port to bind, from `PORT` (default `3000`).
    pub port: u16,
    /// Store selection, from `STORE_BACKEND` (`memory` by default, or
    /// `postgres`, which requires `DATABASE_URL`).
    pub backend: StoreBackend,
}

impl ApiConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is malformed or a required
    /// one is missing.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is malformed or a required
    /// one is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?;

        let backend = match lookup("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("" | "memory") => StoreBackend::Memory,
            Some("postgres") => {
                let database_url = lookup("DATABASE_URL").ok_or_else(|| {
                    AppError::Config(
                        "DATABASE_URL environment variable must be set for the postgres backend"
                            .into(),
                    )
                })?;
                StoreBackend::Postgres { database_url }
            }
            Some(other) => {
                return Err(AppError::Config(format!(
                    "STORE_BACKEND must be memory or postgres, got {other}"
                )));
            }
        };

        Ok(Self {
            host,
            port,
            backend,
        })
    }

    /// Returns the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `host` and `port` do not form an
    /// address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_use_memory_backend() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_postgres_backend_reads_database_url() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/chronicle"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(
            config.backend,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/chronicle".to_owned()
            }
        );
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_postgres_backend_without_database_url_is_rejected() {
        let result = ApiConfig::from_lookup(lookup(&[("STORE_BACKEND", "postgres")]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = ApiConfig::from_lookup(lookup(&[("STORE_BACKEND", "cassandra")]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("cassandra")));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = ApiConfig::from_lookup(lookup(&[("PORT", "http")]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_host_fails_when_building_address() {
        let config = ApiConfig::from_lookup(lookup(&[("HOST", "not a host")])).unwrap();

        assert!(config.socket_addr().is_err());
    }
}
