use std::str::FromStr;

use tracing::Level;

use crate::error::ProvisionError;

pub const DEFAULT_IMAGE_REGISTRY: &str = "docker.io/library/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EState {
    DEV,
    PROD,
}

impl EState {
    pub fn prefix(&self) -> &str {
        match *self {
            Self::DEV => "DEV",
            Self::PROD => "PROD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub state: EState,
    pub database_uri: String,
    pub database_name: String,
    pub listening_address: String,
    pub listening_port: u16,
    pub store_backend: StoreBackend,
    pub image_registry: String,
    pub log_level: Level,
}

impl AppConfig {
    pub fn from_env() -> Result<AppConfig, ProvisionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `STATE` picks the `DEV_`/`PROD_` prefixed set of variables.
    pub fn from_lookup<F>(lookup: F) -> Result<AppConfig, ProvisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ProvisionError::Config(format!("{} is not set", key)))
        };
        let state = match required("STATE")?.as_str() {
            "DEV" => EState::DEV,
            "PROD" => EState::PROD,
            other => {
                return Err(ProvisionError::Config(format!(
                    "STATE must be DEV or PROD, got {}",
                    other
                )))
            }
        };
        let prefixed = |name: &str| required(&format!("{}_{}", state.prefix(), name));

        let listening_port = prefixed("LISTENING_PORT")?;
        let listening_port = listening_port.parse::<u16>().map_err(|_| {
            ProvisionError::Config(format!("invalid listening port {}", listening_port))
        })?;

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("mongo") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ProvisionError::Config(format!(
                    "STORE_BACKEND must be mongo or memory, got {}",
                    other
                )))
            }
        };

        let log_level = match lookup("LOG_LEVEL") {
            Some(level) => Level::from_str(&level)
                .map_err(|_| ProvisionError::Config(format!("invalid LOG_LEVEL {}", level)))?,
            None => Level::INFO,
        };

        Ok(AppConfig {
            state,
            database_uri: prefixed("DATABASE_URI")?,
            database_name: prefixed("DATABASE_NAME")?,
            listening_address: prefixed("LISTENING_ADDRESS")?,
            listening_port,
            store_backend,
            image_registry: lookup("IMAGE_REGISTRY")
                .unwrap_or_else(|| DEFAULT_IMAGE_REGISTRY.to_string()),
            log_level,
        })
    }

    pub fn listening_socket(&self) -> String {
        format!("{}:{}", self.listening_address, self.listening_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const DEV: [(&str, &str); 5] = [
        ("STATE", "DEV"),
        ("DEV_DATABASE_URI", "mongodb://localhost:27017"),
        ("DEV_DATABASE_NAME", "infrabuilder"),
        ("DEV_LISTENING_ADDRESS", "0.0.0.0"),
        ("DEV_LISTENING_PORT", "8080"),
    ];

    #[test]
    fn dev_state_reads_dev_prefixed_vars() {
        let config = AppConfig::from_lookup(lookup(&DEV)).unwrap();
        assert_eq!(config.state, EState::DEV);
        assert_eq!(config.database_name, "infrabuilder");
        assert_eq!(config.listening_socket(), "0.0.0.0:8080");
        assert_eq!(config.store_backend, StoreBackend::Mongo);
        assert_eq!(config.image_registry, DEFAULT_IMAGE_REGISTRY);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn optional_overrides() {
        let mut vars = DEV.to_vec();
        vars.push(("STORE_BACKEND", "memory"));
        vars.push(("IMAGE_REGISTRY", "registry.local/"));
        vars.push(("LOG_LEVEL", "debug"));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.image_registry, "registry.local/");
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn prod_state_ignores_dev_vars() {
        let mut vars = DEV.to_vec();
        vars[0] = ("STATE", "PROD");
        let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("PROD_LISTENING_PORT"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("STATE", "STAGING")])).is_err());

        let mut vars = DEV.to_vec();
        vars[4] = ("DEV_LISTENING_PORT", "http");
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());

        let mut vars = DEV.to_vec();
        vars.push(("STORE_BACKEND", "postgres"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }
}
