/**
 * Server Configuration
 *
 * Locates and loads the declarative configuration of the server binary.
 *
 * # Configuration Sources
 *
 * - `PAGEWRIGHT_CONFIG` names the config file explicitly; it must exist
 * - otherwise `./rsconfig.json` is used when present
 * - `PAGEWRIGHT_PORT` overrides the port of the file
 *
 * Loading errors are fatal. Warnings are returned to the caller, which logs
 * them once logging is configured.
 */
use std::net::SocketAddr;
use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::shared::{AppConfig, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_FILE_ENV: &str = "PAGEWRIGHT_CONFIG";

/// Environment variable overriding the listener port.
pub const PORT_ENV: &str = "PAGEWRIGHT_PORT";

/// Config file named by the environment, if any.
pub fn config_file_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Overrides taken from the environment.
pub fn overrides_from_env() -> Result<Value, ConfigError> {
    let mut overrides = Map::new();
    if let Ok(port) = std::env::var(PORT_ENV) {
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} must be a port number, got '{port}'")))?;
        overrides.insert("port".to_string(), json!(port));
    }
    Ok(Value::Object(overrides))
}

/// Address the listener binds to.
pub fn listen_addr(config: &AppConfig) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], config.port))
}
