//! Listener settings for the HTTP services

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

/// Bind address of a service
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    /// Load settings from `<PREFIX>_HOST` and `<PREFIX>_PORT`
    ///
    /// Host defaults to `0.0.0.0`; port defaults to `default_port`.
    pub fn load(prefix: &str, default_port: u16) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", default_port as i64)?
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.address().parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        unsafe {
            std::env::remove_var("SETTINGSTEST_HOST");
            std::env::remove_var("SETTINGSTEST_PORT");
        }

        let settings = ServerSettings::load("SETTINGSTEST", 3001).unwrap();
        assert_eq!(settings.address(), "0.0.0.0:3001");
        assert!(settings.socket_addr().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            std::env::set_var("SETTINGSTEST_HOST", "127.0.0.1");
            std::env::set_var("SETTINGSTEST_PORT", "8080");
        }

        let settings = ServerSettings::load("SETTINGSTEST", 3001).unwrap();
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 8080);

        unsafe {
            std::env::remove_var("SETTINGSTEST_HOST");
            std::env::remove_var("SETTINGSTEST_PORT");
        }
    }
}
