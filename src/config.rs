//! Client configuration.
//!
//! [`ConnectionOptions`] carries the broker connection parameters. Every
//! field is optional and a transport only applies the ones that are set.
//! [`RpcConfig`] adds the client name and can be loaded from JSON:
//!
//! ```
//! use mq_rpc::RpcConfig;
//!
//! let config = RpcConfig::from_json_str(
//!     r#"{ "client_name": "nixos", "host": "mq.local", "port": 5672, "ssl": true }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.client_name, "nixos");
//! assert_eq!(config.connection.port, Some(5672));
//! assert!(config.connection.login.is_none());
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RpcError};

/// Broker connection parameters.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Broker hostname or address.
    pub host: Option<String>,
    /// Broker port.
    pub port: Option<u16>,
    /// User name to authenticate with.
    pub login: Option<String>,
    /// Password for `login`. Redacted from `Debug` output.
    pub password: Option<String>,
    /// Virtual host to open the connection on.
    pub virtualhost: Option<String>,
    /// Connect over TLS.
    pub ssl: Option<bool>,
}

impl ConnectionOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn virtualhost(mut self, virtualhost: impl Into<String>) -> Self {
        self.virtualhost = Some(virtualhost.into());
        self
    }

    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    /// The options that were explicitly set, as `(name, value)` pairs.
    ///
    /// Names match the usual broker client keyword arguments.
    pub fn explicit(&self) -> Vec<(&'static str, String)> {
        let mut set = Vec::new();
        if let Some(host) = &self.host {
            set.push(("host", host.clone()));
        }
        if let Some(port) = self.port {
            set.push(("port", port.to_string()));
        }
        if let Some(login) = &self.login {
            set.push(("login", login.clone()));
        }
        if let Some(password) = &self.password {
            set.push(("password", password.clone()));
        }
        if let Some(virtualhost) = &self.virtualhost {
            set.push(("virtualhost", virtualhost.clone()));
        }
        if let Some(ssl) = self.ssl {
            set.push(("ssl", ssl.to_string()));
        }
        set
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("virtualhost", &self.virtualhost)
            .field("ssl", &self.ssl)
            .finish()
    }
}

/// Client name plus connection options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Name this client listens under (`rpc.<client_name>`).
    #[serde(alias = "CLIENT_NAME")]
    pub client_name: String,
    /// Options passed to the transport on connect and send.
    #[serde(flatten)]
    pub connection: ConnectionOptions,
}

impl RpcConfig {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            connection: ConnectionOptions::default(),
        }
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RpcConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.client_name.is_empty() {
            return Err(RpcError::Config("client_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_lists_only_set_fields() {
        let options = ConnectionOptions::new().host("mq.local").ssl(false);

        assert_eq!(
            options.explicit(),
            vec![("host", "mq.local".to_string()), ("ssl", "false".to_string())]
        );
        assert!(ConnectionOptions::new().explicit().is_empty());
    }

    #[test]
    fn test_explicit_lists_every_field_in_order() {
        let options = ConnectionOptions::new()
            .ssl(true)
            .virtualhost("/rpc")
            .password("hunter2")
            .login("guest")
            .port(5671)
            .host("mq.local");
        let names: Vec<&str> = options.explicit().into_iter().map(|(name, _)| name).collect();

        assert_eq!(names, ["host", "port", "login", "password", "virtualhost", "ssl"]);
        assert!(options.explicit().contains(&("password", "hunter2".to_string())));
    }

    #[test]
    fn test_debug_redacts_password() {
        let options = ConnectionOptions::new().login("guest").password("hunter2");
        let debug = format!("{options:?}");

        assert!(debug.contains("guest"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_config_from_json() {
        let config = RpcConfig::from_json_str(
            r#"{
                "CLIENT_NAME": "nixos",
                "host": "mq.local",
                "port": 5671,
                "login": "guest",
                "password": "guest",
                "virtualhost": "/",
                "ssl": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.client_name, "nixos");
        assert_eq!(
            config.connection,
            ConnectionOptions::new()
                .host("mq.local")
                .port(5671)
                .login("guest")
                .password("guest")
                .virtualhost("/")
                .ssl(true)
        );
    }

    #[test]
    fn test_config_defaults_missing_options() {
        let config = RpcConfig::from_json_str(r#"{ "client_name": "pi" }"#).unwrap();
        assert_eq!(config, RpcConfig::new("pi"));
    }

    #[test]
    fn test_config_rejects_empty_name() {
        let err = RpcConfig::from_json_str(r#"{ "client_name": "" }"#).unwrap_err();
        assert!(matches!(err, RpcError::Config(_)));
    }

    #[test]
    fn test_config_rejects_bad_json() {
        let err = RpcConfig::from_json_str(r#"{ "port": "nope" }"#).unwrap_err();
        assert!(matches!(err, RpcError::Json(_)));
    }

    #[test]
    fn test_config_from_missing_file() {
        let err = RpcConfig::from_file("/nonexistent/mq-rpc.json").unwrap_err();
        assert!(matches!(err, RpcError::Io(_)));
    }
}
