//! Cluster adapter configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Configuration for the clustered broadcast adapter.
///
/// When this section is absent from the environment the server runs
/// single-node: no bus connections, and room introspection answers from
/// local state.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Transport family for the bus dialer: `tcp` or `unix`.
    #[serde(default = "default_network")]
    pub network: String,

    /// Bus host, used with `port` when `addr` is not set.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bus port, used with `host` when `addr` is not set.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Full bus endpoint, overriding `host`/`port`. Required for `unix`
    /// (the socket path).
    #[serde(default)]
    pub addr: Option<String>,

    /// Optional bus authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Channel-name prefix namespacing this deployment within a shared
    /// bus.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Deadline for cluster-wide queries, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl AdapterConfig {
    /// Bus endpoint: the explicit `addr` if set, else `host:port`.
    pub fn addr(&self) -> String {
        match &self.addr {
            Some(addr) => addr.clone(),
            None => format!("{}:{}", self.host, self.port),
        }
    }

    /// Connection URL for the bus client.
    pub fn url(&self) -> String {
        let auth = match &self.password {
            Some(password) => format!(":{}@", password),
            None => String::new(),
        };

        if self.network == "unix" {
            format!("redis+unix://{}", self.addr())
        } else {
            format!("redis://{}{}", auth, self.addr())
        }
    }

    /// Cluster query deadline as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate adapter configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.network.as_str() {
            "tcp" => {}
            "unix" => {
                if self.addr.is_none() {
                    return Err(ValidationError::MissingRequired("ADAPTER_ADDR"));
                }
            }
            other => return Err(ValidationError::UnsupportedNetwork(other.to_string())),
        }

        if self.prefix.is_empty() {
            return Err(ValidationError::EmptyPrefix);
        }
        // '#' is the channel-name separator; a prefix containing it would
        // break the namespace/uid parse on the receive side.
        if self.prefix.contains('#') {
            return Err(ValidationError::PrefixContainsSeparator(self.prefix.clone()));
        }

        Ok(())
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            host: default_host(),
            port: default_port(),
            addr: None,
            password: None,
            prefix: default_prefix(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_network() -> String {
    "tcp".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_prefix() -> String {
    "roomcast".to_string()
}

fn default_request_timeout() -> u64 {
    5
}
