//! Adapter configuration.

use serde::{Deserialize, Serialize};

/// OAuth 1.0a signing material.
///
/// Immutable once constructed; shared read-only by the signed client and the
/// webhook manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Consumer key (API key)
    pub consumer_key: String,

    /// Consumer secret (API secret)
    pub consumer_secret: String,

    /// User access token
    pub access_token: String,

    /// User access token secret
    pub access_token_secret: String,
}

/// Configuration for the Twitter adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// OAuth 1.0a credential bundle
    #[serde(flatten)]
    pub credentials: Credentials,

    /// Account Activity environment name scoping webhook and subscription
    /// operations
    pub environment: String,

    /// Publicly reachable webhook URL to register (https only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Base URL for the Twitter API (default: <https://api.twitter.com>)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// REST API version path segment (default: 1.1)
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_url() -> String {
    "https://api.twitter.com".into()
}

fn default_api_version() -> String {
    "1.1".into()
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            environment: String::new(),
            webhook_url: None,
            api_url: default_api_url(),
            api_version: default_api_version(),
        }
    }
}

impl TwitterConfig {
    /// Base URL for versioned REST endpoints, e.g.
    /// `https://api.twitter.com/1.1`.
    pub(crate) fn rest_base(&self) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            self.api_version
        )
    }

    /// OAuth 2.0 token endpoint. Unversioned, unlike the data endpoints.
    pub(crate) fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_base_joins_host_and_version() {
        let config = TwitterConfig {
            environment: "prod".into(),
            ..Default::default()
        };
        assert_eq!(config.rest_base(), "https://api.twitter.com/1.1");
        assert_eq!(config.token_url(), "https://api.twitter.com/oauth2/token");
    }

    #[test]
    fn rest_base_tolerates_trailing_slash() {
        let config = TwitterConfig {
            api_url: "http://127.0.0.1:9999/".into(),
            ..Default::default()
        };
        assert_eq!(config.rest_base(), "http://127.0.0.1:9999/1.1");
    }

    #[test]
    fn config_deserializes_with_flattened_credentials() {
        let config: TwitterConfig = serde_json::from_value(serde_json::json!({
            "consumer_key": "ck",
            "consumer_secret": "cs",
            "access_token": "at",
            "access_token_secret": "ats",
            "environment": "dev"
        }))
        .unwrap();

        assert_eq!(config.credentials.consumer_key, "ck");
        assert_eq!(config.environment, "dev");
        assert_eq!(config.api_url, "https://api.twitter.com");
        assert_eq!(config.api_version, "1.1");
    }
}
