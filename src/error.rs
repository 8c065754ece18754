//! Adapter error taxonomy.

use thiserror::Error;

/// Errors surfaced by the adapter.
///
/// Lifecycle and API errors carry only the HTTP status and the message
/// Twitter reported; transport response objects never cross this boundary.
/// Nothing in the adapter retries: rate-limit and server errors propagate to
/// the caller, which decides whether to back off and start over.
#[derive(Error, Debug)]
pub enum TwitterError {
    /// Transport-level failure from the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body or webhook payload was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// OAuth signature generation failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// A webhook URL failed local validation; no network call was made
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(String),

    /// A Twitter endpoint returned a non-success result
    #[error("Twitter API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 429 from Twitter; `reset` is the Unix timestamp at which the
    /// rate-limit window reopens, when the response carried one
    #[error("rate limited by Twitter")]
    RateLimited { reset: Option<u64> },

    /// Twitter rejected a webhook URL, typically because the CRC challenge
    /// was not answered correctly
    #[error("webhook URL rejected ({status}): {message}")]
    WebhookUri { status: u16, message: String },

    /// Credential verification or a subscription mutation failed
    #[error("subscription error ({status}): {message}")]
    UserSubscription { status: u16, message: String },

    /// Every provisioned subscription slot is in use; detected from the
    /// cached count before any subscribe call goes out
    #[error("all {provisioned} provisioned subscriptions are in use")]
    TooManySubscriptions { provisioned: u64 },
}

/// Result type for adapter operations.
pub type TwitterResult<T> = Result<T, TwitterError>;
