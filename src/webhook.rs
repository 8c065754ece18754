//! Account Activity webhook lifecycle and subscription management.
//!
//! Drives Twitter-side registration state for one environment: webhook
//! enumeration and replacement, the CRC challenge handshake, and user
//! subscription accounting. Operations are meant to run one at a time while
//! the adapter boots. Nothing here retries; a rate limit or server error
//! propagates and the caller restarts the sequence.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, instrument};
use url::Url;

use crate::client::error_message;
use crate::config::TwitterConfig;
use crate::error::{TwitterError, TwitterResult};
use crate::oauth::OauthSigner;
use crate::types::{BearerGrant, CrcResponse, SubscriptionCount, UserProfile, Webhook};

/// Manages webhook registration and user subscriptions for one Account
/// Activity environment.
///
/// Holds two in-memory caches: the app-only bearer token (fetched once, never
/// refreshed) and the subscription quota (adjusted optimistically on
/// subscribe/unsubscribe, so advisory only).
pub struct WebhookManager {
    config: TwitterConfig,
    signer: OauthSigner,
    http: Client,
    bearer: Option<String>,
    subscriptions: Option<SubscriptionCount>,
}

impl WebhookManager {
    /// Create a manager for the configured environment.
    pub fn new(config: TwitterConfig) -> TwitterResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("twitter-adapter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let signer = OauthSigner::new(config.credentials.clone());

        Ok(Self {
            config,
            signer,
            http,
            bearer: None,
            subscriptions: None,
        })
    }

    /// App-only bearer token, exchanged once via the client-credentials
    /// grant and cached for this manager's lifetime.
    ///
    /// An expired token is not detected or refreshed here; managers are
    /// expected to live no longer than the adapter's initialization.
    pub async fn bearer_token(&mut self) -> TwitterResult<String> {
        if let Some(token) = &self.bearer {
            return Ok(token.clone());
        }

        debug!("exchanging consumer credentials for a bearer token");
        let response = self
            .http
            .post(self.config.token_url())
            .basic_auth(
                &self.config.credentials.consumer_key,
                Some(&self.config.credentials.consumer_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: "bearer token exchange failed; check the consumer key and secret".into(),
            });
        }

        let grant: BearerGrant = response.json().await?;
        self.bearer = Some(grant.access_token.clone());
        Ok(grant.access_token)
    }

    /// List the webhooks registered for the environment.
    #[instrument(skip(self))]
    pub async fn get_webhooks(&mut self) -> TwitterResult<Vec<Webhook>> {
        let bearer = self.bearer_token().await?;
        let url = format!(
            "{}/account_activity/all/{}/webhooks.json",
            self.config.rest_base(),
            self.config.environment
        );

        let response = self.http.get(&url).bearer_auth(&bearer).send().await?;
        let status = response.status();
        if status == StatusCode::OK {
            Ok(response.json().await?)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Err(rate_limited(&response))
        } else {
            Err(TwitterError::Api {
                status: status.as_u16(),
                message: "could not list webhooks; check the environment name and app credentials"
                    .into(),
            })
        }
    }

    /// Remove each listed webhook, sequentially.
    #[instrument(skip(self, webhooks))]
    pub async fn delete_webhooks(&self, webhooks: &[Webhook]) -> TwitterResult<()> {
        for webhook in webhooks {
            let path = format!(
                "/account_activity/all/{}/webhooks/{}.json",
                self.config.environment, webhook.id
            );
            let response = self.signed_request(Method::DELETE, &path, &[]).await?;
            let status = response.status();
            if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
                info!(webhook_id = %webhook.id, "deleted webhook");
            } else if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(rate_limited(&response));
            } else {
                return Err(TwitterError::Api {
                    status: status.as_u16(),
                    message: format!("could not delete webhook {}", webhook.id),
                });
            }
        }
        Ok(())
    }

    /// Register `url` as the environment's webhook.
    ///
    /// The URL is validated locally first; registration never reaches the
    /// network with a malformed or non-https URL. Twitter issues a CRC
    /// challenge to the URL during this call, so the endpoint must already
    /// be answering challenges when registration starts.
    #[instrument(skip(self))]
    pub async fn set_webhook(&self, webhook_url: &str) -> TwitterResult<Webhook> {
        let parsed = Url::parse(webhook_url)
            .map_err(|e| TwitterError::InvalidUrl(format!("{webhook_url}: {e}")))?;
        if parsed.scheme() != "https" {
            return Err(TwitterError::InvalidUrl(format!(
                "{webhook_url}: webhook URLs must use https"
            )));
        }

        let path = format!(
            "/account_activity/all/{}/webhooks.json",
            self.config.environment
        );
        let params = [("url".to_string(), webhook_url.to_string())];
        let response = self.signed_request(Method::POST, &path, &params).await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            info!(url = webhook_url, "registered webhook");
            let body = response.bytes().await?;
            if body.is_empty() {
                return Ok(Webhook {
                    id: String::new(),
                    url: webhook_url.to_string(),
                    valid: None,
                    created_timestamp: None,
                });
            }
            Ok(serde_json::from_slice(&body)?)
        } else if status == StatusCode::BAD_REQUEST || status == StatusCode::FORBIDDEN {
            Err(TwitterError::WebhookUri {
                status: status.as_u16(),
                message: response_message(response).await,
            })
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Err(rate_limited(&response))
        } else {
            Err(TwitterError::Api {
                status: status.as_u16(),
                message: format!("could not register webhook {webhook_url}"),
            })
        }
    }

    /// Answer Twitter's CRC challenge.
    ///
    /// Pure and synchronous: Twitter expects the response within seconds, so
    /// nothing here may block or touch the network.
    #[must_use]
    pub fn validate_webhook(&self, crc_token: &str) -> CrcResponse {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.config.credentials.consumer_secret.as_bytes())
                .expect("HMAC can take key of any size");
        mac.update(crc_token.as_bytes());
        let digest = BASE64.encode(mac.finalize().into_bytes());

        CrcResponse {
            response_token: format!("sha256={digest}"),
        }
    }

    /// Fetch and delete every webhook for the environment.
    ///
    /// Twitter allows one webhook per environment, so registration always
    /// starts from a clean slate. An environment with no webhooks is already
    /// clean, making this safe to repeat.
    pub async fn remove_webhooks(&mut self) -> TwitterResult<()> {
        let webhooks = self.get_webhooks().await?;
        self.delete_webhooks(&webhooks).await
    }

    /// Confirm the credential bundle and return the authenticated profile.
    #[instrument(skip(self))]
    pub async fn verify_credentials(&self) -> TwitterResult<UserProfile> {
        let response = self
            .signed_request(Method::GET, "/account/verify_credentials.json", &[])
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(response.json().await?)
        } else {
            Err(TwitterError::UserSubscription {
                status: status.as_u16(),
                message: response_message(response).await,
            })
        }
    }

    /// Cached subscription quota, fetched on first use.
    ///
    /// `subscribe`/`unsubscribe` adjust the cache optimistically, so it can
    /// drift from server truth when subscriptions are mutated through
    /// another app instance; call [`Self::refresh_subscription_count`] to
    /// resync.
    pub async fn subscription_count(&mut self) -> TwitterResult<SubscriptionCount> {
        if let Some(count) = &self.subscriptions {
            return Ok(count.clone());
        }
        self.refresh_subscription_count().await
    }

    /// Re-fetch the authoritative quota from Twitter, replacing the cache.
    pub async fn refresh_subscription_count(&mut self) -> TwitterResult<SubscriptionCount> {
        let bearer = self.bearer_token().await?;
        let url = format!("{}/account_activity/all/count.json", self.config.rest_base());

        let response = self.http.get(&url).bearer_auth(&bearer).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&response));
        }
        if !status.is_success() {
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: "could not fetch subscription counts".into(),
            });
        }

        let count: SubscriptionCount = response.json().await?;
        self.subscriptions = Some(count.clone());
        Ok(count)
    }

    /// Subscribe the authenticated user to the environment's events.
    ///
    /// Credentials are verified first, then the quota is checked against the
    /// cached count: when every provisioned slot is in use the call fails
    /// without touching the subscription endpoint.
    #[instrument(skip(self))]
    pub async fn subscribe(&mut self) -> TwitterResult<()> {
        let profile = self.verify_credentials().await?;

        let count = self.subscription_count().await?;
        if count.subscriptions_count == count.provisioned_count {
            return Err(TwitterError::TooManySubscriptions {
                provisioned: count.provisioned_count,
            });
        }

        let path = format!(
            "/account_activity/all/{}/subscriptions.json",
            self.config.environment
        );
        let response = self.signed_request(Method::POST, &path, &[]).await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            if let Some(count) = &mut self.subscriptions {
                count.subscriptions_count += 1;
            }
            info!(user_id = %profile.id_str, "subscribed user to account activity");
            Ok(())
        } else {
            Err(TwitterError::UserSubscription {
                status: status.as_u16(),
                message: response_message(response).await,
            })
        }
    }

    /// Remove a user's subscription by id, using app-only auth.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&mut self, user_id: &str) -> TwitterResult<()> {
        let bearer = self.bearer_token().await?;
        let url = format!(
            "{}/account_activity/all/{}/subscriptions/{}.json",
            self.config.rest_base(),
            self.config.environment,
            user_id
        );

        let response = self.http.delete(&url).bearer_auth(&bearer).send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            if let Some(count) = &mut self.subscriptions {
                count.subscriptions_count = count.subscriptions_count.saturating_sub(1);
            }
            info!(user_id, "unsubscribed user");
            Ok(())
        } else {
            Err(TwitterError::UserSubscription {
                status: status.as_u16(),
                message: response_message(response).await,
            })
        }
    }

    /// Issue one OAuth 1.0a signed request with `params` as the query
    /// string. Lifecycle endpoints carry no bodies.
    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
    ) -> TwitterResult<Response> {
        let url = format!("{}{}", self.config.rest_base(), path);
        let auth = self
            .signer
            .authorization_header(method.as_str(), &url, params)?;

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", auth);
        if !params.is_empty() {
            request = request.query(params);
        }
        Ok(request.send().await?)
    }
}

impl std::fmt::Debug for WebhookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookManager")
            .field("environment", &self.config.environment)
            .field("bearer_cached", &self.bearer.is_some())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

/// Build a `RateLimited` error, carrying the window-reset hint when Twitter
/// sent one.
fn rate_limited(response: &Response) -> TwitterError {
    let reset = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    TwitterError::RateLimited { reset }
}

/// Pull Twitter's reported message out of an error response body.
async fn response_message(response: Response) -> String {
    match response.json::<Value>().await {
        Ok(body) => error_message(&body)
            .unwrap_or_else(|| "Twitter did not include an error message".into()),
        Err(_) => "Twitter did not include an error message".into(),
    }
}
