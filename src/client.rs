//! OAuth 1.0a signed REST client.

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::TwitterConfig;
use crate::error::{TwitterError, TwitterResult};
use crate::oauth::OauthSigner;
use crate::types::StatusUpdate;

/// Signed client for Twitter's versioned REST endpoints.
///
/// One HTTP attempt per call: no retry, no backoff, and no client-side
/// timeout. A caller that needs a deadline must impose its own.
#[derive(Debug, Clone)]
pub struct TwitterApiClient {
    http: Client,
    base_url: String,
    signer: OauthSigner,
}

impl TwitterApiClient {
    /// Create a client from the adapter configuration.
    pub fn new(config: &TwitterConfig) -> TwitterResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("twitter-adapter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.rest_base(),
            signer: OauthSigner::new(config.credentials.clone()),
        })
    }

    /// Issue one signed request against `{base_url}{path}`.
    ///
    /// On GET, `payload` entries become the percent-encoded query string.
    /// On other methods `payload` is the JSON body, except when `form` is
    /// given: then `form` becomes the form-encoded body and `payload`
    /// entries move to the query string instead, since some endpoints (DM
    /// typing) require both encodings on one request.
    ///
    /// Resolves with the parsed response body. Fails on a transport error or
    /// when the body carries a Twitter error object; the HTTP status is not
    /// otherwise consulted here.
    #[instrument(skip(self, payload, form))]
    pub async fn call_api(
        &self,
        path: &str,
        method: Method,
        payload: Option<&Value>,
        form: Option<&[(String, String)]>,
    ) -> TwitterResult<Value> {
        let url = format!("{}{}", self.base_url, path);

        let query: Vec<(String, String)> = if method == Method::GET || form.is_some() {
            payload.map(object_to_pairs).unwrap_or_default()
        } else {
            Vec::new()
        };

        // OAuth 1.0a signs query and form parameters; JSON bodies are not
        // part of the signature base.
        let mut signed: Vec<(String, String)> = query.clone();
        if let Some(form) = form {
            signed.extend(form.iter().cloned());
        }
        let auth = self
            .signer
            .authorization_header(method.as_str(), &url, &signed)?;

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", auth);
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(form) = form {
            request = request.form(form);
        } else if method != Method::GET {
            if let Some(body) = payload {
                request = request.json(body);
            }
        }

        debug!(%url, method = %method, "calling Twitter API");
        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        if let Some(message) = error_message(&body) {
            return Err(TwitterError::Api { status, message });
        }
        Ok(body)
    }

    /// Post an ordered chain of reply tweets and return their ids.
    ///
    /// Each tweet replies to the one the previous call created; the first
    /// payload's own `in_reply_to_status_id` seeds the chain. Posting is
    /// strictly sequential, and a failure aborts the rest of the chain
    /// without rolling back tweets already posted.
    #[instrument(skip(self, payloads))]
    pub async fn post_thread_reply(&self, payloads: &[StatusUpdate]) -> TwitterResult<Vec<String>> {
        let mut parent = payloads
            .first()
            .and_then(|p| p.in_reply_to_status_id.clone());
        let mut posted = Vec::with_capacity(payloads.len());

        for payload in payloads {
            let mut form = vec![("status".to_string(), payload.status.clone())];
            if payload.auto_populate_reply_metadata {
                form.push(("auto_populate_reply_metadata".into(), "true".into()));
            }
            if let Some(id) = parent.take() {
                form.push(("in_reply_to_status_id".into(), id));
            }

            let response = self
                .call_api("/statuses/update.json", Method::POST, None, Some(&form))
                .await?;

            parent = response
                .get("id_str")
                .and_then(Value::as_str)
                .map(str::to_string);
            posted.push(parent.clone().unwrap_or_default());
        }

        Ok(posted)
    }
}

/// Pull Twitter's reported message out of a response body, if the body is an
/// error shape. Covers both the `errors` array and bare `error` forms.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    if let Some(message) = body
        .pointer("/errors/0/message")
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }
    match body.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        None => None,
    }
}

/// Flatten a JSON object into query pairs, stringifying scalar values.
fn object_to_pairs(value: &Value) -> Vec<(String, String)> {
    let Some(map) = value.as_object() else {
        tracing::warn!("non-object payload ignored for query encoding");
        return Vec::new();
    };
    map.iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k.clone(), s.clone())),
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}
