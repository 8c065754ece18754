//! OAuth 1.0a request signing.
//!
//! Twitter's v1.1 endpoints require user-context OAuth 1.0a signatures on
//! every request. Signatures cover query and form parameters; JSON bodies
//! are excluded per the OAuth 1.0a spec.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;

use crate::config::Credentials;
use crate::error::{TwitterError, TwitterResult};

/// RFC 3986 encoding: everything outside ALPHA / DIGIT / "-" / "." / "_" /
/// "~" is percent-encoded.
const RFC3986_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Signs requests with the adapter's credential bundle.
#[derive(Clone)]
pub(crate) struct OauthSigner {
    credentials: Credentials,
}

impl OauthSigner {
    pub(crate) const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Build the `Authorization` header value for one request.
    ///
    /// `params` must contain every query and form pair the request will
    /// carry, unencoded; the base string is assembled from `base_url`
    /// without its query component.
    pub(crate) fn authorization_header(
        &self,
        method: &str,
        base_url: &str,
        params: &[(String, String)],
    ) -> TwitterResult<String> {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| TwitterError::OAuth(format!("system clock before epoch: {e}")))?
            .as_secs()
            .to_string();

        let mut oauth_params = vec![
            ("oauth_consumer_key", self.credentials.consumer_key.clone()),
            ("oauth_nonce", nonce()),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.credentials.access_token.clone()),
            ("oauth_version", "1.0".to_string()),
        ];

        // Signature base: OAuth params plus request params, sorted after
        // encoding-relevant normalization (key, then value).
        let mut signable: Vec<(String, String)> = oauth_params
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .chain(params.iter().cloned())
            .collect();
        signable.sort();

        let param_string = signable
            .iter()
            .map(|(k, v)| format!("{}={}", rfc3986(k), rfc3986(v)))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            rfc3986(base_url),
            rfc3986(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            rfc3986(&self.credentials.consumer_secret),
            rfc3986(&self.credentials.access_token_secret)
        );

        oauth_params.push(("oauth_signature", hmac_sha1(&signing_key, &base_string)?));

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"", rfc3986(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {header}"))
    }
}

impl std::fmt::Debug for OauthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OauthSigner")
            .field("consumer_key", &self.credentials.consumer_key)
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

/// Percent-encode per RFC 3986.
fn rfc3986(s: &str) -> String {
    utf8_percent_encode(s, RFC3986_SET).to_string()
}

/// Random per-request nonce, 32 hex characters.
fn nonce() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// HMAC-SHA1, base64-encoded.
fn hmac_sha1(key: &str, data: &str) -> TwitterResult<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| TwitterError::OAuth(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
