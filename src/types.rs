//! Twitter wire types.
//!
//! Webhook management records, Account Activity event payloads, and the
//! outbound request shapes the adapter produces. Inbound structs keep
//! unmodeled fields in a flattened `extra` map so nothing Twitter sends is
//! lost on the way into an activity's channel data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Webhook and subscription management
// ─────────────────────────────────────────────────────────────────────────────

/// A webhook registration as Twitter reports it.
///
/// Never persisted locally; the environment's registration list is always
/// re-fetched from Twitter as the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    /// Webhook id assigned by Twitter
    #[serde(default)]
    pub id: String,

    /// The registered URL
    #[serde(default)]
    pub url: String,

    /// Whether Twitter currently considers the webhook valid
    #[serde(default)]
    pub valid: Option<bool>,

    /// Registration time, epoch milliseconds as a string
    #[serde(default)]
    pub created_timestamp: Option<String>,
}

/// Environment subscription quota from `account_activity/all/count.json`.
///
/// Twitter encodes both counts as JSON strings; they are normalized to
/// integers here. The adapter caches one of these and adjusts it
/// optimistically, so treat a cached value as advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCount {
    /// Subscriptions currently in use
    #[serde(deserialize_with = "lenient::u64")]
    pub subscriptions_count: u64,

    /// Subscription slots provisioned for the app
    #[serde(deserialize_with = "lenient::u64")]
    pub provisioned_count: u64,
}

/// Answer to Twitter's CRC challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrcResponse {
    /// `sha256=<base64 HMAC digest>`
    pub response_token: String,
}

/// Bearer grant response from `oauth2/token`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BearerGrant {
    pub access_token: String,
}

/// Authenticated account profile from `account/verify_credentials.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Numeric account id, string-encoded
    pub id_str: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Handle, without the leading `@`
    #[serde(default)]
    pub screen_name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound webhook payloads
// ─────────────────────────────────────────────────────────────────────────────

/// One Account Activity webhook delivery.
///
/// A single delivery may carry zero or more events per family; each family's
/// events are processed independently and in array order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    /// Id of the subscribed user the delivery is for
    #[serde(default)]
    pub for_user_id: Option<String>,

    /// Tweet mentions of the subscribed user
    #[serde(default)]
    pub tweet_create_events: Vec<TweetCreateEvent>,

    /// Direct messages sent to or by the subscribed user
    #[serde(default)]
    pub direct_message_events: Vec<DirectMessageEvent>,

    /// DM typing indicators. The alias tolerates the misspelled key found in
    /// some historical payload dumps.
    #[serde(default, alias = "direct_messsage_indicate_typing_events")]
    pub direct_message_indicate_typing_events: Vec<TypingEvent>,

    /// DM read receipts
    #[serde(default)]
    pub direct_message_mark_read_events: Vec<MarkReadEvent>,

    /// User objects referenced by DM events, keyed by user id
    #[serde(default)]
    pub users: HashMap<String, EventUser>,
}

/// A tweet that mentioned the subscribed user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetCreateEvent {
    /// Tweet id; some payloads carry it as a number
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,

    /// Tweet id, string-encoded
    #[serde(default)]
    pub id_str: Option<String>,

    /// Tweet text
    #[serde(default)]
    pub text: String,

    /// Author of the tweet
    pub user: TweetUser,

    /// Creation time, e.g. `Wed Oct 10 20:19:24 +0000 2018`
    #[serde(default)]
    pub created_at: Option<String>,

    /// Hashtags, urls, mentions, media
    #[serde(default)]
    pub entities: Option<Value>,

    /// Everything else Twitter sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TweetCreateEvent {
    /// Best-available string id for the tweet.
    #[must_use]
    pub fn tweet_id(&self) -> Option<&str> {
        self.id_str.as_deref().or(self.id.as_deref())
    }
}

/// Author block inside a tweet event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetUser {
    /// Account id; some payloads carry it as a number
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,

    /// Account id, string-encoded
    #[serde(default)]
    pub id_str: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Handle
    #[serde(default)]
    pub screen_name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TweetUser {
    /// Best-available string id for the account.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.id_str.as_deref().or(self.id.as_deref())
    }
}

/// One direct-message event (`message_create`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessageEvent {
    /// Event kind; `message_create` for messages
    #[serde(default, rename = "type")]
    pub event_type: String,

    /// Event id
    #[serde(default)]
    pub id: Option<String>,

    /// Creation time, epoch milliseconds as a string
    #[serde(default)]
    pub created_timestamp: Option<String>,

    /// The message body and addressing
    #[serde(default)]
    pub message_create: Option<MessageCreate>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Addressing and content of a DM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreate {
    /// Sender account id
    #[serde(default)]
    pub sender_id: Option<String>,

    /// Recipient addressing
    #[serde(default)]
    pub target: Option<EventTarget>,

    /// Text and entities
    #[serde(default)]
    pub message_data: Option<MessageData>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Recipient reference shared by DM, typing, and read-receipt events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTarget {
    /// Recipient account id
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Content of a DM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageData {
    /// Message text
    #[serde(default)]
    pub text: String,

    /// Hashtags, urls, mentions
    #[serde(default)]
    pub entities: Option<Value>,

    /// Attached media
    #[serde(default)]
    pub attachment: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A DM typing indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingEvent {
    /// Event time, epoch milliseconds as a string
    #[serde(default)]
    pub created_timestamp: Option<String>,

    /// Who is typing
    #[serde(default)]
    pub sender_id: Option<String>,

    /// Whose conversation they are typing into
    #[serde(default)]
    pub target: Option<EventTarget>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A DM read receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadEvent {
    /// Event time, epoch milliseconds as a string
    #[serde(default)]
    pub created_timestamp: Option<String>,

    /// Who read the conversation
    #[serde(default)]
    pub sender_id: Option<String>,

    /// Whose messages were read
    #[serde(default)]
    pub target: Option<EventTarget>,

    /// Id of the newest event covered by the receipt
    #[serde(default)]
    pub last_read_event_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user object from a delivery's `users` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventUser {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub screen_name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound request shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Form payload for one `statuses/update.json` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Tweet text, at most 280 characters
    pub status: String,

    /// Tweet to reply to; inside a thread chain only the first payload's
    /// value is honored, later ones are overridden by the chain
    pub in_reply_to_status_id: Option<String>,

    /// Ask Twitter to prepend the @mentions of the parent tweet
    pub auto_populate_reply_metadata: bool,
}

/// JSON body for `direct_messages/events/new.json`.
#[derive(Debug, Clone, Serialize)]
pub struct DirectMessageRequest {
    event: DmEvent,
}

#[derive(Debug, Clone, Serialize)]
struct DmEvent {
    #[serde(rename = "type")]
    event_type: &'static str,
    message_create: DmMessageCreate,
}

#[derive(Debug, Clone, Serialize)]
struct DmMessageCreate {
    target: DmTarget,
    message_data: DmMessageData,
}

#[derive(Debug, Clone, Serialize)]
struct DmTarget {
    recipient_id: String,
}

#[derive(Debug, Clone, Serialize)]
struct DmMessageData {
    text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    quick_reply: Option<QuickReply>,

    #[serde(skip_serializing_if = "Option::is_none")]
    ctas: Option<Value>,
}

/// Quick-reply option set attached to an outbound DM.
#[derive(Debug, Clone, Serialize)]
struct QuickReply {
    #[serde(rename = "type")]
    kind: &'static str,
    options: Value,
}

impl DirectMessageRequest {
    /// A plain-text DM addressed to `recipient_id`.
    #[must_use]
    pub fn new(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            event: DmEvent {
                event_type: "message_create",
                message_create: DmMessageCreate {
                    target: DmTarget {
                        recipient_id: recipient_id.into(),
                    },
                    message_data: DmMessageData {
                        text: text.into(),
                        quick_reply: None,
                        ctas: None,
                    },
                },
            },
        }
    }

    /// Attach quick-reply options (the raw `options` array).
    pub fn set_quick_replies(&mut self, options: Value) {
        self.event.message_create.message_data.quick_reply = Some(QuickReply {
            kind: "options",
            options,
        });
    }

    /// Attach call-to-action buttons (the raw `ctas` array).
    pub fn set_ctas(&mut self, ctas: Value) {
        self.event.message_create.message_data.ctas = Some(ctas);
    }
}

/// Deserializers tolerant of Twitter's string-or-number encodings.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept a JSON number or a numeric string.
    pub fn u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| serde::de::Error::custom("expected an unsigned integer")),
            Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            _ => Err(serde::de::Error::custom(
                "expected a number or numeric string",
            )),
        }
    }

    /// Accept an optional id encoded as a string or a number.
    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscription_count_accepts_string_numbers() {
        let count: SubscriptionCount = serde_json::from_value(json!({
            "account_name": "my-app",
            "subscriptions_count": "2",
            "provisioned_count": 15
        }))
        .unwrap();

        assert_eq!(count.subscriptions_count, 2);
        assert_eq!(count.provisioned_count, 15);
    }

    #[test]
    fn tweet_event_keeps_unmodeled_fields() {
        let event: TweetCreateEvent = serde_json::from_value(json!({
            "id_str": "100",
            "text": "hi",
            "user": {"id": 9, "screen_name": "someone"},
            "favorite_count": 3
        }))
        .unwrap();

        assert_eq!(event.tweet_id(), Some("100"));
        assert_eq!(event.user.user_id(), Some("9"));
        assert_eq!(event.extra.get("favorite_count"), Some(&json!(3)));
    }

    #[test]
    fn payload_accepts_misspelled_typing_key() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "direct_messsage_indicate_typing_events": [
                {"sender_id": "5", "target": {"recipient_id": "1"}}
            ]
        }))
        .unwrap();

        assert_eq!(payload.direct_message_indicate_typing_events.len(), 1);
        assert_eq!(
            payload.direct_message_indicate_typing_events[0]
                .sender_id
                .as_deref(),
            Some("5")
        );
    }

    #[test]
    fn dm_request_serializes_with_optional_blocks() {
        let mut message = DirectMessageRequest::new("42", "hello");
        message.set_quick_replies(json!([{"label": "Yes"}, {"label": "No"}]));

        let body = serde_json::to_value(&message).unwrap();
        assert_eq!(body["event"]["type"], "message_create");
        assert_eq!(
            body["event"]["message_create"]["target"]["recipient_id"],
            "42"
        );
        assert_eq!(
            body["event"]["message_create"]["message_data"]["quick_reply"]["type"],
            "options"
        );
        assert!(body["event"]["message_create"]["message_data"]
            .get("ctas")
            .is_none());
    }
}
