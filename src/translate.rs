//! Bidirectional translation between activities and Twitter payloads.
//!
//! Inbound: one webhook delivery fans out into zero or more activities, one
//! per event, in array order. Outbound: one activity maps onto at most one
//! Twitter call (a DM, a typing indicator, or a chunked reply thread).

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::activity::{Activity, ActivityType, ChannelAccount, ChannelId, ConversationAccount};
use crate::types::{
    DirectMessageEvent, DirectMessageRequest, MarkReadEvent, StatusUpdate, TweetCreateEvent,
    TypingEvent, WebhookPayload,
};

/// Maximum characters per tweet; longer text becomes a thread.
pub(crate) const MAX_TWEET_CHARS: usize = 280;

/// What one outbound activity becomes on the wire.
#[derive(Debug, Clone)]
pub enum OutboundPlan {
    /// POST `direct_messages/events/new.json`
    DirectMessage(DirectMessageRequest),

    /// POST `direct_messages/indicate_typing.json`
    Typing { recipient_id: String },

    /// Chunked `statuses/update.json` thread replies
    ThreadReplies(Vec<StatusUpdate>),

    /// Unsupported channel/type pair; logged, no API call
    Skip,
}

/// Map one outbound activity onto the Twitter call it requires.
///
/// DM messages pick up `quick_replies` and `ctas` arrays from the activity's
/// channel data. Mention replies are split into 280-character chunks; the
/// thread's parent tweet is taken from `channel_data.in_reply_to_status_id`,
/// falling back to `channel_data.id_str` so an activity echoed back from an
/// inbound mention threads under that mention.
#[must_use]
pub fn plan_outbound(activity: &Activity) -> OutboundPlan {
    match (activity.channel_id, activity.activity_type) {
        (ChannelId::TwitterDm, ActivityType::Message) => {
            let mut message = DirectMessageRequest::new(
                outbound_recipient(activity),
                activity.text.clone().unwrap_or_default(),
            );
            if let Some(options) = activity.channel_data.get("quick_replies") {
                message.set_quick_replies(options.clone());
            }
            if let Some(ctas) = activity.channel_data.get("ctas") {
                message.set_ctas(ctas.clone());
            }
            OutboundPlan::DirectMessage(message)
        }
        (ChannelId::TwitterDm, ActivityType::Typing) => OutboundPlan::Typing {
            recipient_id: outbound_recipient(activity).to_string(),
        },
        (ChannelId::TwitterMention, ActivityType::Message) => {
            let text = activity.text.as_deref().unwrap_or_default();
            let parent = activity
                .channel_data
                .get("in_reply_to_status_id")
                .or_else(|| activity.channel_data.get("id_str"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut replies: Vec<StatusUpdate> = chunk_text(text, MAX_TWEET_CHARS)
                .into_iter()
                .map(|status| StatusUpdate {
                    status,
                    in_reply_to_status_id: None,
                    auto_populate_reply_metadata: true,
                })
                .collect();
            if let Some(first) = replies.first_mut() {
                first.in_reply_to_status_id = parent;
            }
            OutboundPlan::ThreadReplies(replies)
        }
        (channel, kind) => {
            debug!(?channel, ?kind, "no Twitter mapping for activity");
            OutboundPlan::Skip
        }
    }
}

/// Translate one webhook delivery into activities, preserving array order.
///
/// `self_id` is the adapter's own account id; self-authored tweets and DMs
/// are dropped so the bot never reacts to its own output. Typing and
/// read-receipt events carry no self filter.
#[must_use]
pub fn events_to_activities(payload: &WebhookPayload, self_id: &str) -> Vec<Activity> {
    let mut activities = Vec::new();

    for tweet in &payload.tweet_create_events {
        if tweet.user.user_id() == Some(self_id) {
            debug!(tweet_id = ?tweet.tweet_id(), "skipping self-authored tweet");
            continue;
        }
        activities.push(tweet_to_activity(tweet, self_id));
    }

    for event in &payload.direct_message_events {
        let Some(create) = &event.message_create else {
            debug!(event_id = ?event.id, "direct message event without message_create");
            continue;
        };
        if create.sender_id.as_deref() == Some(self_id) {
            debug!(event_id = ?event.id, "skipping self-sent direct message");
            continue;
        }
        activities.push(dm_to_activity(event, payload));
    }

    for event in &payload.direct_message_indicate_typing_events {
        activities.push(typing_to_activity(event));
    }

    for event in &payload.direct_message_mark_read_events {
        activities.push(mark_read_to_activity(event));
    }

    activities
}

fn tweet_to_activity(tweet: &TweetCreateEvent, self_id: &str) -> Activity {
    let sender = tweet.user.user_id().unwrap_or_default().to_string();
    let mut channel_data = to_object(serde_json::to_value(tweet).unwrap_or_default());
    merge_entities(&mut channel_data, tweet.entities.as_ref());

    Activity {
        channel_id: ChannelId::TwitterMention,
        activity_type: ActivityType::Message,
        conversation: ConversationAccount { id: sender.clone() },
        from: ChannelAccount {
            id: sender,
            name: tweet.user.screen_name.clone().unwrap_or_default(),
        },
        recipient: ChannelAccount {
            id: self_id.to_string(),
            name: String::new(),
        },
        text: Some(tweet.text.clone()),
        channel_data,
        timestamp: tweet.created_at.as_deref().and_then(parse_created_at),
    }
}

fn dm_to_activity(event: &DirectMessageEvent, payload: &WebhookPayload) -> Activity {
    let create = event.message_create.as_ref();
    let sender = create
        .and_then(|c| c.sender_id.clone())
        .unwrap_or_default();
    let recipient = create
        .and_then(|c| c.target.as_ref())
        .and_then(|t| t.recipient_id.clone())
        .unwrap_or_default();
    let text = create
        .and_then(|c| c.message_data.as_ref())
        .map(|d| d.text.clone())
        .unwrap_or_default();

    let mut channel_data = to_object(serde_json::to_value(event).unwrap_or_default());
    let entities = create
        .and_then(|c| c.message_data.as_ref())
        .and_then(|d| d.entities.as_ref());
    merge_entities(&mut channel_data, entities);

    Activity {
        channel_id: ChannelId::TwitterDm,
        activity_type: ActivityType::Message,
        conversation: ConversationAccount { id: sender.clone() },
        from: ChannelAccount {
            name: account_name(payload, &sender),
            id: sender,
        },
        recipient: ChannelAccount {
            name: account_name(payload, &recipient),
            id: recipient,
        },
        text: Some(text),
        channel_data,
        timestamp: event.created_timestamp.as_deref().and_then(parse_millis),
    }
}

fn typing_to_activity(event: &TypingEvent) -> Activity {
    let sender = event.sender_id.clone().unwrap_or_default();
    Activity {
        channel_id: ChannelId::TwitterDm,
        activity_type: ActivityType::Typing,
        conversation: ConversationAccount { id: sender.clone() },
        from: ChannelAccount {
            id: sender,
            name: String::new(),
        },
        recipient: ChannelAccount {
            id: target_id(event.target.as_ref()),
            name: String::new(),
        },
        text: None,
        channel_data: to_object(serde_json::to_value(event).unwrap_or_default()),
        timestamp: event.created_timestamp.as_deref().and_then(parse_millis),
    }
}

fn mark_read_to_activity(event: &MarkReadEvent) -> Activity {
    let sender = event.sender_id.clone().unwrap_or_default();
    Activity {
        channel_id: ChannelId::TwitterDm,
        activity_type: ActivityType::MessageReaction,
        conversation: ConversationAccount { id: sender.clone() },
        from: ChannelAccount {
            id: sender,
            name: String::new(),
        },
        recipient: ChannelAccount {
            id: target_id(event.target.as_ref()),
            name: String::new(),
        },
        text: None,
        channel_data: to_object(serde_json::to_value(event).unwrap_or_default()),
        timestamp: event.created_timestamp.as_deref().and_then(parse_millis),
    }
}

/// Split text into fixed-width chunks of at most `width` characters.
///
/// Splits on character boundaries, not words; concatenating the chunks
/// reproduces the input exactly. Empty text yields no chunks.
pub(crate) fn chunk_text(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

/// Recipient id for an outbound activity, falling back to the conversation
/// key when the host filled in only that.
fn outbound_recipient(activity: &Activity) -> &str {
    if activity.recipient.id.is_empty() {
        &activity.conversation.id
    } else {
        &activity.recipient.id
    }
}

fn account_name(payload: &WebhookPayload, user_id: &str) -> String {
    payload
        .users
        .get(user_id)
        .and_then(|u| u.screen_name.clone().or_else(|| u.name.clone()))
        .unwrap_or_default()
}

fn target_id(target: Option<&crate::types::EventTarget>) -> String {
    target
        .and_then(|t| t.recipient_id.clone())
        .unwrap_or_default()
}

fn to_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Hoist entity fields (hashtags, urls, mentions, media) to the top level of
/// the channel data without clobbering event fields of the same name.
fn merge_entities(data: &mut Map<String, Value>, entities: Option<&Value>) {
    if let Some(Value::Object(entities)) = entities {
        for (key, value) in entities {
            data.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// `Wed Oct 10 20:19:24 +0000 2018`
fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Epoch milliseconds as a string.
fn parse_millis(s: &str) -> Option<DateTime<Utc>> {
    s.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}
