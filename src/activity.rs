//! Normalized activity model shared with the host framework.
//!
//! Activities are constructed fresh per inbound event and live only for the
//! duration of one turn-processing call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which Twitter surface an activity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelId {
    /// Public tweet mentions
    #[serde(rename = "twitter-mention")]
    TwitterMention,

    /// Direct messages
    #[serde(rename = "twitter-dm")]
    TwitterDm,
}

/// Framework-level activity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    /// A user- or bot-authored message
    Message,

    /// A typing indicator
    Typing,

    /// A read receipt, surfaced as a reaction
    MessageReaction,
}

/// A user or bot account on the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    /// Twitter account id
    pub id: String,

    /// Handle or display name, when known
    #[serde(default)]
    pub name: String,
}

/// The conversation an activity belongs to. On Twitter this is keyed by the
/// counterparty's account id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

/// Framework-normalized representation of one Twitter event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Which surface the activity travels on
    pub channel_id: ChannelId,

    /// What kind of activity this is
    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    /// Conversation key
    pub conversation: ConversationAccount,

    /// Who produced the activity
    pub from: ChannelAccount,

    /// Who it is addressed to
    pub recipient: ChannelAccount,

    /// Message text, when the activity carries any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Raw event fields for downstream inspection; tweet and DM entities are
    /// merged in flat
    #[serde(default)]
    pub channel_data: Map<String, Value>,

    /// Event time, when the payload carried a parsable one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Activity {
    /// Outbound message skeleton addressed to `recipient_id`.
    ///
    /// The conversation is keyed by the recipient, matching how inbound
    /// activities key it by the sender.
    #[must_use]
    pub fn message(
        channel_id: ChannelId,
        recipient_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let recipient_id = recipient_id.into();
        Self {
            channel_id,
            activity_type: ActivityType::Message,
            conversation: ConversationAccount {
                id: recipient_id.clone(),
            },
            from: ChannelAccount::default(),
            recipient: ChannelAccount {
                id: recipient_id,
                name: String::new(),
            },
            text: Some(text.into()),
            channel_data: Map::new(),
            timestamp: None,
        }
    }

    /// Outbound typing indicator for a DM conversation.
    #[must_use]
    pub fn typing(recipient_id: impl Into<String>) -> Self {
        let recipient_id = recipient_id.into();
        Self {
            channel_id: ChannelId::TwitterDm,
            activity_type: ActivityType::Typing,
            conversation: ConversationAccount {
                id: recipient_id.clone(),
            },
            from: ChannelAccount::default(),
            recipient: ChannelAccount {
                id: recipient_id,
                name: String::new(),
            },
            text: None,
            channel_data: Map::new(),
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_and_type_serialize_as_wire_names() {
        let activity = Activity::message(ChannelId::TwitterDm, "42", "hi");
        let value = serde_json::to_value(&activity).unwrap();

        assert_eq!(value["channel_id"], "twitter-dm");
        assert_eq!(value["type"], "message");
        assert_eq!(value["recipient"]["id"], "42");
        assert_eq!(value["conversation"]["id"], "42");
    }

    #[test]
    fn typing_skeleton_has_no_text() {
        let activity = Activity::typing("42");
        assert_eq!(activity.activity_type, ActivityType::Typing);
        assert!(activity.text.is_none());
    }
}
