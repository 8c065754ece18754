//! Twitter Account Activity adapter for conversational bots.
//!
//! Bridges a bot framework's normalized activities and Twitter's Account
//! Activity webhooks plus the v1.1 REST API:
//!
//! - [`TwitterApiClient`] issues OAuth 1.0a signed REST calls and posts
//!   threaded tweet replies.
//! - [`WebhookManager`] drives webhook registration for an Account Activity
//!   environment: enumeration, replacement, the CRC challenge handshake, and
//!   user subscription accounting.
//! - [`TwitterAdapter`] translates inbound webhook deliveries (mentions, DMs,
//!   typing, read receipts) into activities for a bot's turn logic, and
//!   outbound activities into DM, typing-indicator, and threaded-reply calls.
//!
//! The adapter is transport-agnostic on the inbound side: the host's web
//! server hands over a [`WebhookRequest`] and writes back the returned
//! [`WebhookResponse`].

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod activity;
mod adapter;
mod client;
mod config;
mod error;
mod oauth;
mod translate;
mod types;
mod webhook;

pub use activity::{Activity, ActivityType, ChannelAccount, ChannelId, ConversationAccount};
pub use adapter::{TwitterAdapter, WebhookRequest, WebhookResponse};
pub use client::TwitterApiClient;
pub use config::{Credentials, TwitterConfig};
pub use error::{TwitterError, TwitterResult};
pub use translate::{events_to_activities, plan_outbound, OutboundPlan};
pub use types::{
    CrcResponse, DirectMessageEvent, DirectMessageRequest, EventTarget, EventUser, MarkReadEvent,
    MessageCreate, MessageData, StatusUpdate, SubscriptionCount, TweetCreateEvent, TweetUser,
    TypingEvent, UserProfile, Webhook, WebhookPayload,
};
pub use webhook::WebhookManager;
