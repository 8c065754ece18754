//! Bot-framework-facing adapter surface.

use std::future::Future;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::activity::Activity;
use crate::client::TwitterApiClient;
use crate::config::TwitterConfig;
use crate::error::{TwitterError, TwitterResult};
use crate::translate::{events_to_activities, plan_outbound, OutboundPlan};
use crate::types::WebhookPayload;
use crate::webhook::WebhookManager;

/// Inbound HTTP request as handed over by the host's web server.
///
/// The adapter never runs a server of its own; whatever framework the host
/// uses, it forwards the method, query pairs, and raw body here.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: String,
    pub query: Vec<(String, String)>,
    pub body: String,
}

impl WebhookRequest {
    fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Response the host's web server should write back to Twitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    fn json<T: Serialize>(body: &T) -> TwitterResult<Self> {
        Ok(Self {
            status: 200,
            body: serde_json::to_string(body)?,
        })
    }

    const fn empty_ok() -> Self {
        Self {
            status: 200,
            body: String::new(),
        }
    }

    const fn bad_request() -> Self {
        Self {
            status: 400,
            body: String::new(),
        }
    }
}

/// Twitter Account Activity adapter.
///
/// Owns the signed REST client and the webhook lifecycle manager, translates
/// between activities and Twitter payloads, and hands inbound events to the
/// host's turn logic.
pub struct TwitterAdapter {
    config: TwitterConfig,
    client: TwitterApiClient,
    webhooks: WebhookManager,
    bot_user_id: Option<String>,
}

impl TwitterAdapter {
    /// Build an adapter from configuration. No network traffic happens until
    /// [`Self::init`] or the first operation.
    pub fn new(config: TwitterConfig) -> TwitterResult<Self> {
        let client = TwitterApiClient::new(&config)?;
        let webhooks = WebhookManager::new(config.clone())?;

        Ok(Self {
            config,
            client,
            webhooks,
            bot_user_id: None,
        })
    }

    /// Resolve the bot's own account id so inbound self-authored events can
    /// be filtered out.
    pub async fn init(&mut self) -> TwitterResult<()> {
        let profile = self.webhooks.verify_credentials().await?;
        info!(user_id = %profile.id_str, screen_name = %profile.screen_name, "authenticated");
        self.bot_user_id = Some(profile.id_str);
        Ok(())
    }

    /// Full first-time webhook setup for the configured environment, using
    /// the configured `webhook_url`.
    ///
    /// Twitter permits one webhook per environment and rejects subscriptions
    /// against a missing webhook, so the order is fixed: clear existing
    /// registrations, register the URL, then subscribe the user. Each step
    /// must succeed before the next starts; a failure aborts setup.
    pub async fn register_webhook(&mut self) -> TwitterResult<()> {
        let url = self.config.webhook_url.clone().ok_or_else(|| {
            TwitterError::InvalidUrl("no webhook_url configured".into())
        })?;

        self.webhooks.remove_webhooks().await?;
        self.webhooks.set_webhook(&url).await?;
        self.webhooks.subscribe().await?;
        Ok(())
    }

    /// The signed REST client, for callers needing raw API access.
    #[must_use]
    pub const fn get_api(&self) -> &TwitterApiClient {
        &self.client
    }

    /// The lifecycle manager, for callers driving registration manually.
    pub fn webhooks_mut(&mut self) -> &mut WebhookManager {
        &mut self.webhooks
    }

    /// Handle one inbound webhook HTTP request.
    ///
    /// CRC challenges (GET with a `crc_token`) are answered immediately.
    /// Event deliveries (POST) are translated and handed to `logic` one
    /// activity at a time, in payload order; the 200 response is produced
    /// only after every activity in the delivery has been processed.
    pub async fn process_payload<F, Fut>(
        &self,
        request: &WebhookRequest,
        mut logic: F,
    ) -> TwitterResult<WebhookResponse>
    where
        F: FnMut(Activity) -> Fut,
        Fut: Future<Output = ()>,
    {
        if request.method.eq_ignore_ascii_case("GET") {
            if let Some(token) = request.query_param("crc_token") {
                debug!("answering CRC challenge");
                return WebhookResponse::json(&self.webhooks.validate_webhook(token));
            }
            return Ok(WebhookResponse::bad_request());
        }

        let payload: WebhookPayload = serde_json::from_str(&request.body)?;
        let self_id = self.bot_user_id.as_deref().unwrap_or_default();

        for activity in events_to_activities(&payload, self_id) {
            logic(activity).await;
        }
        Ok(WebhookResponse::empty_ok())
    }

    /// Send a batch of outbound activities, in order.
    ///
    /// A failure sending one activity is logged and the rest of the batch
    /// still goes out; callers get `None` in that slot instead of an error.
    /// Slots also hold `None` for activities that produce no id (typing) or
    /// no call at all.
    #[instrument(skip(self, activities))]
    pub async fn send_activities(&self, activities: &[Activity]) -> Vec<Option<String>> {
        let mut responses = Vec::with_capacity(activities.len());
        for activity in activities {
            match self.send_activity(activity).await {
                Ok(id) => responses.push(id),
                Err(error) => {
                    warn!(%error, "failed to deliver activity");
                    responses.push(None);
                }
            }
        }
        responses
    }

    async fn send_activity(&self, activity: &Activity) -> TwitterResult<Option<String>> {
        match plan_outbound(activity) {
            OutboundPlan::DirectMessage(message) => {
                let body = serde_json::to_value(&message)?;
                let response = self
                    .client
                    .call_api(
                        "/direct_messages/events/new.json",
                        Method::POST,
                        Some(&body),
                        None,
                    )
                    .await?;
                Ok(response
                    .pointer("/event/id")
                    .and_then(Value::as_str)
                    .map(str::to_string))
            }
            OutboundPlan::Typing { recipient_id } => {
                let form = [("recipient_id".to_string(), recipient_id)];
                self.client
                    .call_api(
                        "/direct_messages/indicate_typing.json",
                        Method::POST,
                        None,
                        Some(&form),
                    )
                    .await?;
                Ok(None)
            }
            OutboundPlan::ThreadReplies(payloads) => {
                let ids = self.client.post_thread_reply(&payloads).await?;
                Ok(ids.into_iter().next().filter(|id| !id.is_empty()))
            }
            OutboundPlan::Skip => Ok(None),
        }
    }

    /// Twitter exposes no edit primitive for bot-authored content; always a
    /// no-op.
    pub fn update_activity(&self, activity: &Activity) {
        debug!(kind = ?activity.activity_type, "update_activity is not supported on Twitter");
    }

    /// Twitter exposes no delete-by-bot primitive here either; always a
    /// no-op.
    pub fn delete_activity(&self, activity_id: &str) {
        debug!(activity_id, "delete_activity is not supported on Twitter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::activity::{ActivityType, ChannelId};
    use crate::config::Credentials;

    fn test_config(api_url: &str) -> TwitterConfig {
        TwitterConfig {
            credentials: Credentials {
                consumer_key: "ck".into(),
                consumer_secret: "cs".into(),
                access_token: "at".into(),
                access_token_secret: "ats".into(),
            },
            environment: "dev".into(),
            webhook_url: Some("https://example.com/hook".into()),
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    async fn mount_verify_credentials(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/1.1/account/verify_credentials.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_str": "1", "screen_name": "the_bot", "name": "Bot"
            })))
            .mount(server)
            .await;
    }

    fn get_request(query: &[(&str, &str)]) -> WebhookRequest {
        WebhookRequest {
            method: "GET".into(),
            query: query
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body: String::new(),
        }
    }

    fn post_request(body: Value) -> WebhookRequest {
        WebhookRequest {
            method: "POST".into(),
            query: Vec::new(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn crc_challenges_get_an_immediate_token() {
        let adapter = TwitterAdapter::new(test_config("https://api.twitter.com")).unwrap();
        let request = get_request(&[("crc_token", "challenge-me")]);

        let response = adapter
            .process_payload(&request, |_| async {})
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert!(body["response_token"]
            .as_str()
            .unwrap()
            .starts_with("sha256="));
    }

    #[tokio::test]
    async fn get_without_a_token_is_rejected() {
        let adapter = TwitterAdapter::new(test_config("https://api.twitter.com")).unwrap();
        let response = adapter
            .process_payload(&get_request(&[]), |_| async {})
            .await
            .unwrap();
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn deliveries_run_the_turn_logic_per_event() {
        let server = MockServer::start().await;
        mount_verify_credentials(&server).await;

        let mut adapter = TwitterAdapter::new(test_config(&server.uri())).unwrap();
        adapter.init().await.unwrap();

        let request = post_request(json!({
            "for_user_id": "1",
            "tweet_create_events": [
                {"user": {"id": "1"}, "id_str": "99", "text": "self echo"},
                {"user": {"id": "9"}, "id_str": "100", "text": "hi", "entities": {}}
            ]
        }));

        let collected = Mutex::new(Vec::new());
        let response = adapter
            .process_payload(&request, |activity| {
                collected.lock().unwrap().push(activity);
                async {}
            })
            .await
            .unwrap();

        assert_eq!(response, WebhookResponse::empty_ok());
        let activities = collected.into_inner().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].channel_id, ChannelId::TwitterMention);
        assert_eq!(activities[0].activity_type, ActivityType::Message);
        assert_eq!(activities[0].conversation.id, "9");
        assert_eq!(activities[0].text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn unparsable_deliveries_raise() {
        let adapter = TwitterAdapter::new(test_config("https://api.twitter.com")).unwrap();
        let request = WebhookRequest {
            method: "POST".into(),
            query: Vec::new(),
            body: "this is not json".into(),
        };

        let err = adapter
            .process_payload(&request, |_| async {})
            .await
            .unwrap_err();
        assert!(matches!(err, TwitterError::Json(_)));
    }

    #[tokio::test]
    async fn batch_send_continues_past_a_failed_activity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/direct_messages/events/new.json"))
            .and(body_partial_json(json!({
                "event": {"message_create": {"target": {"recipient_id": "42"}}}
            })))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "errors": [{"message": "Internal error"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1.1/direct_messages/events/new.json"))
            .and(body_partial_json(json!({
                "event": {"message_create": {"target": {"recipient_id": "43"}}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "event": {"id": "dm-7", "type": "message_create"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = TwitterAdapter::new(test_config(&server.uri())).unwrap();
        let activities = vec![
            Activity::message(ChannelId::TwitterDm, "42", "first"),
            Activity::message(ChannelId::TwitterDm, "43", "second"),
        ];

        let ids = adapter.send_activities(&activities).await;
        assert_eq!(ids, vec![None, Some("dm-7".to_string())]);
    }

    #[tokio::test]
    async fn typing_activities_hit_the_indicator_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/direct_messages/indicate_typing.json"))
            .and(body_string_contains("recipient_id=42"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = TwitterAdapter::new(test_config(&server.uri())).unwrap();
        let ids = adapter.send_activities(&[Activity::typing("42")]).await;
        assert_eq!(ids, vec![None]);
    }

    #[tokio::test]
    async fn mention_replies_return_the_head_tweet_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/update.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id_str": "501"})))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = TwitterAdapter::new(test_config(&server.uri())).unwrap();
        let mut activity = Activity::message(ChannelId::TwitterMention, "9", "short reply");
        activity
            .channel_data
            .insert("in_reply_to_status_id".into(), json!("100"));

        let ids = adapter.send_activities(&[activity]).await;
        assert_eq!(ids, vec![Some("501".to_string())]);
    }

    #[tokio::test]
    async fn register_webhook_runs_the_full_sequence() {
        let server = MockServer::start().await;
        mount_verify_credentials(&server).await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "bearer", "access_token": "BEARER"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.1/account_activity/all/dev/webhooks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "111", "url": "https://old.example.com/hook"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/1.1/account_activity/all/dev/webhooks/111.json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1.1/account_activity/all/dev/webhooks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "222", "url": "https://example.com/hook", "valid": true
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.1/account_activity/all/count.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "subscriptions_count": "0",
                "provisioned_count": "15"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1.1/account_activity/all/dev/subscriptions.json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut adapter = TwitterAdapter::new(test_config(&server.uri())).unwrap();
        adapter.register_webhook().await.unwrap();
    }

    #[tokio::test]
    async fn register_webhook_requires_a_configured_url() {
        let mut config = test_config("https://api.twitter.com");
        config.webhook_url = None;

        let mut adapter = TwitterAdapter::new(config).unwrap();
        let err = adapter.register_webhook().await.unwrap_err();
        assert!(matches!(err, TwitterError::InvalidUrl(_)));
    }
}
