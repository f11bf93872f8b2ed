//! Discord REST client for outbound messages.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use switchyard_types::error::ChannelError;
use switchyard_types::secret::SecretString;

use super::events::RateLimited;

/// Discord REST API v10.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Attempts per message when Discord answers 429.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
struct CreatedMessage {
    id: String,
}

/// Bot-authenticated REST client.
pub struct DiscordApiClient {
    http: Client,
    token: SecretString,
    base_url: String,
}

impl DiscordApiClient {
    pub fn new(token: SecretString, base_url: Option<&str>) -> Self {
        Self {
            http: Client::new(),
            token,
            base_url: base_url
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Post `content` to `channel_id`, optionally as a reply. Returns the
    /// new message's id.
    ///
    /// Rate-limited requests are retried after the advertised delay.
    pub async fn create_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ChannelError> {
        let url = format!("{}/channels/{channel_id}/messages", self.base_url);
        let mut body = json!({ "content": content });
        if let Some(id) = reply_to {
            body["message_reference"] = json!({ "message_id": id });
            body["allowed_mentions"] = json!({ "replied_user": false });
        }

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(channel_id = %channel_id, attempt, "creating message");
            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bot {}", self.token.expose()))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = resp
                    .json::<RateLimited>()
                    .await
                    .ok()
                    .and_then(|r| Duration::try_from_secs_f64(r.retry_after).ok())
                    .unwrap_or(Duration::from_secs(1));
                warn!(wait_ms = wait.as_millis() as u64, "Discord rate limit hit, retrying");
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed(format!(
                    "Discord API returned {status}: {text}"
                )));
            }

            let created: CreatedMessage = resp
                .json()
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
            return Ok(created.id);
        }

        Err(ChannelError::SendFailed("rate limited".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DiscordApiClient {
        DiscordApiClient::new(SecretString::new("tok"), Some(&server.uri()))
    }

    #[test]
    fn default_base_url() {
        let client = DiscordApiClient::new(SecretString::new("t"), None);
        assert_eq!(client.base_url(), DEFAULT_API_BASE);
    }

    #[tokio::test]
    async fn create_message_sends_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/222/messages"))
            .and(header("Authorization", "Bot tok"))
            .and(body_partial_json(json!({"content": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "555", "content": "hi"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server).create_message("222", "hi", None).await.unwrap();
        assert_eq!(id, "555");
    }

    #[tokio::test]
    async fn create_message_reply_references_original() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/222/messages"))
            .and(body_partial_json(json!({"message_reference": {"message_id": "111"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "556"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .create_message("222", "re", Some("111"))
            .await
            .unwrap();
        assert_eq!(id, "556");
    }

    #[tokio::test]
    async fn create_message_retries_after_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/222/messages"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"message": "slow down", "retry_after": 0.01, "global": false})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/222/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "557"})))
            .mount(&server)
            .await;

        let id = client(&server).create_message("222", "hi", None).await.unwrap();
        assert_eq!(id, "557");
    }

    #[tokio::test]
    async fn create_message_reports_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Missing Access"))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_message("222", "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed(ref m) if m.contains("403")));
    }
}
