//! HTTP client for the Telegram Bot API.
//!
//! Covers `getMe`, `getUpdates` and `sendMessage`.

use reqwest::{Client, Proxy};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use switchyard_types::error::ChannelError;
use switchyard_types::secret::SecretString;

use super::types::{Message, SendMessageRequest, TelegramResponse, Update, User};

/// Public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Typed wrapper around [`reqwest::Client`] for one bot.
pub struct TelegramClient {
    http: Client,
    /// `{api_base}/bot{token}`. Contains the token; never logged.
    base_url: String,
}

impl TelegramClient {
    /// Build a client for `token`, optionally against a self-hosted Bot
    /// API server and through an HTTP(S)/SOCKS proxy.
    pub fn new(
        token: &SecretString,
        api_base: Option<&str>,
        proxy: Option<&str>,
    ) -> Result<Self, ChannelError> {
        let mut builder = Client::builder();
        if let Some(url) = proxy {
            let proxy = Proxy::all(url)
                .map_err(|e| ChannelError::InvalidConfig(format!("invalid proxy '{url}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| ChannelError::InvalidConfig(e.to_string()))?;

        let api_base = api_base.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/');
        Ok(Self {
            http,
            base_url: format!("{api_base}/bot{}", token.expose()),
        })
    }

    /// Verify the token. Returns the bot's own user.
    pub async fn get_me(&self) -> Result<User, ChannelError> {
        debug!("verifying bot token");
        let resp = self
            .http
            .get(self.url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        unwrap_result(resp, ChannelError::AuthFailed).await
    }

    /// Long-poll for updates starting at `offset`, waiting up to
    /// `timeout_secs` on the server side.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError> {
        trace!(offset, timeout_secs, "polling for updates");
        let resp = self
            .http
            .get(self.url("getUpdates"))
            .query(&[("offset", offset.to_string()), ("timeout", timeout_secs.to_string())])
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let updates: Vec<Update> = unwrap_result(resp, ChannelError::ReceiveFailed).await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }
        Ok(updates)
    }

    /// Send one text message.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message, ChannelError> {
        let req = SendMessageRequest {
            chat_id,
            text: text.to_owned(),
            reply_to_message_id: reply_to,
        };

        debug!(chat_id, "sending message");
        let resp = self
            .http
            .post(self.url("sendMessage"))
            .json(&req)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        unwrap_result(resp, ChannelError::SendFailed).await
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }
}

/// Decode the `{ok, result, description}` envelope, mapping every
/// failure through `err`.
async fn unwrap_result<T: DeserializeOwned>(
    resp: reqwest::Response,
    err: fn(String) -> ChannelError,
) -> Result<T, ChannelError> {
    let status = resp.status();
    let body: TelegramResponse<T> = resp
        .json()
        .await
        .map_err(|e| err(format!("HTTP {status}: {e}")))?;

    if !body.ok {
        return Err(err(body
            .description
            .unwrap_or_else(|| format!("HTTP {status}"))));
    }
    body.result
        .ok_or_else(|| err("missing result in response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_construction() {
        let client = TelegramClient::new(&SecretString::new("123:ABC"), None, None).unwrap();
        assert_eq!(client.url("getMe"), "https://api.telegram.org/bot123:ABC/getMe");
    }

    #[test]
    fn custom_api_base_trims_slash() {
        let client =
            TelegramClient::new(&SecretString::new("t"), Some("http://localhost:8081/"), None)
                .unwrap();
        assert_eq!(client.url("getUpdates"), "http://localhost:8081/bott/getUpdates");
    }

    #[test]
    fn invalid_proxy_is_a_config_error() {
        let err = TelegramClient::new(&SecretString::new("t"), None, Some("::not a url::"))
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::InvalidConfig(_)));
    }
}
