//! Telegram Bot API
//!
//! Thin JSON client over the three Bot API methods the planner needs:
//! `sendMessage`, `getUpdates` (long polling) and `answerCallbackQuery`.

use std::time::Duration;

use async_trait::async_trait;
use planner_core::{
    DeliveryError, FormatHint, InboundEvent, Keyboard, OutboundMessage, RecipientId, Transport,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// Telegram client configuration
#[derive(Clone, Debug)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub token: String,

    /// API root, overridable for a local Bot API server
    pub api_base: String,

    /// Long-poll duration passed to `getUpdates`
    pub poll_timeout_secs: u64,

    /// HTTP timeout for ordinary calls
    pub request_timeout_secs: u64,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: "https://api.telegram.org".into(),
            poll_timeout_secs: 25,
            request_timeout_secs: 15,
        }
    }
}

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, http_status: u16) -> Result<T, DeliveryError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(DeliveryError::Rejected {
                status: http_status,
                description: "response without result".into(),
            }),
            (false, _) => Err(DeliveryError::Rejected {
                status: self.error_code.unwrap_or(http_status),
                description: self.description.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl Update {
    /// Map to a core event; updates the planner does not handle yield `None`
    pub fn to_event(&self) -> Option<InboundEvent> {
        if let Some(message) = &self.message {
            let text = message.text.as_ref()?;
            return Some(InboundEvent::Text {
                from: RecipientId::new(message.chat.id),
                text: text.clone(),
            });
        }

        let query = self.callback_query.as_ref()?;
        // Replies go to the chat holding the keyboard, which differs from
        // the user id in groups
        let chat = query.message.as_ref().map_or(query.from.id, |m| m.chat.id);
        Some(InboundEvent::Button {
            from: RecipientId::new(chat),
            callback_id: query.data.clone()?,
        })
    }
}

/// Telegram Bot API client
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.config.api_base, self.config.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, DeliveryError> {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(network)?;

        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response.json().await.map_err(network)?;
        envelope.into_result(status)
    }

    /// Verify the token; returns the bot's user id
    pub async fn get_me(&self) -> Result<i64, DeliveryError> {
        let me: User = self.call("getMe", &json!({}), self.request_timeout()).await?;
        Ok(me.id)
    }

    /// Block up to the poll timeout for updates at or after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, DeliveryError> {
        let body = json!({
            "offset": offset,
            "timeout": self.config.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        // HTTP deadline must outlast the server-side long poll
        let timeout = Duration::from_secs(self.config.poll_timeout_secs + self.config.request_timeout_secs);
        self.call("getUpdates", &body, timeout).await
    }

    /// Stop the client-side spinner on a pressed button
    pub async fn answer_callback(&self, callback_query_id: &str) -> Result<(), DeliveryError> {
        let body = json!({ "callback_query_id": callback_query_id });
        let _: bool = self.call("answerCallbackQuery", &body, self.request_timeout()).await?;
        Ok(())
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }
}

/// reqwest errors embed the request URL, which contains the token
fn network(err: reqwest::Error) -> DeliveryError {
    DeliveryError::Network(err.without_url().to_string())
}

fn send_message_body(to: RecipientId, message: &OutboundMessage) -> Value {
    let mut body = json!({
        "chat_id": to.get(),
        "text": message.text,
        "disable_web_page_preview": true,
    });
    if message.format == FormatHint::Html {
        body["parse_mode"] = json!("HTML");
    }
    if let Some(keyboard) = &message.keyboard {
        body["reply_markup"] = reply_markup(keyboard);
    }
    body
}

fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Inline(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.callback_id }))
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
        Keyboard::Menu(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send(&self, to: RecipientId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let body = send_message_body(to, message);
        let _: Value = self.call("sendMessage", &body, self.request_timeout()).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "Telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_core::Button;

    const UPDATES: &str = r#"{
        "ok": true,
        "result": [
            {"update_id": 501, "message": {"message_id": 1, "chat": {"id": 1001, "type": "private"}, "date": 1733385600, "text": "/start"}},
            {"update_id": 502, "callback_query": {"id": "cb-9", "from": {"id": 1001, "is_bot": false, "first_name": "Ana"},
                "message": {"message_id": 2, "chat": {"id": -2002, "type": "group"}, "date": 1733385601},
                "data": "lang_en"}},
            {"update_id": 503, "message": {"message_id": 3, "chat": {"id": 1001, "type": "private"}, "date": 1733385602, "sticker": {}}}
        ]
    }"#;

    #[test]
    fn test_updates_map_to_events() {
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(UPDATES).unwrap();
        let updates = response.into_result(200).unwrap();

        let events: Vec<_> = updates.iter().map(Update::to_event).collect();
        assert_eq!(
            events[0],
            Some(InboundEvent::Text { from: RecipientId::new(1001), text: "/start".into() })
        );
        assert_eq!(
            events[1],
            Some(InboundEvent::Button { from: RecipientId::new(-2002), callback_id: "lang_en".into() })
        );
        assert_eq!(events[2], None);
    }

    #[test]
    fn test_api_error_becomes_rejection() {
        let body = r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#;
        let response: ApiResponse<Value> = serde_json::from_str(body).unwrap();

        let err = response.into_result(403).unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected {
                status: 403,
                description: "Forbidden: bot was blocked by the user".into()
            }
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_send_body_html_with_inline_keyboard() {
        let message = OutboundMessage::html("<b>hi</b>").with_keyboard(Keyboard::Inline(vec![vec![Button {
            label: "🇬🇧 English".into(),
            callback_id: "lang_en".into(),
        }]]));

        let body = send_message_body(RecipientId::new(7), &message);
        assert_eq!(body["chat_id"], 7);
        assert_eq!(body["parse_mode"], "HTML");
        assert_eq!(body["reply_markup"]["inline_keyboard"][0][0]["callback_data"], "lang_en");
    }

    #[test]
    fn test_send_body_plain_with_menu() {
        let message = OutboundMessage::plain("menu")
            .with_keyboard(Keyboard::Menu(vec![vec!["📰 News".into(), "⚙️ Settings".into()]]));

        let body = send_message_body(RecipientId::new(7), &message);
        assert!(body.get("parse_mode").is_none());
        assert_eq!(body["reply_markup"]["keyboard"][0][1]["text"], "⚙️ Settings");
        assert_eq!(body["reply_markup"]["resize_keyboard"], true);
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new(TelegramConfig::new("123:abc")).unwrap();
        assert_eq!(client.method_url("getMe"), "https://api.telegram.org/bot123:abc/getMe");
    }
}
