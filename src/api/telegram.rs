use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::models::{AttachmentKind, DeliveryReceipt, SendUnit};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const USER_AGENT: &str = "wallposter/0.3";
const TIMEOUT_SECS: u64 = 20;
const VK_BUTTON_LABEL: &str = "Открыть пост в VK";

pub struct TelegramClient {
    http_client: Client,
    base_url: String,
    channel_id: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str, channel_id: &str) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        TelegramClient {
            http_client,
            base_url: format!("{}/bot{}", TELEGRAM_API_URL, bot_token),
            channel_id: channel_id.to_string(),
        }
    }

    /// Inline-кнопка со ссылкой на оригинальный пост.
    fn keyboard(url: &str) -> Value {
        json!({ "inline_keyboard": [[{ "text": VK_BUTTON_LABEL, "url": url }]] })
    }

    async fn call(&self, method: &str, body: Value) -> Result<DeliveryReceipt, DeliveryError> {
        debug!("Calling Telegram {}", method);

        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, method))
            .json(&body)
            .send()
            .await
            // Транспортные сбои всегда считаем временными
            .map_err(|e| DeliveryError::Transient(format!("{}: {}", method, e)))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transient(format!("{}: {}", method, e)))?;

        if !status.is_success() {
            warn!("Telegram {} returned HTTP {}: {}", method, status, raw);
            return Err(classify_status(status, &raw));
        }

        let payload: TgResponse = serde_json::from_str(&raw)
            .map_err(|e| DeliveryError::Permanent(format!("{}: invalid response: {}", method, e)))?;

        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "no description".to_string());
            warn!("Telegram {} rejected request: {}", method, description);
            return Err(DeliveryError::Permanent(format!(
                "{}: {}",
                method, description
            )));
        }

        let message = payload.result.ok_or_else(|| {
            DeliveryError::Permanent(format!("{}: response without message", method))
        })?;

        Ok(DeliveryReceipt {
            message_id: message.message_id,
        })
    }

    async fn send_message(
        &self,
        text: String,
        source_url: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": self.channel_id,
                "text": text,
                "reply_markup": Self::keyboard(source_url),
            }),
        )
        .await
    }

    async fn send_media(
        &self,
        method: &str,
        field: &str,
        url: &str,
        caption: Option<&str>,
        source_url: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let mut body = json!({
            "chat_id": self.channel_id,
            "reply_markup": Self::keyboard(source_url),
        });
        body[field] = json!(url);
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }
        self.call(method, body).await
    }
}

#[async_trait::async_trait]
impl super::DestinationApi for TelegramClient {
    async fn send(&self, unit: &SendUnit) -> Result<DeliveryReceipt, DeliveryError> {
        let attachment = match &unit.attachment {
            None => {
                // Текстовая отправка или ссылка-заглушка
                let text = unit
                    .text
                    .clone()
                    .unwrap_or_else(|| unit.source_url.clone());
                return self.send_message(text, &unit.source_url).await;
            }
            Some(attachment) => attachment,
        };

        let url = attachment.url.as_deref().ok_or_else(|| {
            DeliveryError::Permanent("attachment without direct payload".to_string())
        })?;
        let caption = unit.text.as_deref().or(attachment.title.as_deref());

        match attachment.kind {
            AttachmentKind::Photo => {
                self.send_media("sendPhoto", "photo", url, caption, &unit.source_url)
                    .await
            }
            AttachmentKind::Video => {
                self.send_media("sendVideo", "video", url, caption, &unit.source_url)
                    .await
            }
            AttachmentKind::Audio => {
                self.send_media("sendAudio", "audio", url, caption, &unit.source_url)
                    .await
            }
            AttachmentKind::Link => {
                let mut lines = Vec::new();
                if let Some(text) = &unit.text {
                    lines.push(text.clone());
                }
                if let Some(title) = &attachment.title {
                    lines.push(title.clone());
                }
                lines.push(url.to_string());
                self.send_message(lines.join("\n"), &unit.source_url).await
            }
        }
    }
}

/// HTTP 429 и 5xx имеет смысл повторять, остальное - отказ.
fn classify_status(status: StatusCode, body: &str) -> DeliveryError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryError::Transient(format!("HTTP {}: {}", status, body))
    } else {
        DeliveryError::Permanent(format!("HTTP {}: {}", status, body))
    }
}

#[derive(Debug, Deserialize)]
struct TgResponse {
    ok: bool,
    description: Option<String>,
    result: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_transient() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            DeliveryError::Transient(_)
        ));
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            DeliveryError::Transient(_)
        ));
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "wrong file type"),
            DeliveryError::Permanent(_)
        ));
    }

    #[test]
    fn test_keyboard_links_to_source() {
        let keyboard = TelegramClient::keyboard("https://vk.com/wall-1_10");
        assert_eq!(
            keyboard["inline_keyboard"][0][0]["url"],
            "https://vk.com/wall-1_10"
        );
    }
}
