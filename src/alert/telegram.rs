//! Telegram Bot API notifier.
//!
//! Two synchronous calls, no retry:
//! - `POST {api_base}/bot{token}/sendMessage` (form: `chat_id`, `text`)
//! - `POST {api_base}/bot{token}/sendPhoto` (multipart: `chat_id`, `caption`, `photo`)
//!
//! Only HTTP 200 counts as delivered.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};

use super::multipart::MultipartForm;
use super::notifier::{Delivery, Notifier};
use crate::config::{BotToken, TelegramSettings};

const PHOTO_FILENAME: &str = "detected.png";

pub struct TelegramNotifier {
    agent: ureq::Agent,
    api_base: String,
    token: BotToken,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base: impl Into<String>, token: BotToken, chat_id: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            agent: ureq::AgentBuilder::new().build(),
            api_base,
            token,
            chat_id: chat_id.into(),
        }
    }

    /// Build from configuration; `None` when the token or chat id is missing.
    pub fn from_settings(settings: &TelegramSettings) -> Option<Self> {
        let token = settings.bot_token.clone()?;
        let chat_id = settings.chat_id.as_deref()?;
        Some(Self::new(settings.api_base.as_str(), token, chat_id))
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose(), method)
    }

    /// Endpoint with the token masked, for logs.
    fn redacted_endpoint(&self, method: &str) -> String {
        format!("{}/bot<redacted>/{}", self.api_base, method)
    }

    fn redact(&self, text: &str) -> String {
        text.replace(self.token.expose(), "<redacted>")
    }

    fn finish(&self, what: &str, method: &str, result: Result<ureq::Response, ureq::Error>) -> Delivery {
        let delivery = match result {
            Ok(response) if response.status() == 200 => Delivery::Sent,
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().unwrap_or_default();
                Delivery::failed(format!("HTTP {}: {}", status, body.trim()))
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Delivery::failed(format!("HTTP {}: {}", status, body.trim()))
            }
            Err(ureq::Error::Transport(transport)) => {
                // Display on a transport error includes the request URL.
                match transport.message() {
                    Some(message) => Delivery::failed(format!(
                        "transport error: {}: {}",
                        transport.kind(),
                        message
                    )),
                    None => Delivery::failed(format!("transport error: {}", transport.kind())),
                }
            }
        };
        let delivery = match delivery {
            Delivery::Failed { reason } => Delivery::Failed {
                reason: self.redact(&reason),
            },
            sent => sent,
        };
        match &delivery {
            Delivery::Sent => log::info!("telegram {} sent", what),
            Delivery::Failed { reason } => log::warn!(
                "telegram {} failed ({}): {}",
                what,
                self.redacted_endpoint(method),
                reason
            ),
        }
        delivery
    }
}

impl Notifier for TelegramNotifier {
    fn send_message(&self, text: &str) -> Delivery {
        let result = self.agent.post(&self.endpoint("sendMessage")).send_form(&[
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
        ]);
        self.finish("message", "sendMessage", result)
    }

    fn send_photo(&self, image: &DynamicImage, caption: &str) -> Delivery {
        let png = match encode_png(image) {
            Ok(png) => png,
            Err(err) => {
                log::warn!("telegram photo not sent: {:#}", err);
                return Delivery::failed(format!("{:#}", err));
            }
        };
        let form = MultipartForm::new()
            .text("chat_id", &self.chat_id)
            .text("caption", caption)
            .file("photo", PHOTO_FILENAME, "image/png", &png);
        let content_type = form.content_type();
        let result = self
            .agent
            .post(&self.endpoint("sendPhoto"))
            .set("Content-Type", &content_type)
            .send_bytes(&form.finish());
        self.finish("photo", "sendPhoto", result)
    }
}

/// Encode an image as PNG in memory.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buffer.into_inner())
}
