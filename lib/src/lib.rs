//! Telegram Bot API bindings for Rust
//! Provides a blocking client for identifying the bot and sending messages to chats

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid bot token")]
    InvalidToken,
    #[error("Rate limited by Telegram (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
}

impl TelegramError {
    /// HTTP-level status reported by the API, if any
    pub fn code(&self) -> Option<u16> {
        match self {
            TelegramError::RateLimited { .. } => Some(429),
            TelegramError::Api { code, .. } => Some(*code),
            TelegramError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    MarkdownV2,
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, status: u16) -> Result<T, TelegramError> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| TelegramError::MalformedResponse("missing result".to_string()));
        }

        let code = self.error_code.unwrap_or(status);
        if code == 429 {
            return Err(TelegramError::RateLimited {
                retry_after: self.parameters.and_then(|p| p.retry_after),
            });
        }

        Err(TelegramError::Api {
            code,
            description: self
                .description
                .unwrap_or_else(|| "no description".to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    disable_web_page_preview: bool,
}

/// Options for `sendMessage`
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,
    pub disable_web_page_preview: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            parse_mode: Some(ParseMode::Markdown),
            disable_web_page_preview: false,
        }
    }
}

pub struct TelegramClient {
    base: String,
    client: Client,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TelegramError> {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Create a client against a custom Bot API server (self-hosted or test double)
    pub fn with_api_url(api_url: &str, token: &str) -> Result<Self, TelegramError> {
        let token = token.trim();
        if token.is_empty() || !token.contains(':') {
            return Err(TelegramError::InvalidToken);
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            client,
        })
    }

    fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(body)
            .send()?;

        let status = response.status().as_u16();
        let text = response.text()?;
        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            TelegramError::MalformedResponse(format!("HTTP {}: {}", status, e))
        })?;

        parsed.into_result(status)
    }

    /// Identify the bot behind the token
    pub fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}))
    }

    /// Send a text message to a chat id or `@channel` username
    pub fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        options: SendOptions,
    ) -> Result<Message, TelegramError> {
        let payload = SendMessagePayload {
            chat_id,
            text,
            parse_mode: options.parse_mode,
            disable_web_page_preview: options.disable_web_page_preview,
        };

        self.call("sendMessage", &payload)
    }
}
