use std::time::Duration;

use telegram::{SendOptions, TelegramClient, TelegramError};
use tracing::debug;

use crate::domain::{DeliveryTarget, NotificationPayload};
use crate::errors::{DeliveryError, FeederResult};
use crate::transport::traits::Transport;

pub struct TelegramTransport {
    client: TelegramClient,
}

impl TelegramTransport {
    pub fn new(token: &str) -> FeederResult<Self> {
        Ok(Self {
            client: TelegramClient::new(token)?,
        })
    }

    /// Bot username, confirming the token works
    pub fn identify(&self) -> FeederResult<String> {
        let me = self.client.get_me()?;
        Ok(me.username.unwrap_or(me.first_name))
    }
}

impl Transport for TelegramTransport {
    fn send(
        &self,
        target: &DeliveryTarget,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        let message = payload.render();
        match self
            .client
            .send_message(target.as_str(), &message, SendOptions::default())
        {
            Ok(_) => return Ok(()),
            Err(e) if is_markup_rejection(&e) => {
                debug!(chat = %target, error = %e, "markdown rejected, resending as plain text");
            }
            Err(e) => return Err(classify(e)),
        }

        // Entity parsing failed, send the same text without formatting
        let plain = SendOptions {
            parse_mode: None,
            ..SendOptions::default()
        };
        self.client
            .send_message(target.as_str(), &message, plain)
            .map(|_| ())
            .map_err(classify)
    }
}

fn is_markup_rejection(err: &TelegramError) -> bool {
    matches!(err, TelegramError::Api { code: 400, description } if description.contains("can't parse entities"))
}

/// Map a Telegram failure onto the dispatcher's retry taxonomy
fn classify(err: TelegramError) -> DeliveryError {
    match err {
        TelegramError::RateLimited { retry_after } => DeliveryError::RateLimited {
            retry_after: retry_after.map(Duration::from_secs),
        },
        TelegramError::Api { code, description } if code >= 500 => {
            DeliveryError::Transient(format!("{}: {}", code, description))
        }
        TelegramError::Api { code, description } => {
            DeliveryError::Fatal(format!("{}: {}", code, description))
        }
        TelegramError::RequestError(e) => DeliveryError::Transient(e.to_string()),
        TelegramError::MalformedResponse(detail) => DeliveryError::Transient(detail),
        TelegramError::InvalidToken => DeliveryError::Fatal("invalid bot token".to_string()),
    }
}
