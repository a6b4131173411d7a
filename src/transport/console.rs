use crate::domain::{DeliveryTarget, NotificationPayload};
use crate::errors::DeliveryError;
use crate::transport::traits::Transport;

/// Prints messages instead of sending them; used for dry runs.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

impl Transport for ConsoleTransport {
    fn send(
        &self,
        target: &DeliveryTarget,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        println!("[DRY RUN] -> {}\n{}\n", target, payload.render());
        Ok(())
    }
}
