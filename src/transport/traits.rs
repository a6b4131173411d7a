use crate::domain::{DeliveryTarget, NotificationPayload};
use crate::errors::DeliveryError;

#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// One send attempt. Errors must be classified so the dispatcher knows whether to retry.
    fn send(
        &self,
        target: &DeliveryTarget,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError>;
}
