use async_trait::async_trait;
use log::info;
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::Server(err.to_string())
    }
}

/// Outbound mail. Only the reset flow sends anything.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, link: &str) -> Result<(), MailError>;
}

/// Writes the message to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, link: &str) -> Result<(), MailError> {
        info!("Password reset for {}: {}", to, link);
        Ok(())
    }
}
