use thiserror::Error;

/// One plain text e-mail.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum MailError {
    /// The mail engine refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
    /// The mail engine failed before a verdict was reached.
    #[error("mail transport failure: {0}")]
    Transport(String),
}

/// Blocking mail delivery collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait MailTransport: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}
