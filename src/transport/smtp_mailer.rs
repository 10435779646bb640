use crate::transport::{MailError, MailMessage, MailTransport};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Send mail through an SMTP relay with `lettre`.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> anyhow::Result<Self> {
        let credentials = Credentials::new(username.to_string(), password.to_string());
        let transport = SmtpTransport::relay(host)
            .map_err(|e| anyhow::anyhow!("Failed to configure SMTP relay '{host}': {e}"))?
            .port(port)
            .credentials(credentials)
            .build();
        Ok(Self { transport })
    }

    fn build(message: &MailMessage) -> Result<Message, MailError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| MailError::Rejected(format!("Invalid sender '{}': {e}", message.from)))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| MailError::Rejected(format!("Invalid recipient '{}': {e}", message.to)))?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| MailError::Rejected(e.to_string()))
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let email = Self::build(message)?;
        match self.transport.send(&email) {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => Err(MailError::Rejected(e.to_string())),
            Err(e) => Err(MailError::Transport(e.to_string())),
        }
    }
}
