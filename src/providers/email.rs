//! E-mail delivery, one address per call.
use crate::providers::{ApiKey, Dispatcher, Endpoints, Notification, ProviderType};
use crate::status::{DeliveryStatus, Response, ResponseBuilder};
use crate::transport::{MailError, MailMessage, MailTransport};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    /// Sender address.
    pub from: String,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default = "empty_password")]
    pub password: ApiKey,
}

fn default_smtp_port() -> u16 {
    587
}

fn empty_password() -> ApiKey {
    ApiKey::new("")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailPayload {
    subject: String,
    body: String,
}

impl EmailPayload {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// JSON encoded `{subject, body}`.
    pub fn get_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&Notification> for EmailPayload {
    fn from(n: &Notification) -> Self {
        let subject = n.title.clone().unwrap_or_default();
        EmailPayload::new()
            .set_subject(subject)
            .set_body(n.body.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailRequest {
    endpoint: String,
    payload: EmailPayload,
}

impl EmailRequest {
    pub fn new() -> Self {
        Default::default()
    }

    /// Recipient address.
    pub fn set_endpoint(mut self, address: impl Into<String>) -> Self {
        self.endpoint = address.into();
        self
    }

    pub fn set_payload(mut self, payload: EmailPayload) -> Self {
        self.payload = payload;
        self
    }
}

pub struct EmailDispatcher {
    from: String,
    mailer: Arc<dyn MailTransport>,
}

impl EmailDispatcher {
    pub fn new(config: EmailConfig, mailer: Arc<dyn MailTransport>) -> Self {
        Self {
            from: config.from,
            mailer,
        }
    }

    pub fn with_sender(from: impl Into<String>, mailer: Arc<dyn MailTransport>) -> Self {
        Self {
            from: from.into(),
            mailer,
        }
    }

    pub fn push(&self, request: EmailRequest) -> Response {
        if request.endpoint.is_empty() {
            warn!("Email push requested without a recipient");
            return ResponseBuilder::new(ProviderType::Email, &[]).build();
        }
        let endpoints = [request.endpoint.clone()];
        let mut builder = ResponseBuilder::new(ProviderType::Email, &endpoints);
        let message = MailMessage {
            from: self.from.clone(),
            to: request.endpoint.clone(),
            subject: request.payload.subject,
            body: request.payload.body,
        };

        debug!("Sending e-mail to {}", request.endpoint);
        match self.mailer.send(&message) {
            Ok(()) => {
                builder.record(&request.endpoint, DeliveryStatus::Success, "");
                builder.build()
            }
            Err(e @ MailError::Rejected(_)) => {
                builder.record(&request.endpoint, DeliveryStatus::Error, &e.to_string());
                builder.build()
            }
            Err(e @ MailError::Transport(_)) => builder.fail_all(e),
        }
    }
}

impl Dispatcher for EmailDispatcher {
    fn provider(&self) -> ProviderType {
        ProviderType::Email
    }

    fn dispatch(&self, endpoints: &Endpoints, notification: &Notification) -> Vec<Response> {
        let payload = EmailPayload::from(notification);
        endpoints
            .iter()
            .map(|address| {
                self.push(
                    EmailRequest::new()
                        .set_endpoint(address)
                        .set_payload(payload.clone()),
                )
            })
            .collect()
    }
}
