//! Contracts for the network collaborators dispatchers talk through.
use thiserror::Error;

mod mail;
#[cfg(feature = "mail-smtp")]
mod smtp_mailer;
#[cfg(feature = "http-ureq")]
mod ureq_transport;

pub use mail::{MailError, MailMessage, MailTransport};
#[cfg(feature = "mail-smtp")]
pub use smtp_mailer::SmtpMailer;
#[cfg(feature = "http-ureq")]
pub use ureq_transport::UreqTransport;

#[cfg(test)]
pub use mail::MockMailTransport;

/// Outgoing HTTP POST.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Any HTTP response that made it back from the gateway, whatever its status code.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// No HTTP response was received at all.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("network error: {0}")]
pub struct TransportError(pub String);

/// Blocking HTTP client used by every HTTP based dispatcher.
///
/// Implementations return `Ok` for every response that reached us, including
/// 4xx and 5xx ones, and `Err` only when the exchange failed below HTTP.
#[cfg_attr(test, mockall::automock)]
pub trait HttpTransport: Send + Sync {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
