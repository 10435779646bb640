//! Collection of push provider dispatchers.
use crate::status::Response;
use crate::transport::{HttpTransport, MailTransport};
use anyhow::anyhow;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

pub mod apns;
pub mod email;
pub mod fcm;
pub mod gcm;
pub mod mpns;
mod multicast;

pub use multicast::{MulticastError, MulticastRequest, Priority};

#[derive(Debug, Deserialize, Copy, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gcm,
    Fcm,
    Apns,
    Mpns,
    Email,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::Gcm => "GCM",
            ProviderType::Fcm => "FCM",
            ProviderType::Apns => "APNS",
            ProviderType::Mpns => "MPNS",
            ProviderType::Email => "Email",
        }
    }
}

impl Display for ProviderType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcm" => Ok(ProviderType::Gcm),
            "fcm" => Ok(ProviderType::Fcm),
            "apns" => Ok(ProviderType::Apns),
            "mpns" => Ok(ProviderType::Mpns),
            "email" => Ok(ProviderType::Email),
            _ => Err(format!("unknown provider '{s}'")),
        }
    }
}

/// Ordered list of destinations for one call.
///
/// A single value becomes a one element list. Duplicates are not removed.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Endpoints(Vec<String>);

impl Endpoints {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for Endpoints {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for Endpoints {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for Endpoints {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for Endpoints {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Endpoints {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Endpoints {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&[String]> for Endpoints {
    fn from(value: &[String]) -> Self {
        Self(value.to_vec())
    }
}

/// Credential sent to a provider. Never printed by `Debug`.
#[derive(Clone, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Provider neutral message, converted into each provider's payload.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Notification {
    pub title: Option<String>,
    pub body: String,
    pub sound: Option<String>,
    pub badge: Option<u32>,
    pub data: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Uniform entry point over every provider.
pub trait Dispatcher: Send + Sync {
    fn provider(&self) -> ProviderType;

    /// Deliver `notification` to `endpoints`. Multicast providers issue one call,
    /// the others one call per endpoint.
    fn dispatch(&self, endpoints: &Endpoints, notification: &Notification) -> Vec<Response>;
}

#[derive(Debug, Deserialize, Copy, Clone, Eq, PartialEq)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    60
}

fn default_timeout() -> u64 {
    120
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub http: HttpConfig,
    pub gcm: Option<gcm::GcmConfig>,
    pub fcm: Option<fcm::FcmConfig>,
    pub apns: Option<apns::ApnsConfig>,
    pub mpns: Option<mpns::MpnsConfig>,
    pub email: Option<email::EmailConfig>,
}

/// Build the dispatcher for `t` from configuration, wired to the default transports.
///
/// APNS is refused here: the gateway only speaks HTTP/2, which the bundled HTTP
/// transport does not. Build an [`apns::ApnsDispatcher`] with a capable transport instead.
pub fn new_dispatcher(
    t: ProviderType,
    config: &ProvidersConfig,
) -> Result<Box<dyn Dispatcher>, anyhow::Error> {
    let missing = || anyhow!("No configuration for provider {t}");
    match t {
        ProviderType::Gcm => {
            let cfg = config.gcm.clone().ok_or_else(missing)?;
            let http = new_http_transport(&config.http)?;
            Ok(Box::new(gcm::GcmDispatcher::new(cfg, http)))
        }
        ProviderType::Fcm => {
            let cfg = config.fcm.clone().ok_or_else(missing)?;
            let http = new_http_transport(&config.http)?;
            Ok(Box::new(fcm::FcmDispatcher::new(cfg, http)))
        }
        ProviderType::Apns => {
            config.apns.as_ref().ok_or_else(missing)?;
            Err(anyhow!("APNS needs an HTTP/2 capable transport"))
        }
        ProviderType::Mpns => {
            let cfg = config.mpns.unwrap_or_default();
            let http = new_http_transport(&config.http)?;
            Ok(Box::new(mpns::MpnsDispatcher::new(cfg, http)))
        }
        ProviderType::Email => {
            let cfg = config.email.clone().ok_or_else(missing)?;
            let mailer = new_mailer(&cfg)?;
            Ok(Box::new(email::EmailDispatcher::new(cfg, mailer)))
        }
    }
}

#[cfg(feature = "http-ureq")]
fn new_http_transport(config: &HttpConfig) -> anyhow::Result<Arc<dyn HttpTransport>> {
    use std::time::Duration;
    Ok(Arc::new(crate::transport::UreqTransport::new(
        Duration::from_secs(config.connect_timeout_secs),
        Duration::from_secs(config.timeout_secs),
    )))
}

#[cfg(not(feature = "http-ureq"))]
fn new_http_transport(_config: &HttpConfig) -> anyhow::Result<Arc<dyn HttpTransport>> {
    Err(anyhow!("http-ureq feature is not enabled"))
}

#[cfg(feature = "mail-smtp")]
fn new_mailer(config: &email::EmailConfig) -> anyhow::Result<Arc<dyn MailTransport>> {
    let mailer = crate::transport::SmtpMailer::new(
        &config.smtp_host,
        config.smtp_port,
        &config.username,
        config.password.expose(),
    )?;
    Ok(Arc::new(mailer))
}

#[cfg(not(feature = "mail-smtp"))]
fn new_mailer(_config: &email::EmailConfig) -> anyhow::Result<Arc<dyn MailTransport>> {
    Err(anyhow!("mail-smtp feature is not enabled"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_endpoint_becomes_single_element_list() {
        let endpoints = Endpoints::from("tok1");
        assert_eq!(endpoints.as_slice(), &["tok1".to_string()]);
        let endpoints = Endpoints::from(vec!["a", "b", "a"]);
        assert_eq!(endpoints.len(), 3);
    }

    #[test]
    fn api_key_is_redacted() {
        let key = ApiKey::new("super-secret");
        assert!(!format!("{key:?}").contains("super-secret"));
        assert_eq!(key.expose(), "super-secret");
    }

    #[test]
    fn provider_type_parses_case_insensitive() {
        assert_eq!("GCM".parse::<ProviderType>(), Ok(ProviderType::Gcm));
        assert_eq!("email".parse::<ProviderType>(), Ok(ProviderType::Email));
        assert!("sms".parse::<ProviderType>().is_err());
    }

    #[test]
    fn missing_provider_config_is_an_error() {
        let config = ProvidersConfig::default();
        let err = new_dispatcher(ProviderType::Gcm, &config).err().unwrap();
        assert_eq!(err.to_string(), "No configuration for provider GCM");
    }

    #[test]
    fn apns_is_refused_without_an_http2_transport() {
        let config = ProvidersConfig {
            apns: Some(apns::ApnsConfig::new("jwt", "com.example.app")),
            ..Default::default()
        };
        let err = new_dispatcher(ProviderType::Apns, &config).err().unwrap();
        assert!(err.to_string().contains("HTTP/2"));
    }

    #[cfg(feature = "http-ureq")]
    #[test]
    fn configured_providers_build() {
        let config = ProvidersConfig {
            gcm: Some(gcm::GcmConfig::new("k")),
            fcm: Some(fcm::FcmConfig::new("k")),
            ..Default::default()
        };
        for t in [ProviderType::Gcm, ProviderType::Fcm, ProviderType::Mpns] {
            let dispatcher = new_dispatcher(t, &config).unwrap();
            assert_eq!(dispatcher.provider(), t);
        }
    }
}
