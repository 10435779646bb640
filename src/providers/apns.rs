//! Apple Push Notification service, provider API.
//!
//! One device token per call. The gateway requires HTTP/2, so the transport given
//! to [`ApnsDispatcher`] has to speak it.
use crate::providers::{ApiKey, Dispatcher, Endpoints, Notification, ProviderType};
use crate::status::{DeliveryStatus, Response, ResponseBuilder};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const APNS_SEND_URL: &str = "https://api.push.apple.com/3/device";

#[derive(Debug, Deserialize, Clone)]
pub struct ApnsConfig {
    /// Provider authentication token (JWT).
    pub auth_token: ApiKey,
    /// Bundle id of the receiving app.
    pub topic: String,
    #[serde(default = "default_send_url")]
    pub send_url: String,
}

fn default_send_url() -> String {
    APNS_SEND_URL.to_string()
}

impl ApnsConfig {
    pub fn new(auth_token: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            auth_token: ApiKey::new(auth_token),
            topic: topic.into(),
            send_url: default_send_url(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<String>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    content_available: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApnsPayload {
    aps: Aps,
    #[serde(flatten)]
    custom: BTreeMap<String, Value>,
}

impl ApnsPayload {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_alert(mut self, alert: impl Into<String>) -> Self {
        self.aps.alert = Some(alert.into());
        self
    }

    pub fn set_badge(mut self, badge: i64) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    pub fn set_sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    pub fn set_category(mut self, category: impl Into<String>) -> Self {
        self.aps.category = Some(category.into());
        self
    }

    /// Wake the app in the background.
    pub fn set_content_available(mut self, available: bool) -> Self {
        self.aps.content_available = available.then_some(1);
        self
    }

    /// Add a top level key next to `aps`.
    pub fn set_custom_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn get_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn push_type(&self) -> &'static str {
        if self.aps.alert.is_none() && self.aps.content_available.is_some() {
            "background"
        } else {
            "alert"
        }
    }
}

impl From<&Notification> for ApnsPayload {
    fn from(n: &Notification) -> Self {
        let alert = match &n.title {
            Some(title) => format!("{title}: {}", n.body),
            None => n.body.clone(),
        };
        let mut payload = ApnsPayload::new().set_alert(alert);
        if let Some(sound) = &n.sound {
            payload = payload.set_sound(sound.as_str());
        }
        if let Some(badge) = n.badge {
            payload = payload.set_badge(i64::from(badge));
        }
        for (key, value) in &n.data {
            payload = payload.set_custom_data(key.as_str(), value.as_str());
        }
        payload
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum ApnsPriority {
    #[default]
    Immediate,
    PowerConsiderate,
}

impl ApnsPriority {
    fn header_value(self) -> &'static str {
        match self {
            ApnsPriority::Immediate => "10",
            ApnsPriority::PowerConsiderate => "5",
        }
    }
}

/// One call to a single device token.
///
/// Tokens are the hexadecimal strings handed out by the device; anything else is
/// reported as [`DeliveryStatus::InvalidEndpoint`] without contacting the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApnsRequest {
    endpoint: String,
    payload: ApnsPayload,
    priority: ApnsPriority,
    expiration: Option<i64>,
    collapse_id: Option<String>,
}

impl ApnsRequest {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_endpoint(mut self, token: impl Into<String>) -> Self {
        self.endpoint = token.into();
        self
    }

    pub fn set_payload(mut self, payload: ApnsPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn set_priority(mut self, priority: ApnsPriority) -> Self {
        self.priority = priority;
        self
    }

    /// UNIX timestamp after which the gateway stops trying.
    pub fn set_expiration(mut self, timestamp: i64) -> Self {
        self.expiration = Some(timestamp);
        self
    }

    pub fn set_collapse_key(mut self, key: impl Into<String>) -> Self {
        self.collapse_id = Some(key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Error reasons reported in the `reason` field of a rejected request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ApnsReason {
    BadDeviceToken,
    Unregistered,
    DeviceTokenNotForTopic,
    MissingDeviceToken,
    PayloadTooLarge,
    BadTopic,
    MissingTopic,
    TopicDisallowed,
    BadMessageId,
    BadPriority,
    BadExpirationDate,
    BadCollapseId,
    BadPath,
    MethodNotAllowed,
    ExpiredProviderToken,
    InvalidProviderToken,
    MissingProviderToken,
    Forbidden,
    TooManyRequests,
    IdleTimeout,
    Shutdown,
    InternalServerError,
    ServiceUnavailable,
}

impl ApnsReason {
    const ALL: [ApnsReason; 23] = [
        ApnsReason::BadDeviceToken,
        ApnsReason::Unregistered,
        ApnsReason::DeviceTokenNotForTopic,
        ApnsReason::MissingDeviceToken,
        ApnsReason::PayloadTooLarge,
        ApnsReason::BadTopic,
        ApnsReason::MissingTopic,
        ApnsReason::TopicDisallowed,
        ApnsReason::BadMessageId,
        ApnsReason::BadPriority,
        ApnsReason::BadExpirationDate,
        ApnsReason::BadCollapseId,
        ApnsReason::BadPath,
        ApnsReason::MethodNotAllowed,
        ApnsReason::ExpiredProviderToken,
        ApnsReason::InvalidProviderToken,
        ApnsReason::MissingProviderToken,
        ApnsReason::Forbidden,
        ApnsReason::TooManyRequests,
        ApnsReason::IdleTimeout,
        ApnsReason::Shutdown,
        ApnsReason::InternalServerError,
        ApnsReason::ServiceUnavailable,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.code() == code)
    }

    pub fn code(self) -> &'static str {
        match self {
            ApnsReason::BadDeviceToken => "BadDeviceToken",
            ApnsReason::Unregistered => "Unregistered",
            ApnsReason::DeviceTokenNotForTopic => "DeviceTokenNotForTopic",
            ApnsReason::MissingDeviceToken => "MissingDeviceToken",
            ApnsReason::PayloadTooLarge => "PayloadTooLarge",
            ApnsReason::BadTopic => "BadTopic",
            ApnsReason::MissingTopic => "MissingTopic",
            ApnsReason::TopicDisallowed => "TopicDisallowed",
            ApnsReason::BadMessageId => "BadMessageId",
            ApnsReason::BadPriority => "BadPriority",
            ApnsReason::BadExpirationDate => "BadExpirationDate",
            ApnsReason::BadCollapseId => "BadCollapseId",
            ApnsReason::BadPath => "BadPath",
            ApnsReason::MethodNotAllowed => "MethodNotAllowed",
            ApnsReason::ExpiredProviderToken => "ExpiredProviderToken",
            ApnsReason::InvalidProviderToken => "InvalidProviderToken",
            ApnsReason::MissingProviderToken => "MissingProviderToken",
            ApnsReason::Forbidden => "Forbidden",
            ApnsReason::TooManyRequests => "TooManyRequests",
            ApnsReason::IdleTimeout => "IdleTimeout",
            ApnsReason::Shutdown => "Shutdown",
            ApnsReason::InternalServerError => "InternalServerError",
            ApnsReason::ServiceUnavailable => "ServiceUnavailable",
        }
    }

    pub fn status(self) -> DeliveryStatus {
        match self {
            ApnsReason::BadDeviceToken
            | ApnsReason::Unregistered
            | ApnsReason::DeviceTokenNotForTopic
            | ApnsReason::MissingDeviceToken => DeliveryStatus::InvalidEndpoint,
            ApnsReason::PayloadTooLarge
            | ApnsReason::BadTopic
            | ApnsReason::MissingTopic
            | ApnsReason::TopicDisallowed
            | ApnsReason::BadMessageId
            | ApnsReason::BadPriority
            | ApnsReason::BadExpirationDate
            | ApnsReason::BadCollapseId
            | ApnsReason::BadPath
            | ApnsReason::MethodNotAllowed => DeliveryStatus::Error,
            ApnsReason::ExpiredProviderToken
            | ApnsReason::InvalidProviderToken
            | ApnsReason::MissingProviderToken
            | ApnsReason::Forbidden => DeliveryStatus::ClientError,
            ApnsReason::TooManyRequests
            | ApnsReason::IdleTimeout
            | ApnsReason::Shutdown
            | ApnsReason::InternalServerError
            | ApnsReason::ServiceUnavailable => DeliveryStatus::TemporaryError,
        }
    }
}

#[derive(Deserialize)]
struct RejectionBody {
    reason: Option<String>,
}

fn status_for_code(code: u16) -> DeliveryStatus {
    match code {
        400 => DeliveryStatus::Error,
        403 => DeliveryStatus::ClientError,
        410 => DeliveryStatus::InvalidEndpoint,
        429 | 500..=599 => DeliveryStatus::TemporaryError,
        _ => DeliveryStatus::Unknown,
    }
}

pub struct ApnsDispatcher {
    config: ApnsConfig,
    http: Arc<dyn HttpTransport>,
}

impl ApnsDispatcher {
    pub fn new(config: ApnsConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self { config, http }
    }

    pub fn push(&self, request: ApnsRequest) -> Response {
        if request.endpoint.is_empty() {
            warn!("APNS push requested without a device token");
            return ResponseBuilder::new(ProviderType::Apns, &[]).build();
        }
        let endpoints = [request.endpoint.clone()];
        let mut builder = ResponseBuilder::new(ProviderType::Apns, &endpoints);
        // The token becomes a path segment of the request URL.
        if !request.endpoint.bytes().all(|b| b.is_ascii_hexdigit()) {
            builder.record(
                &request.endpoint,
                DeliveryStatus::InvalidEndpoint,
                "device token is not hexadecimal",
            );
            return builder.build();
        }

        let body = match request.payload.get_payload() {
            Ok(b) => b,
            Err(e) => return builder.fail_all(format!("failed to serialize payload: {e}")),
        };
        let url = format!(
            "{}/{}",
            self.config.send_url.trim_end_matches('/'),
            request.endpoint
        );
        let mut http_request = HttpRequest::new(url, body)
            .with_header(
                "authorization",
                format!("bearer {}", self.config.auth_token.expose()),
            )
            .with_header("apns-topic", self.config.topic.as_str())
            .with_header("apns-priority", request.priority.header_value())
            .with_header("apns-push-type", request.payload.push_type());
        if let Some(expiration) = request.expiration {
            http_request = http_request.with_header("apns-expiration", expiration.to_string());
        }
        if let Some(collapse_id) = &request.collapse_id {
            http_request = http_request.with_header("apns-collapse-id", collapse_id.as_str());
        }

        debug!("Posting APNS request for {}", request.endpoint);
        normalize(builder, &request.endpoint, self.http.post(&http_request))
    }
}

fn normalize(
    mut builder: ResponseBuilder,
    endpoint: &str,
    outcome: Result<HttpResponse, TransportError>,
) -> Response {
    let response = match outcome {
        Ok(r) => r,
        Err(e) => return builder.fail_all(e),
    };
    if response.status == 200 {
        builder.record(endpoint, DeliveryStatus::Success, "");
        return builder.build();
    }

    let reason = serde_json::from_str::<RejectionBody>(&response.body)
        .ok()
        .and_then(|b| b.reason);
    let status = reason
        .as_deref()
        .and_then(ApnsReason::from_code)
        .map(ApnsReason::status)
        .unwrap_or_else(|| status_for_code(response.status));
    let message = format!(
        "HttpCode={} Reason={}",
        response.status,
        reason.as_deref().unwrap_or("none")
    );
    builder.record(endpoint, status, &message);
    builder.build()
}

impl Dispatcher for ApnsDispatcher {
    fn provider(&self) -> ProviderType {
        ProviderType::Apns
    }

    fn dispatch(&self, endpoints: &Endpoints, notification: &Notification) -> Vec<Response> {
        let payload = ApnsPayload::from(notification);
        endpoints
            .iter()
            .map(|token| {
                self.push(
                    ApnsRequest::new()
                        .set_endpoint(token)
                        .set_payload(payload.clone()),
                )
            })
            .collect()
    }
}
