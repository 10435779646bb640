//! Dispatch mechanics shared by the GCM and FCM legacy HTTP protocol.
use crate::providers::gcm::GcmPayload;
use crate::providers::{ApiKey, Endpoints, ProviderType};
use crate::status::{DeliveryStatus, Response, ResponseBuilder};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    High,
    Normal,
}

/// One multicast call: every endpoint goes out in the same request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MulticastRequest {
    endpoints: Endpoints,
    payload: GcmPayload,
    priority: Priority,
}

impl MulticastRequest {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_endpoints(mut self, endpoints: impl Into<Endpoints>) -> Self {
        self.endpoints = endpoints.into();
        self
    }

    /// The payload is captured as is; later changes to the caller's copy are not sent.
    pub fn set_payload(mut self, payload: GcmPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn set_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn payload(&self) -> &GcmPayload {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Wire body with the addressing and priority merged into the payload.
    pub fn body(&self) -> serde_json::Result<String> {
        let endpoints = self.endpoints.as_slice();
        let body = WireBody {
            to: match endpoints {
                [single] => Some(single.as_str()),
                _ => None,
            },
            registration_ids: match endpoints {
                [_] => None,
                many => Some(many),
            },
            priority: self.priority,
            payload: &self.payload,
        };
        serde_json::to_string(&body)
    }
}

#[derive(Serialize)]
struct WireBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registration_ids: Option<&'a [String]>,
    priority: Priority,
    #[serde(flatten)]
    payload: &'a GcmPayload,
}

#[derive(Deserialize)]
struct ResultsBody {
    #[serde(default)]
    failure: u64,
    #[serde(default)]
    results: Vec<ResultEntry>,
}

#[derive(Deserialize)]
struct ResultEntry {
    error: Option<String>,
    registration_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Per-entry error codes the gateway reports in its `results` array.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MulticastError {
    MissingRegistration,
    InvalidRegistration,
    NotRegistered,
    InvalidPackageName,
    MismatchSenderId,
    MessageTooBig,
    InvalidDataKey,
    InvalidTtl,
    Unavailable,
    InternalServerError,
    DeviceMessageRateExceeded,
    TopicsMessageRateExceeded,
}

impl MulticastError {
    const ALL: [MulticastError; 12] = [
        MulticastError::MissingRegistration,
        MulticastError::InvalidRegistration,
        MulticastError::NotRegistered,
        MulticastError::InvalidPackageName,
        MulticastError::MismatchSenderId,
        MulticastError::MessageTooBig,
        MulticastError::InvalidDataKey,
        MulticastError::InvalidTtl,
        MulticastError::Unavailable,
        MulticastError::InternalServerError,
        MulticastError::DeviceMessageRateExceeded,
        MulticastError::TopicsMessageRateExceeded,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    pub fn code(self) -> &'static str {
        match self {
            MulticastError::MissingRegistration => "MissingRegistration",
            MulticastError::InvalidRegistration => "InvalidRegistration",
            MulticastError::NotRegistered => "NotRegistered",
            MulticastError::InvalidPackageName => "InvalidPackageName",
            MulticastError::MismatchSenderId => "MismatchSenderId",
            MulticastError::MessageTooBig => "MessageTooBig",
            MulticastError::InvalidDataKey => "InvalidDataKey",
            MulticastError::InvalidTtl => "InvalidTtl",
            MulticastError::Unavailable => "Unavailable",
            MulticastError::InternalServerError => "InternalServerError",
            MulticastError::DeviceMessageRateExceeded => "DeviceMessageRateExceeded",
            MulticastError::TopicsMessageRateExceeded => "TopicsMessageRateExceeded",
        }
    }

    pub fn status(self) -> DeliveryStatus {
        match self {
            MulticastError::MissingRegistration
            | MulticastError::InvalidRegistration
            | MulticastError::NotRegistered
            | MulticastError::InvalidPackageName
            | MulticastError::MismatchSenderId => DeliveryStatus::InvalidEndpoint,
            MulticastError::MessageTooBig
            | MulticastError::InvalidDataKey
            | MulticastError::InvalidTtl => DeliveryStatus::Error,
            MulticastError::Unavailable
            | MulticastError::InternalServerError
            | MulticastError::DeviceMessageRateExceeded
            | MulticastError::TopicsMessageRateExceeded => DeliveryStatus::TemporaryError,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MulticastError::MissingRegistration => "Registration token is missing",
            MulticastError::InvalidRegistration => "Registration token is invalid",
            MulticastError::NotRegistered => "Registration token is no longer registered",
            MulticastError::InvalidPackageName => "Token does not match the package name",
            MulticastError::MismatchSenderId => "Token belongs to another sender",
            MulticastError::MessageTooBig => "Message payload is too big",
            MulticastError::InvalidDataKey => "Payload data uses a reserved key",
            MulticastError::InvalidTtl => "Time to live is out of range",
            MulticastError::Unavailable => "Gateway is temporarily unavailable",
            MulticastError::InternalServerError => "Gateway internal error",
            MulticastError::DeviceMessageRateExceeded => "Too many messages for this device",
            MulticastError::TopicsMessageRateExceeded => "Too many messages for this topic",
        }
    }
}

pub(crate) fn status_for_code(code: &str) -> DeliveryStatus {
    MulticastError::from_code(code)
        .map(MulticastError::status)
        .unwrap_or(DeliveryStatus::Unknown)
}

/// POST-and-normalize helper the GCM and FCM dispatchers are composed from.
pub(crate) struct MulticastDispatcher {
    provider: ProviderType,
    url: String,
    api_key: ApiKey,
    http: Arc<dyn HttpTransport>,
}

impl MulticastDispatcher {
    pub fn new(
        provider: ProviderType,
        url: String,
        api_key: ApiKey,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            provider,
            url,
            api_key,
            http,
        }
    }

    pub fn push(&self, request: MulticastRequest) -> Response {
        let endpoints = request.endpoints().as_slice();
        let builder = ResponseBuilder::new(self.provider, endpoints);
        if endpoints.is_empty() {
            warn!("{} push requested without endpoints", self.provider);
            return builder.build();
        }

        let body = match request.body() {
            Ok(b) => b,
            Err(e) => return builder.fail_all(format!("failed to serialize payload: {e}")),
        };
        let http_request = HttpRequest::new(&self.url, body)
            .with_header("Authorization", format!("key={}", self.api_key.expose()))
            .with_header("Content-Type", "application/json");

        debug!(
            "Posting {} request for {} endpoint(s) to {}",
            self.provider,
            endpoints.len(),
            self.url
        );
        normalize(builder, self.http.post(&http_request))
    }
}

fn normalize(builder: ResponseBuilder, outcome: Result<HttpResponse, TransportError>) -> Response {
    let response = match outcome {
        Ok(r) => r,
        Err(e) => return builder.fail_all(e),
    };

    let (status, reason) = match response.status {
        200 => return normalize_results(builder, &response.body),
        400 => (DeliveryStatus::Error, "malformed request"),
        401 => (DeliveryStatus::InvalidEndpoint, "authentication failed"),
        500..=599 => (DeliveryStatus::TemporaryError, "gateway unavailable"),
        _ => (DeliveryStatus::Unknown, "unexpected response"),
    };
    let detail = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_default();
    let message = format!("HttpCode={} {reason} {detail}", response.status);
    builder.record_all(status, message.trim_end()).build()
}

fn normalize_results(mut builder: ResponseBuilder, body: &str) -> Response {
    let parsed: ResultsBody = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => {
            let message = format!("unparseable response body: {e}");
            return builder
                .record_all(DeliveryStatus::Unknown, &message)
                .build();
        }
    };

    debug!("Gateway reported {} failure(s)", parsed.failure);
    let endpoints = builder.endpoints().to_vec();
    for (endpoint, entry) in endpoints.iter().zip(parsed.results) {
        match entry.error {
            None => {
                builder.record(endpoint, DeliveryStatus::Success, "");
                if let Some(id) = entry.registration_id {
                    builder.canonical_id(endpoint, id);
                }
            }
            Some(code) => {
                let message = match MulticastError::from_code(&code) {
                    Some(e) => format!("{code}: {}", e.description()),
                    None => format!("{code}: unrecognized error code"),
                };
                builder.record(endpoint, status_for_code(&code), &message);
            }
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_table_matches_gateway_codes() {
        let expectations = [
            ("MissingRegistration", DeliveryStatus::InvalidEndpoint),
            ("InvalidRegistration", DeliveryStatus::InvalidEndpoint),
            ("NotRegistered", DeliveryStatus::InvalidEndpoint),
            ("InvalidPackageName", DeliveryStatus::InvalidEndpoint),
            ("MismatchSenderId", DeliveryStatus::InvalidEndpoint),
            ("MessageTooBig", DeliveryStatus::Error),
            ("InvalidDataKey", DeliveryStatus::Error),
            ("InvalidTtl", DeliveryStatus::Error),
            ("Unavailable", DeliveryStatus::TemporaryError),
            ("InternalServerError", DeliveryStatus::TemporaryError),
            ("DeviceMessageRateExceeded", DeliveryStatus::TemporaryError),
            ("TopicsMessageRateExceeded", DeliveryStatus::TemporaryError),
            ("SomethingNew", DeliveryStatus::Unknown),
            ("", DeliveryStatus::Unknown),
        ];
        for (code, status) in expectations {
            assert_eq!(status_for_code(code), status, "code {code}");
        }
    }

    #[test]
    fn single_endpoint_uses_to() {
        let request = MulticastRequest::new()
            .set_endpoints("tok1")
            .set_priority(Priority::Normal);
        let body: serde_json::Value = serde_json::from_str(&request.body().unwrap()).unwrap();
        assert_eq!(body["to"], "tok1");
        assert!(body.get("registration_ids").is_none());
        assert_eq!(body["priority"], "normal");
    }

    #[test]
    fn several_endpoints_use_registration_ids() {
        let request = MulticastRequest::new().set_endpoints(vec!["a", "b"]);
        let body: serde_json::Value = serde_json::from_str(&request.body().unwrap()).unwrap();
        assert_eq!(body["registration_ids"], serde_json::json!(["a", "b"]));
        assert!(body.get("to").is_none());
        assert_eq!(body["priority"], "high");
    }
}
