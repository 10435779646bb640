//! Google Cloud Messaging.
use crate::providers::multicast::{MulticastDispatcher, MulticastRequest};
use crate::providers::{ApiKey, Dispatcher, Endpoints, Notification, ProviderType};
use crate::status::Response;
use crate::transport::HttpTransport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const GCM_SEND_URL: &str = "https://gcm-http.googleapis.com/gcm/send";

#[derive(Debug, Deserialize, Clone)]
pub struct GcmConfig {
    pub api_key: ApiKey,
    #[serde(default = "default_send_url")]
    pub send_url: String,
}

fn default_send_url() -> String {
    GCM_SEND_URL.to_string()
}

impl GcmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            send_url: default_send_url(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct DisplayBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<String>,
}

/// Message fields for the GCM/FCM legacy HTTP protocol.
///
/// Values are passed through untouched, the gateway decides what it accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GcmPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    collapse_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_to_live: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<DisplayBlock>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    data: BTreeMap<String, Value>,
}

impl GcmPayload {
    pub fn new() -> Self {
        Default::default()
    }

    fn display(&mut self) -> &mut DisplayBlock {
        self.notification.get_or_insert_with(Default::default)
    }

    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.display().title = Some(title.into());
        self
    }

    pub fn set_alert(mut self, alert: impl Into<String>) -> Self {
        self.display().body = Some(alert.into());
        self
    }

    pub fn set_sound(mut self, sound: impl Into<String>) -> Self {
        self.display().sound = Some(sound.into());
        self
    }

    pub fn set_badge(mut self, badge: impl ToString) -> Self {
        self.display().badge = Some(badge.to_string());
        self
    }

    pub fn set_custom_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn set_collapse_key(mut self, key: impl Into<String>) -> Self {
        self.collapse_key = Some(key.into());
        self
    }

    pub fn set_time_to_live(mut self, seconds: i64) -> Self {
        self.time_to_live = Some(seconds);
        self
    }

    pub fn get_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&Notification> for GcmPayload {
    fn from(n: &Notification) -> Self {
        let mut payload = GcmPayload::new().set_alert(n.body.as_str());
        if let Some(title) = &n.title {
            payload = payload.set_title(title.as_str());
        }
        if let Some(sound) = &n.sound {
            payload = payload.set_sound(sound.as_str());
        }
        if let Some(badge) = n.badge {
            payload = payload.set_badge(badge);
        }
        for (key, value) in &n.data {
            payload = payload.set_custom_data(key.as_str(), value.as_str());
        }
        payload
    }
}

pub struct GcmDispatcher {
    inner: MulticastDispatcher,
}

impl GcmDispatcher {
    pub fn new(config: GcmConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            inner: MulticastDispatcher::new(
                ProviderType::Gcm,
                config.send_url,
                config.api_key,
                http,
            ),
        }
    }

    /// Send one request addressing every endpoint of `request`.
    pub fn push(&self, request: MulticastRequest) -> Response {
        self.inner.push(request)
    }
}

impl Dispatcher for GcmDispatcher {
    fn provider(&self) -> ProviderType {
        ProviderType::Gcm
    }

    fn dispatch(&self, endpoints: &Endpoints, notification: &Notification) -> Vec<Response> {
        let request = MulticastRequest::new()
            .set_endpoints(endpoints.clone())
            .set_payload(notification.into());
        vec![self.push(request)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::DeliveryStatus;
    use crate::test_support::{
        answering, capture_logs, error_count, logged, unreachable, untouched, warning_count,
    };
    use crate::transport::{HttpResponse, MockHttpTransport};

    fn dispatcher(http: MockHttpTransport) -> GcmDispatcher {
        GcmDispatcher::new(GcmConfig::new("secret-key"), Arc::new(http))
    }

    fn ok(body: &str) -> MockHttpTransport {
        answering(HttpResponse::new(200, body))
    }

    #[test]
    fn batch_results_map_by_position() {
        capture_logs();
        let http = ok(r#"{"results":[{"message_id":"1"},{"error":"InvalidRegistration"}]}"#);
        let request = MulticastRequest::new().set_endpoints(vec!["tok1", "tok2"]);
        let response = dispatcher(http).push(request);

        assert_eq!(response.get_status("tok1"), DeliveryStatus::Success);
        assert_eq!(response.get_status("tok2"), DeliveryStatus::InvalidEndpoint);
        assert_eq!(response.get_status("tok3"), DeliveryStatus::Unknown);
        assert_eq!(warning_count(), 1);
    }

    #[test]
    fn order_is_preserved_across_the_batch() {
        let http = ok(r#"{"failure":1,"results":[{},{"error":"NotRegistered"},{}]}"#);
        let request = MulticastRequest::new().set_endpoints(vec!["A", "B", "C"]);
        let response = dispatcher(http).push(request);
        assert_eq!(response.get_status("A"), DeliveryStatus::Success);
        assert_eq!(response.get_status("B"), DeliveryStatus::InvalidEndpoint);
        assert_eq!(response.get_status("C"), DeliveryStatus::Success);
    }

    #[test]
    fn short_result_list_leaves_the_rest_unknown() {
        capture_logs();
        let http = ok(r#"{"results":[{}]}"#);
        let request = MulticastRequest::new().set_endpoints(vec!["A", "B", "C"]);
        let response = dispatcher(http).push(request);
        assert_eq!(response.get_status("A"), DeliveryStatus::Success);
        assert_eq!(response.get_status("B"), DeliveryStatus::Unknown);
        assert_eq!(response.get_status("C"), DeliveryStatus::Unknown);
        assert_eq!(warning_count(), 2);
    }

    #[test]
    fn canonical_ids_are_exposed() {
        let http = ok(r#"{"results":[{"message_id":"1","registration_id":"tok1-new"}]}"#);
        let request = MulticastRequest::new().set_endpoints("tok1");
        let response = dispatcher(http).push(request);
        assert_eq!(response.get_status("tok1"), DeliveryStatus::Success);
        assert_eq!(response.canonical_id("tok1"), Some("tok1-new"));
    }

    #[test]
    fn full_success_logs_nothing() {
        capture_logs();
        let http = ok(r#"{"results":[{},{}]}"#);
        let request = MulticastRequest::new().set_endpoints(vec!["a", "b"]);
        let response = dispatcher(http).push(request);
        assert!(response.is_success());
        assert_eq!(warning_count(), 0);
        assert_eq!(error_count(), 0);
    }

    #[test]
    fn http_status_applies_to_every_endpoint() {
        let cases = [
            (400, DeliveryStatus::Error),
            (401, DeliveryStatus::InvalidEndpoint),
            (500, DeliveryStatus::TemporaryError),
            (503, DeliveryStatus::TemporaryError),
            (302, DeliveryStatus::Unknown),
        ];
        for (code, expected) in cases {
            capture_logs();
            let http = answering(HttpResponse::new(code, r#"{"error":"whatever"}"#));
            let request = MulticastRequest::new().set_endpoints(vec!["a", "b"]);
            let response = dispatcher(http).push(request);
            assert_eq!(response.get_status("a"), expected, "http {code}");
            assert_eq!(response.get_status("b"), expected, "http {code}");
            assert_eq!(warning_count(), 2, "http {code}");
        }
    }

    #[test]
    fn network_error_fails_every_endpoint_with_one_log() {
        capture_logs();
        let http = unreachable("connection refused");
        let request = MulticastRequest::new().set_endpoints(vec!["a", "b", "c"]);
        let response = dispatcher(http).push(request);
        for endpoint in ["a", "b", "c"] {
            assert_eq!(response.get_status(endpoint), DeliveryStatus::Error);
        }
        assert_eq!(error_count(), 1);
        assert_eq!(warning_count(), 0);
        assert!(logged("connection refused"));
    }

    #[test]
    fn unparseable_success_body_is_unknown() {
        let request = MulticastRequest::new().set_endpoints("a");
        let response = dispatcher(ok("<html>")).push(request);
        assert_eq!(response.get_status("a"), DeliveryStatus::Unknown);
    }

    #[test]
    fn empty_request_makes_no_call() {
        capture_logs();
        let response = dispatcher(untouched()).push(MulticastRequest::new());
        assert!(response.is_empty());
        assert_eq!(warning_count(), 1);
    }

    #[test]
    fn request_carries_key_and_payload() {
        let mut http = MockHttpTransport::new();
        http.expect_post()
            .withf(|request| {
                let body: Value = serde_json::from_str(&request.body).unwrap();
                request.url == GCM_SEND_URL
                    && request.header("authorization") == Some("key=secret-key")
                    && request.header("content-type") == Some("application/json")
                    && body["to"] == "tok1"
                    && body["collapse_key"] == "news"
                    && body["time_to_live"] == -5
                    && body["notification"]["body"] == "hello"
                    && body["data"]["id"] == 7
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"results":[{}]}"#)));

        let payload = GcmPayload::new()
            .set_alert("hello")
            .set_collapse_key("news")
            .set_time_to_live(-5)
            .set_custom_data("id", 7);
        let request = MulticastRequest::new()
            .set_endpoints("tok1")
            .set_payload(payload);
        assert!(dispatcher(http).push(request).is_success());
    }

    #[test]
    fn identical_setters_give_identical_payloads() {
        let build = || {
            GcmPayload::new()
                .set_title("t")
                .set_alert("a")
                .set_badge(3)
                .set_sound("default")
                .set_custom_data("k", "v")
                .set_time_to_live(60)
        };
        let first = build().get_payload().unwrap();
        assert_eq!(first, build().get_payload().unwrap());
        assert_eq!(
            first,
            r#"{"time_to_live":60,"notification":{"title":"t","body":"a","sound":"default","badge":"3"},"data":{"k":"v"}}"#
        );
    }

    #[test]
    fn dispatch_sends_a_single_multicast_call() {
        let http = ok(r#"{"results":[{},{}]}"#);
        let notification = Notification::new("body")
            .with_title("title")
            .with_data("k", "v");
        let endpoints = Endpoints::from(vec!["a", "b"]);
        let responses = dispatcher(http).dispatch(&endpoints, &notification);
        assert_eq!(responses.len(), 1);
        assert!(responses[0].is_success());
    }
}
