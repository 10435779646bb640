//! Firebase Cloud Messaging, legacy HTTP protocol.
//!
//! Wire format and error codes are the GCM ones, only the gateway differs.
use crate::providers::gcm::GcmPayload;
use crate::providers::multicast::{MulticastDispatcher, MulticastRequest};
use crate::providers::{ApiKey, Dispatcher, Endpoints, Notification, ProviderType};
use crate::status::Response;
use crate::transport::HttpTransport;
use serde::Deserialize;
use std::sync::Arc;

pub const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

pub type FcmPayload = GcmPayload;

#[derive(Debug, Deserialize, Clone)]
pub struct FcmConfig {
    pub api_key: ApiKey,
    #[serde(default = "default_send_url")]
    pub send_url: String,
}

fn default_send_url() -> String {
    FCM_SEND_URL.to_string()
}

impl FcmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            send_url: default_send_url(),
        }
    }
}

pub struct FcmDispatcher {
    inner: MulticastDispatcher,
}

impl FcmDispatcher {
    pub fn new(config: FcmConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            inner: MulticastDispatcher::new(
                ProviderType::Fcm,
                config.send_url,
                config.api_key,
                http,
            ),
        }
    }

    pub fn push(&self, request: MulticastRequest) -> Response {
        self.inner.push(request)
    }
}

impl Dispatcher for FcmDispatcher {
    fn provider(&self) -> ProviderType {
        ProviderType::Fcm
    }

    fn dispatch(&self, endpoints: &Endpoints, notification: &Notification) -> Vec<Response> {
        let request = MulticastRequest::new()
            .set_endpoints(endpoints.clone())
            .set_payload(FcmPayload::from(notification));
        vec![self.push(request)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::DeliveryStatus;
    use crate::test_support::{answering, capture_logs, warning_count};
    use crate::transport::{HttpResponse, MockHttpTransport};

    #[test]
    fn posts_to_the_firebase_gateway() {
        let mut http = MockHttpTransport::new();
        http.expect_post()
            .withf(|request| request.url == FCM_SEND_URL)
            .times(1)
            .returning(|_| {
                let body = r#"{"failure":1,"results":[{"error":"Unavailable"},{}]}"#;
                Ok(HttpResponse::new(200, body))
            });
        let dispatcher = FcmDispatcher::new(FcmConfig::new("k"), Arc::new(http));
        let request = MulticastRequest::new().set_endpoints(vec!["a", "b"]);
        let response = dispatcher.push(request);

        assert_eq!(response.provider(), ProviderType::Fcm);
        assert_eq!(response.get_status("a"), DeliveryStatus::TemporaryError);
        assert_eq!(response.get_status("b"), DeliveryStatus::Success);
    }

    #[test]
    fn rate_limited_topic_is_temporary() {
        capture_logs();
        let http = answering(HttpResponse::new(
            200,
            r#"{"results":[{"error":"TopicsMessageRateExceeded"}]}"#,
        ));
        let dispatcher = FcmDispatcher::new(FcmConfig::new("k"), Arc::new(http));
        let request = MulticastRequest::new().set_endpoints("/topics/news");
        let response = dispatcher.push(request);
        assert_eq!(
            response.get_status("/topics/news"),
            DeliveryStatus::TemporaryError
        );
        assert_eq!(warning_count(), 1);
    }
}
