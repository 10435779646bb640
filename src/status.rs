//! Normalized delivery outcomes shared by every provider.
use crate::providers::ProviderType;
use log::{error, warn};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Outcome of delivering one notification to one endpoint.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DeliveryStatus {
    /// No information available for the endpoint.
    #[default]
    Unknown,
    /// Accepted by the provider.
    Success,
    /// Retry later.
    TemporaryError,
    /// The endpoint is permanently unusable, stop sending to it.
    InvalidEndpoint,
    /// The provider rejected how the client used the service.
    ClientError,
    /// Malformed request or unclassified rejection.
    Error,
}

impl DeliveryStatus {
    pub fn is_success(self) -> bool {
        self == DeliveryStatus::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Unknown => "UNKNOWN",
            DeliveryStatus::Success => "SUCCESS",
            DeliveryStatus::TemporaryError => "TEMPORARY_ERROR",
            DeliveryStatus::InvalidEndpoint => "INVALID_ENDPOINT",
            DeliveryStatus::ClientError => "CLIENT_ERROR",
            DeliveryStatus::Error => "ERROR",
        }
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one dispatch call.
///
/// Every endpoint targeted by the call resolves to exactly one status. Any other
/// endpoint reports [`DeliveryStatus::Unknown`].
#[derive(Debug, Clone)]
pub struct Response {
    provider: ProviderType,
    endpoints: Vec<String>,
    statuses: HashMap<String, DeliveryStatus>,
    canonical_ids: HashMap<String, String>,
}

impl Response {
    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    pub fn get_status(&self, endpoint: &str) -> DeliveryStatus {
        self.statuses.get(endpoint).copied().unwrap_or_default()
    }

    /// Replacement token the provider asked us to use for `endpoint` from now on.
    pub fn canonical_id(&self, endpoint: &str) -> Option<&str> {
        self.canonical_ids.get(endpoint).map(String::as_str)
    }

    /// Targeted endpoints with their status, in submission order.
    pub fn statuses(&self) -> impl Iterator<Item = (&str, DeliveryStatus)> + '_ {
        self.endpoints
            .iter()
            .map(|e| (e.as_str(), self.get_status(e)))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// True when at least one endpoint was targeted and all of them succeeded.
    pub fn is_success(&self) -> bool {
        !self.endpoints.is_empty() && self.statuses().all(|(_, s)| s.is_success())
    }
}

/// Accumulates per-endpoint statuses while a provider response is normalized.
///
/// Each non-success status is logged when recorded; endpoints never recorded are
/// logged as unknown when the response is built.
pub(crate) struct ResponseBuilder {
    provider: ProviderType,
    endpoints: Vec<String>,
    statuses: HashMap<String, DeliveryStatus>,
    canonical_ids: HashMap<String, String>,
}

impl ResponseBuilder {
    pub fn new(provider: ProviderType, endpoints: &[String]) -> Self {
        Self {
            provider,
            endpoints: endpoints.to_vec(),
            statuses: HashMap::with_capacity(endpoints.len()),
            canonical_ids: HashMap::new(),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn record(&mut self, endpoint: &str, status: DeliveryStatus, message: &str) {
        if !status.is_success() {
            warn!(
                "{} delivery to {endpoint} failed: Status={status} Message={message}",
                self.provider
            );
        }
        self.statuses.insert(endpoint.to_string(), status);
    }

    pub fn canonical_id(&mut self, endpoint: &str, id: String) {
        self.canonical_ids.insert(endpoint.to_string(), id);
    }

    /// Record the same outcome for every endpoint.
    pub fn record_all(mut self, status: DeliveryStatus, message: &str) -> Self {
        for endpoint in self.endpoints.clone() {
            self.record(&endpoint, status, message);
        }
        self
    }

    /// Marks every endpoint as failed with a single error log entry.
    pub fn fail_all(mut self, reason: impl Display) -> Response {
        error!(
            "{} request for {} endpoint(s) failed: {reason}",
            self.provider,
            self.endpoints.len()
        );
        for endpoint in &self.endpoints {
            self.statuses.insert(endpoint.clone(), DeliveryStatus::Error);
        }
        self.build()
    }

    pub fn build(mut self) -> Response {
        for endpoint in &self.endpoints {
            if !self.statuses.contains_key(endpoint) {
                warn!(
                    "{} delivery to {endpoint} failed: Status={} Message=no result reported",
                    self.provider,
                    DeliveryStatus::Unknown
                );
                self.statuses.insert(endpoint.clone(), DeliveryStatus::Unknown);
            }
        }
        Response {
            provider: self.provider,
            endpoints: self.endpoints,
            statuses: self.statuses,
            canonical_ids: self.canonical_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{capture_logs, error_count, warning_count};

    fn endpoints() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn untargeted_endpoint_is_unknown() {
        let mut builder = ResponseBuilder::new(ProviderType::Gcm, &endpoints());
        builder.record("a", DeliveryStatus::Success, "");
        builder.record("b", DeliveryStatus::Success, "");
        let response = builder.build();
        assert_eq!(response.get_status("a"), DeliveryStatus::Success);
        assert_eq!(response.get_status("c"), DeliveryStatus::Unknown);
        assert!(response.is_success());
    }

    #[test]
    fn unrecorded_endpoint_is_logged_once() {
        capture_logs();
        let mut builder = ResponseBuilder::new(ProviderType::Gcm, &endpoints());
        builder.record("a", DeliveryStatus::Success, "");
        let response = builder.build();
        assert_eq!(response.get_status("b"), DeliveryStatus::Unknown);
        assert!(!response.is_success());
        assert_eq!(warning_count(), 1);
    }

    #[test]
    fn fail_all_logs_a_single_error() {
        capture_logs();
        let response =
            ResponseBuilder::new(ProviderType::Fcm, &endpoints()).fail_all("connection refused");
        assert_eq!(response.get_status("a"), DeliveryStatus::Error);
        assert_eq!(response.get_status("b"), DeliveryStatus::Error);
        assert_eq!(error_count(), 1);
        assert_eq!(warning_count(), 0);
    }

    #[test]
    fn statuses_keep_submission_order() {
        let response = ResponseBuilder::new(ProviderType::Gcm, &endpoints())
            .record_all(DeliveryStatus::TemporaryError, "unavailable")
            .build();
        let order: Vec<_> = response.statuses().map(|(e, _)| e).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn empty_response_is_not_success() {
        let response = ResponseBuilder::new(ProviderType::Email, &[]).build();
        assert!(response.is_empty());
        assert!(!response.is_success());
    }
}
