//! Microsoft Push Notification Service (Windows Phone).
//!
//! The endpoint is the channel URI handed out by the device, one per call.
use crate::providers::{Dispatcher, Endpoints, Notification, ProviderType};
use crate::status::{DeliveryStatus, Response, ResponseBuilder};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, Copy, Clone, Default)]
pub struct MpnsConfig {}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum MpnsKind {
    #[default]
    Toast,
    Tile,
    Raw,
}

impl MpnsKind {
    fn target(self) -> Option<&'static str> {
        match self {
            MpnsKind::Toast => Some("toast"),
            MpnsKind::Tile => Some("token"),
            MpnsKind::Raw => None,
        }
    }

    fn base_class(self) -> u8 {
        match self {
            MpnsKind::Tile => 1,
            MpnsKind::Toast => 2,
            MpnsKind::Raw => 3,
        }
    }
}

/// How soon the device should get the notification.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum DeliveryInterval {
    #[default]
    Immediate,
    Within450Seconds,
    Within900Seconds,
}

impl DeliveryInterval {
    fn class_offset(self) -> u8 {
        match self {
            DeliveryInterval::Immediate => 0,
            DeliveryInterval::Within450Seconds => 10,
            DeliveryInterval::Within900Seconds => 20,
        }
    }
}

/// Toast, tile or raw notification rendered as the XML the gateway expects.
///
/// Fields that do not apply to the chosen kind are ignored when rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpnsPayload {
    kind: MpnsKind,
    title: Option<String>,
    alert: Option<String>,
    param: Option<String>,
    background_image: Option<String>,
    count: Option<i64>,
    body: String,
}

impl MpnsPayload {
    pub fn toast() -> Self {
        Self {
            kind: MpnsKind::Toast,
            ..Default::default()
        }
    }

    pub fn tile() -> Self {
        Self {
            kind: MpnsKind::Tile,
            ..Default::default()
        }
    }

    pub fn raw() -> Self {
        Self {
            kind: MpnsKind::Raw,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> MpnsKind {
        self.kind
    }

    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Second line of a toast.
    pub fn set_alert(mut self, alert: impl Into<String>) -> Self {
        self.alert = Some(alert.into());
        self
    }

    /// Page (and query string) a toast opens.
    pub fn set_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn set_background_image(mut self, uri: impl Into<String>) -> Self {
        self.background_image = Some(uri.into());
        self
    }

    /// Tile counter.
    pub fn set_badge(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    /// Raw body, sent verbatim.
    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get_payload(&self) -> String {
        if self.kind == MpnsKind::Raw {
            return self.body.clone();
        }
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="utf-8"?><wp:Notification xmlns:wp="WPNotification">"#,
        );
        match self.kind {
            MpnsKind::Raw => {}
            MpnsKind::Toast => {
                xml.push_str("<wp:Toast>");
                push_element(&mut xml, "wp:Text1", self.title.as_deref());
                push_element(&mut xml, "wp:Text2", self.alert.as_deref());
                push_element(&mut xml, "wp:Param", self.param.as_deref());
                xml.push_str("</wp:Toast>");
            }
            MpnsKind::Tile => {
                xml.push_str("<wp:Tile>");
                let image = self.background_image.as_deref();
                push_element(&mut xml, "wp:BackgroundImage", image);
                let count = self.count.map(|c| c.to_string());
                push_element(&mut xml, "wp:Count", count.as_deref());
                push_element(&mut xml, "wp:Title", self.title.as_deref());
                xml.push_str("</wp:Tile>");
            }
        }
        xml.push_str("</wp:Notification>");
        xml
    }
}

fn push_element(xml: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        xml.push_str(&format!("<{name}>{}</{name}>", escape_xml(value)));
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl From<&Notification> for MpnsPayload {
    fn from(n: &Notification) -> Self {
        let mut payload = MpnsPayload::toast().set_alert(n.body.as_str());
        if let Some(title) = &n.title {
            payload = payload.set_title(title.as_str());
        }
        payload
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpnsRequest {
    endpoint: String,
    payload: MpnsPayload,
    interval: DeliveryInterval,
}

impl MpnsRequest {
    pub fn new() -> Self {
        Default::default()
    }

    /// Channel URI of the device.
    pub fn set_endpoint(mut self, uri: impl Into<String>) -> Self {
        self.endpoint = uri.into();
        self
    }

    pub fn set_payload(mut self, payload: MpnsPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn set_interval(mut self, interval: DeliveryInterval) -> Self {
        self.interval = interval;
        self
    }

    fn notification_class(&self) -> u8 {
        self.payload.kind.base_class() + self.interval.class_offset()
    }
}

pub struct MpnsDispatcher {
    http: Arc<dyn HttpTransport>,
}

impl MpnsDispatcher {
    pub fn new(_config: MpnsConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self { http }
    }

    pub fn push(&self, request: MpnsRequest) -> Response {
        if request.endpoint.is_empty() {
            warn!("MPNS push requested without a channel URI");
            return ResponseBuilder::new(ProviderType::Mpns, &[]).build();
        }
        let endpoints = [request.endpoint.clone()];
        let builder = ResponseBuilder::new(ProviderType::Mpns, &endpoints);

        let body = request.payload.get_payload();
        let class = request.notification_class().to_string();
        let mut http_request = HttpRequest::new(request.endpoint.as_str(), body)
            .with_header("Content-Type", "text/xml")
            .with_header("X-NotificationClass", class);
        if let Some(target) = request.payload.kind.target() {
            http_request = http_request.with_header("X-WindowsPhone-Target", target);
        }

        debug!("Posting MPNS request to {}", request.endpoint);
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

    let notification = response.header("X-NotificationStatus").unwrap_or("");
    let status = match response.status {
        200 => match notification {
            "Received" => DeliveryStatus::Success,
            "QueueFull" => DeliveryStatus::TemporaryError,
            "Suppressed" => DeliveryStatus::ClientError,
            _ => DeliveryStatus::Unknown,
        },
        400 => DeliveryStatus::Error,
        401 | 404 => DeliveryStatus::InvalidEndpoint,
        405 => DeliveryStatus::ClientError,
        406 | 412 | 503 => DeliveryStatus::TemporaryError,
        _ => DeliveryStatus::Unknown,
    };
    let message = format!(
        "HttpCode={} NotificationStatus={notification} DeviceConnectionStatus={} SubscriptionStatus={}",
        response.status,
        response.header("X-DeviceConnectionStatus").unwrap_or(""),
        response.header("X-SubscriptionStatus").unwrap_or(""),
    );
    builder.record(endpoint, status, &message);
    builder.build()
}

impl Dispatcher for MpnsDispatcher {
    fn provider(&self) -> ProviderType {
        ProviderType::Mpns
    }

    fn dispatch(&self, endpoints: &Endpoints, notification: &Notification) -> Vec<Response> {
        let payload = MpnsPayload::from(notification);
        endpoints
            .iter()
            .map(|uri| {
                self.push(
                    MpnsRequest::new()
                        .set_endpoint(uri)
                        .set_payload(payload.clone()),
                )
            })
            .collect()
    }
}
