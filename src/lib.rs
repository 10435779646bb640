//! Push notification dispatch for GCM, FCM, APNS, MPNS and e-mail.
//!
//! Each provider builds its wire payload, performs one blocking call through an
//! [`transport::HttpTransport`] or [`transport::MailTransport`], and turns whatever
//! the gateway answered into a [`DeliveryStatus`] per endpoint. Failures never
//! surface as errors from `push`, only as statuses on the returned [`Response`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use vortex::providers::gcm::{GcmConfig, GcmDispatcher, GcmPayload};
//! use vortex::providers::MulticastRequest;
//! use vortex::transport::UreqTransport;
//! use vortex::DeliveryStatus;
//!
//! let transport = Arc::new(UreqTransport::default());
//! let dispatcher = GcmDispatcher::new(GcmConfig::new("api-key"), transport);
//! let response = dispatcher.push(
//!     MulticastRequest::new()
//!         .set_endpoints(vec!["tok1", "tok2"])
//!         .set_payload(GcmPayload::new().set_alert("Hello")),
//! );
//! if response.get_status("tok2") == DeliveryStatus::InvalidEndpoint {
//!     // forget tok2
//! }
//! ```
#![warn(
    missing_copy_implementations,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    trivial_casts,
    unused_qualifications
)]

pub mod providers;
pub mod status;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use providers::{
    new_dispatcher, Dispatcher, Endpoints, Notification, ProviderType, ProvidersConfig,
};
pub use status::{DeliveryStatus, Response};
