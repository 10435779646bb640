use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use log::debug;
use std::time::Duration;
use ureq::Error;

/// [`HttpTransport`] backed by a blocking `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        let agent = ureq::builder()
            .timeout_connect(connect_timeout)
            .timeout(timeout)
            .build();
        Self { agent }
    }

    fn convert(response: ureq::Response) -> HttpResponse {
        let status = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = match response.into_string() {
            Ok(s) => s,
            Err(e) => {
                debug!("Failed to read response body: {e}");
                String::new()
            }
        };
        HttpResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(120))
    }
}

impl HttpTransport for UreqTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut outgoing = self.agent.post(&request.url);
        for (name, value) in &request.headers {
            outgoing = outgoing.set(name, value);
        }

        match outgoing.send_string(&request.body) {
            Ok(response) => Ok(Self::convert(response)),
            Err(e) => match e {
                Error::Status(_, response) => Ok(Self::convert(response)),
                Error::Transport(e) => Err(TransportError(e.to_string())),
            },
        }
    }
}
