//! HTTP push adapter.
//!
//! Implements [`PushTransport`]:
//!
//! - **`target_os = "espidf"`**: one `EspHttpConnection` per push, wrapped in
//!   the `embedded-svc` HTTP client. The connection timeout is the request's
//!   timeout; HTTPS endpoints are verified against the ESP-IDF certificate
//!   bundle.
//! - **`not(target_os = "espidf")`**: simulation backend that logs the
//!   request and answers with a fixed status.

use log::debug;

use crate::app::ports::{PushRequest, PushTransport, TransportError};

#[cfg(target_os = "espidf")]
use embedded_svc::{
    http::{Method, Status, client::Client as HttpClient},
    io::Write,
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};
#[cfg(target_os = "espidf")]
use log::warn;

/// Most headers a push carries (auth, content type, content length).
#[cfg(target_os = "espidf")]
const MAX_HEADERS: usize = 4;

pub struct HttpPushTransport {
    #[cfg(not(target_os = "espidf"))]
    sim_status: u16,
}

impl Default for HttpPushTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpPushTransport {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim_status: 200,
        }
    }

    /// Simulation: status code every push will receive.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_sim_status(status: u16) -> Self {
        Self { sim_status: status }
    }

    #[cfg(target_os = "espidf")]
    fn post_once(request: &PushRequest<'_>) -> Result<u16, TransportError> {
        let started = std::time::Instant::now();
        let classify = |stage: &str, e: &dyn core::fmt::Debug| {
            warn!("HttpPush: {} failed: {:?}", stage, e);
            if started.elapsed() >= request.timeout {
                TransportError::Timeout
            } else {
                TransportError::Io
            }
        };

        let config = HttpClientConfiguration {
            timeout: Some(request.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config).map_err(|e| {
            warn!("HttpPush: connection setup failed: {:?}", e);
            TransportError::Connect
        })?;
        let mut client = HttpClient::wrap(connection);

        let content_length = request.body.len().to_string();
        let mut headers: heapless::Vec<(&str, &str), MAX_HEADERS> = heapless::Vec::new();
        for h in request.headers.iter().copied() {
            if headers.push(h).is_err() {
                break;
            }
        }
        let _ = headers.push(("Content-Length", content_length.as_str()));

        let mut http = client
            .request(Method::Post, request.url, &headers)
            .map_err(|e| {
                warn!("HttpPush: connect to {} failed: {:?}", request.url, e);
                if started.elapsed() >= request.timeout {
                    TransportError::Timeout
                } else {
                    TransportError::Connect
                }
            })?;
        http.write_all(request.body).map_err(|e| classify("send", &e))?;
        http.flush().map_err(|e| classify("flush", &e))?;
        let response = http.submit().map_err(|e| classify("response", &e))?;
        Ok(response.status())
    }
}

impl PushTransport for HttpPushTransport {
    #[cfg(target_os = "espidf")]
    fn post(&mut self, request: &PushRequest<'_>) -> Result<u16, TransportError> {
        debug!("HttpPush: POST {} ({} bytes)", request.url, request.body.len());
        Self::post_once(request)
    }

    #[cfg(not(target_os = "espidf"))]
    fn post(&mut self, request: &PushRequest<'_>) -> Result<u16, TransportError> {
        debug!(
            "HttpPush(sim): POST {} ({} bytes, {} headers) -> {}",
            request.url,
            request.body.len(),
            request.headers.len(),
            self.sim_status
        );
        Ok(self.sim_status)
    }
}
