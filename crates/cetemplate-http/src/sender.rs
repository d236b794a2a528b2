//! Sending a parsed request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, HOST};
use tracing::{debug, instrument, warn};

use crate::error::TransportError;
use crate::request::WireRequest;
use crate::response::HttpResponse;

/// Performs a single HTTP round trip.
///
/// Implementations make exactly one attempt and never retry; `timeout`
/// bounds the whole call, connect and transfer included.
#[async_trait]
pub trait HttpSend: Send + Sync {
  async fn send(
    &self,
    request: WireRequest,
    timeout: Duration,
  ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpSend`] over reqwest, building a client per call.
#[derive(Debug, Clone, Default)]
pub struct ReqwestSender;

impl ReqwestSender {
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl HttpSend for ReqwestSender {
  #[instrument(
    name = "http_send",
    skip(self, request),
    fields(method = %request.method, url = %request.url)
  )]
  async fn send(
    &self,
    request: WireRequest,
    timeout: Duration,
  ) -> Result<HttpResponse, TransportError> {
    // A fresh client per call so one call's timeout never applies to another.
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|source| TransportError::Client { source })?;

    let url = request.url.to_string();

    // The URL carries the host and reqwest frames the body itself.
    let mut headers = request.headers;
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);

    let mut builder = client.request(request.method, request.url).headers(headers);
    if let Some(body) = request.body {
      debug!(body = %body, "request body");
      builder = builder.body(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| classify(e, &url, timeout))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
      .bytes()
      .await
      .map_err(|e| classify(e, &url, timeout))?;

    debug!(status = %status, body_len = body.len(), "response received");

    Ok(HttpResponse {
      status,
      headers,
      body: body.to_vec(),
    })
  }
}

fn classify(error: reqwest::Error, url: &str, timeout: Duration) -> TransportError {
  // A connect timeout never reached the peer, so connect is checked first.
  let error = if error.is_connect() {
    TransportError::Connect {
      url: url.to_string(),
      source: error,
    }
  } else if error.is_timeout() {
    TransportError::Timeout {
      url: url.to_string(),
      timeout_ms: timeout.as_millis() as u64,
    }
  } else {
    TransportError::Request {
      url: url.to_string(),
      message: error.to_string(),
    }
  };
  warn!(error = %error, "http call failed");
  error
}
