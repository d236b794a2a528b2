//! HTTP bridge error types.

use cetemplate_event::excerpt;
use thiserror::Error;

/// Rendered text is not a well-formed HTTP/1.1 request.
#[derive(Debug, Error)]
#[error("invalid request text: {message} (text: {excerpt:?})")]
pub struct ParseError {
  pub message: String,
  pub excerpt: String,
}

impl ParseError {
  pub(crate) fn new(message: impl Into<String>, text: &str) -> Self {
    Self {
      message: message.into(),
      excerpt: excerpt(text),
    }
  }
}

/// The request could not be completed.
#[derive(Debug, Error)]
pub enum TransportError {
  /// The HTTP client could not be built; nothing was sent.
  #[error("failed to build http client: {source}")]
  Client {
    #[source]
    source: reqwest::Error,
  },

  /// No connection could be established; the peer never saw the request.
  #[error("failed to connect to {url}: {source}")]
  Connect {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The timeout elapsed before the round trip finished.
  #[error("request to {url} timed out after {timeout_ms}ms")]
  Timeout { url: String, timeout_ms: u64 },

  /// The request failed after it may have been sent.
  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },
}

impl TransportError {
  /// Whether the request may have reached the peer before failing.
  pub fn may_have_reached_peer(&self) -> bool {
    match self {
      Self::Client { .. } | Self::Connect { .. } => false,
      Self::Timeout { .. } | Self::Request { .. } => true,
    }
  }
}

/// A response body that had to be JSON was not.
#[derive(Debug, Error)]
#[error("{what} is not valid JSON: {source} (body: {excerpt:?})")]
pub struct DecodeError {
  pub what: &'static str,
  pub excerpt: String,
  #[source]
  pub source: serde_json::Error,
}

impl DecodeError {
  pub(crate) fn new(what: &'static str, body: &[u8], source: serde_json::Error) -> Self {
    Self {
      what,
      excerpt: excerpt(&String::from_utf8_lossy(body)),
      source,
    }
  }
}

#[cfg(test)]
mod tests {
  use cetemplate_event::EXCERPT_LIMIT;

  use super::*;

  #[test]
  fn test_long_body_excerpt_is_cut() {
    let body = "x".repeat(EXCERPT_LIMIT * 2);
    let source = serde_json::from_str::<serde_json::Value>(&body).unwrap_err();
    let err = DecodeError::new("response body", body.as_bytes(), source);

    assert_eq!(err.excerpt.len(), EXCERPT_LIMIT + 3);
    assert!(err.excerpt.ends_with("..."));
  }
}
