//! Template input built from an inbound HTTP request.
//!
//! Used by producers that turn incoming calls into events. Receiving the
//! request is the caller's job; this only describes it to a template:
//!
//! ```json
//! {
//!   "method": "POST",
//!   "host": "localhost:8080",
//!   "url": { "scheme": "http", "hostname": "localhost", "path": "/", "query": { "a": ["1"] } },
//!   "header": { "Content-Type": ["application/json"] },
//!   "body": { "name": "Alex" }
//! }
//! ```

use reqwest::Method;
use reqwest::header::{HOST, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use url::Url;

use crate::error::DecodeError;
use crate::response::headers_to_value;

/// An HTTP request received by the caller.
#[derive(Debug, Clone)]
pub struct InboundRequest {
  pub method: Method,
  pub url: Url,
  pub headers: HeaderMap,
  pub body: Vec<u8>,
}

impl InboundRequest {
  pub fn new(method: Method, url: Url) -> Self {
    Self {
      method,
      url,
      headers: HeaderMap::new(),
      body: Vec::new(),
    }
  }

  pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
    self.headers.append(name, value);
    self
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  /// The `Host` header if present, otherwise host and port of the URL.
  pub fn host(&self) -> String {
    if let Some(host) = self.headers.get(HOST).and_then(|h| h.to_str().ok()) {
      return host.to_string();
    }
    match (self.url.host_str(), self.url.port()) {
      (Some(host), Some(port)) => format!("{}:{}", host, port),
      (Some(host), None) => host.to_string(),
      _ => String::new(),
    }
  }
}

/// Build template input for `request`. A non-empty body must be JSON.
pub fn request_to_input(request: &InboundRequest) -> Result<Map<String, Value>, DecodeError> {
  let mut query = Map::new();
  for (name, value) in request.url.query_pairs() {
    let values = query
      .entry(name.into_owned())
      .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(values) = values {
      values.push(Value::String(value.into_owned()));
    }
  }

  let mut url = Map::new();
  url.insert(
    "scheme".to_string(),
    Value::String(request.url.scheme().to_string()),
  );
  url.insert(
    "hostname".to_string(),
    Value::String(request.url.host_str().unwrap_or_default().to_string()),
  );
  url.insert(
    "path".to_string(),
    Value::String(request.url.path().to_string()),
  );
  url.insert("query".to_string(), Value::Object(query));

  let mut input = Map::new();
  input.insert(
    "method".to_string(),
    Value::String(request.method.to_string()),
  );
  input.insert("host".to_string(), Value::String(request.host()));
  input.insert("url".to_string(), Value::Object(url));
  input.insert("header".to_string(), headers_to_value(&request.headers));

  if !request.body.is_empty() {
    let body = serde_json::from_slice(&request.body)
      .map_err(|e| DecodeError::new("request body", &request.body, e))?;
    input.insert("body".to_string(), body);
  }

  Ok(input)
}
