//! Mapping an HTTP response into template input.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: Vec<u8>,
}

impl HttpResponse {
  /// An empty response with `status`.
  pub fn new(status: StatusCode) -> Self {
    Self {
      status,
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

  /// Status line text, e.g. `200 OK`.
  pub fn status_text(&self) -> String {
    match self.status.canonical_reason() {
      Some(reason) => format!("{} {}", self.status.as_u16(), reason),
      None => self.status.as_u16().to_string(),
    }
  }
}

/// Map `response` to `{status, statusCode, header, body}`.
///
/// `body` is only set when the response has one. With `json_body` the body
/// must be JSON; anything else is an error rather than a string fallback.
/// Without a response (no call was made) the map is empty.
pub fn response_to_map(
  response: Option<&HttpResponse>,
  json_body: bool,
) -> Result<Map<String, Value>, DecodeError> {
  let mut map = Map::new();
  let Some(response) = response else {
    return Ok(map);
  };

  map.insert("status".to_string(), Value::String(response.status_text()));
  map.insert(
    "statusCode".to_string(),
    Value::from(response.status.as_u16()),
  );
  map.insert("header".to_string(), headers_to_value(&response.headers));

  if !response.body.is_empty() {
    let body = if json_body {
      serde_json::from_slice(&response.body)
        .map_err(|e| DecodeError::new("response body", &response.body, e))?
    } else {
      Value::String(String::from_utf8_lossy(&response.body).into_owned())
    };
    map.insert("body".to_string(), body);
  }

  Ok(map)
}

/// Header name to the list of its values, in arrival order.
///
/// Names are keyed in canonical form (`Content-Type`), whatever case they
/// arrived in.
pub(crate) fn headers_to_value(headers: &HeaderMap) -> Value {
  let mut map = Map::new();
  for name in headers.keys() {
    let values = headers
      .get_all(name)
      .iter()
      .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
      .collect();
    map.insert(canonical_header_name(name.as_str()), Value::Array(values));
  }
  Value::Object(map)
}

/// `content-type` to `Content-Type`: each `-` separated word capitalized.
pub(crate) fn canonical_header_name(name: &str) -> String {
  name
    .split('-')
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join("-")
}
