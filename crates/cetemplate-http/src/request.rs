//! Parsing of rendered HTTP/1.1 request text.
//!
//! The text is read the way a template author writes it by hand:
//!
//! ```text
//! POST http://localhost:8080/person HTTP/1.1
//! content-type: application/json
//!
//! { "name": "Alex" }
//! ```
//!
//! Everything after the first blank line is the body, verbatim. There is no
//! `Content-Length` or chunked framing; templates are not expected to compute
//! lengths. Lines may end in `\n` or `\r\n`.

use reqwest::Method;
use reqwest::header::{HOST, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::ParseError;

/// A request parsed from wire text, ready to send.
#[derive(Debug, Clone)]
pub struct WireRequest {
  pub method: Method,
  /// Absolute URL, from an absolute request target or from the `Host` header.
  pub url: Url,
  pub headers: HeaderMap,
  /// Text after the header block, `None` when empty.
  pub body: Option<String>,
}

/// Parse `text` as an HTTP/1.1 request.
pub fn parse_request(text: &str) -> Result<WireRequest, ParseError> {
  let (head, body) = split_head(text)
    .ok_or_else(|| ParseError::new("missing blank line after the header block", text))?;

  let mut lines = head.lines();
  let request_line = lines
    .next()
    .filter(|line| !line.is_empty())
    .ok_or_else(|| ParseError::new("missing request line", text))?;
  let (method, target) = parse_request_line(request_line, text)?;

  let mut headers = HeaderMap::new();
  for line in lines {
    let (name, value) = line
      .split_once(':')
      .ok_or_else(|| ParseError::new(format!("malformed header line '{}'", line), text))?;
    let name = HeaderName::from_bytes(name.as_bytes())
      .map_err(|_| ParseError::new(format!("invalid header name '{}'", name), text))?;
    let value = HeaderValue::from_str(value.trim())
      .map_err(|_| ParseError::new(format!("invalid value for header '{}'", name), text))?;
    headers.append(name, value);
  }

  let url = resolve_target(target, &headers, text)?;
  let body = (!body.is_empty()).then(|| body.to_string());

  Ok(WireRequest {
    method,
    url,
    headers,
    body,
  })
}

/// Split at the first blank line into (request line + headers, body).
fn split_head(text: &str) -> Option<(&str, &str)> {
  let mut offset = 0;
  for line in text.split_inclusive('\n') {
    let end = offset + line.len();
    if line.ends_with('\n') && line.trim_end_matches('\n').trim_end_matches('\r').is_empty() {
      return Some((&text[..offset], &text[end..]));
    }
    offset = end;
  }
  None
}

/// `METHOD request-target HTTP/1.x`
fn parse_request_line<'a>(line: &'a str, text: &str) -> Result<(Method, &'a str), ParseError> {
  let parts: Vec<&str> = line.split(' ').collect();
  let [method, target, version] = parts[..] else {
    return Err(ParseError::new(
      format!("malformed request line '{}'", line),
      text,
    ));
  };

  if version != "HTTP/1.1" && version != "HTTP/1.0" {
    return Err(ParseError::new(
      format!("unsupported protocol version '{}'", version),
      text,
    ));
  }

  let method = Method::from_bytes(method.as_bytes())
    .map_err(|_| ParseError::new(format!("invalid method '{}'", method), text))?;

  Ok((method, target))
}

/// Absolute targets are used as is; origin-form paths need a `Host` header.
fn resolve_target(target: &str, headers: &HeaderMap, text: &str) -> Result<Url, ParseError> {
  let absolute = if target.starts_with('/') {
    let host = headers
      .get(HOST)
      .and_then(|h| h.to_str().ok())
      .ok_or_else(|| ParseError::new("origin-form target requires a Host header", text))?;
    format!("http://{}{}", host.trim(), target)
  } else {
    target.to_string()
  };

  let url = Url::parse(&absolute)
    .map_err(|e| ParseError::new(format!("invalid request target '{}': {}", target, e), text))?;

  match url.scheme() {
    "http" | "https" => Ok(url),
    scheme => Err(ParseError::new(
      format!("unsupported scheme '{}'", scheme),
      text,
    )),
  }
}
