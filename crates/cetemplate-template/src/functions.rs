//! The function library available to every template.
//!
//! Everything here is registered on the environment before the template
//! source is added, and nothing is registered afterwards. Functions that take
//! a leading value are also registered as filters, so both `toJson(data)` and
//! `data | toJson` work.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind, Output, State, escape_formatter};
use sha2::{Digest, Sha256};

/// Context key holding the invocation number of the current render.
pub(crate) const COUNT_KEY: &str = "__invocation";

/// Register the full function table on `env`.
pub(crate) fn register(env: &mut Environment<'static>) {
  env.add_function("count", count);
  env.add_function("uuidv4", uuidv4);
  env.add_function("now", now);
  env.add_function("date", date);
  env.add_function("index", index);
  env.add_function("eq", eq);
  env.add_function("ne", ne);

  env.add_function("toJson", to_json);
  env.add_filter("toJson", to_json);
  env.add_function("toPrettyJson", to_pretty_json);
  env.add_filter("toPrettyJson", to_pretty_json);
  env.add_function("fromJson", from_json);
  env.add_filter("fromJson", from_json);
  env.add_function("toString", to_string);
  env.add_filter("toString", to_string);
  env.add_function("quote", quote);
  env.add_filter("quote", quote);
  env.add_function("squote", squote);
  env.add_filter("squote", squote);
  env.add_function("b64enc", b64enc);
  env.add_filter("b64enc", b64enc);
  env.add_function("b64dec", b64dec);
  env.add_filter("b64dec", b64dec);
  env.add_function("sha256sum", sha256sum);
  env.add_filter("sha256sum", sha256sum);
  env.add_function("trimPrefix", trim_prefix);
  env.add_filter("trimPrefix", trim_prefix);
  env.add_function("trimSuffix", trim_suffix);
  env.add_filter("trimSuffix", trim_suffix);
  env.add_function("hasPrefix", has_prefix);
  env.add_filter("hasPrefix", has_prefix);
  env.add_function("hasSuffix", has_suffix);
  env.add_filter("hasSuffix", has_suffix);
  env.add_function("contains", contains);
  env.add_filter("contains", contains);
}

/// Writes booleans as `true`/`false`; everything else as minijinja would.
///
/// Predicates compare rendered output against the literal `true`.
pub(crate) fn format_value(out: &mut Output, state: &State, value: &Value) -> Result<(), Error> {
  if value.kind() == ValueKind::Bool {
    out.write_str(bool_text(value))?;
    return Ok(());
  }
  escape_formatter(out, state, value)
}

fn bool_text(value: &Value) -> &'static str {
  if value.is_true() { "true" } else { "false" }
}

/// Undefined values are errors here too, not just when printed.
fn defined(value: Value) -> Result<Value, Error> {
  if value.is_undefined() {
    return Err(Error::new(
      ErrorKind::UndefinedError,
      "undefined value passed to a template function",
    ));
  }
  Ok(value)
}

/// The invocation number of the render in progress (1 for the first render).
fn count(state: &State) -> Result<Value, Error> {
  state.lookup(COUNT_KEY).ok_or_else(|| {
    Error::new(
      ErrorKind::InvalidOperation,
      "count() is only available while rendering a compiled template",
    )
  })
}

fn uuidv4() -> String {
  uuid::Uuid::new_v4().to_string()
}

/// Current UTC time in RFC 3339.
fn now() -> String {
  Utc::now().to_rfc3339()
}

/// Format a timestamp with a strftime pattern.
///
/// The timestamp may be unix seconds or an RFC 3339 string; it defaults to now.
fn date(format: &str, timestamp: Rest<Value>) -> Result<String, Error> {
  if timestamp.len() > 1 {
    return Err(Error::new(
      ErrorKind::TooManyArguments,
      "date() takes a format and at most one timestamp",
    ));
  }
  if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
    return Err(Error::new(
      ErrorKind::InvalidOperation,
      format!("invalid date format '{}'", format),
    ));
  }

  let timestamp = timestamp.first().cloned().map(defined).transpose()?;
  let at: DateTime<Utc> = match timestamp {
    None => Utc::now(),
    Some(value) if value.is_none() => Utc::now(),
    Some(value) if value.kind() == ValueKind::Number => {
      let secs = i64::try_from(value)?;
      DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        Error::new(
          ErrorKind::InvalidOperation,
          format!("timestamp {} is out of range", secs),
        )
      })?
    }
    Some(value) => {
      let text = value.as_str().ok_or_else(|| {
        Error::new(
          ErrorKind::InvalidOperation,
          "date() expects unix seconds or an RFC 3339 string",
        )
      })?;
      DateTime::parse_from_rfc3339(text)
        .map_err(|e| {
          Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid timestamp '{}': {}", text, e),
          )
        })?
        .with_timezone(&Utc)
    }
  };

  Ok(at.format_with_items(StrftimeItems::new(format)).to_string())
}

/// Walk into nested lists and maps: `index(data.values, 0)`.
///
/// A missing key or out of range position is an error rather than an empty
/// value.
fn index(collection: Value, keys: Rest<Value>) -> Result<Value, Error> {
  let mut current = defined(collection)?;
  for key in keys.iter() {
    let next = current.get_item(&defined(key.clone())?)?;
    if next.is_undefined() {
      return Err(Error::new(
        ErrorKind::UndefinedError,
        format!("index {} not found", key),
      ));
    }
    current = next;
  }
  Ok(current)
}

fn eq(a: Value, b: Value) -> Result<bool, Error> {
  Ok(defined(a)? == defined(b)?)
}

fn ne(a: Value, b: Value) -> Result<bool, Error> {
  Ok(defined(a)? != defined(b)?)
}

fn to_json(value: Value) -> Result<String, Error> {
  serde_json::to_string(&defined(value)?).map_err(|e| {
    Error::new(
      ErrorKind::BadSerialization,
      format!("value cannot be encoded as JSON: {}", e),
    )
  })
}

fn to_pretty_json(value: Value) -> Result<String, Error> {
  serde_json::to_string_pretty(&defined(value)?).map_err(|e| {
    Error::new(
      ErrorKind::BadSerialization,
      format!("value cannot be encoded as JSON: {}", e),
    )
  })
}

fn from_json(text: &str) -> Result<Value, Error> {
  let parsed: serde_json::Value = serde_json::from_str(text).map_err(|e| {
    Error::new(
      ErrorKind::InvalidOperation,
      format!("invalid JSON: {}", e),
    )
  })?;
  Ok(Value::from_serialize(&parsed))
}

/// Strings pass through unchanged, everything else uses its rendered form.
fn to_string(value: Value) -> Result<String, Error> {
  let value = defined(value)?;
  Ok(match value.as_str() {
    Some(s) => s.to_string(),
    None if value.kind() == ValueKind::Bool => bool_text(&value).to_string(),
    None => value.to_string(),
  })
}

/// Double-quote a value with JSON string escaping, usable inside JSON output.
fn quote(value: Value) -> Result<String, Error> {
  serde_json::to_string(&to_string(value)?).map_err(|e| {
    Error::new(
      ErrorKind::BadSerialization,
      format!("value cannot be quoted: {}", e),
    )
  })
}

fn squote(value: Value) -> Result<String, Error> {
  Ok(format!("'{}'", to_string(value)?))
}

fn b64enc(text: &str) -> String {
  STANDARD.encode(text)
}

fn b64dec(text: &str) -> Result<String, Error> {
  let bytes = STANDARD.decode(text).map_err(|e| {
    Error::new(
      ErrorKind::InvalidOperation,
      format!("invalid base64: {}", e),
    )
  })?;
  String::from_utf8(bytes).map_err(|e| {
    Error::new(
      ErrorKind::InvalidOperation,
      format!("decoded base64 is not UTF-8: {}", e),
    )
  })
}

fn sha256sum(text: &str) -> String {
  Sha256::digest(text.as_bytes())
    .iter()
    .map(|b| format!("{:02x}", b))
    .collect()
}

fn trim_prefix(text: &str, prefix: &str) -> String {
  text.strip_prefix(prefix).unwrap_or(text).to_string()
}

fn trim_suffix(text: &str, suffix: &str) -> String {
  text.strip_suffix(suffix).unwrap_or(text).to_string()
}

fn has_prefix(text: &str, prefix: &str) -> bool {
  text.starts_with(prefix)
}

fn has_suffix(text: &str, suffix: &str) -> bool {
  text.ends_with(suffix)
}

fn contains(text: &str, needle: &str) -> bool {
  text.contains(needle)
}
