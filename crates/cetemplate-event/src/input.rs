//! Conversion between events and template input/output.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::event::{Event, EventContext};

/// How rendered output is turned back into an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
  /// The output is a complete serialized event, metadata included.
  #[default]
  FullEnvelope,
  /// The output is only the payload; metadata is copied from the source
  /// event's context and a fresh id is generated.
  PayloadOnly,
}

impl OutputMode {
  pub fn from_only_payload(only_payload: bool) -> Self {
    if only_payload {
      Self::PayloadOnly
    } else {
      Self::FullEnvelope
    }
  }
}

/// Build the template input for `event`.
///
/// Keys: `data`, `type`, `source`, `id`, `datacontenttype`, `specversion`.
/// Without an event, or without a payload, `data` is an empty map and the
/// metadata fields are empty strings.
pub fn event_to_input(event: Option<&Event>) -> Map<String, Value> {
  let (context, data) = match event {
    Some(event) => (
      Some(&event.context),
      event.data.clone().unwrap_or_else(|| Value::Object(Map::new())),
    ),
    None => (None, Value::Object(Map::new())),
  };

  let field = |get: fn(&EventContext) -> &String| {
    Value::String(context.map(get).cloned().unwrap_or_default())
  };

  let mut input = Map::new();
  input.insert("data".to_string(), data);
  input.insert("type".to_string(), field(|c| &c.event_type));
  input.insert("source".to_string(), field(|c| &c.source));
  input.insert("id".to_string(), field(|c| &c.id));
  input.insert("datacontenttype".to_string(), field(|c| &c.datacontenttype));
  input.insert("specversion".to_string(), field(|c| &c.specversion));
  input
}

/// Decode rendered output into an event.
///
/// In [`OutputMode::PayloadOnly`] the output becomes the payload of a new
/// event whose context is cloned from `base` (or empty without one) and
/// given a fresh id. The caller's event is never modified.
pub fn bytes_to_event(
  rendered: &str,
  base: Option<&EventContext>,
  mode: OutputMode,
) -> Result<Event, DecodeError> {
  match mode {
    OutputMode::FullEnvelope => {
      serde_json::from_str(rendered).map_err(|e| DecodeError::new("event", rendered, e))
    }
    OutputMode::PayloadOnly => {
      let data: Value =
        serde_json::from_str(rendered).map_err(|e| DecodeError::new("JSON payload", rendered, e))?;

      let mut context = base.cloned().unwrap_or_else(|| EventContext::new("", ""));
      context.id = uuid::Uuid::new_v4().to_string();

      let mut event = Event {
        context,
        data: None,
      };
      event.set_json_data(data);
      Ok(event)
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn source_event() -> Event {
    Event::new("myType", "mySource", json!({ "name": "King" })).with_id("myId")
  }

  #[test]
  fn test_event_to_input() {
    let input = event_to_input(Some(&source_event()));

    assert_eq!(
      Value::Object(input),
      json!({
        "data": { "name": "King" },
        "type": "myType",
        "source": "mySource",
        "id": "myId",
        "datacontenttype": "application/json",
        "specversion": "1.0"
      })
    );
  }

  #[test]
  fn test_event_to_input_without_event() {
    let input = event_to_input(None);

    assert_eq!(input["data"], json!({}));
    assert_eq!(input["type"], "");
    assert_eq!(input["source"], "");
    assert_eq!(input["id"], "");
    assert_eq!(input["datacontenttype"], "");
    assert_eq!(input["specversion"], "");
  }

  #[test]
  fn test_event_to_input_without_payload() {
    let mut event = source_event();
    event.data = None;

    assert_eq!(event_to_input(Some(&event))["data"], json!({}));
  }

  #[test]
  fn test_full_envelope_decode() {
    let rendered = r#"{"data":{"name":"Alex"},"datacontenttype":"application/json","id":"myid","source":"mysource","specversion":"1.0","type":"mytype"}"#;
    let event = bytes_to_event(rendered, Some(&source_event().context), OutputMode::FullEnvelope).unwrap();

    assert_eq!(event.id(), "myid");
    assert_eq!(event.source(), "mysource");
    assert_eq!(event.event_type(), "mytype");
    assert_eq!(event.data, Some(json!({ "name": "Alex" })));
  }

  #[test]
  fn test_payload_only_keeps_context_with_new_id() {
    let source = source_event();
    let event = bytes_to_event(r#"{"name": "Alex"}"#, Some(&source.context), OutputMode::PayloadOnly).unwrap();

    assert_ne!(event.id(), source.id());
    assert_eq!(event.source(), "mySource");
    assert_eq!(event.event_type(), "myType");
    assert_eq!(event.context.specversion, "1.0");
    assert_eq!(event.data, Some(json!({ "name": "Alex" })));
    // The source event is untouched.
    assert_eq!(source.id(), "myId");
  }

  #[test]
  fn test_payload_only_without_base() {
    let event = bytes_to_event("[1, 2]", None, OutputMode::PayloadOnly).unwrap();

    assert_eq!(event.data, Some(json!([1, 2])));
    assert_eq!(event.context.datacontenttype, "application/json");
    assert!(!event.id().is_empty());
  }

  #[test]
  fn test_invalid_json_is_decode_error() {
    let err = bytes_to_event("{ not json", None, OutputMode::PayloadOnly).unwrap_err();
    assert_eq!(err.excerpt, "{ not json");
    assert_eq!(err.expected, "JSON payload");

    let err = bytes_to_event(r#"{"data": {}}"#, None, OutputMode::FullEnvelope).unwrap_err();
    assert_eq!(err.expected, "event");
  }

  #[test]
  fn test_empty_output_is_decode_error() {
    assert!(bytes_to_event("", None, OutputMode::PayloadOnly).is_err());
  }
}
