use serde::{Deserialize, Serialize};

/// CloudEvents spec version written on events this crate creates.
pub const SPEC_VERSION: &str = "1.0";

/// Media type of every payload produced from rendered JSON.
const JSON_CONTENT_TYPE: &str = "application/json";

/// Envelope metadata of an event, everything except the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
  pub id: String,
  #[serde(rename = "type")]
  pub event_type: String,
  pub source: String,
  pub specversion: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub datacontenttype: String,
}

impl EventContext {
  /// A fresh context with a random id and a JSON payload.
  pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      event_type: event_type.into(),
      source: source.into(),
      specversion: SPEC_VERSION.to_string(),
      datacontenttype: JSON_CONTENT_TYPE.to_string(),
    }
  }
}

/// An event: envelope metadata plus an optional JSON payload.
///
/// Serializes to the CloudEvents JSON format with the metadata attributes at
/// the top level next to `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  #[serde(flatten)]
  pub context: EventContext,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<serde_json::Value>,
}

impl Event {
  /// A new event with a random id carrying `data` as JSON.
  pub fn new(
    event_type: impl Into<String>,
    source: impl Into<String>,
    data: serde_json::Value,
  ) -> Self {
    Self {
      context: EventContext::new(event_type, source),
      data: Some(data),
    }
  }

  /// Same event with the given id.
  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.context.id = id.into();
    self
  }

  pub fn id(&self) -> &str {
    &self.context.id
  }

  pub fn event_type(&self) -> &str {
    &self.context.event_type
  }

  pub fn source(&self) -> &str {
    &self.context.source
  }

  /// Replace the payload with JSON `data`.
  pub(crate) fn set_json_data(&mut self, data: serde_json::Value) {
    self.context.datacontenttype = JSON_CONTENT_TYPE.to_string();
    self.data = Some(data);
  }
}

/// Fixed `type`/`source` values stamped on every event a pipeline emits.
///
/// Empty or absent values leave the attribute as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
  pub event_type: Option<String>,
  pub source: Option<String>,
}

impl Overrides {
  pub fn apply(&self, event: &mut Event) {
    if let Some(event_type) = self.event_type.as_deref().filter(|t| !t.is_empty()) {
      event.context.event_type = event_type.to_string();
    }
    if let Some(source) = self.source.as_deref().filter(|s| !s.is_empty()) {
      event.context.source = source.to_string();
    }
  }
}
