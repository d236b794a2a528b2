//! Pipeline configuration.

use std::time::Duration;

use cetemplate_event::{OutputMode, Overrides};
use serde::{Deserialize, Serialize};

/// Event template used with an HTTP stage when none is given: the response
/// body becomes the payload.
pub const DEFAULT_RESPONSE_TEMPLATE: &str = "{{ httpresponse.body | toJson }}";

fn default_timeout_ms() -> u64 {
  1000
}

fn default_json_body() -> bool {
  true
}

/// Everything a pipeline needs, supplied by its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
  /// Wire-text request template. Absent or blank means no HTTP stage.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub request_template: Option<String>,
  /// Template rendering the final event, payload or predicate.
  pub event_template: String,
  /// Bound on the whole HTTP round trip.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Whether HTTP response bodies must be JSON.
  #[serde(default = "default_json_body")]
  pub json_body: bool,
  /// Whether the event template renders only the payload.
  #[serde(default)]
  pub only_payload: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event_source: Option<String>,
}

impl PipelineConfig {
  /// A template-only configuration with defaults for everything else.
  pub fn new(event_template: impl Into<String>) -> Self {
    Self {
      request_template: None,
      event_template: event_template.into(),
      timeout_ms: default_timeout_ms(),
      json_body: default_json_body(),
      only_payload: false,
      event_type: None,
      event_source: None,
    }
  }

  pub fn with_request_template(mut self, template: impl Into<String>) -> Self {
    self.request_template = Some(template.into());
    self
  }

  pub fn with_only_payload(mut self, only_payload: bool) -> Self {
    self.only_payload = only_payload;
    self
  }

  pub fn with_json_body(mut self, json_body: bool) -> Self {
    self.json_body = json_body;
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = timeout_ms;
    self
  }

  pub fn with_overrides(mut self, event_type: Option<String>, event_source: Option<String>) -> Self {
    self.event_type = event_type;
    self.event_source = event_source;
    self
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn output_mode(&self) -> OutputMode {
    OutputMode::from_only_payload(self.only_payload)
  }

  pub fn overrides(&self) -> Overrides {
    Overrides {
      event_type: self.event_type.clone(),
      source: self.event_source.clone(),
    }
  }

  /// The request template, if it is set and not blank.
  pub fn http_stage(&self) -> Option<&str> {
    self
      .request_template
      .as_deref()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_deserialize_defaults() {
    let config: PipelineConfig =
      serde_json::from_value(json!({ "event_template": "{{ toJson(data) }}" })).unwrap();

    assert_eq!(config, PipelineConfig::new("{{ toJson(data) }}"));
    assert_eq!(config.timeout(), Duration::from_millis(1000));
    assert!(config.json_body);
    assert_eq!(config.output_mode(), OutputMode::FullEnvelope);
    assert_eq!(config.http_stage(), None);
  }

  #[test]
  fn test_blank_request_template_means_no_http_stage() {
    let config = PipelineConfig::new("x").with_request_template("  \n");
    assert_eq!(config.http_stage(), None);

    let config = PipelineConfig::new("x").with_request_template("GET http://a/ HTTP/1.1\n\n");
    assert!(config.http_stage().is_some());
  }
}
