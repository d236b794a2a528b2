//! Events produced from inbound HTTP requests.

use cetemplate_event::{Event, EventContext, OutputMode, bytes_to_event};
use cetemplate_http::{InboundRequest, request_to_input};
use cetemplate_template::{CompileError, Template};
use tracing::{debug, instrument};

use crate::error::PipelineError;

/// Renders an inbound request into the payload of a new event.
///
/// The template sees `method`, `host`, `url`, `header` and `body`. Every
/// event gets a fresh id and the configured type and source.
#[derive(Debug)]
pub struct RequestTransformer {
  template: Template,
  event_type: String,
  source: String,
}

impl RequestTransformer {
  pub fn new(
    template: &str,
    event_type: impl Into<String>,
    source: impl Into<String>,
  ) -> Result<Self, CompileError> {
    Ok(Self {
      template: Template::compile("inbound", template)?,
      event_type: event_type.into(),
      source: source.into(),
    })
  }

  #[instrument(
    name = "request_transform",
    skip(self, request),
    fields(method = %request.method, url = %request.url)
  )]
  pub fn transform(&self, request: &InboundRequest) -> Result<Event, PipelineError> {
    let input = request_to_input(request).map_err(|source| PipelineError::InboundDecode { source })?;

    let rendered = self
      .template
      .render(&input)
      .map_err(|source| PipelineError::EventRender { source })?;

    let context = EventContext::new(self.event_type.as_str(), self.source.as_str());
    let event = bytes_to_event(&rendered, Some(&context), OutputMode::PayloadOnly)
      .map_err(|source| PipelineError::EventDecode { source })?;

    debug!(event_id = %event.id(), "event produced");
    Ok(event)
  }
}

#[cfg(test)]
mod tests {
  use cetemplate_http::{Method, Url};
  use reqwest::header::{CONTENT_TYPE, HeaderValue};
  use serde_json::json;

  use super::*;
  use crate::error::Stage;

  fn post(body: &str) -> InboundRequest {
    InboundRequest::new(Method::POST, Url::parse("http://localhost:8080/people?team=blue").unwrap())
      .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
      .with_body(body)
  }

  #[test]
  fn test_request_becomes_event() {
    let transformer = RequestTransformer::new(
      r#"{"name": {{ body.name | toJson }}, "team": {{ url.query.team[0] | toJson }}, "method": "{{ method }}"}"#,
      "person.created",
      "/people",
    )
    .unwrap();

    let first = transformer.transform(&post(r#"{"name": "Alex"}"#)).unwrap();
    let second = transformer.transform(&post(r#"{"name": "Alex"}"#)).unwrap();

    assert_eq!(first.event_type(), "person.created");
    assert_eq!(first.source(), "/people");
    assert_eq!(first.context.datacontenttype, "application/json");
    assert_eq!(first.data, Some(json!({ "name": "Alex", "team": "blue", "method": "POST" })));
    assert_ne!(first.id(), second.id());
  }

  #[test]
  fn test_invalid_request_body() {
    let transformer = RequestTransformer::new("{}", "t", "s").unwrap();
    let err = transformer.transform(&post("name=Alex")).unwrap_err();

    assert_eq!(err.stage(), Stage::InboundDecode);
  }

  #[test]
  fn test_invalid_output() {
    let transformer = RequestTransformer::new("{{ method }}", "t", "s").unwrap();
    let err = transformer.transform(&post("{}")).unwrap_err();

    assert_eq!(err.stage(), Stage::EventDecode);
  }
}
