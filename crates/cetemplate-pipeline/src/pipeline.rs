//! The two-stage pipeline composer.

use std::sync::Arc;
use std::time::Duration;

use cetemplate_event::{Event, OutputMode, Overrides, bytes_to_event, event_to_input};
use cetemplate_http::{HttpSend, ReqwestSender, parse_request, response_to_map};
use cetemplate_template::{CompileError, Template};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Template name of the HTTP request stage.
const REQUEST_TEMPLATE: &str = "request";
/// Template name of the final stage.
const EVENT_TEMPLATE: &str = "event";

/// A configured chain of templates, optionally with one HTTP call between
/// them.
///
/// Templates are compiled once in [`Pipeline::new`]. Each invocation is
/// independent apart from the per-template invocation counters, so a
/// pipeline can be shared across tasks.
pub struct Pipeline {
  request: Option<Template>,
  event: Template,
  sender: Arc<dyn HttpSend>,
  timeout: Duration,
  json_body: bool,
  mode: OutputMode,
  overrides: Overrides,
}

impl Pipeline {
  /// Compile the templates in `config`, sending over reqwest.
  pub fn new(config: PipelineConfig) -> Result<Self, CompileError> {
    Self::with_sender(config, Arc::new(ReqwestSender::new()))
  }

  /// Compile the templates in `config`, sending with `sender`.
  pub fn with_sender(
    config: PipelineConfig,
    sender: Arc<dyn HttpSend>,
  ) -> Result<Self, CompileError> {
    let request = config
      .http_stage()
      .map(|source| Template::compile(REQUEST_TEMPLATE, source))
      .transpose()?;
    let event = Template::compile(EVENT_TEMPLATE, &config.event_template)?;

    Ok(Self {
      request,
      event,
      sender,
      timeout: config.timeout(),
      json_body: config.json_body,
      mode: config.output_mode(),
      overrides: config.overrides(),
    })
  }

  /// Whether invocations make an HTTP call before the final template.
  pub fn has_http_stage(&self) -> bool {
    self.request.is_some()
  }

  /// Invocations counted so far for the request and event templates.
  pub fn invocations(&self) -> (u64, u64) {
    (
      self.request.as_ref().map_or(0, Template::invocations),
      self.event.invocations(),
    )
  }

  /// Produce a new event from `event`, or from nothing.
  ///
  /// The output is decoded per the configured [`OutputMode`] and then
  /// stamped with the configured type/source overrides. `event` is never
  /// modified.
  #[instrument(
    name = "pipeline_transform",
    skip(self, event),
    fields(event_id = event.map(Event::id).unwrap_or_default())
  )]
  pub async fn transform(&self, event: Option<&Event>) -> Result<Event, PipelineError> {
    let result = self.transform_inner(event).await;

    match &result {
      Ok(output) => {
        info!(output_id = %output.id(), output_type = %output.event_type(), "transform completed");
      }
      Err(e) => {
        error!(stage = %e.stage(), error = %e, "transform failed");
      }
    }

    result
  }

  async fn transform_inner(&self, event: Option<&Event>) -> Result<Event, PipelineError> {
    let rendered = self.render(event).await?;

    let base = event.map(|e| &e.context);
    let mut output = bytes_to_event(&rendered, base, self.mode)
      .map_err(|source| PipelineError::EventDecode { source })?;
    self.overrides.apply(&mut output);

    Ok(output)
  }

  /// Decide whether `event` passes.
  ///
  /// Only output that is exactly `true` passes; surrounding whitespace,
  /// quotes or other casing do not. Render failures are errors, not `false`.
  #[instrument(
    name = "pipeline_predicate",
    skip(self, event),
    fields(event_id = event.map(Event::id).unwrap_or_default())
  )]
  pub async fn predicate(&self, event: Option<&Event>) -> Result<bool, PipelineError> {
    let result = self.render(event).await.map(|rendered| rendered == "true");

    match &result {
      Ok(passed) => info!(passed, "predicate evaluated"),
      Err(e) => error!(stage = %e.stage(), error = %e, "predicate failed"),
    }

    result
  }

  /// Run every stage up to and including the final template.
  async fn render(&self, event: Option<&Event>) -> Result<String, PipelineError> {
    let input = event_to_input(event);

    let input = match &self.request {
      None => input,
      Some(request) => {
        let response = self.call(request, &input).await?;

        let mut merged = Map::new();
        merged.insert("inputce".to_string(), Value::Object(input));
        merged.insert("httpresponse".to_string(), Value::Object(response));
        merged
      }
    };

    self
      .event
      .render(&input)
      .map_err(|source| PipelineError::EventRender { source })
  }

  /// Render, parse and send the request, then map the response.
  async fn call(
    &self,
    request: &Template,
    input: &Map<String, Value>,
  ) -> Result<Map<String, Value>, PipelineError> {
    let text = request
      .render(input)
      .map_err(|source| PipelineError::RequestRender { source })?;
    debug!(request = %text, "request rendered");

    let wire = parse_request(&text).map_err(|source| PipelineError::RequestParse { source })?;

    let response = self
      .sender
      .send(wire, self.timeout)
      .await
      .map_err(|source| PipelineError::Transport { source })?;

    response_to_map(Some(&response), self.json_body)
      .map_err(|source| PipelineError::ResponseDecode { source })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use cetemplate_http::{HttpResponse, StatusCode, TransportError, WireRequest};
  use reqwest::header::{CONTENT_TYPE, HeaderValue};
  use serde_json::json;

  use super::*;
  use crate::error::Stage;

  /// Records the requests it is given and answers with a canned response.
  struct MockSender {
    response: Result<HttpResponse, fn() -> TransportError>,
    requests: Mutex<Vec<WireRequest>>,
  }

  impl MockSender {
    fn responding(response: HttpResponse) -> Arc<Self> {
      Arc::new(Self {
        response: Ok(response),
        requests: Mutex::new(Vec::new()),
      })
    }

    fn failing(error: fn() -> TransportError) -> Arc<Self> {
      Arc::new(Self {
        response: Err(error),
        requests: Mutex::new(Vec::new()),
      })
    }

    fn requests(&self) -> Vec<WireRequest> {
      self.requests.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl HttpSend for MockSender {
    async fn send(
      &self,
      request: WireRequest,
      _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
      self.requests.lock().unwrap().push(request);
      match &self.response {
        Ok(response) => Ok(response.clone()),
        Err(error) => Err(error()),
      }
    }
  }

  fn json_response(body: &str) -> HttpResponse {
    HttpResponse::new(StatusCode::OK)
      .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
      .with_body(body)
  }

  fn source_event() -> Event {
    Event::new("myType", "mySource", json!({ "name": "King" })).with_id("myId")
  }

  fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(config).unwrap()
  }

  #[tokio::test]
  async fn test_constant_envelope() {
    let config = PipelineConfig::new(
      r#"{"data":{"name":"Alex"},"datacontenttype":"application/json","id":"myid","source":"mysource","specversion":"1.0","type":"mytype"}"#,
    );
    let output = pipeline(config).transform(Some(&source_event())).await.unwrap();

    assert_eq!(output.id(), "myid");
    assert_eq!(output.event_type(), "mytype");
    assert_eq!(output.source(), "mysource");
    assert_eq!(output.data, Some(json!({ "name": "Alex" })));
  }

  #[tokio::test]
  async fn test_constant_payload() {
    let config = PipelineConfig::new(r#"{"name":"Alex"}"#).with_only_payload(true);
    let source = source_event();
    let output = pipeline(config).transform(Some(&source)).await.unwrap();

    assert_ne!(output.id(), "myId");
    assert_eq!(output.event_type(), "myType");
    assert_eq!(output.source(), "mySource");
    assert_eq!(output.data, Some(json!({ "name": "Alex" })));
    assert_eq!(source.id(), "myId");
    assert_eq!(source.data, Some(json!({ "name": "King" })));
  }

  #[tokio::test]
  async fn test_envelope_from_input_with_count() {
    let config = PipelineConfig::new(
      r#"{"data": {{ toJson(data) }}, "datacontenttype": "application/json", "id": "{{ id }}-{{ count() }}", "source": "{{ source }}", "specversion": "1.0", "type": "{{ type }}"}"#,
    );
    let pipeline = pipeline(config);

    let first = pipeline.transform(Some(&source_event())).await.unwrap();
    let second = pipeline.transform(Some(&source_event())).await.unwrap();

    assert_eq!(first.id(), "myId-1");
    assert_eq!(second.id(), "myId-2");
    assert_eq!(first.data, Some(json!({ "name": "King" })));
    assert_eq!(pipeline.invocations(), (0, 2));
  }

  #[tokio::test]
  async fn test_identity_payload_round_trip() {
    let data = json!({ "list": [1, 2.5, "x", null, true], "nested": { "a": { "b": [] } } });
    let source = Event::new("t", "s", data.clone());
    let config = PipelineConfig::new("{{ toJson(data) }}").with_only_payload(true);

    let output = pipeline(config).transform(Some(&source)).await.unwrap();

    assert_eq!(output.data, Some(data));
  }

  #[tokio::test]
  async fn test_array_index() {
    let source = Event::new("t", "s", json!({ "items": [{ "name": "first" }, { "name": "second" }] }));
    let config = PipelineConfig::new(r#"{"second": {{ index(data.items, 1).name | toJson }}}"#)
      .with_only_payload(true);

    let output = pipeline(config).transform(Some(&source)).await.unwrap();

    assert_eq!(output.data, Some(json!({ "second": "second" })));
  }

  #[tokio::test]
  async fn test_helper_functions_in_payload() {
    let config = PipelineConfig::new(r#"{"encoded": "{{ data.name | b64enc }}"}"#).with_only_payload(true);
    let output = pipeline(config).transform(Some(&source_event())).await.unwrap();

    assert_eq!(output.data, Some(json!({ "encoded": "S2luZw==" })));
  }

  #[tokio::test]
  async fn test_overrides_applied_last() {
    let config = PipelineConfig::new("{}")
      .with_only_payload(true)
      .with_overrides(Some("newType".to_string()), Some(String::new()));

    let output = pipeline(config).transform(Some(&source_event())).await.unwrap();

    assert_eq!(output.event_type(), "newType");
    assert_eq!(output.source(), "mySource");
  }

  #[tokio::test]
  async fn test_transform_without_event() {
    let config = PipelineConfig::new(r#"{"tick": {{ count() }}}"#).with_only_payload(true);
    let output = pipeline(config).transform(None).await.unwrap();

    assert_eq!(output.data, Some(json!({ "tick": 1 })));
    assert_eq!(output.event_type(), "");
  }

  #[tokio::test]
  async fn test_invalid_output_is_event_decode_error() {
    let config = PipelineConfig::new("not json").with_only_payload(true);
    let err = pipeline(config).transform(Some(&source_event())).await.unwrap_err();

    assert_eq!(err.stage(), Stage::EventDecode);
    assert!(!err.may_have_reached_peer());
  }

  #[tokio::test]
  async fn test_render_failure_is_event_render_error() {
    let config = PipelineConfig::new("{{ data.missing.deeper }}");
    let err = pipeline(config).transform(Some(&source_event())).await.unwrap_err();

    assert_eq!(err.stage(), Stage::EventRender);
  }

  #[tokio::test]
  async fn test_predicate_outputs() {
    let cases = [
      ("true", true),
      ("", false),
      ("false", false),
      (r#"{{ data.name == "King" }}"#, true),
      (r#"{{ source == "mySource" }}"#, true),
      (r#"{{ data.name == "Queen" }}"#, false),
      (r#""true""#, false),
      ("True", false),
      ("TRUE", false),
      ("true\n", false),
      (" true", false),
    ];

    for (template, expected) in cases {
      let pipeline = pipeline(PipelineConfig::new(template));
      let passed = pipeline.predicate(Some(&source_event())).await.unwrap();
      assert_eq!(passed, expected, "template {:?}", template);
    }
  }

  #[tokio::test]
  async fn test_predicate_error_propagates() {
    let pipeline = pipeline(PipelineConfig::new("{{ nope.field }}"));
    let err = pipeline.predicate(Some(&source_event())).await.unwrap_err();

    assert_eq!(err.stage(), Stage::EventRender);
  }

  #[test]
  fn test_compile_errors_name_the_template() {
    let err = Pipeline::new(PipelineConfig::new("{{ broken")).err().unwrap();
    assert_eq!(err.name, "event");

    let config = PipelineConfig::new("{}").with_request_template("{% if %}");
    let err = Pipeline::new(config).err().unwrap();
    assert_eq!(err.name, "request");
  }

  #[tokio::test]
  async fn test_http_stage_status() {
    let sender = MockSender::responding(json_response("{}"));
    let config = PipelineConfig::new(r#"{"status": "{{ httpresponse.status }}", "code": {{ httpresponse.statusCode }}}"#)
      .with_request_template("GET http://localhost:8080/get HTTP/1.1\n\n")
      .with_only_payload(true);
    let pipeline = Pipeline::with_sender(config, sender.clone()).unwrap();

    let output = pipeline.transform(Some(&source_event())).await.unwrap();

    assert!(pipeline.has_http_stage());
    assert_eq!(output.data, Some(json!({ "status": "200 OK", "code": 200 })));
    assert_eq!(pipeline.invocations(), (1, 1));
    assert_eq!(sender.requests().len(), 1);
  }

  #[tokio::test]
  async fn test_http_stage_request_rendered_from_event() {
    let sender = MockSender::responding(json_response(r#"{"name": "King", "gender": "male"}"#));
    let config = PipelineConfig::new(
      r#"{"from": "{{ inputce.source }}", "gender": "{{ httpresponse.body.gender }}"}"#,
    )
    .with_request_template(
      "POST http://localhost:8080/postPerson HTTP/1.1\ncontent-type: application/json\n\n{\"name\": {{ data.name | toJson }}}",
    )
    .with_only_payload(true);
    let pipeline = Pipeline::with_sender(config, sender.clone()).unwrap();

    let output = pipeline.transform(Some(&source_event())).await.unwrap();

    assert_eq!(output.data, Some(json!({ "from": "mySource", "gender": "male" })));
    let requests = sender.requests();
    assert_eq!(requests[0].method, reqwest::Method::POST);
    assert_eq!(requests[0].headers["content-type"], "application/json");
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"name": "King"}"#));
  }

  #[tokio::test]
  async fn test_http_stage_predicate() {
    let sender = MockSender::responding(json_response(r#"{"gender": "male"}"#));
    let config = PipelineConfig::new(r#"{{ httpresponse.body.gender == "male" }}"#)
      .with_request_template("GET http://localhost:8080/person HTTP/1.1\n\n");
    let pipeline = Pipeline::with_sender(config, sender).unwrap();

    assert!(pipeline.predicate(Some(&source_event())).await.unwrap());
  }

  #[tokio::test]
  async fn test_http_stage_errors_carry_stage() {
    let request_render = PipelineConfig::new("{}").with_request_template("GET {{ nope.x }} HTTP/1.1\n\n");
    let request_parse = PipelineConfig::new("{}").with_request_template("GET /relative HTTP/1.1\n\n");
    let response_decode = PipelineConfig::new("{}").with_request_template("GET http://localhost/ HTTP/1.1\n\n");

    let cases = [
      (request_render, Stage::RequestRender),
      (request_parse, Stage::RequestParse),
      (response_decode, Stage::ResponseDecode),
    ];

    for (config, stage) in cases {
      let sender = MockSender::responding(HttpResponse::new(StatusCode::OK).with_body("plain text"));
      let pipeline = Pipeline::with_sender(config, sender.clone()).unwrap();
      let err = pipeline.transform(Some(&source_event())).await.unwrap_err();

      assert_eq!(err.stage(), stage);
      if stage != Stage::ResponseDecode {
        assert!(sender.requests().is_empty());
      }
    }
  }

  #[tokio::test]
  async fn test_transport_error_stage() {
    let sender = MockSender::failing(|| TransportError::Timeout {
      url: "http://localhost/".to_string(),
      timeout_ms: 10,
    });
    let config = PipelineConfig::new("{}").with_request_template("GET http://localhost/ HTTP/1.1\n\n");
    let pipeline = Pipeline::with_sender(config, sender).unwrap();

    let err = pipeline.transform(Some(&source_event())).await.unwrap_err();

    assert_eq!(err.stage(), Stage::HttpSend);
    assert!(err.may_have_reached_peer());
    // The event template never ran.
    assert_eq!(pipeline.invocations(), (1, 0));
  }

  #[tokio::test]
  async fn test_plain_body_allowed_without_json() {
    let sender = MockSender::responding(HttpResponse::new(StatusCode::OK).with_body("plain text"));
    let config = PipelineConfig::new(r#"{"text": {{ httpresponse.body | toJson }}}"#)
      .with_request_template("GET http://localhost/ HTTP/1.1\n\n")
      .with_json_body(false)
      .with_only_payload(true);
    let pipeline = Pipeline::with_sender(config, sender).unwrap();

    let output = pipeline.transform(Some(&source_event())).await.unwrap();

    assert_eq!(output.data, Some(json!({ "text": "plain text" })));
  }
}
