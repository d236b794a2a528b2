//! Receiver adapters between a pipeline and an event transport.
//!
//! A transport hands each received event to a handler and acts on the
//! returned [`Outcome`]: acknowledge, reject, or reply with an event. Which
//! handler runs is decided once at setup, never per event.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cetemplate_event::Event;
use cetemplate_http::InboundRequest;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::producer::RequestTransformer;

/// Maps one event to another.
#[async_trait]
pub trait EventMapper: Send + Sync {
  async fn transform_event(&self, source: &Event) -> Result<Event, PipelineError>;
}

/// Decides whether an event passes.
#[async_trait]
pub trait EventFilter: Send + Sync {
  async fn predicate_event(&self, source: &Event) -> Result<bool, PipelineError>;
}

/// Creates events from something that is not an event.
#[async_trait]
pub trait EventProducer: Send + Sync {
  type Input: Send + 'static;

  async fn create_event(&self, input: Self::Input) -> Result<Event, PipelineError>;
}

/// Delivers events to a target.
#[async_trait]
pub trait EventClient: Send + Sync {
  async fn send(&self, target: &str, event: &Event) -> Outcome;
}

#[async_trait]
impl EventMapper for Pipeline {
  async fn transform_event(&self, source: &Event) -> Result<Event, PipelineError> {
    self.transform(Some(source)).await
  }
}

#[async_trait]
impl EventFilter for Pipeline {
  async fn predicate_event(&self, source: &Event) -> Result<bool, PipelineError> {
    self.predicate(Some(source)).await
  }
}

/// A pipeline without a source event, e.g. on a schedule.
#[async_trait]
impl EventProducer for Pipeline {
  type Input = ();

  async fn create_event(&self, _input: ()) -> Result<Event, PipelineError> {
    self.transform(None).await
  }
}

#[async_trait]
impl EventProducer for RequestTransformer {
  type Input = InboundRequest;

  async fn create_event(&self, input: InboundRequest) -> Result<Event, PipelineError> {
    self.transform(&input)
  }
}

/// Result of handling one event, for the transport to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// Handled, or delivered to the target.
  Accepted,
  /// Handled with nothing to reply, e.g. a filtered-out event.
  NoContent { reason: String },
  /// The event could not be processed.
  Rejected { status: u16, message: String },
  /// The target could not be reached.
  Undelivered { message: String },
  /// The target answered with a failure status.
  Nacked { status: u16, message: String },
}

impl Outcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Self::Accepted | Self::NoContent { .. })
  }

  fn rejected(err: &PipelineError) -> Self {
    Self::Rejected {
      status: 400,
      message: format!("got error {} while transforming event", err),
    }
  }
}

/// Replies to the transport with the transformed event.
#[derive(Clone)]
pub struct ReplyHandler {
  mapper: Arc<dyn EventMapper>,
}

impl ReplyHandler {
  pub fn new(mapper: Arc<dyn EventMapper>) -> Self {
    Self { mapper }
  }

  pub async fn handle(&self, event: Event) -> (Option<Event>, Outcome) {
    match self.mapper.transform_event(&event).await {
      Ok(output) => (Some(output), Outcome::Accepted),
      Err(e) => (None, Outcome::rejected(&e)),
    }
  }
}

/// Sends the transformed event to a fixed sink instead of replying.
#[derive(Clone)]
pub struct SendHandler {
  mapper: Arc<dyn EventMapper>,
  sink: String,
  client: Arc<dyn EventClient>,
}

impl SendHandler {
  pub fn new(mapper: Arc<dyn EventMapper>, sink: impl Into<String>, client: Arc<dyn EventClient>) -> Self {
    Self {
      mapper,
      sink: sink.into(),
      client,
    }
  }

  pub fn sink(&self) -> &str {
    &self.sink
  }

  pub async fn handle(&self, event: Event) -> Outcome {
    let output = match self.mapper.transform_event(&event).await {
      Ok(output) => output,
      Err(e) => return Outcome::rejected(&e),
    };

    let outcome = self.client.send(&self.sink, &output).await;
    if !outcome.is_success() {
      warn!(sink = %self.sink, event_id = %output.id(), outcome = ?outcome, "send to sink failed");
    }
    outcome
  }
}

/// The mapping handler picked at setup.
#[derive(Clone)]
pub enum Receiver {
  Reply(ReplyHandler),
  Send(SendHandler),
}

impl Receiver {
  /// Send to `sink` when one is configured, reply otherwise.
  pub fn new(
    mapper: Arc<dyn EventMapper>,
    sink: Option<String>,
    client: Arc<dyn EventClient>,
  ) -> Self {
    match sink.filter(|s| !s.is_empty()) {
      Some(sink) => {
        info!(sink = %sink, "sending transformed events to sink");
        Self::Send(SendHandler::new(mapper, sink, client))
      }
      None => {
        info!("replying with transformed events");
        Self::Reply(ReplyHandler::new(mapper))
      }
    }
  }

  /// Handle `event`; only the reply handler ever returns an event.
  pub async fn handle(&self, event: Event) -> (Option<Event>, Outcome) {
    match self {
      Self::Reply(handler) => handler.handle(event).await,
      Self::Send(handler) => (None, handler.handle(event).await),
    }
  }
}

/// Replies with the source event when it passes the filter.
#[derive(Clone)]
pub struct FilterHandler {
  filter: Arc<dyn EventFilter>,
}

impl FilterHandler {
  pub fn new(filter: Arc<dyn EventFilter>) -> Self {
    Self { filter }
  }

  pub async fn handle(&self, event: Event) -> (Option<Event>, Outcome) {
    match self.filter.predicate_event(&event).await {
      Ok(true) => (Some(event), Outcome::Accepted),
      Ok(false) => (
        None,
        Outcome::NoContent {
          reason: "Filter did not pass".to_string(),
        },
      ),
      Err(e) => (None, Outcome::rejected(&e)),
    }
  }
}

/// Creates events with a producer and sends them to a sink.
pub struct ProducerHandler<P> {
  producer: P,
  sink: String,
  client: Arc<dyn EventClient>,
  timeout: Duration,
}

impl<P: EventProducer> ProducerHandler<P> {
  pub fn new(producer: P, sink: impl Into<String>, client: Arc<dyn EventClient>, timeout: Duration) -> Self {
    Self {
      producer,
      sink: sink.into(),
      client,
      timeout,
    }
  }

  pub async fn produce(&self, input: P::Input) -> Outcome {
    let event = match self.producer.create_event(input).await {
      Ok(event) => event,
      Err(e) => {
        error!(stage = %e.stage(), error = %e, "event creation failed");
        return Outcome::rejected(&e);
      }
    };

    match tokio::time::timeout(self.timeout, self.client.send(&self.sink, &event)).await {
      Ok(outcome) => {
        if !outcome.is_success() {
          warn!(sink = %self.sink, event_id = %event.id(), outcome = ?outcome, "send to sink failed");
        }
        outcome
      }
      Err(_) => Outcome::Undelivered {
        message: format!("send to {} timed out after {}ms", self.sink, self.timeout.as_millis()),
      },
    }
  }
}
