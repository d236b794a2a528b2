//! Pipeline error types.

use std::fmt;

use cetemplate_template::RenderError;
use thiserror::Error;

/// Where in a pipeline invocation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  InboundDecode,
  RequestRender,
  RequestParse,
  HttpSend,
  ResponseDecode,
  EventRender,
  EventDecode,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::InboundDecode => "inbound_decode",
      Self::RequestRender => "request_render",
      Self::RequestParse => "request_parse",
      Self::HttpSend => "http_send",
      Self::ResponseDecode => "response_decode",
      Self::EventRender => "event_render",
      Self::EventDecode => "event_decode",
    };
    f.write_str(name)
  }
}

/// A failed invocation, tagged with the stage that failed.
///
/// Nothing partial is produced alongside an error.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("inbound request could not be decoded: {source}")]
  InboundDecode {
    #[source]
    source: cetemplate_http::DecodeError,
  },

  #[error("request template failed: {source}")]
  RequestRender {
    #[source]
    source: RenderError,
  },

  #[error("rendered request is not valid HTTP: {source}")]
  RequestParse {
    #[source]
    source: cetemplate_http::ParseError,
  },

  #[error("http call failed: {source}")]
  Transport {
    #[source]
    source: cetemplate_http::TransportError,
  },

  #[error("http response could not be decoded: {source}")]
  ResponseDecode {
    #[source]
    source: cetemplate_http::DecodeError,
  },

  #[error("event template failed: {source}")]
  EventRender {
    #[source]
    source: RenderError,
  },

  #[error("rendered output is not a valid event: {source}")]
  EventDecode {
    #[source]
    source: cetemplate_event::DecodeError,
  },
}

impl PipelineError {
  pub fn stage(&self) -> Stage {
    match self {
      Self::InboundDecode { .. } => Stage::InboundDecode,
      Self::RequestRender { .. } => Stage::RequestRender,
      Self::RequestParse { .. } => Stage::RequestParse,
      Self::Transport { .. } => Stage::HttpSend,
      Self::ResponseDecode { .. } => Stage::ResponseDecode,
      Self::EventRender { .. } => Stage::EventRender,
      Self::EventDecode { .. } => Stage::EventDecode,
    }
  }

  /// Whether the failing stage may have delivered an outbound HTTP request.
  ///
  /// True for transport failures after connecting and for undecodable
  /// responses; every other stage fails before or without a send.
  pub fn may_have_reached_peer(&self) -> bool {
    match self {
      Self::Transport { source } => source.may_have_reached_peer(),
      Self::ResponseDecode { .. } => true,
      _ => false,
    }
  }
}
