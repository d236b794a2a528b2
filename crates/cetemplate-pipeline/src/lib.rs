//! cetemplate Pipeline
//!
//! Chains the template engine, the event adapter and the HTTP bridge into one
//! invocation:
//!
//! ```text
//! event ─▶ input ─▶ [request template ─▶ parse ─▶ send ─▶ response map] ─▶ event template ─▶ event | bool
//! ```
//!
//! The bracketed HTTP stage only runs when a request template is configured;
//! the event template then sees `inputce` (the event input) and
//! `httpresponse` (the mapped response) instead of the event fields.
//!
//! [`Pipeline`] is the composer. [`RequestTransformer`] produces events from
//! inbound HTTP requests. The handlers in [`handler`] adapt both to the
//! reply/send shapes an event transport calls back with.

mod client;
mod config;
mod error;
pub mod handler;
mod pipeline;
mod producer;

pub use client::HttpEventClient;
pub use config::{DEFAULT_RESPONSE_TEMPLATE, PipelineConfig};
pub use error::{PipelineError, Stage};
pub use handler::{
  EventClient, EventFilter, EventMapper, EventProducer, FilterHandler, Outcome, ProducerHandler,
  Receiver, ReplyHandler, SendHandler,
};
pub use pipeline::Pipeline;
pub use producer::RequestTransformer;

pub use cetemplate_event::{Event, EventContext, OutputMode, Overrides};
pub use cetemplate_http::{HttpResponse, HttpSend, InboundRequest, ReqwestSender, WireRequest};
pub use cetemplate_template::CompileError;
