//! cetemplate Event
//!
//! The CloudEvents-style envelope that flows through the pipeline, and the
//! two conversions around a template render:
//!
//! - [`event_to_input`]: event (or nothing) to the template input map
//! - [`bytes_to_event`]: rendered output back to an event, either as a full
//!   envelope or as the payload of a copy of the source event's context

mod error;
mod event;
mod input;

pub use error::{DecodeError, EXCERPT_LIMIT, excerpt};
pub use event::{Event, EventContext, Overrides, SPEC_VERSION};
pub use input::{OutputMode, bytes_to_event, event_to_input};
