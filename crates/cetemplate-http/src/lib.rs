//! cetemplate HTTP
//!
//! Turns rendered text into an HTTP call and the answer back into template
//! input:
//!
//! 1. [`parse_request`]: literal HTTP/1.1 request text to a [`WireRequest`]
//! 2. [`HttpSend::send`]: one attempt, bounded by a timeout, to an [`HttpResponse`]
//! 3. [`response_to_map`]: response to a map with `status`, `statusCode`,
//!    `header` and (when present) `body`
//!
//! [`request_to_input`] covers the other direction, an inbound request that
//! should become the input of an event-producing template.

mod error;
mod inbound;
mod request;
mod response;
mod sender;

pub use error::{DecodeError, ParseError, TransportError};
pub use reqwest::{Method, StatusCode};
pub use url::Url;
pub use inbound::{InboundRequest, request_to_input};
pub use request::{WireRequest, parse_request};
pub use response::{HttpResponse, response_to_map};
pub use sender::{HttpSend, ReqwestSender};
