//! Event delivery over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use cetemplate_event::Event;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::handler::{EventClient, Outcome};

const CLOUDEVENTS_JSON: &str = "application/cloudevents+json";

/// Posts events in structured mode: the whole event as the JSON body.
#[derive(Debug, Clone)]
pub struct HttpEventClient {
  client: Client,
}

impl HttpEventClient {
  pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl EventClient for HttpEventClient {
  #[instrument(name = "event_send", skip(self, event), fields(event_id = %event.id()))]
  async fn send(&self, target: &str, event: &Event) -> Outcome {
    let body = match serde_json::to_vec(event) {
      Ok(body) => body,
      Err(e) => {
        return Outcome::Undelivered {
          message: format!("failed to serialize event: {}", e),
        };
      }
    };

    let response = self
      .client
      .post(target)
      .header(CONTENT_TYPE, CLOUDEVENTS_JSON)
      .body(body)
      .send()
      .await;

    match response {
      Ok(response) if response.status().is_success() => {
        debug!(status = %response.status(), "event delivered");
        Outcome::Accepted
      }
      Ok(response) => {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Outcome::Nacked {
          status: status.as_u16(),
          message: if text.is_empty() { status.to_string() } else { text },
        }
      }
      Err(e) => Outcome::Undelivered {
        message: e.to_string(),
      },
    }
  }
}
