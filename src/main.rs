use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cetemplate_pipeline::{
  DEFAULT_RESPONSE_TEMPLATE, Event, FilterHandler, HttpEventClient, Outcome, Pipeline,
  PipelineConfig, ProducerHandler, Receiver,
};

/// cetemplate - transform, filter and produce CloudEvents with templates
#[derive(Parser)]
#[command(name = "cetemplate")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log at debug level unless RUST_LOG says otherwise
  #[arg(long, global = true, env = "VERBOSE")]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Transform the event read from stdin
  Map {
    #[command(flatten)]
    pipeline: PipelineArgs,
  },

  /// Reply with the event read from stdin if it passes the template
  Filter {
    #[command(flatten)]
    pipeline: PipelineArgs,
  },

  /// Render a new event from empty input
  Produce {
    #[command(flatten)]
    pipeline: PipelineArgs,
  },
}

#[derive(Args)]
struct PipelineArgs {
  /// Event template, used when there is no request template
  #[arg(long, env = "CE_TEMPLATE")]
  template: Option<String>,

  /// HTTP request template; enables the HTTP stage
  #[arg(long, env = "REQUEST_TEMPLATE")]
  request_template: Option<String>,

  /// Event template used after the HTTP stage
  #[arg(long, env = "RESPONSE_TEMPLATE", default_value = DEFAULT_RESPONSE_TEMPLATE)]
  response_template: String,

  /// Timeout for the HTTP stage and for sends to the sink
  #[arg(long, env = "HTTP_TIMEOUT_MS", default_value_t = 1000)]
  timeout_ms: u64,

  /// Require HTTP response bodies to be JSON
  #[arg(long, env = "HTTP_JSON_BODY", default_value_t = true, action = ArgAction::Set)]
  json_body: bool,

  /// The template renders only the payload
  #[arg(long, env = "ONLY_PAYLOAD")]
  only_payload: bool,

  /// Type stamped on every output event
  #[arg(long = "type", env = "CE_TYPE")]
  event_type: Option<String>,

  /// Source stamped on every output event
  #[arg(long = "source", env = "CE_SOURCE")]
  event_source: Option<String>,

  /// Send output events here instead of printing them
  #[arg(long, env = "K_SINK")]
  sink: Option<String>,
}

impl PipelineArgs {
  fn config(&self) -> Result<PipelineConfig> {
    let http_stage = self
      .request_template
      .as_deref()
      .is_some_and(|t| !t.trim().is_empty());

    let event_template = if http_stage {
      self.response_template.clone()
    } else {
      self
        .template
        .clone()
        .context("an event template is required (--template or CE_TEMPLATE)")?
    };

    Ok(PipelineConfig {
      request_template: self.request_template.clone(),
      event_template,
      timeout_ms: self.timeout_ms,
      json_body: self.json_body,
      only_payload: self.only_payload,
      event_type: self.event_type.clone(),
      event_source: self.event_source.clone(),
    })
  }

  fn sink(&self) -> Option<String> {
    self.sink.clone().filter(|s| !s.is_empty())
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    )
    .with_writer(io::stderr)
    .init();

  match cli.command {
    Commands::Map { pipeline } => run_map(pipeline).await,
    Commands::Filter { pipeline } => run_filter(pipeline).await,
    Commands::Produce { pipeline } => run_produce(pipeline).await,
  }
}

async fn run_map(args: PipelineArgs) -> Result<()> {
  let config = args.config()?;
  let pipeline = Pipeline::new(config.clone()).context("failed to compile templates")?;
  let client = HttpEventClient::new(config.timeout()).context("failed to create event client")?;

  let receiver = Receiver::new(Arc::new(pipeline), args.sink(), Arc::new(client));

  let event = read_event_from_stdin()?;
  let (reply, outcome) = receiver.handle(event).await;
  finish(reply, outcome)
}

async fn run_filter(args: PipelineArgs) -> Result<()> {
  if args.sink().is_some() {
    warn!("filter replies only, ignoring the sink");
  }

  let pipeline = Pipeline::new(args.config()?).context("failed to compile templates")?;
  let handler = FilterHandler::new(Arc::new(pipeline));

  let event = read_event_from_stdin()?;
  let (reply, outcome) = handler.handle(event).await;
  finish(reply, outcome)
}

async fn run_produce(args: PipelineArgs) -> Result<()> {
  let config = args.config()?;
  let pipeline = Pipeline::new(config.clone()).context("failed to compile templates")?;

  match args.sink() {
    Some(sink) => {
      let client =
        HttpEventClient::new(config.timeout()).context("failed to create event client")?;
      let handler = ProducerHandler::new(pipeline, sink, Arc::new(client), config.timeout());
      finish(None, handler.produce(()).await)
    }
    None => {
      let event = pipeline
        .transform(None)
        .await
        .context("failed to produce event")?;
      finish(Some(event), Outcome::Accepted)
    }
  }
}

/// Print a reply event, or turn a failed outcome into an error.
fn finish(reply: Option<Event>, outcome: Outcome) -> Result<()> {
  match outcome {
    Outcome::Accepted => {
      if let Some(event) = reply {
        println!("{}", serde_json::to_string(&event)?);
      }
      Ok(())
    }
    Outcome::NoContent { reason } => {
      info!(reason = %reason, "no event to reply with");
      Ok(())
    }
    Outcome::Rejected { status, message } => bail!("event rejected ({}): {}", status, message),
    Outcome::Undelivered { message } => bail!("event not delivered: {}", message),
    Outcome::Nacked { status, message } => bail!("sink refused event ({}): {}", status, message),
  }
}

/// Read the source event as CloudEvents JSON from stdin.
fn read_event_from_stdin() -> Result<Event> {
  if io::stdin().is_terminal() {
    bail!("expected an event on stdin");
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read event from stdin")?;

  serde_json::from_str(&input).context("failed to parse event JSON from stdin")
}
