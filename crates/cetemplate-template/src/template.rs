//! Compiled template with its invocation counter.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use minijinja::value::Value;
use minijinja::{Environment, UndefinedBehavior};
use tracing::debug;

use crate::error::{CompileError, RenderError};
use crate::functions::{self, COUNT_KEY};
use crate::validate;

/// A template compiled once and rendered many times.
///
/// Rendering takes `&self` and is safe to call from many threads at once.
/// The only state that changes between renders is the invocation counter,
/// which is atomic: every render, successful or not, takes the next number
/// before the template runs, and `count()` inside that render sees exactly
/// that number.
#[derive(Debug)]
pub struct Template {
  name: String,
  env: Environment<'static>,
  invocations: AtomicU64,
}

impl Template {
  /// Compile `source` under `name`. Syntax errors surface here.
  pub fn compile(name: impl Into<String>, source: impl Into<String>) -> Result<Self, CompileError> {
    let name = name.into();

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    // Wire-text requests end with a blank line that must survive rendering.
    env.set_keep_trailing_newline(true);
    env.set_formatter(functions::format_value);
    functions::register(&mut env);

    env
      .add_template_owned(name.clone(), source.into())
      .and_then(|_| validate::check_names(&env, &name))
      .map_err(|source| CompileError {
        name: name.clone(),
        source,
      })?;

    Ok(Self {
      name,
      env,
      invocations: AtomicU64::new(0),
    })
  }

  /// The name errors and logs refer to this template by.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Number of renders attempted so far.
  pub fn invocations(&self) -> u64 {
    self.invocations.load(Ordering::SeqCst)
  }

  /// Render against `input`, whose top-level keys become template variables.
  pub fn render(
    &self,
    input: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<String, RenderError> {
    let invocation = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;

    let mut ctx: BTreeMap<&str, Value> = input
      .iter()
      .map(|(key, value)| (key.as_str(), Value::from_serialize(value)))
      .collect();
    ctx.insert(COUNT_KEY, Value::from(invocation));

    let rendered = self
      .env
      .get_template(&self.name)
      .and_then(|template| template.render(&ctx))
      .map_err(|source| RenderError {
        name: self.name.clone(),
        invocation,
        source,
      })?;

    debug!(template = %self.name, invocation, rendered = %rendered, "template rendered");

    Ok(rendered)
  }
}
