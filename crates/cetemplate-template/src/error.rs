//! Template error types.

use thiserror::Error;

/// The template source could not be compiled.
///
/// Compilation happens once at setup; this error is not retried.
#[derive(Debug, Error)]
#[error("failed to compile template '{name}': {source}")]
pub struct CompileError {
  pub name: String,
  #[source]
  pub source: minijinja::Error,
}

/// A compiled template failed while rendering.
///
/// The invocation was already counted when this error was produced.
#[derive(Debug, Error)]
#[error("failed to render template '{name}' (invocation {invocation}): {source}")]
pub struct RenderError {
  pub name: String,
  pub invocation: u64,
  #[source]
  pub source: minijinja::Error,
}
