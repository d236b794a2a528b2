//! Event decode errors.

use thiserror::Error;

/// Longest slice of offending text kept in an error.
pub const EXCERPT_LIMIT: usize = 256;

/// Rendered output could not be turned into an event.
#[derive(Debug, Error)]
#[error("rendered output is not a valid {expected}: {source} (output: {excerpt:?})")]
pub struct DecodeError {
  /// What the output was expected to be ("event" or "JSON payload").
  pub expected: &'static str,
  /// The start of the offending output.
  pub excerpt: String,
  #[source]
  pub source: serde_json::Error,
}

impl DecodeError {
  pub(crate) fn new(expected: &'static str, output: &str, source: serde_json::Error) -> Self {
    Self {
      expected,
      excerpt: excerpt(output),
      source,
    }
  }
}

/// The start of `text`, cut on a char boundary and marked with `...` when
/// longer than [`EXCERPT_LIMIT`].
pub fn excerpt(text: &str) -> String {
  if text.len() <= EXCERPT_LIMIT {
    return text.to_string();
  }
  let mut end = EXCERPT_LIMIT;
  while !text.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_excerpt_short_text_unchanged() {
    assert_eq!(excerpt("{\"a\":"), "{\"a\":");
  }

  #[test]
  fn test_excerpt_truncates_on_char_boundary() {
    let text = "é".repeat(200);
    let cut = excerpt(&text);
    assert!(cut.ends_with("..."));
    assert!(cut.len() <= EXCERPT_LIMIT + 3);
  }
}
