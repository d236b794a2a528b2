//! Compile-time checks for function and filter names.
//!
//! minijinja resolves callables lazily, so a misspelled function only fails
//! when the render reaches it. Templates here are compiled once at startup
//! and rendered per event, so unknown names are rejected up front instead.

use minijinja::machinery::{Token, WhitespaceConfig, tokenize};
use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, Error, ErrorKind};

/// Words that are followed by `(` without being a call to a global.
const KEYWORDS: &[&str] = &[
  "and", "or", "not", "in", "is", "if", "elif", "else", "for", "call", "macro", "set", "with",
  "recursive",
];

/// Callables the engine provides while rendering, not as globals.
const RUNTIME_CALLABLES: &[&str] = &["caller", "loop", "super", "self", "varargs", "kwargs"];

#[derive(Clone, Copy, PartialEq)]
enum Seen<'a> {
  Ident(&'a str),
  Dot,
  Pipe,
  BlockStart,
  Other,
}

/// Fail if template `name` calls a function or applies a filter that `env`
/// does not know.
pub(crate) fn check_names(env: &Environment<'_>, name: &str) -> Result<(), Error> {
  let template = env.get_template(name)?;
  // Names the template assigns itself (macros, set) are not in this set.
  let free = template.undeclared_variables(false);
  let state = env.empty_state();

  // Most recent first.
  let mut seen = [Seen::Other; 3];

  for token in tokenize(
    template.source(),
    false,
    SyntaxConfig::default(),
    WhitespaceConfig::default(),
  ) {
    let (token, _) = token?;

    match (&token, seen) {
      (Token::ParenOpen, [Seen::Ident(callee), before, earlier]) => {
        let is_function_call = !matches!(before, Seen::Dot | Seen::Pipe)
          && before != Seen::Ident("is")
          && before != Seen::Ident("filter")
          && before != Seen::Ident("macro")
          && !(before == Seen::Ident("not") && earlier == Seen::Ident("is"))
          && !KEYWORDS.contains(&callee)
          && !RUNTIME_CALLABLES.contains(&callee)
          && free.contains(callee);

        if is_function_call && !env.globals().any(|(global, _)| global == callee) {
          return Err(Error::new(
            ErrorKind::UnknownFunction,
            format!("{} is unknown", callee),
          ));
        }
      }
      (Token::Ident(filter), [Seen::Pipe, ..])
      | (Token::Ident(filter), [Seen::Ident("filter"), Seen::BlockStart, _]) => {
        if !minijinja::tests::is_filter(&state, filter) {
          return Err(Error::new(
            ErrorKind::UnknownFilter,
            format!("filter {} is unknown", filter),
          ));
        }
      }
      _ => {}
    }

    let current = match token {
      Token::Ident(ident) => Seen::Ident(ident),
      Token::Dot => Seen::Dot,
      Token::Pipe => Seen::Pipe,
      Token::BlockStart => Seen::BlockStart,
      _ => Seen::Other,
    };
    seen = [current, seen[0], seen[1]];
  }

  Ok(())
}
