//! cetemplate Template
//!
//! Compiles a template source once into a [`Template`] that can be rendered
//! any number of times, concurrently, against a JSON input map.
//!
//! Templates use minijinja (Jinja2) syntax with strict undefined handling and
//! a fixed function library registered before compilation. Each template owns
//! an invocation counter that is bumped on every render and exposed to the
//! template itself as `count()`:
//!
//! ```text
//! {"data": {{ toJson(data) }}, "id": "{{ source }}-{{ count() }}"}
//! ```

mod error;
mod functions;
mod template;
mod validate;

pub use error::{CompileError, RenderError};
pub use template::Template;
