//! Symplate - Template System
//!
//! Templates are plain text with two embedded forms: `{% ... %}` holds
//! code, and `{{ ... }}` emits the value of an expression through an
//! output filter. Compiling a template produces a [`Program`], and a
//! [`Renderer`] manages a directory of templates, compiling them to
//! artifacts on disk and executing them by name.
//!
//! ```no_run
//! use symplate::{Args, Renderer, Settings};
//!
//! let mut renderer = Renderer::new(Settings::new("views"));
//! let page = renderer
//!     .render("hello", &Args::new().with_must("name", "taylor"))
//!     .expect("template should render");
//! ```
pub mod filter;

mod compile;
mod log;
mod region;
mod render;
mod renderer;
mod store;
mod syntax;

pub use compile::{compile, Arm, Program, Step};
pub use log::{Error, HostError, Pointer};
pub use region::Region;
pub use renderer::{DefaultFilter, Fault, Renderer, Settings};
pub use store::Args;
