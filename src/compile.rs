pub mod lexer;
pub mod parser;
pub mod program;

pub use parser::Parser;
pub use program::{Arm, Program, Step};

use crate::{log::Error, syntax::default_syntax};

use morel::Finder;

/// Compile template source into a [`Program`] using the default syntax,
/// filter and an empty preamble.
///
/// # Errors
///
/// Returns an [`Error`] when the source is structurally invalid.
///
/// # Examples
///
/// ```
/// use symplate::compile;
///
/// let program = compile("{% template name %}hello, {{ name }}!")
///     .expect("template should compile");
///
/// assert_eq!(program.params, "name");
/// ```
pub fn compile(source: &str) -> Result<Program, Error> {
    let finder = Finder::new(default_syntax());

    Parser::new(source, &finder).compile()
}
