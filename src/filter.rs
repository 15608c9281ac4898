//! Contains the `Filter` trait and the built in output filters.
//!
//! A filter is any type which implements the [`Filter`] trait. Every
//! expression in a template body runs its output through the filter named
//! by the `template` directive's renderer, unless the expression starts
//! with `!`, which emits the raw text form of the value.
//!
//! You can register a filter on a [`Renderer`][`crate::Renderer`] with
//! [`add_filter`][`crate::Renderer::add_filter`]. Either create a struct
//! and implement the trait on that, or just create a function matching
//! the trait signature:
//!
//! ```rust
//! use symplate::filter::{serde::Value, to_text, HostError};
//!
//! fn upper(value: &Value) -> Result<String, HostError> {
//!     Ok(to_text(value).to_uppercase())
//! }
//! ```
//!
//! Two filters are always available: `html`, which escapes markup
//! characters, and `text`, which emits the text form of a value without
//! escaping.

pub mod serde {
    //! Contains types from `serde_json`.
    pub use serde_json::*;
}

pub use crate::log::HostError;

use serde_json::Value;

/// Describes a type which can transform the output of an expression.
pub trait Filter: Sync + Send {
    /// Execute the filter with the given input and return the text to
    /// write into the rendered output.
    fn apply(&self, input: &Value) -> Result<String, HostError>;
}

/// Allows assignment of any function matching the signature of `apply` as
/// a `Filter`, instead of requiring a struct be created.
impl<F> Filter for F
where
    F: Fn(&Value) -> Result<String, HostError> + Sync + Send,
{
    fn apply(&self, input: &Value) -> Result<String, HostError> {
        self(input)
    }
}

/// Return the text form of the given [`Value`].
///
/// Null becomes empty text, strings are returned as they are, and any
/// other value is rendered the way `serde_json` prints it.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(value) => value.to_string(),
        Value::Number(value) => value.to_string(),
        other => other.to_string(),
    }
}

/// The default output filter.
///
/// Escapes the characters `& < > ' "` in the text form of the value.
pub fn html(value: &Value) -> Result<String, HostError> {
    let text = to_text(value);
    let mut buffer = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => buffer.push_str("&amp;"),
            '<' => buffer.push_str("&lt;"),
            '>' => buffer.push_str("&gt;"),
            '\'' => buffer.push_str("&#39;"),
            '"' => buffer.push_str("&quot;"),
            other => buffer.push(other),
        }
    }

    Ok(buffer)
}

/// Output filter that emits the text form of a value without escaping.
pub fn text(value: &Value) -> Result<String, HostError> {
    Ok(to_text(value))
}

#[cfg(test)]
mod tests {
    use super::{html, text};
    use serde_json::{json, Value};

    #[test]
    fn test_html_null() {
        assert_eq!(html(&Value::Null).unwrap(), "");
    }

    #[test]
    fn test_html_plain() {
        assert_eq!(html(&json!("foo")).unwrap(), "foo");
        assert_eq!(html(&json!("\u{2019}")).unwrap(), "\u{2019}");
    }

    #[test]
    fn test_html_non_string() {
        assert_eq!(html(&json!(1234)).unwrap(), "1234");
    }

    #[test]
    fn test_html_special_chars() {
        assert_eq!(
            html(&json!("foo &<>'\" bar")).unwrap(),
            "foo &amp;&lt;&gt;&#39;&quot; bar"
        );
    }

    #[test]
    fn test_text_no_escape() {
        assert_eq!(text(&json!("<b>")).unwrap(), "<b>");
        assert_eq!(text(&Value::Null).unwrap(), "");
    }
}
