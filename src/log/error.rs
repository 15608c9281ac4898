use super::{Pointer, RED, RESET};
use crate::region::Region;
use std::fmt::{Debug, Display, Formatter, Result};

/// Describes a structural template error.
///
/// Every `Error` raised during compilation points to the exact line it was
/// detected on, and allows adding contextual help text.
///
/// # Examples
///
/// Creating an [`Error`] that includes a [`Pointer`]:
///
/// ```
/// use symplate::{Error, Region};
///
/// Error::build("unexpected keyword")
///     .with_pointer("{% update name %}", Region::new(3..9))
///     .with_name("template.symp")
///     .with_help(r#"expected one of "template", "end""#);
/// ```
///
/// When printed with `println!("{:#}", error)` the [`Error`] produces this output:
///
/// ```text
/// error: unexpected keyword
///   --> template.symp:1:4
///    |
///  1 | {% update name %}
///    |    ^^^^^^
///    |
///   = help: expected one of "template", "end"
/// ```
pub struct Error {
    /// Describes the cause of the [`Error`].
    reason: String,
    /// Points to the offending line within the template source.
    pointer: Option<Pointer>,
    /// Additional information to display with the [`Error`].
    help: Option<String>,
    /// The name of the template that the [`Error`] comes from.
    name: Option<String>,
}

impl Error {
    /// Create a new [`Error`] with the given reason text.
    ///
    /// The additional fields may be populated using the various methods
    /// defined on `Error`.
    ///
    /// # Examples
    ///
    /// ```
    /// use symplate::Error;
    ///
    /// Error::build("unexpected keyword")
    ///     .with_help("expected `template` or `end`");
    /// ```
    pub fn build<T>(reason: T) -> Self
    where
        T: Into<String>,
    {
        Error {
            reason: reason.into(),
            name: None,
            pointer: None,
            help: None,
        }
    }

    /// Set the name text, which is the name of the template that the
    /// [`Error`] is related to.
    pub fn with_name<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.name = Some(text.into());

        self
    }

    /// Set the [`Pointer`] to the given source text and [`Region`].
    pub fn with_pointer<T>(mut self, source: &str, region: T) -> Self
    where
        T: Into<Region>,
    {
        self.pointer = Some(Pointer::new(source, region.into()));

        self
    }

    /// Set the help text, which is contextual information to accompany the
    /// reason text.
    pub fn with_help<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.help = Some(text.into());

        self
    }

    /// Return the name of the template that the error is related to.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return the 1-based line number that the error points to.
    pub fn line_num(&self) -> Option<usize> {
        self.pointer.as_ref().map(|p| p.line_num())
    }

    /// Return the literal text of the line that the error points to.
    pub fn line(&self) -> Option<&str> {
        self.pointer.as_ref().map(|p| p.line())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if !f.alternate() {
            writeln!(f, "{self:#}")?;
        }
        f.debug_struct("Error")
            .field("reason", &self.reason)
            .field("name", &self.name)
            .field("pointer", &self.pointer)
            .field("help", &self.help)
            .finish()?;

        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let header = format!("{RED}error{RESET}");
        write!(f, "{header}: {}", self.reason)?;

        if let Some(pointer) = &self.pointer {
            if f.alternate() {
                return pointer.display(f, self.name.as_deref(), self.help.as_deref());
            }
        }

        Ok(())
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.reason == other.reason && self.help == other.help && self.name == other.name
    }
}

/// Describes a fault raised while embedded template code executes.
///
/// The compiler never inspects the content of code blocks or expressions,
/// so a fault inside one of those fragments only surfaces at render time.
/// Unlike [`Error`], a `HostError` carries no line information.
#[derive(Debug, PartialEq)]
pub struct HostError {
    /// Describes the cause of the [`HostError`].
    reason: String,
    /// Additional information to display with the [`HostError`].
    help: Option<String>,
}

impl HostError {
    /// Create a new [`HostError`] with the given reason text.
    pub fn build<T>(reason: T) -> Self
    where
        T: Into<String>,
    {
        HostError {
            reason: reason.into(),
            help: None,
        }
    }

    /// Set the help text, which is contextual information to accompany the
    /// reason text.
    pub fn with_help<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.help = Some(text.into());

        self
    }

    /// Return the reason text.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let header = format!("{RED}error{RESET}");
        write!(f, "{header}: {}", self.reason)?;

        if f.alternate() {
            if let Some(help) = &self.help {
                write!(f, "\n  = help: {help}")?;
            }
        }

        Ok(())
    }
}
