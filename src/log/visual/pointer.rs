use std::{
    cmp::{max, min},
    fmt::{Formatter, Result},
};

use super::{
    super::{RESET, YELLOW},
    {get_width, BLANK, EQUAL, HIGHLIGHT, PIPE},
};
use crate::region::Region;

/// Points to a specific location within source text.
///
/// Derives the line number, column and literal line text from the source
/// and a [`Region`], so errors can be reported against the exact line.
#[derive(Debug, PartialEq)]
pub struct Pointer {
    /// The line that the Pointer is pointing to.
    ///
    /// This number is zero indexed.
    line: usize,
    /// The column that the Pointer is pointing to.
    ///
    /// This number is zero indexed.
    column: usize,
    /// The length of the object being highlighted.
    length: usize,
    /// The actual line of text that is being pointed to.
    text: String,
}

impl Pointer {
    /// Create a new Pointer over the given source text and Region.
    pub fn new(source: &str, region: Region) -> Self {
        let begin = min(region.begin, source.len());
        let line = source[..begin].matches('\n').count();
        let line_begin = source[..begin].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = source[begin..]
            .find('\n')
            .map(|i| begin + i)
            .unwrap_or(source.len());

        let column = get_width(&source[line_begin..begin]);
        let to = min(max(region.end, begin), line_end);
        let length = max(1, get_width(&source[begin..to]));
        let text = source[line_begin..line_end].to_string();

        Self {
            line,
            column,
            length,
            text,
        }
    }

    /// Return the 1-based line number being pointed to.
    pub fn line_num(&self) -> usize {
        self.line + 1
    }

    /// Return the literal text of the line being pointed to.
    pub fn line(&self) -> &str {
        &self.text
    }

    /// Display the visualization by writing to the given Formatter.
    pub fn display(
        &self,
        formatter: &mut Formatter<'_>,
        template: Option<&str>,
        help: Option<&str>,
    ) -> Result {
        let num = (self.line + 1).to_string();
        let col = self.column + 1;
        let pad = get_width(&num);
        let align = self.column + self.length;

        let extra = "-".repeat(3_usize.saturating_sub(self.length));
        let name = template.unwrap_or("?");
        let text = &self.text;
        let underline = HIGHLIGHT.repeat(self.length);

        write!(
            formatter,
            "\n {BLANK:pad$}--> {name}:{num}:{col}\
             \n {BLANK:pad$} {PIPE}\
             \n {num:>} {PIPE} {text}\
             \n {BLANK:pad$} {PIPE} {YELLOW}{underline:>align$}{RESET}{extra}\
             \n {BLANK:pad$} {PIPE}\n",
        )?;

        if let Some(help) = help {
            write!(formatter, "{BLANK:pad$} {EQUAL} help: {help}\n")?;
        }

        Ok(())
    }
}
