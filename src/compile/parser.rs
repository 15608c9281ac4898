use std::mem;

use super::{
    lexer::{Lexer, Token},
    program::{Arm, Program, Step},
};
use crate::{
    log::{
        Error, DEDENT_TOP_LEVEL, EXTRA_END, MULTIPLE_TEMPLATE, NO_TEMPLATE,
        OUTPUT_OUTSIDE_TEMPLATE, TEMPLATE_NOT_TOP_LEVEL, UNBALANCED_END,
    },
    region::Region,
};

use morel::Finder;

/// Keywords that close the current arm of the innermost block and open
/// a new one.
const DEDENT_KEYWORDS: [&str; 4] = ["elif", "else", "except", "finally"];

/// An open control structure that has not yet seen its `end`.
struct OpenBlock {
    /// Region of the opening statement, for unclosed block errors.
    open: Region,
    /// Head of the arm currently being collected.
    head: String,
    /// Steps collected for the current arm.
    steps: Vec<Step>,
    /// Arms that are already complete.
    arms: Vec<Arm>,
}

/// Transforms template source into a [`Program`].
///
/// Code blocks are processed line by line, so one `{% %}` pair may hold
/// several statements. Text and expressions are only legal between the
/// `template` directive and the `end` that closes it.
pub struct Parser<'source> {
    /// [`Lexer`] instance that reads the source as tokens.
    lexer: Lexer<'source>,
    /// Reference to the source text.
    source: &'source str,
    /// Name of the filter recorded into the compiled [`Program`].
    filter: String,
    /// Statements prepended to the program setup.
    preamble: String,
    /// Parameter list from the `template` directive.
    params: String,
    /// True once a `template` directive has been seen.
    got_template: bool,
    /// True while between the `template` directive and its `end`.
    in_template: bool,
    /// True when the previous token was a block close, which swallows
    /// one following newline.
    strip_eol: bool,
    /// Statements that run before the body.
    setup: Vec<Step>,
    /// The renderable body.
    body: Vec<Step>,
    /// Control structures that are still open.
    stack: Vec<OpenBlock>,
}

impl<'source> Parser<'source> {
    /// Create a new [`Parser`] over the given source.
    pub fn new(source: &'source str, finder: &'source Finder) -> Self {
        Self {
            lexer: Lexer::new(source, finder),
            source,
            filter: "html".into(),
            preamble: String::new(),
            params: String::new(),
            got_template: false,
            in_template: false,
            strip_eol: false,
            setup: Vec::new(),
            body: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Set the name of the filter recorded into the compiled [`Program`].
    pub fn with_filter<T>(mut self, name: T) -> Self
    where
        T: Into<String>,
    {
        self.filter = name.into();

        self
    }

    /// Set the preamble, extra statements that run before anything else
    /// in the template.
    pub fn with_preamble<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.preamble = text.into();

        self
    }

    /// Compile the source into a [`Program`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the source is structurally invalid.
    /// The content of code blocks and expressions is not inspected here,
    /// faults inside those fragments surface at render time.
    pub fn compile(mut self) -> Result<Program, Error> {
        for line in mem::take(&mut self.preamble).lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                self.setup.push(Step::Stmt(line.to_string()));
            }
        }

        let mut next = self.lexer.next()?;
        while let Some((token, region)) = next {
            let strip_eol = mem::take(&mut self.strip_eol);

            next = match token {
                Token::Text => {
                    // Peek ahead, trailing line whitespace is only removed
                    // when a block follows.
                    let peeked = self.lexer.next()?;
                    let before_block = matches!(peeked, Some((Token::BeginBlock, _)));
                    self.parse_text(region, strip_eol, before_block)?;

                    peeked
                }
                Token::BeginBlock => {
                    self.parse_block()?;
                    self.strip_eol = true;

                    self.lexer.next()?
                }
                Token::BeginExpression => {
                    self.parse_expression(region)?;

                    self.lexer.next()?
                }
                _ => unreachable!("close markers are consumed with their open markers"),
            };
        }

        self.finish()
    }

    /// Parse a text span.
    ///
    /// Applies the two whitespace rules before anything else: one newline
    /// immediately after a `%}` is swallowed, and trailing spaces or tabs
    /// are removed when the rest of the line holds only a block.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the remaining text is not blank and no
    /// template body is open to receive it.
    fn parse_text(&mut self, region: Region, strip_eol: bool, before_block: bool) -> Result<(), Error> {
        let source = self.source;
        let mut begin = region.begin;
        let mut end = region.end;

        if before_block {
            // Only a line the span itself starts may be right-trimmed, a
            // span with no newline shares its line with earlier content.
            let span = &source[begin..end];
            if let Some(at) = span.rfind('\n') {
                let line_begin = at + 1;
                if span[line_begin..].bytes().all(|b| b == b' ' || b == b'\t') {
                    end = begin + line_begin;
                }
            }
        }
        if strip_eol && source[begin..end].starts_with('\n') {
            begin += 1;
        }

        let text = &source[begin..end];
        if !self.in_template {
            if let Some((at, c)) = text.char_indices().find(|(_, c)| !c.is_whitespace()) {
                let at = begin + at;

                return Err(Error::build(OUTPUT_OUTSIDE_TEMPLATE)
                    .with_pointer(source, Region::new(at..at + c.len_utf8()))
                    .with_help("text may only appear between `{% template %}` and `{% end %}`"));
            }

            return Ok(());
        }
        if !text.is_empty() {
            self.push_step(Step::Text(text.to_string()));
        }

        Ok(())
    }

    /// Parse a code block, one statement line at a time.
    fn parse_block(&mut self) -> Result<(), Error> {
        match self.lexer.next()? {
            Some((Token::Fragment, region)) => {
                let source = self.source;
                let mut offset = region.begin;
                for line in source[region].split('\n') {
                    self.parse_statement(Region::new(offset..offset + line.len()))?;
                    offset += line.len() + 1;
                }

                match self.lexer.next()? {
                    Some((Token::EndBlock, _)) => Ok(()),
                    _ => unreachable!("a fragment is always followed by its close marker"),
                }
            }
            Some((Token::EndBlock, _)) => Ok(()),
            _ => unreachable!("an open marker is always followed by a fragment or close marker"),
        }
    }

    /// Parse a single statement line from a code block.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a directive is misplaced, such as a second
    /// `template` directive or an `end` with no open block.
    fn parse_statement(&mut self, region: Region) -> Result<(), Error> {
        let source = self.source;
        let region = trim_region(source, region);
        let line = &source[region];

        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if line == "template" || line.starts_with("template ") || line.starts_with("template\t") {
            if self.got_template {
                return Err(Error::build(MULTIPLE_TEMPLATE)
                    .with_pointer(source, region)
                    .with_help("a template may only have one `template` directive"));
            }
            if !self.stack.is_empty() {
                return Err(Error::build(TEMPLATE_NOT_TOP_LEVEL)
                    .with_pointer(source, region)
                    .with_help("close the surrounding block before the `template` directive"));
            }
            self.got_template = true;
            self.in_template = true;
            self.params = line["template".len()..].trim().to_string();

            return Ok(());
        }

        if line == "end" || line.starts_with("end ") || line.starts_with("end\t") {
            if let Some(mut open) = self.stack.pop() {
                open.arms.push(Arm {
                    head: open.head,
                    body: open.steps,
                });
                self.push_step(Step::Block(open.arms));
            } else if self.in_template {
                self.in_template = false;
            } else {
                return Err(Error::build(EXTRA_END)
                    .with_pointer(source, region)
                    .with_help("this `end` has no matching block"));
            }

            return Ok(());
        }

        let opens_block = line.ends_with(':');
        let dedents = opens_block
            && DEDENT_KEYWORDS
                .iter()
                .any(|keyword| line.starts_with(keyword));

        if dedents {
            match self.stack.last_mut() {
                Some(open) => {
                    let head = mem::replace(&mut open.head, head_of(line));
                    let steps = mem::take(&mut open.steps);
                    open.arms.push(Arm { head, body: steps });
                }
                // Inside the body the net depth is unchanged, the
                // statement is kept and faults at render time.
                None if self.in_template => self.push_step(Step::Stmt(line.to_string())),
                None => {
                    return Err(Error::build(DEDENT_TOP_LEVEL)
                        .with_pointer(source, region)
                        .with_help("this keyword continues a block, but no block is open"));
                }
            }

            return Ok(());
        }

        if opens_block {
            self.stack.push(OpenBlock {
                open: region,
                head: head_of(line),
                steps: Vec::new(),
                arms: Vec::new(),
            });

            return Ok(());
        }

        self.push_step(Step::Stmt(line.to_string()));

        Ok(())
    }

    /// Parse an expression.
    ///
    /// Empty expressions are dropped. A leading `!` marks the expression
    /// as raw, meaning the filter is not applied to its output.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when no template body is open to receive
    /// the output.
    fn parse_expression(&mut self, open: Region) -> Result<(), Error> {
        let source = self.source;
        let content = match self.lexer.next()? {
            Some((Token::Fragment, region)) => {
                match self.lexer.next()? {
                    Some((Token::EndExpression, _)) => {}
                    _ => unreachable!("a fragment is always followed by its close marker"),
                }

                source[region].trim()
            }
            Some((Token::EndExpression, _)) => "",
            _ => unreachable!("an open marker is always followed by a fragment or close marker"),
        };

        if !self.in_template {
            return Err(Error::build(OUTPUT_OUTSIDE_TEMPLATE)
                .with_pointer(source, open)
                .with_help("expressions may only appear between `{% template %}` and `{% end %}`"));
        }

        let (raw, expr) = match content.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, content),
        };
        if !expr.is_empty() {
            self.push_step(Step::Emit {
                expr: expr.to_string(),
                raw,
            });
        }

        Ok(())
    }

    /// Push the given [`Step`] to the innermost open block, or failing
    /// that to the body or setup.
    fn push_step(&mut self, step: Step) {
        if let Some(open) = self.stack.last_mut() {
            open.steps.push(step);
        } else if self.in_template {
            self.body.push(step);
        } else {
            self.setup.push(step);
        }
    }

    /// Check the end-of-source invariants and return the finished
    /// [`Program`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when no `template` directive was seen, or
    /// when a block is still open.
    fn finish(self) -> Result<Program, Error> {
        let source = self.source;

        if !self.got_template {
            let mut offset = source.len();
            if source.ends_with('\n') {
                offset -= 1;
            }

            return Err(Error::build(NO_TEMPLATE)
                .with_pointer(source, Region::new(offset..offset))
                .with_help("add a `{% template %}` directive to mark the renderable body"));
        }
        if let Some(open) = self.stack.last() {
            return Err(Error::build(UNBALANCED_END)
                .with_pointer(source, open.open)
                .with_help("close this block with `{% end %}`"));
        }

        Ok(Program {
            params: self.params,
            filter: self.filter,
            setup: self.setup,
            body: self.body,
        })
    }
}

/// Return a [`Region`] covering the given one with surrounding whitespace
/// removed.
fn trim_region(source: &str, region: Region) -> Region {
    let text = &source[region];
    let trimmed = text.trim();
    let offset = match text.find(|c: char| !c.is_whitespace()) {
        Some(at) => at,
        None => 0,
    };
    let begin = region.begin + offset;

    Region::new(begin..begin + trimmed.len())
}

/// Return the head of a block-opening line, which is the line without
/// its trailing colon.
fn head_of(line: &str) -> String {
    line.strip_suffix(':').unwrap_or(line).trim_end().to_string()
}
