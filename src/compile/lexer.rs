use crate::{
    log::{
        Error, BLOCK_CLOSE_IN_EXPRESSION, EXPRESSION_CLOSE_IN_BLOCK, EXPRESSION_OPEN_IN_BLOCK,
        STRAY_BLOCK_CLOSE, STRAY_EXPRESSION_CLOSE, UNTERMINATED_BLOCK, UNTERMINATED_EXPRESSION,
    },
    region::Region,
    syntax::Marker,
};

use morel::Finder;

/// A tagged piece of template source.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Token {
    /// Plain template text.
    Text,
    /// Beginning of a code block, `{%`.
    BeginBlock,
    /// End of a code block, `%}`.
    EndBlock,
    /// Beginning of an expression, `{{`.
    BeginExpression,
    /// End of an expression, `}}`.
    EndExpression,
    /// The opaque content between an open marker and its close.
    Fragment,
}

/// Tracks the [`Lexer`] state and determines the action taken
/// when `.next` is called.
#[derive(Debug, PartialEq, Clone, Copy)]
enum State {
    /// Outside of any markers, reading plain text.
    Default,
    /// Between an open marker and its close.
    Inside {
        /// The token that closes the surrounding region.
        end_token: Token,
        /// Region of the open marker, for unterminated errors.
        open: Region,
    },
}

pub type TokenResult = Result<Option<(Token, Region)>, Error>;

/// Provides methods to read template source as [`Token`] instances.
///
/// Exactly one close marker per open marker is enforced here: inside a block
/// the only legal marker is `%}`, and inside an expression the only legal
/// marker is `}}`. In plain text a lone `}}` is literal until an expression
/// has closed on the same span, after which a second `}}` is an error.
pub struct Lexer<'source> {
    /// Reference to the source text.
    pub source: &'source str,
    /// Position within source.
    cursor: usize,
    /// Compiled [`Finder`] instance used to search for markers
    /// in the source text.
    finder: &'source Finder,
    /// Determines the action taken when `.next` is called.
    state: State,
    /// True once an expression has closed on the current plain span,
    /// which makes a further `}}` on that span illegal.
    closed_expression: bool,
    /// Temporary storage for a [`Token`] that will be read
    /// on the following call to `.next`.
    buffer: Option<(Token, Region)>,
}

impl<'source> Lexer<'source> {
    /// Create a new [`Lexer`] over the given source.
    #[inline]
    pub fn new(source: &'source str, finder: &'source Finder) -> Self {
        Self {
            source,
            cursor: 0,
            finder,
            state: State::Default,
            closed_expression: false,
            buffer: None,
        }
    }

    /// Return the next [`Token`] and [`Region`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a marker is found that is not legal in the
    /// current state, or when an open marker is never closed.
    pub fn next(&mut self) -> TokenResult {
        // Always prefer taking from the buffer when possible.
        if let Some(next) = self.buffer.take() {
            return Ok(Some(next));
        }
        if self.cursor >= self.source.len() {
            return match self.state {
                State::Default => Ok(None),
                State::Inside { end_token, open } => Err(self.unterminated(end_token, open)),
            };
        }

        match self.state {
            State::Default => self.lex_default(self.cursor),
            State::Inside { .. } => self.lex_inside(self.cursor),
        }
    }

    /// Return the next [`Token`] and [`Region`] in [`State::Default`]
    /// configuration.
    ///
    /// A `}}` with no expression before it on the current span is plain
    /// text and is scanned past.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] on a `%}` with no matching open marker, or a
    /// second `}}` after an expression has closed on the span.
    fn lex_default(&mut self, from: usize) -> TokenResult {
        let mut search = from;
        loop {
            match self.finder.next(self.source, search) {
                Some((id, marker_begin, marker_end)) => {
                    let region = Region::new(marker_begin..marker_end);
                    let token = match Marker::from(id) {
                        Marker::BeginExpression => {
                            self.state = State::Inside {
                                end_token: Token::EndExpression,
                                open: region,
                            };
                            Token::BeginExpression
                        }
                        Marker::BeginBlock => {
                            self.state = State::Inside {
                                end_token: Token::EndBlock,
                                open: region,
                            };
                            // A block starts a new plain span.
                            self.closed_expression = false;
                            Token::BeginBlock
                        }
                        Marker::EndBlock => {
                            return Err(Error::build(STRAY_BLOCK_CLOSE)
                                .with_pointer(self.source, region)
                                .with_help("this close marker has no matching `{%`"));
                        }
                        Marker::EndExpression => {
                            if self.closed_expression {
                                return Err(Error::build(STRAY_EXPRESSION_CLOSE)
                                    .with_pointer(self.source, region)
                                    .with_help("only one `}}` may follow an expression"));
                            }
                            search = marker_end;
                            continue;
                        }
                    };

                    self.cursor = marker_end;
                    if from == marker_begin {
                        return Ok(Some((token, region)));
                    }
                    self.buffer = Some((token, region));

                    return Ok(Some((Token::Text, (from..marker_begin).into())));
                }
                None => {
                    let remaining = from..self.source.len();
                    self.cursor = self.source.len();

                    return Ok(Some((Token::Text, remaining.into())));
                }
            }
        }
    }

    /// Return the next [`Token`] and [`Region`] in [`State::Inside`]
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when any marker other than the expected close
    /// marker is found.
    fn lex_inside(&mut self, from: usize) -> TokenResult {
        let (end_token, open) = match self.state {
            State::Inside { end_token, open } => (end_token, open),
            _ => unreachable!("lexer must be inside a marker pair"),
        };

        match self.finder.next(self.source, from) {
            Some((id, marker_begin, marker_end)) => {
                let region = Region::new(marker_begin..marker_end);
                let token = match Marker::from(id) {
                    Marker::EndExpression => Token::EndExpression,
                    Marker::EndBlock => Token::EndBlock,
                    Marker::BeginExpression => Token::BeginExpression,
                    Marker::BeginBlock => Token::BeginBlock,
                };

                if token != end_token {
                    return Err(self.unexpected(end_token, token, open, region));
                }

                self.state = State::Default;
                if token == Token::EndExpression {
                    self.closed_expression = true;
                }
                self.cursor = marker_end;
                if from == marker_begin {
                    Ok(Some((token, region)))
                } else {
                    self.buffer = Some((token, region));

                    Ok(Some((Token::Fragment, (from..marker_begin).into())))
                }
            }
            None => Err(self.unterminated(end_token, open)),
        }
    }

    /// Return an [`Error`] describing an open marker that is never closed.
    ///
    /// The error points at the open marker.
    fn unterminated(&mut self, end_token: Token, open: Region) -> Error {
        // Park the cursor so further calls return the same error.
        self.cursor = self.source.len();
        self.state = State::Default;

        if end_token == Token::EndBlock {
            Error::build(UNTERMINATED_BLOCK)
                .with_pointer(self.source, open)
                .with_help("close this block with `%}`")
        } else {
            Error::build(UNTERMINATED_EXPRESSION)
                .with_pointer(self.source, open)
                .with_help("close this expression with `}}`")
        }
    }

    /// Return an [`Error`] describing an unexpected marker between an open
    /// marker and its close.
    fn unexpected(&self, end_token: Token, found: Token, open: Region, at: Region) -> Error {
        match (end_token, found) {
            (Token::EndBlock, Token::BeginExpression) => Error::build(EXPRESSION_OPEN_IN_BLOCK)
                .with_pointer(self.source, at)
                .with_help("expressions may only appear in template text"),
            (Token::EndBlock, Token::EndExpression) => Error::build(EXPRESSION_CLOSE_IN_BLOCK)
                .with_pointer(self.source, at)
                .with_help("expressions may only appear in template text"),
            // A second `{%` before the close means the first was never
            // terminated.
            (Token::EndBlock, _) => Error::build(UNTERMINATED_BLOCK)
                .with_pointer(self.source, open)
                .with_help("close this block with `%}`"),
            (_, Token::EndBlock) => Error::build(BLOCK_CLOSE_IN_EXPRESSION)
                .with_pointer(self.source, at)
                .with_help("did you close the surrounding expression?"),
            (_, _) => Error::build(UNTERMINATED_EXPRESSION)
                .with_pointer(self.source, open)
                .with_help("close this expression with `}}`"),
        }
    }
}
