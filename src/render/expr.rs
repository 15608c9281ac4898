use super::{
    compare::{arithmetic, compare, is_truthy, Operator},
    scope::Scope,
};
use crate::log::HostError;

use serde_json::Value;
use unicode_ident::{is_xid_continue, is_xid_start};

/// Evaluate an expression fragment against the given [`Scope`].
///
/// Fragments support literals, names with dotted paths, grouping, unary
/// `-` and `not`, arithmetic, comparisons, and short circuiting `and`
/// and `or` which return the deciding operand.
///
/// # Errors
///
/// Returns a [`HostError`] when the fragment is not valid, or refers to
/// a name that is not defined.
pub fn evaluate(fragment: &str, scope: &Scope) -> Result<Value, HostError> {
    let mut parser = ExprParser::new(fragment);
    let value = parser.parse_or(scope, true)?;

    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(HostError::build(format!("invalid syntax in `{fragment}`"))
            .with_help("the expression has trailing content that cannot be parsed"));
    }

    Ok(value)
}

/// Recursive descent parser that evaluates as it goes.
///
/// The `live` flag threads short circuiting through the grammar: a dead
/// subexpression is still parsed, but performs no name lookups and
/// reports no value errors.
struct ExprParser<'fragment> {
    source: &'fragment str,
    cursor: usize,
}

impl<'fragment> ExprParser<'fragment> {
    fn new(source: &'fragment str) -> Self {
        Self { source, cursor: 0 }
    }

    /// True when the cursor has passed the last character.
    fn at_end(&self) -> bool {
        self.cursor >= self.source.len()
    }

    /// Return the character under the cursor.
    fn peek(&self) -> Option<char> {
        self.source[self.cursor..].chars().next()
    }

    /// Move the cursor past any whitespace, including newlines, so
    /// expressions may span lines.
    fn skip_whitespace(&mut self) {
        let remaining = &self.source[self.cursor..];
        self.cursor += remaining.len() - remaining.trim_start().len();
    }

    /// Consume the given symbol if it appears under the cursor.
    fn eat_symbol(&mut self, symbol: &str) -> bool {
        self.skip_whitespace();
        if self.source[self.cursor..].starts_with(symbol) {
            self.cursor += symbol.len();

            return true;
        }

        false
    }

    /// Consume the given keyword if it appears under the cursor followed
    /// by a word boundary.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let remaining = &self.source[self.cursor..];
        if !remaining.starts_with(keyword) {
            return false;
        }

        let boundary = remaining[keyword.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_xid_continue(c) && c != '_');
        if boundary {
            self.cursor += keyword.len();

            return true;
        }

        false
    }

    /// Parse an `or` chain.
    ///
    /// The left operand wins when truthy, otherwise the right operand is
    /// the result.
    fn parse_or(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        let mut value = self.parse_and(scope, live)?;
        while self.eat_keyword("or") {
            let truthy = live && is_truthy(&value);
            let right = self.parse_and(scope, live && !truthy)?;
            if !truthy {
                value = right;
            }
        }

        Ok(value)
    }

    /// Parse an `and` chain.
    ///
    /// The left operand wins when falsy, otherwise the right operand is
    /// the result.
    fn parse_and(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        let mut value = self.parse_not(scope, live)?;
        while self.eat_keyword("and") {
            let falsy = live && !is_truthy(&value);
            let right = self.parse_not(scope, live && !falsy)?;
            if !falsy {
                value = right;
            }
        }

        Ok(value)
    }

    /// Parse a `not` prefix.
    fn parse_not(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        if self.eat_keyword("not") {
            let value = self.parse_not(scope, live)?;

            return Ok(Value::Bool(!is_truthy(&value)));
        }

        self.parse_comparison(scope, live)
    }

    /// Parse an optional single comparison between two additive
    /// expressions.
    fn parse_comparison(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        let left = self.parse_additive(scope, live)?;
        let operator = if self.eat_symbol("==") {
            Operator::Equal
        } else if self.eat_symbol("!=") {
            Operator::NotEqual
        } else if self.eat_symbol("<=") {
            Operator::LesserOrEqual
        } else if self.eat_symbol(">=") {
            Operator::GreaterOrEqual
        } else if self.eat_symbol("<") {
            Operator::Lesser
        } else if self.eat_symbol(">") {
            Operator::Greater
        } else {
            return Ok(left);
        };

        let right = self.parse_additive(scope, live)?;
        if !live {
            return Ok(Value::Null);
        }

        compare(&left, operator, &right).map(Value::Bool)
    }

    /// Parse a chain of `+` and `-` operations.
    fn parse_additive(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        let mut value = self.parse_term(scope, live)?;
        loop {
            let operator = if self.eat_symbol("+") {
                Operator::Add
            } else if self.eat_symbol("-") {
                Operator::Subtract
            } else {
                return Ok(value);
            };

            let right = self.parse_term(scope, live)?;
            if live {
                value = arithmetic(&value, operator, &right)?;
            }
        }
    }

    /// Parse a chain of `*` and `/` operations.
    fn parse_term(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        let mut value = self.parse_unary(scope, live)?;
        loop {
            let operator = if self.eat_symbol("*") {
                Operator::Multiply
            } else if self.eat_symbol("/") {
                Operator::Divide
            } else {
                return Ok(value);
            };

            let right = self.parse_unary(scope, live)?;
            if live {
                value = arithmetic(&value, operator, &right)?;
            }
        }
    }

    /// Parse an optional `-` prefix.
    fn parse_unary(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        if self.eat_symbol("-") {
            let value = self.parse_unary(scope, live)?;
            if !live {
                return Ok(Value::Null);
            }

            return match &value {
                Value::Number(number) => match number.as_i64() {
                    Some(value) => Ok(Value::from(-value)),
                    None => Ok(Value::from(-number.as_f64().unwrap_or(0.0))),
                },
                other => Err(HostError::build(format!(
                    "unary `-` is invalid on type `{}`",
                    super::compare::type_of(other)
                ))),
            };
        }

        self.parse_primary(scope, live)
    }

    /// Parse a literal, a name with an optional dotted path, or a
    /// parenthesized expression.
    fn parse_primary(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Err(HostError::build("unexpected end of expression"));
        };

        if c == '(' {
            self.cursor += 1;
            let value = self.parse_or(scope, live)?;
            if !self.eat_symbol(")") {
                return Err(HostError::build("expected `)` to close the group"));
            }

            return Ok(value);
        }
        if c == '\'' || c == '"' {
            return self.parse_string(c);
        }
        if c.is_ascii_digit() {
            return self.parse_number();
        }
        if is_xid_start(c) || c == '_' {
            return self.parse_path(scope, live);
        }

        Err(HostError::build(format!("unexpected `{c}` in expression")))
    }

    /// Parse a quoted string literal with backslash escapes.
    fn parse_string(&mut self, quote: char) -> Result<Value, HostError> {
        self.cursor += quote.len_utf8();
        let mut buffer = String::new();
        let mut chars = self.source[self.cursor..].char_indices();

        while let Some((at, c)) = chars.next() {
            if c == quote {
                self.cursor += at + quote.len_utf8();

                return Ok(Value::String(buffer));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => buffer.push('\n'),
                    Some((_, 't')) => buffer.push('\t'),
                    Some((_, 'r')) => buffer.push('\r'),
                    Some((_, escaped)) => buffer.push(escaped),
                    None => break,
                }
                continue;
            }
            buffer.push(c);
        }

        Err(HostError::build("unterminated string literal"))
    }

    /// Parse an integer or float literal.
    fn parse_number(&mut self) -> Result<Value, HostError> {
        let remaining = &self.source[self.cursor..];
        let mut length = 0;
        let mut seen_dot = false;
        for c in remaining.chars() {
            if c.is_ascii_digit() {
                length += 1;
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                length += 1;
            } else {
                break;
            }
        }

        let literal = &remaining[..length];
        self.cursor += length;
        if seen_dot {
            literal
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| HostError::build(format!("invalid number literal `{literal}`")))
        } else {
            literal
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| HostError::build(format!("invalid number literal `{literal}`")))
        }
    }

    /// Parse a name with an optional dotted path, and resolve it against
    /// the scope.
    ///
    /// A missing root name is an error, a missing key along the path
    /// resolves to null.
    fn parse_path(&mut self, scope: &Scope, live: bool) -> Result<Value, HostError> {
        let name = self.parse_identifier();
        let mut keys = Vec::new();
        while self.source[self.cursor..].starts_with('.') {
            self.cursor += 1;
            let key = self.parse_identifier();
            if key.is_empty() {
                return Err(HostError::build(format!(
                    "expected a key after `.` in `{name}`"
                )));
            }
            keys.push(key);
        }

        if keys.is_empty() {
            match name {
                "True" | "true" => return Ok(Value::Bool(true)),
                "False" | "false" => return Ok(Value::Bool(false)),
                "None" | "null" => return Ok(Value::Null),
                _ => {}
            }
        }
        if !live {
            return Ok(Value::Null);
        }

        let mut value = scope
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::build(format!("name `{name}` is not defined")))?;
        for key in keys {
            value = match value {
                Value::Object(mut entries) => entries.remove(key).unwrap_or(Value::Null),
                _ => Value::Null,
            };
        }

        Ok(value)
    }

    /// Consume and return an identifier under the cursor.
    fn parse_identifier(&mut self) -> &'fragment str {
        let remaining = &self.source[self.cursor..];
        let mut length = 0;
        for c in remaining.chars() {
            let valid = if length == 0 {
                is_xid_start(c) || c == '_'
            } else {
                is_xid_continue(c) || c == '_'
            };
            if !valid {
                break;
            }
            length += c.len_utf8();
        }

        self.cursor += length;

        &remaining[..length]
    }
}

#[cfg(test)]
mod tests {
    use super::evaluate;
    use crate::render::scope::Scope;
    use serde_json::{json, Value};

    #[test]
    fn test_literals() {
        let scope = Scope::new();

        assert_eq!(evaluate("42", &scope).unwrap(), json!(42));
        assert_eq!(evaluate("1.5", &scope).unwrap(), json!(1.5));
        assert_eq!(evaluate("'<b>'", &scope).unwrap(), json!("<b>"));
        assert_eq!(evaluate("\"two\\n\"", &scope).unwrap(), json!("two\n"));
        assert_eq!(evaluate("True", &scope).unwrap(), json!(true));
        assert_eq!(evaluate("None", &scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_name_lookup() {
        let mut scope = Scope::new();
        scope.set("name", json!("taylor"));

        assert_eq!(evaluate("name", &scope).unwrap(), json!("taylor"));
    }

    #[test]
    fn test_undefined_name() {
        let error = evaluate("asdf", &Scope::new()).unwrap_err();

        assert!(error.reason().contains("asdf"));
    }

    #[test]
    fn test_dotted_path() {
        let mut scope = Scope::new();
        scope.set("user", json!({"name": {"first": "taylor"}}));

        assert_eq!(evaluate("user.name.first", &scope).unwrap(), json!("taylor"));
        assert_eq!(evaluate("user.missing", &scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_precedence() {
        let scope = Scope::new();

        assert_eq!(evaluate("1 + 2 * 3", &scope).unwrap(), json!(7));
        assert_eq!(evaluate("(1 + 2) * 3", &scope).unwrap(), json!(9));
        assert_eq!(evaluate("7 / 2", &scope).unwrap(), json!(3.5));
    }

    #[test]
    fn test_multiline() {
        let scope = Scope::new();

        assert_eq!(evaluate("'<' +\n'>'", &scope).unwrap(), json!("<>"));
    }

    #[test]
    fn test_comparisons() {
        let mut scope = Scope::new();
        scope.set("x", json!(1));

        assert_eq!(evaluate("x == 1", &scope).unwrap(), json!(true));
        assert_eq!(evaluate("x >= 2", &scope).unwrap(), json!(false));
        assert_eq!(evaluate("not x", &scope).unwrap(), json!(false));
    }

    #[test]
    fn test_short_circuit() {
        let mut scope = Scope::new();
        scope.set("name", json!(""));

        // The dead side may hold undefined names.
        assert_eq!(evaluate("name or 'anonymous'", &scope).unwrap(), json!("anonymous"));
        assert_eq!(evaluate("name and missing", &scope).unwrap(), json!(""));
        scope.set("name", json!("taylor"));
        assert_eq!(evaluate("name or missing", &scope).unwrap(), json!("taylor"));
    }

    #[test]
    fn test_unary_minus() {
        let mut scope = Scope::new();
        scope.set("x", json!(3));

        assert_eq!(evaluate("-x", &scope).unwrap(), json!(-3));
        assert!(evaluate("-'a'", &scope).is_err());
    }

    #[test]
    fn test_invalid_syntax() {
        let scope = Scope::new();

        assert!(evaluate("$$$", &scope).is_err());
        assert!(evaluate("1 +", &scope).is_err());
        assert!(evaluate("'unterminated", &scope).is_err());
        assert!(evaluate("1 2", &scope).is_err());
    }
}
