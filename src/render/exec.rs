use std::collections::HashMap;

use super::{compare::is_truthy, compare::type_of, expr::evaluate, scope::Scope};
use crate::{
    compile::{Arm, Program, Step},
    filter::{to_text, Filter},
    log::HostError,
    store::Args,
};

use serde_json::Value;
use unicode_ident::{is_xid_continue, is_xid_start};

/// Executes a compiled [`Program`] against a set of [`Args`].
///
/// Setup statements run first in the root scope frame, then the
/// parameters bind into a fresh body frame and the body runs.
pub struct Executor<'program, 'filters> {
    /// The program being executed.
    program: &'program Program,
    /// Filters available to expressions.
    filters: &'filters HashMap<String, Box<dyn Filter>>,
}

impl<'program, 'filters> Executor<'program, 'filters> {
    /// Create a new [`Executor`].
    pub fn new(
        program: &'program Program,
        filters: &'filters HashMap<String, Box<dyn Filter>>,
    ) -> Self {
        Self { program, filters }
    }

    /// Execute the [`Program`] and return the rendered output.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] when the arguments do not satisfy the
    /// parameter list, or when any embedded fragment faults.
    pub fn execute(&self, args: &Args) -> Result<String, HostError> {
        let mut scope = Scope::new();
        let mut buffer = String::new();

        for step in &self.program.setup {
            self.step(step, &mut scope, &mut buffer)?;
        }

        scope.push();
        self.bind_params(args, &mut scope)?;
        for step in &self.program.body {
            self.step(step, &mut scope, &mut buffer)?;
        }

        Ok(buffer)
    }

    /// Bind the given [`Args`] to the parameter list recorded by the
    /// `template` directive.
    ///
    /// Positional arguments bind in order, named arguments bind by name,
    /// and anything left unbound falls back to its declared default.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] when there are surplus positional
    /// arguments, an unknown or doubly bound name, or a missing
    /// required parameter.
    fn bind_params(&self, args: &Args, scope: &mut Scope) -> Result<(), HostError> {
        let params = parse_params(&self.program.params)?;
        let positional = args.positional();
        if positional.len() > params.len() {
            return Err(HostError::build(format!(
                "template takes at most {} arguments, received {}",
                params.len(),
                positional.len()
            )));
        }

        let mut bound: Vec<Option<Value>> = vec![None; params.len()];
        for (at, value) in positional.iter().enumerate() {
            bound[at] = Some(value.clone());
        }
        for (name, value) in args.named() {
            let at = params
                .iter()
                .position(|param| &param.name == name)
                .ok_or_else(|| {
                    HostError::build(format!("template got an unexpected argument `{name}`"))
                })?;
            if bound[at].is_some() {
                return Err(HostError::build(format!(
                    "template got multiple values for argument `{name}`"
                )));
            }
            bound[at] = Some(value.clone());
        }

        for (param, value) in params.into_iter().zip(bound) {
            let value = match value {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => evaluate(default, scope)?,
                    None => {
                        return Err(HostError::build(format!(
                            "template missing required argument `{}`",
                            param.name
                        )))
                    }
                },
            };
            scope.set(param.name, value);
        }

        Ok(())
    }

    /// Execute a single [`Step`].
    fn step(&self, step: &Step, scope: &mut Scope, buffer: &mut String) -> Result<(), HostError> {
        match step {
            Step::Text(text) => buffer.push_str(text),
            Step::Emit { expr, raw } => {
                let value = evaluate(expr, scope)?;
                if *raw {
                    buffer.push_str(&to_text(&value));
                } else {
                    let name = &self.program.filter;
                    let filter = self.filters.get(name).ok_or_else(|| {
                        HostError::build(format!("filter `{name}` was not found"))
                            .with_help("did you register the filter with `.add_filter`?")
                    })?;
                    buffer.push_str(&filter.apply(&value)?);
                }
            }
            Step::Stmt(stmt) => self.statement(stmt, scope)?,
            Step::Block(arms) => self.block(arms, scope, buffer)?,
        }

        Ok(())
    }

    /// Execute a statement.
    ///
    /// A statement is either an assignment to a bare name, or an
    /// expression evaluated for its effect and discarded.
    fn statement(&self, stmt: &str, scope: &mut Scope) -> Result<(), HostError> {
        if let Some(at) = find_assignment(stmt) {
            let name = stmt[..at].trim();
            if is_identifier(name) {
                let value = evaluate(&stmt[at + 1..], scope)?;
                scope.set(name, value);

                return Ok(());
            }
        }

        evaluate(stmt, scope)?;

        Ok(())
    }

    /// Execute a control structure.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] when the head keyword is not one the
    /// renderer supports, or an arm does not fit its block kind.
    fn block(&self, arms: &[Arm], scope: &mut Scope, buffer: &mut String) -> Result<(), HostError> {
        let first = arms.first().expect("a block always has at least one arm");
        let (keyword, rest) = split_keyword(&first.head);

        match keyword {
            "if" => self.if_chain(arms, scope, buffer),
            "for" => {
                self.single_arm(arms, keyword)?;
                self.for_loop(rest, &first.body, scope, buffer)
            }
            "while" => {
                self.single_arm(arms, keyword)?;
                self.while_loop(rest, &first.body, scope, buffer)
            }
            other => Err(HostError::build(format!(
                "the `{other}` statement is not supported in templates"
            ))),
        }
    }

    /// Reject continuation arms on blocks that take exactly one.
    fn single_arm(&self, arms: &[Arm], keyword: &str) -> Result<(), HostError> {
        if let Some(extra) = arms.get(1) {
            let (continuation, _) = split_keyword(&extra.head);

            return Err(HostError::build(format!(
                "`{continuation}` cannot continue a `{keyword}` block"
            )));
        }

        Ok(())
    }

    /// Execute an `if` chain, running the body of the first arm whose
    /// condition is truthy.
    fn if_chain(&self, arms: &[Arm], scope: &mut Scope, buffer: &mut String) -> Result<(), HostError> {
        for arm in arms {
            let (keyword, rest) = split_keyword(&arm.head);
            let selected = match keyword {
                "if" | "elif" => is_truthy(&evaluate(rest, scope)?),
                "else" if rest.is_empty() => true,
                other => {
                    return Err(HostError::build(format!(
                        "`{other}` cannot continue an `if` block"
                    )))
                }
            };
            if selected {
                for step in &arm.body {
                    self.step(step, scope, buffer)?;
                }

                return Ok(());
            }
        }

        Ok(())
    }

    /// Execute a `for` loop over a string, array or object.
    ///
    /// Strings iterate by character, objects iterate over their keys.
    /// The loop variable stays assigned after the loop finishes.
    fn for_loop(
        &self,
        head: &str,
        body: &[Step],
        scope: &mut Scope,
        buffer: &mut String,
    ) -> Result<(), HostError> {
        let at = head.find(" in ").ok_or_else(|| {
            HostError::build("expected `for NAME in EXPRESSION`")
        })?;
        let name = head[..at].trim();
        if !is_identifier(name) {
            return Err(HostError::build(format!(
                "`{name}` is not a valid loop variable name"
            )));
        }

        let value = evaluate(&head[at + " in ".len()..], scope)?;
        let items: Vec<Value> = match value {
            Value::String(text) => text
                .chars()
                .map(|c| Value::String(c.to_string()))
                .collect(),
            Value::Array(items) => items,
            Value::Object(entries) => entries
                .keys()
                .map(|key| Value::String(key.clone()))
                .collect(),
            other => {
                return Err(HostError::build(format!(
                    "type `{}` is not iterable",
                    type_of(&other)
                )))
            }
        };

        for item in items {
            scope.set(name, item);
            for step in body {
                self.step(step, scope, buffer)?;
            }
        }

        Ok(())
    }

    /// Execute a `while` loop.
    fn while_loop(
        &self,
        head: &str,
        body: &[Step],
        scope: &mut Scope,
        buffer: &mut String,
    ) -> Result<(), HostError> {
        while is_truthy(&evaluate(head, scope)?) {
            for step in body {
                self.step(step, scope, buffer)?;
            }
        }

        Ok(())
    }
}

/// A parameter declared by the `template` directive.
struct Param {
    name: String,
    default: Option<String>,
}

/// Parse the verbatim parameter list recorded by the `template`
/// directive.
///
/// The compiler copies the list through without validation, so this is
/// where a malformed parameter surfaces.
fn parse_params(params: &str) -> Result<Vec<Param>, HostError> {
    let mut parsed = Vec::new();
    for piece in split_top_level(params) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }

        let (name, default) = match find_assignment(piece) {
            Some(at) => (piece[..at].trim(), Some(piece[at + 1..].trim().to_string())),
            None => (piece, None),
        };
        if !is_identifier(name) {
            return Err(HostError::build(format!(
                "`{name}` is not a valid parameter name"
            )));
        }

        parsed.push(Param {
            name: name.to_string(),
            default,
        });
    }

    Ok(parsed)
}

/// Split text on commas that sit outside quotes and grouping characters.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut begin = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (at, c) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(&text[begin..at]);
                begin = at + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[begin..]);

    pieces
}

/// Find the position of a top level assignment `=`, ignoring `==`, `!=`,
/// `<=` and `>=`, and anything inside quotes or grouping characters.
fn find_assignment(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (at, c) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => {
                let before = at.checked_sub(1).map(|i| bytes[i]);
                let after = bytes.get(at + 1);
                let comparison = matches!(before, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>'))
                    || after == Some(&b'=');
                if !comparison {
                    return Some(at);
                }
            }
            _ => {}
        }
    }

    None
}

/// True if the text is a single bare identifier.
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if is_xid_start(c) || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| is_xid_continue(c) || c == '_')
}

/// Split a block head into its leading keyword and the rest.
fn split_keyword(head: &str) -> (&str, &str) {
    match head.find(|c: char| c.is_whitespace()) {
        Some(at) => (&head[..at], head[at..].trim_start()),
        None => (head, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::Executor;
    use crate::{
        compile::compile,
        filter::{html, text, Filter, HostError},
        store::Args,
    };
    use serde_json::Value;
    use std::collections::HashMap;

    #[test]
    fn test_execute_text_and_expression() {
        assert_eq!(render("{% template %}a{{'b'}}c", Args::new()), "abc");
    }

    #[test]
    fn test_execute_literal_close_marker() {
        assert_eq!(render("{% template %}a }} b", Args::new()), "a }} b");
    }

    #[test]
    fn test_execute_default_filter() {
        assert_eq!(render("{% template %}a{{ '<' }}c", Args::new()), "a&lt;c");
    }

    #[test]
    fn test_execute_raw() {
        assert_eq!(render("{% template %}{{ !'<b>' }}", Args::new()), "<b>");
    }

    #[test]
    fn test_execute_positional_args() {
        let source = "{% template one, two %}{{one}}.{{two}}";

        assert_eq!(
            render(source, Args::new().with_arg_must("ONE").with_arg_must("TWO")),
            "ONE.TWO"
        );
        assert_eq!(
            render(source, Args::new().with_must("two", "B").with_must("one", "A")),
            "A.B"
        );
        assert!(try_render(source, Args::new().with_arg_must(1)).is_err());
        assert!(try_render(
            source,
            Args::new()
                .with_arg_must(1)
                .with_arg_must(2)
                .with_arg_must(3)
        )
        .is_err());
        assert!(try_render(
            source,
            Args::new()
                .with_arg_must(1)
                .with_arg_must(2)
                .with_must("three", 3)
        )
        .is_err());
    }

    #[test]
    fn test_execute_default_args() {
        let source = "{% template one='a', two='b' %}{{one}}.{{two}}";

        assert_eq!(render(source, Args::new()), "a.b");
        assert_eq!(render(source, Args::new().with_arg_must("A")), "A.b");
        assert_eq!(render(source, Args::new().with_must("two", "B")), "a.B");
    }

    #[test]
    fn test_execute_multiple_values() {
        let source = "{% template one %}{{one}}";
        let result = try_render(source, Args::new().with_arg_must(1).with_must("one", 2));

        assert!(result.is_err());
    }

    #[test]
    fn test_execute_no_args_expected() {
        let result = try_render("{% template %}a", Args::new().with_must("foo", "bar"));

        assert!(result.is_err());
    }

    #[test]
    fn test_execute_assignment() {
        assert_eq!(
            render("{% template %}{% x = 40 + 2 %}{{ x }}", Args::new()),
            "42"
        );
    }

    #[test]
    fn test_execute_name_error() {
        let error = try_render("{% template %}{% asdf %}", Args::new()).unwrap_err();

        assert!(error.reason().contains("asdf"));
    }

    #[test]
    fn test_execute_syntax_error() {
        assert!(try_render("{% template %}{% $$$ %}", Args::new()).is_err());
    }

    #[test]
    fn test_execute_if_else() {
        let source = "{% template x %}{% if x: %}t{% else: %}f{% end if %}";

        assert_eq!(render(source, Args::new().with_arg_must(true)), "t");
        assert_eq!(render(source, Args::new().with_arg_must(false)), "f");
    }

    #[test]
    fn test_execute_elif() {
        let source =
            "{% template x %}{% if x == 0: %}a{% elif x == 1: %}b{% else: %}c{% end %}";

        assert_eq!(render(source, Args::new().with_arg_must(0)), "a");
        assert_eq!(render(source, Args::new().with_arg_must(1)), "b");
        assert_eq!(render(source, Args::new().with_arg_must(2)), "c");
    }

    #[test]
    fn test_execute_for_string() {
        let source = "{% template %}{% for c in 'abc': %}{{ c }}{% end %}";

        assert_eq!(render(source, Args::new()), "abc");
    }

    #[test]
    fn test_execute_for_array() {
        let source = "{% template items %}{% for item in items: %}[{{ item }}]{% end %}";
        let args = Args::new().with_must("items", vec![1, 2, 3]);

        assert_eq!(render(source, args), "[1][2][3]");
    }

    #[test]
    fn test_execute_while() {
        let source =
            "{% template %}{% n = 3 %}{% while n: %}{{ n }}{% n = n - 1 %}{% end %}";

        assert_eq!(render(source, Args::new()), "321");
    }

    #[test]
    fn test_execute_setup_visible_in_body() {
        let source = "{% x = 'wxy' %}{% template %}{{ x }}{% end %}";

        assert_eq!(render(source, Args::new()), "wxy");
    }

    #[test]
    fn test_execute_unsupported_block() {
        let source = "{% template %}{% try: %}a{% end %}";

        assert!(try_render(source, Args::new()).is_err());
    }

    /// Helper function to compile and execute the given source.
    fn try_render(source: &str, args: Args) -> Result<String, HostError> {
        let program = compile(source).expect("source should compile");

        Executor::new(&program, &filters()).execute(&args)
    }

    /// Helper function which compiles and executes the given source,
    /// panicking on any fault.
    fn render(source: &str, args: Args) -> String {
        try_render(source, args).expect("source should render")
    }

    /// Return the built in filters.
    fn filters() -> HashMap<String, Box<dyn Filter>> {
        let mut filters: HashMap<String, Box<dyn Filter>> = HashMap::new();
        filters.insert(
            "html".into(),
            Box::new(html as fn(&Value) -> Result<String, HostError>),
        );
        filters.insert(
            "text".into(),
            Box::new(text as fn(&Value) -> Result<String, HostError>),
        );

        filters
    }
}
