use serde::{Deserialize, Serialize};

/// A compiled template.
///
/// Holds the parameter list and filter name recorded by the `template`
/// directive, the statements that run before the body, and the body itself.
/// A `Program` is what gets serialized to the output directory and what the
/// renderer executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// The verbatim parameter list from the `template` directive.
    pub params: String,
    /// Name of the filter applied to expressions, unless suppressed
    /// with `!`.
    pub filter: String,
    /// Statements that run before the body, in source order.
    ///
    /// Holds the preamble followed by any statements that appear outside
    /// the `template` directive.
    pub setup: Vec<Step>,
    /// The renderable body, between `{% template %}` and the final
    /// `{% end %}` or the end of the source.
    pub body: Vec<Step>,
}

/// A single executable step within a [`Program`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Emit literal text.
    Text(String),
    /// Evaluate an expression and emit the result.
    Emit {
        /// The verbatim expression.
        expr: String,
        /// True when the filter is suppressed with `!`.
        raw: bool,
    },
    /// Execute a statement for its effect.
    Stmt(String),
    /// A control structure with one or more arms.
    ///
    /// The first arm holds the opening statement, and the rest hold any
    /// dedent continuations such as `elif` or `else`.
    Block(Vec<Arm>),
}

/// One arm of a [`Step::Block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arm {
    /// The verbatim head statement, without the trailing colon.
    pub head: String,
    /// The steps executed when this arm is selected.
    pub body: Vec<Step>,
}

#[cfg(test)]
mod tests {
    use super::{Arm, Program, Step};

    #[test]
    fn test_serialize_round_trip() {
        let program = Program {
            params: "name, greeting='hi'".into(),
            filter: "html".into(),
            setup: vec![Step::Stmt("x = 1".into())],
            body: vec![
                Step::Text("hello ".into()),
                Step::Emit {
                    expr: "name".into(),
                    raw: false,
                },
                Step::Block(vec![Arm {
                    head: "if x".into(),
                    body: vec![Step::Text("!".into())],
                }]),
            ],
        };

        let text = serde_json::to_string(&program).unwrap();
        let back: Program = serde_json::from_str(&text).unwrap();

        assert_eq!(program, back);
    }
}
