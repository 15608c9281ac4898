use morel::Syntax;

/// Markers that identify blocks and expressions within template text.
pub enum Marker {
    /// Beginning of an expression, `{{`, which outputs filtered content.
    BeginExpression = 0,
    /// End of an expression, `}}`.
    EndExpression = 1,
    /// Beginning of a code block, `{%`, which holds statements and
    /// directives.
    BeginBlock = 2,
    /// End of a code block, `%}`.
    EndBlock = 3,
}

impl From<usize> for Marker {
    fn from(value: usize) -> Self {
        match value {
            0 => Self::BeginExpression,
            1 => Self::EndExpression,
            2 => Self::BeginBlock,
            3 => Self::EndBlock,
            _ => unreachable!(),
        }
    }
}

impl From<Marker> for usize {
    fn from(k: Marker) -> Self {
        k as usize
    }
}

/// Return a [`Syntax`] covering the four template markers.
pub fn default_syntax() -> Syntax {
    let markers = vec![
        (Marker::BeginExpression.into(), "{{".into()),
        (Marker::EndExpression.into(), "}}".into()),
        (Marker::BeginBlock.into(), "{%".into()),
        (Marker::EndBlock.into(), "%}".into()),
    ];

    Syntax::new(markers)
}
