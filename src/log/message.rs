pub const UNTERMINATED_BLOCK: &str = "no %} at end of block";
pub const UNTERMINATED_EXPRESSION: &str = "no }} at end of expression";
pub const STRAY_BLOCK_CLOSE: &str = "more than one %} after block";
pub const STRAY_EXPRESSION_CLOSE: &str = "more than one }} after expression";
pub const EXPRESSION_OPEN_IN_BLOCK: &str = "{{ not valid in code block";
pub const EXPRESSION_CLOSE_IN_BLOCK: &str = "}} not valid in code block";
pub const BLOCK_CLOSE_IN_EXPRESSION: &str = "%} not valid in expression";
pub const MULTIPLE_TEMPLATE: &str = "can't have multiple template directives";
pub const TEMPLATE_NOT_TOP_LEVEL: &str = "{% template %} must be at top level";
pub const EXTRA_END: &str = "extra {% end %}";
pub const DEDENT_TOP_LEVEL: &str = "dedent keyword not allowed at top level";
pub const OUTPUT_OUTSIDE_TEMPLATE: &str = "output must be inside {% template %}";
pub const NO_TEMPLATE: &str = "no {% template %} directive";
pub const UNBALANCED_END: &str = "template must end at top level";
