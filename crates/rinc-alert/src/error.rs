/// Errors raised while compiling an alert's `when` expression or `message`
/// template. A compile error makes the whole alert set unusable.
///
/// # Examples
///
/// ```rust
/// use rinc_alert::expr::Expr;
///
/// let err = Expr::compile("len(jobs) >").unwrap_err();
/// assert!(err.to_string().contains("len(jobs) >"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// The expression source is empty or only whitespace.
    #[error("empty expression")]
    Empty,

    /// The expression does not follow the grammar.
    #[error("invalid expression {source_text:?}: {message} at offset {offset}")]
    Syntax {
        source_text: String,
        offset: usize,
        message: String,
    },

    /// The expression calls a function that is not registered.
    #[error("invalid expression {source_text:?}: unknown function `{name}`")]
    UnknownFunction { source_text: String, name: String },

    /// A literal regular expression on the right of `=~`/`!~` is invalid.
    #[error("invalid expression {source_text:?}: bad regex: {message}")]
    Regex {
        source_text: String,
        message: String,
    },

    /// The message template does not parse.
    #[error("failed to parse template `{source_text}`: {message}")]
    Template {
        source_text: String,
        message: String,
    },
}

/// Errors raised while evaluating a compiled expression against a context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("no field `{field}` on {on}")]
    MissingField { field: String, on: &'static str },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("cannot apply `{op}` to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot apply `{op}` to {operand}")]
    InvalidOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic produced a non-finite number")]
    NonFinite,

    #[error("expression evaluated to {0}, expected bool")]
    NotBoolean(&'static str),

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("{name}(): {message}")]
    Function { name: String, message: String },
}

/// Errors raised while rendering a compiled template against a context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("no field `{field}` on {on}")]
    MissingField { field: String, on: &'static str },

    #[error("{name}: {message}")]
    Function { name: String, message: String },

    #[error("range over {0} is not supported")]
    NotIterable(&'static str),
}
