use calcdoc::parser::ExpressionError;
use thiserror::Error;

/// Why a single expression could not produce a number.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// The arithmetic finished but the value is infinite or NaN.
    #[error("invalid result: {}", describe_non_finite(.0))]
    InvalidResult(f64),

    #[error("syntax error: {0}")]
    Syntax(ExpressionError),

    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("wrong number of arguments for {function}: expected {expected}, got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("evaluation error")]
    Other,
}

impl From<ExpressionError> for EvalError {
    fn from(error: ExpressionError) -> Self {
        match error {
            ExpressionError::UnsupportedOperator { operator, .. } => {
                EvalError::UnsupportedOperator(operator)
            }
            ExpressionError::TooDeep { .. } => EvalError::Other,
            other => EvalError::Syntax(other),
        }
    }
}

fn describe_non_finite(value: &f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if *value > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}
