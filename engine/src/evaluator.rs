use std::collections::BTreeMap;
use std::f64::consts;

use calcdoc::expression::{BinaryOperator, Expr, UnaryOperator};
use calcdoc::parser::parse_expression;

use crate::ValueMap;
use crate::environment::VariableSource;
use crate::error::EvalError;
use crate::functions;

const MAX_DEPTH: usize = 256;

/// Named constants, resolved only when the context has no variable of the same name.
const CONSTANTS: &[(&str, f64)] = &[("PI", consts::PI), ("E", consts::E)];

/// Evaluates expression text against a fixed variable context.
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluator {
    variables: ValueMap,
}

impl ExpressionEvaluator {
    pub fn new(variables: ValueMap) -> Self {
        ExpressionEvaluator { variables }
    }

    /// Replace the whole context.
    pub fn set_variables(&mut self, variables: ValueMap) {
        self.variables = variables;
    }

    pub fn variables(&self) -> &ValueMap {
        &self.variables
    }

    pub fn evaluate(&self, expression: &str) -> Result<f64, EvalError> {
        evaluate_with(expression, &self.variables)
    }

    /// Evaluate every entry independently against the same context.
    pub fn evaluate_all(
        &self,
        expressions: &BTreeMap<String, String>,
    ) -> BTreeMap<String, Result<f64, EvalError>> {
        expressions
            .iter()
            .map(|(name, expression)| (name.clone(), self.evaluate(expression)))
            .collect()
    }
}

/// Evaluate a single expression against `context`.
pub fn evaluate_expression(expression: &str, context: &ValueMap) -> Result<f64, EvalError> {
    evaluate_with(expression, context)
}

/// Parse and evaluate against any variable source. Empty text is zero; a
/// non-finite result is an error even though the arithmetic itself succeeded.
pub fn evaluate_with(expression: &str, source: &dyn VariableSource) -> Result<f64, EvalError> {
    if expression.trim().is_empty() {
        return Ok(0.0);
    }

    let expr = parse_expression(expression)?;
    let value = evaluate_expr(&expr, source, 0)?;

    if !value.is_finite() {
        return Err(EvalError::InvalidResult(value));
    }
    Ok(value)
}

/// Evaluate a parsed expression tree.
pub fn evaluate_expr(expr: &Expr, source: &dyn VariableSource, depth: usize) -> Result<f64, EvalError> {
    if depth > MAX_DEPTH {
        log::trace!("expression nesting exceeded {} levels", MAX_DEPTH);
        return Err(EvalError::Other);
    }

    match expr {
        Expr::Number(n) => Ok(*n),

        Expr::Variable(name, _) => source
            .get_variable(name)
            .or_else(|| constant(name))
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),

        Expr::Unary { operator, operand } => {
            let value = evaluate_expr(operand, source, depth + 1)?;
            Ok(match operator {
                UnaryOperator::Negation => -value,
                UnaryOperator::Plus => value,
            })
        }

        Expr::Binary {
            operator,
            left,
            right,
        } => {
            let left = evaluate_expr(left, source, depth + 1)?;
            let right = evaluate_expr(right, source, depth + 1)?;
            Ok(eval_binary_op(*operator, left, right))
        }

        Expr::Call {
            function,
            arguments,
            ..
        } => {
            let def = functions::registry()
                .get(function)
                .ok_or_else(|| EvalError::UnknownFunction(function.clone()))?;

            if !def.accepts(arguments.len()) {
                return Err(EvalError::Arity {
                    function: function.clone(),
                    expected: def.arity(),
                    actual: arguments.len(),
                });
            }

            let args = arguments
                .iter()
                .map(|arg| evaluate_expr(arg, source, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((def.implementation)(&args))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn constant(name: &str) -> Option<f64> {
    CONSTANTS
        .iter()
        .find(|(constant, _)| *constant == name)
        .map(|(_, value)| *value)
}

/// IEEE semantics throughout: `1 / 0` is infinity and `x % 0` is NaN, both
/// caught by the finiteness check at the top level.
fn eval_binary_op(op: BinaryOperator, left: f64, right: f64) -> f64 {
    match op {
        BinaryOperator::Addition => left + right,
        BinaryOperator::Subtraction => left - right,
        BinaryOperator::Multiplication => left * right,
        BinaryOperator::Division => left / right,
        BinaryOperator::Modulo => left % right,
        BinaryOperator::Exponentiation => left.powf(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expression: &str) -> Result<f64, EvalError> {
        evaluate_expression(expression, &ValueMap::new())
    }

    #[test]
    fn constants_yield_to_context() {
        assert_eq!(eval("PI"), Ok(consts::PI));
        let context = ValueMap::from([("E".to_string(), 2.0)]);
        assert_eq!(evaluate_expression("E * 2", &context), Ok(4.0));
    }

    #[test]
    fn modulo_by_zero_is_nan() {
        assert_eq!(
            eval("5 % 0").unwrap_err().to_string(),
            "invalid result: NaN"
        );
    }

    #[test]
    fn domain_errors_surface_as_invalid_results() {
        assert!(matches!(eval("sqrt(-1)"), Err(EvalError::InvalidResult(v)) if v.is_nan()));
        assert!(matches!(eval("ln(0)"), Err(EvalError::InvalidResult(v)) if v == f64::NEG_INFINITY));
    }

    #[test]
    fn undefined_wins_over_later_arguments() {
        assert_eq!(
            eval("max(a, 1)"),
            Err(EvalError::UndefinedVariable("a".to_string()))
        );
    }
}
