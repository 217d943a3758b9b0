pub mod calculator;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod functions;

use std::collections::BTreeMap;

pub use calculator::{Calculator, CalculatorState, Listeners};
pub use error::EvalError;
pub use evaluator::{ExpressionEvaluator, evaluate_expression};

/// Variable name -> numeric value.
pub type ValueMap = BTreeMap<String, f64>;
