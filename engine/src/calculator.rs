use std::collections::BTreeMap;
use std::fmt;

use calcdoc::Document;

use crate::ValueMap;
use crate::environment::{Environment, Scope};
use crate::evaluator::evaluate_with;

/// Everything a presentation layer needs after a pass. Transitions return
/// a new state and leave `self` untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatorState {
    pub input_values: ValueMap,
    pub calculated_values: ValueMap,
    /// Variable name -> message, for calculated variables that failed this pass.
    pub errors: BTreeMap<String, String>,
}

impl CalculatorState {
    /// Input values for `document`: the override when given, else the number
    /// the variable's own expression starts with, else 0. Nothing is calculated yet.
    pub fn initial(document: &Document, overrides: &ValueMap) -> Self {
        let mut input_values = ValueMap::new();
        for name in &document.input_variables {
            let Some(variable) = document.variable(name) else {
                continue;
            };
            let value = overrides
                .get(name)
                .copied()
                .or_else(|| parse_leading_number(&variable.expression))
                .unwrap_or(0.0);
            input_values.insert(name.clone(), value);
        }

        CalculatorState {
            input_values,
            calculated_values: ValueMap::new(),
            errors: BTreeMap::new(),
        }
    }

    /// One pass over the calculated variables in declaration order. Each sees
    /// the inputs plus whatever was calculated before it in this pass; a failure
    /// records its message and contributes 0.
    pub fn recalculate(&self, document: &Document) -> CalculatorState {
        let mut env = Environment::new(&self.input_values);
        env.push_scope(Scope::new());
        let mut errors = BTreeMap::new();

        for variable in document.variables.iter().filter(|v| !v.is_input) {
            let value = match evaluate_with(&variable.expression, &env) {
                Ok(value) => value,
                Err(error) => {
                    log::trace!("{} = {}: {}", variable.name, variable.expression, error);
                    errors.insert(variable.name.clone(), error.to_string());
                    0.0
                }
            };
            env.set_variable(&variable.name, value);
        }

        let calculated_values = env.pop_scope().map(Scope::into_values).unwrap_or_default();
        log::debug!(
            "recalculated {} variable(s) from {} input(s), {} error(s)",
            calculated_values.len(),
            self.input_values.len(),
            errors.len()
        );

        CalculatorState {
            input_values: self.input_values.clone(),
            calculated_values,
            errors,
        }
    }

    /// Replace one input value. Calculated values and errors are carried over
    /// unchanged until the next [`CalculatorState::recalculate`].
    pub fn apply_input_change(&self, name: &str, value: f64) -> CalculatorState {
        let mut input_values = self.input_values.clone();
        input_values.insert(name.to_string(), value);
        CalculatorState {
            input_values,
            calculated_values: self.calculated_values.clone(),
            errors: self.errors.clone(),
        }
    }
}

pub type Listener = Box<dyn FnMut(&ValueMap)>;

/// Callbacks fired synchronously at the end of the relevant operation.
#[derive(Default)]
pub struct Listeners {
    pub on_input_values_changed: Option<Listener>,
    pub on_calculated_values_changed: Option<Listener>,
}

impl Listeners {
    pub fn new() -> Self {
        Listeners::default()
    }

    pub fn on_input_values_changed(mut self, listener: impl FnMut(&ValueMap) + 'static) -> Self {
        self.on_input_values_changed = Some(Box::new(listener));
        self
    }

    pub fn on_calculated_values_changed(
        mut self,
        listener: impl FnMut(&ValueMap) + 'static,
    ) -> Self {
        self.on_calculated_values_changed = Some(Box::new(listener));
        self
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("on_input_values_changed", &self.on_input_values_changed.is_some())
            .field(
                "on_calculated_values_changed",
                &self.on_calculated_values_changed.is_some(),
            )
            .finish()
    }
}

/// A document bound to its current [`CalculatorState`].
#[derive(Debug)]
pub struct Calculator {
    document: Document,
    state: CalculatorState,
    listeners: Listeners,
}

impl Calculator {
    /// Bind `document`, seed its inputs and run the first pass.
    pub fn new(document: Document, initial_values: &ValueMap, listeners: Listeners) -> Self {
        let state = CalculatorState::initial(&document, initial_values);
        let mut calculator = Calculator {
            document,
            state,
            listeners,
        };
        calculator.recalculate();
        calculator
    }

    pub fn handle_input_change(&mut self, name: &str, value: f64) {
        self.state = self.state.apply_input_change(name, value);
        if let Some(listener) = self.listeners.on_input_values_changed.as_mut() {
            listener(&self.state.input_values);
        }
        self.recalculate();
    }

    pub fn recalculate(&mut self) {
        self.state = self.state.recalculate(&self.document);
        if let Some(listener) = self.listeners.on_calculated_values_changed.as_mut() {
            listener(&self.state.calculated_values);
        }
    }

    pub fn input_values(&self) -> ValueMap {
        self.state.input_values.clone()
    }

    pub fn calculated_values(&self) -> ValueMap {
        self.state.calculated_values.clone()
    }

    pub fn errors(&self) -> BTreeMap<String, String> {
        self.state.errors.clone()
    }

    pub fn state(&self) -> &CalculatorState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current value of any variable, input or calculated.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.state
            .input_values
            .get(name)
            .or_else(|| self.state.calculated_values.get(name))
            .copied()
    }
}

/// The number `text` starts with, ignoring leading whitespace and anything
/// after it: `"10 * 2"` is 10, `"1.5e3kg"` is 1500, `"a + 1"` is None.
fn parse_leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if frac_digits > 0 || int_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    text[..end].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_numbers() {
        assert_eq!(parse_leading_number("42"), Some(42.0));
        assert_eq!(parse_leading_number("  -3.5"), Some(-3.5));
        assert_eq!(parse_leading_number(".5"), Some(0.5));
        assert_eq!(parse_leading_number("5."), Some(5.0));
        assert_eq!(parse_leading_number("10 * 2"), Some(10.0));
        assert_eq!(parse_leading_number("1.5e3kg"), Some(1500.0));
        assert_eq!(parse_leading_number("2e"), Some(2.0));
        assert_eq!(parse_leading_number("a + 1"), None);
        assert_eq!(parse_leading_number(""), None);
        assert_eq!(parse_leading_number("-"), None);
        assert_eq!(parse_leading_number("."), None);
    }

    #[test]
    fn input_change_leaves_the_previous_state_alone() {
        let state = CalculatorState::default();
        let next = state.apply_input_change("x", 3.0);
        assert!(state.input_values.is_empty());
        assert_eq!(next.input_values.get("x"), Some(&3.0));
    }
}
