//! Built-in numeric functions callable from expressions.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Function implementation signature. Arity is checked before the call.
pub type FunctionImpl = fn(&[f64]) -> f64;

/// Function definition
pub struct FunctionDef {
    /// Name as written in expressions (case-sensitive)
    pub name: &'static str,
    pub min_args: usize,
    /// None = unlimited
    pub max_args: Option<usize>,
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }

    /// Human-readable arity for error messages: `1`, `1 or 2`, `at least 1`.
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) if max == self.min_args + 1 => format!("{} or {}", self.min_args, max),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = FunctionRegistry {
            functions: HashMap::new(),
        };
        registry.register_arithmetic_functions();
        registry.register_exponential_functions();
        registry.register_trigonometric_functions();
        registry
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn unary(&mut self, name: &'static str, implementation: FunctionImpl) {
        self.register(FunctionDef {
            name,
            min_args: 1,
            max_args: Some(1),
            implementation,
        });
    }

    fn binary(&mut self, name: &'static str, implementation: FunctionImpl) {
        self.register(FunctionDef {
            name,
            min_args: 2,
            max_args: Some(2),
            implementation,
        });
    }

    fn register_arithmetic_functions(&mut self) {
        self.unary("sqrt", |args| args[0].sqrt());
        self.unary("cbrt", |args| args[0].cbrt());
        self.unary("abs", |args| args[0].abs());
        self.unary("floor", |args| args[0].floor());
        self.unary("ceil", |args| args[0].ceil());
        self.unary("trunc", |args| args[0].trunc());
        self.unary("sign", |args| sign(args[0]));

        self.register(FunctionDef {
            name: "round",
            min_args: 1,
            max_args: Some(2),
            implementation: fn_round,
        });
        self.register(FunctionDef {
            name: "min",
            min_args: 1,
            max_args: None,
            implementation: fn_min,
        });
        self.register(FunctionDef {
            name: "max",
            min_args: 1,
            max_args: None,
            implementation: fn_max,
        });
        self.register(FunctionDef {
            name: "hypot",
            min_args: 1,
            max_args: None,
            implementation: |args| args.iter().map(|a| a * a).sum::<f64>().sqrt(),
        });
    }

    fn register_exponential_functions(&mut self) {
        self.unary("exp", |args| args[0].exp());
        self.unary("ln", |args| args[0].ln());
        self.unary("log", |args| args[0].ln());
        self.unary("log10", |args| args[0].log10());
        self.unary("log2", |args| args[0].log2());
        self.binary("pow", |args| args[0].powf(args[1]));
    }

    fn register_trigonometric_functions(&mut self) {
        self.unary("sin", |args| args[0].sin());
        self.unary("cos", |args| args[0].cos());
        self.unary("tan", |args| args[0].tan());
        self.unary("asin", |args| args[0].asin());
        self.unary("acos", |args| args[0].acos());
        self.unary("atan", |args| args[0].atan());
        self.binary("atan2", |args| args[0].atan2(args[1]));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

pub fn registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// -1, 0 or 1; NaN stays NaN. Unlike `f64::signum`, zero maps to zero.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

// f64::min/max return the other operand when one is NaN; a NaN argument
// has to survive so the result is reported as invalid.
fn fn_min(args: &[f64]) -> f64 {
    if args.iter().any(|a| a.is_nan()) {
        return f64::NAN;
    }
    args.iter().copied().fold(f64::INFINITY, f64::min)
}

fn fn_max(args: &[f64]) -> f64 {
    if args.iter().any(|a| a.is_nan()) {
        return f64::NAN;
    }
    args.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Round half up (toward positive infinity), optionally to `digits` decimal places.
fn fn_round(args: &[f64]) -> f64 {
    let digits = args.get(1).copied().unwrap_or(0.0).trunc();
    let scale = 10f64.powf(digits);
    round_half_up(args[0] * scale) / scale
}

fn round_half_up(x: f64) -> f64 {
    let floor = x.floor();
    if x - floor >= 0.5 { floor + 1.0 } else { floor }
}
