use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Arithmetic negation: -x
    Negation,
    /// No-op sign: +x
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
    /// Right-associative: `2 ^ 3 ^ 2` is `2 ^ 9`.
    Exponentiation,
}

impl BinaryOperator {
    pub fn symbol(self) -> char {
        match self {
            BinaryOperator::Addition => '+',
            BinaryOperator::Subtraction => '-',
            BinaryOperator::Multiplication => '*',
            BinaryOperator::Division => '/',
            BinaryOperator::Modulo => '%',
            BinaryOperator::Exponentiation => '^',
        }
    }
}

/// An arithmetic expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Identifier and its byte span in the expression text.
    Variable(String, Range<usize>),
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `name(arg, ...)`
    Call {
        function: String,
        arguments: Vec<Expr>,
        span: Range<usize>,
    },
}

impl Expr {
    /// Identifiers referenced by this expression, first occurrence order, no repeats.
    pub fn references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name, _) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_references(names),
            Expr::Binary { left, right, .. } => {
                left.collect_references(names);
                right.collect_references(names);
            }
            Expr::Call { arguments, .. } => {
                for arg in arguments {
                    arg.collect_references(names);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Variable(name, _) => write!(f, "{}", name),
            Expr::Unary { operator, operand } => match operator {
                UnaryOperator::Negation => write!(f, "(-{})", operand),
                UnaryOperator::Plus => write!(f, "(+{})", operand),
            },
            Expr::Binary {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator.symbol(), right),
            Expr::Call {
                function,
                arguments,
                ..
            } => {
                write!(f, "{}(", function)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
