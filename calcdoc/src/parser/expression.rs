use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::expression::{BinaryOperator, Expr, UnaryOperator};

/// Why an expression failed to parse. Every variant carries the byte span
/// of the offending text within the expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{character}'")]
    UnexpectedCharacter { character: char, span: Range<usize> },
    #[error("unsupported operator '{operator}'")]
    UnsupportedOperator { operator: String, span: Range<usize> },
    #[error("invalid number '{text}'")]
    InvalidNumber { text: String, span: Range<usize> },
    #[error("unexpected {found}")]
    UnexpectedToken { found: String, span: Range<usize> },
    #[error("unexpected end of expression")]
    UnexpectedEnd { span: Range<usize> },
    #[error("expected ')' to close '('")]
    UnclosedParen { span: Range<usize> },
    #[error("unexpected {found} after expression")]
    TrailingInput { found: String, span: Range<usize> },
    #[error("expression nested more than {} levels deep", MAX_NESTING)]
    TooDeep { span: Range<usize> },
}

impl ExpressionError {
    pub fn span(&self) -> Range<usize> {
        match self {
            ExpressionError::UnexpectedCharacter { span, .. }
            | ExpressionError::UnsupportedOperator { span, .. }
            | ExpressionError::InvalidNumber { span, .. }
            | ExpressionError::UnexpectedToken { span, .. }
            | ExpressionError::UnexpectedEnd { span }
            | ExpressionError::UnclosedParen { span }
            | ExpressionError::TooDeep { span }
            | ExpressionError::TrailingInput { span, .. } => span.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Deepest tree the parser will build. Parentheses, unary operators, call
/// arguments, `^` chains and runs of left-associative operators all count.
pub const MAX_NESTING: usize = 256;

/// Parse arithmetic expression text into an [`Expr`].
pub fn parse_expression(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = ExprParser::new(tokens, source.len());
    let expr = parser.parse_expr(0)?;
    if let Some(spanned) = parser.peek() {
        return Err(ExpressionError::TrailingInput {
            found: spanned.token.to_string(),
            span: spanned.span.clone(),
        });
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Caret => write!(f, "'^'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    span: Range<usize>,
}

fn tokenize(text: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let len = chars.len();
    let offset = |i: usize| chars.get(i).map(|(pos, _)| *pos).unwrap_or(text.len());
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let (start, c) = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }

            // Numbers: 12, 1.5, .5, 2e-3
            '0'..='9' | '.' => {
                let begin = i;
                while i < len && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                if i < len && matches!(chars[i].1, 'e' | 'E') {
                    let mut j = i + 1;
                    if j < len && matches!(chars[j].1, '+' | '-') {
                        j += 1;
                    }
                    if j < len && chars[j].1.is_ascii_digit() {
                        i = j;
                        while i < len && chars[i].1.is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let span = offset(begin)..offset(i);
                let num_str = &text[span.clone()];
                if num_str == "." {
                    return Err(ExpressionError::UnexpectedCharacter { character: '.', span });
                }
                match num_str.parse::<f64>() {
                    Ok(n) => tokens.push(Spanned { token: Token::Number(n), span }),
                    Err(_) => {
                        return Err(ExpressionError::InvalidNumber {
                            text: num_str.to_string(),
                            span,
                        });
                    }
                }
            }

            'a'..='z' | 'A'..='Z' | '_' => {
                let begin = i;
                while i < len && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let span = offset(begin)..offset(i);
                tokens.push(Spanned {
                    token: Token::Ident(text[span.clone()].to_string()),
                    span,
                });
            }

            // Operators from richer expression languages that this grammar rejects
            '=' | '!' | '<' | '>' | '&' | '|' | '?' | ':' | '~' => {
                i += 1;
                if i < len && matches!((c, chars[i].1), ('=', '=') | ('!', '=') | ('<', '=') | ('>', '=') | ('&', '&') | ('|', '|')) {
                    i += 1;
                }
                let span = start..offset(i);
                return Err(ExpressionError::UnsupportedOperator {
                    operator: text[span.clone()].to_string(),
                    span,
                });
            }

            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    other => {
                        return Err(ExpressionError::UnexpectedCharacter {
                            character: other,
                            span: start..start + other.len_utf8(),
                        });
                    }
                };
                i += 1;
                tokens.push(Spanned {
                    token,
                    span: start..offset(i),
                });
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

struct ExprParser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    /// Length of the source text, used as the span of end-of-input errors.
    end: usize,
}

// Binding powers. Left-assoc: right = left + 1. Right-assoc: right = left.
const BP_ADDITIVE: u8 = 2; // + -
const BP_MULTIPLICATIVE: u8 = 4; // * / %
const BP_UNARY: u8 = 6; // -x +x
const BP_POWER: u8 = 8; // ^

impl ExprParser {
    fn new(tokens: Vec<Spanned>, end: usize) -> Self {
        ExprParser {
            tokens,
            pos: 0,
            depth: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn end_span(&self) -> Range<usize> {
        self.end..self.end
    }

    /// `extra` is the length of the operator chain already folded into the
    /// left operand at this level.
    fn check_depth(&self, extra: usize) -> Result<(), ExpressionError> {
        if self.depth + extra <= MAX_NESTING {
            return Ok(());
        }
        let span = self
            .peek()
            .map(|s| s.span.clone())
            .unwrap_or_else(|| self.end_span());
        Err(ExpressionError::TooDeep { span })
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ExpressionError> {
        self.depth += 1;
        let result = self.parse_operators(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_operators(&mut self, min_bp: u8) -> Result<Expr, ExpressionError> {
        self.check_depth(0)?;
        let mut left = self.parse_prefix()?;
        let mut chain = 0;

        loop {
            let Some(token) = self.peek_token() else { break };
            let Some((operator, l_bp, r_bp)) = infix_bp(token) else { break };

            if l_bp < min_bp {
                break;
            }

            chain += 1;
            self.check_depth(chain)?;
            self.advance();
            let right = self.parse_expr(r_bp)?;
            left = Expr::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ExpressionError> {
        let Some(Spanned { token, span }) = self.advance() else {
            return Err(ExpressionError::UnexpectedEnd {
                span: self.end_span(),
            });
        };

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),

            Token::Ident(name) => {
                if self.peek_token() == Some(&Token::LParen) {
                    self.advance();
                    let arguments = self.parse_arguments(&span)?;
                    let span = span.start..self.previous_end();
                    Ok(Expr::Call {
                        function: name,
                        arguments,
                        span,
                    })
                } else {
                    Ok(Expr::Variable(name, span))
                }
            }

            Token::Minus => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::Unary {
                    operator: UnaryOperator::Negation,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::Unary {
                    operator: UnaryOperator::Plus,
                    operand: Box::new(operand),
                })
            }

            Token::LParen => {
                let expr = self.parse_expr(0)?;
                self.expect_close(&span)?;
                Ok(expr)
            }

            other => Err(ExpressionError::UnexpectedToken {
                found: other.to_string(),
                span,
            }),
        }
    }

    /// Comma-separated call arguments; the opening paren is already consumed.
    fn parse_arguments(&mut self, open: &Range<usize>) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if self.peek_token() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr(0)?);
            match self.peek_token() {
                Some(Token::Comma) => {
                    self.advance();
                }
                _ => {
                    self.expect_close(open)?;
                    return Ok(args);
                }
            }
        }
    }

    fn expect_close(&mut self, open: &Range<usize>) -> Result<(), ExpressionError> {
        match self.peek_token() {
            Some(Token::RParen) => {
                self.advance();
                Ok(())
            }
            _ => Err(ExpressionError::UnclosedParen {
                span: open.start..self.end,
            }),
        }
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|s| s.span.end)
            .unwrap_or(self.end)
    }
}

/// Infix operator and its (left, right) binding powers, or None if not infix.
fn infix_bp(token: &Token) -> Option<(BinaryOperator, u8, u8)> {
    match token {
        Token::Plus => Some((BinaryOperator::Addition, BP_ADDITIVE, BP_ADDITIVE + 1)),
        Token::Minus => Some((BinaryOperator::Subtraction, BP_ADDITIVE, BP_ADDITIVE + 1)),
        Token::Star => Some((BinaryOperator::Multiplication, BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1)),
        Token::Slash => Some((BinaryOperator::Division, BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1)),
        Token::Percent => Some((BinaryOperator::Modulo, BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1)),
        Token::Caret => Some((BinaryOperator::Exponentiation, BP_POWER, BP_POWER)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(source: &str) -> String {
        parse_expression(source).unwrap().to_string()
    }

    #[test]
    fn precedence() {
        assert_eq!(shape("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(shape("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(shape("2 ^ 3 ^ 2"), "(2 ^ (3 ^ 2))");
        assert_eq!(shape("a - b - c"), "((a - b) - c)");
        assert_eq!(shape("-2 ^ 2"), "(-(2 ^ 2))");
        assert_eq!(shape("-a * b"), "((-a) * b)");
        assert_eq!(shape("2 * -3"), "(2 * (-3))");
    }

    #[test]
    fn calls() {
        assert_eq!(shape("max(a, b * 2, 3)"), "max(a, (b * 2), 3)");
        assert_eq!(shape("sqrt(abs(x))"), "sqrt(abs(x))");
        assert_eq!(shape("pi()"), "pi()");
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_expression(".5").unwrap(), Expr::Number(0.5));
        assert_eq!(parse_expression("2e3").unwrap(), Expr::Number(2000.0));
        assert_eq!(parse_expression("1.25E-2").unwrap(), Expr::Number(0.0125));
        assert!(matches!(
            parse_expression("1.2.3"),
            Err(ExpressionError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn references_in_order() {
        let expr = parse_expression("price * qty + price / max(qty, fee)").unwrap();
        assert_eq!(expr.references(), vec!["price", "qty", "fee"]);
    }

    #[test]
    fn spans_point_into_source() {
        match parse_expression("a + b").unwrap() {
            Expr::Binary { right, .. } => assert_eq!(*right, Expr::Variable("b".into(), 4..5)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn errors() {
        assert!(matches!(
            parse_expression("a == b"),
            Err(ExpressionError::UnsupportedOperator { ref operator, .. }) if operator == "=="
        ));
        assert!(matches!(
            parse_expression("x > 1 ? 2 : 3"),
            Err(ExpressionError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            parse_expression("1 +"),
            Err(ExpressionError::UnexpectedEnd { span }) if span == (3..3)
        ));
        assert!(matches!(
            parse_expression("(1 + 2"),
            Err(ExpressionError::UnclosedParen { .. })
        ));
        assert!(matches!(
            parse_expression("1 2"),
            Err(ExpressionError::TrailingInput { .. })
        ));
        assert!(matches!(
            parse_expression("* 2"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_expression("$5"),
            Err(ExpressionError::UnexpectedCharacter { character: '$', .. })
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse_expression(&shallow).unwrap(), Expr::Number(1.0));

        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            parse_expression(&parens),
            Err(ExpressionError::TooDeep { .. })
        ));

        let negations = format!("{}1", "-".repeat(10_000));
        assert!(matches!(
            parse_expression(&negations),
            Err(ExpressionError::TooDeep { .. })
        ));

        let calls = format!("{}1{}", "abs(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            parse_expression(&calls),
            Err(ExpressionError::TooDeep { .. })
        ));

        let powers = vec!["2"; 10_000].join(" ^ ");
        assert!(matches!(
            parse_expression(&powers),
            Err(ExpressionError::TooDeep { .. })
        ));

        let sum = vec!["1"; 10_000].join(" + ");
        assert!(matches!(
            parse_expression(&sum),
            Err(ExpressionError::TooDeep { .. })
        ));
    }
}
