use std::collections::HashMap;

use crate::expression::{
    AngleMode, BinaryOp, Equation, EquationForm, Expression, Function, Node, Variable,
};
use crate::normalize::normalize;
use crate::token::{tokenize, Token, TokenKind};

use once_cell::sync::Lazy;
use thiserror::Error;

/// A problem found while parsing. Parsing always produces a tree; each of
/// these marks a spot where a zero (or NaN, for unknown functions) was
/// substituted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{0}' is not a number")]
    UnrecognizedToken(String),
    #[error("'{0}' is not a known function")]
    UnknownFunction(String),
    #[error("'{0}' is out of range")]
    InvalidNumber(String),
    #[error("missing ')'")]
    MissingCloseParen,
    #[error("unexpected ')'")]
    UnexpectedCloseParen,
    #[error("tokenizer failure: {0}")]
    Grammar(String),
    #[error("nested more than {} levels deep", MAX_NESTING)]
    TooDeep,
    #[error("{0} tokens is more than the {} allowed", MAX_TOKENS)]
    TooLong(usize),
}

/// Deepest run of groups, negations and right-hand operands the parser will
/// descend into.
pub const MAX_NESTING: usize = 200;
/// Longest token stream accepted for one side of an equation. Bounds the
/// height of left-leaning operator chains, which are built without recursion.
pub const MAX_TOKENS: usize = 2048;

/// A parsed tree together with everything that had to be patched over to
/// build it.
#[derive(Clone, Debug, PartialEq)]
pub struct Parsed<T> {
    pub tree: T,
    pub diagnostics: Vec<ParseError>,
}

impl<T> Parsed<T> {
    /// True if nothing was substituted while parsing.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl Equation {
    /// Parse an equation such as `x^2 + y^2 = 1` or `sin(x)`.
    ///
    /// The text is split on the first `=`. Each side is parsed on its own and
    /// the result represents `(lhs) - (rhs) = 0`. Without an `=` the result is
    /// the explicit curve `y = lhs`.
    pub fn parse(raw: &str, angle_mode: AngleMode) -> Parsed<Self> {
        let mut diagnostics = Vec::new();
        let (root, form) = match raw.split_once('=') {
            Some((lhs, rhs)) => {
                let lhs = parse_side(lhs, &mut diagnostics);
                let rhs = parse_side(rhs, &mut diagnostics);
                (Node::binary(BinaryOp::Sub, lhs, rhs), EquationForm::Implicit)
            }
            None => (parse_side(raw, &mut diagnostics), EquationForm::Explicit),
        };
        let equation = Equation {
            expression: Expression::new(root, angle_mode),
            form,
        };
        tracing::debug!(
            raw,
            parsed = %equation.expression,
            ?form,
            diagnostics = diagnostics.len(),
            "parsed equation"
        );
        Parsed {
            tree: equation,
            diagnostics,
        }
    }
}

impl Expression {
    /// Parse a single expression. An `=` here is just an unrecognized
    /// character; use [`Equation::parse`] for equations.
    pub fn parse(input: &str, angle_mode: AngleMode) -> Parsed<Self> {
        let mut diagnostics = Vec::new();
        let root = parse_side(input, &mut diagnostics);
        Parsed {
            tree: Expression::new(root, angle_mode),
            diagnostics,
        }
    }
}

fn parse_side(raw: &str, diagnostics: &mut Vec<ParseError>) -> Node {
    let text = normalize(raw);
    tracing::trace!(raw, normalized = %text, "normalized");
    let tokens = match tokenize(&text) {
        Ok(tokens) => tokens,
        Err(e) => {
            diagnostics.push(e);
            return Node::Constant(0.0);
        }
    };
    if tokens.len() > MAX_TOKENS {
        diagnostics.push(ParseError::TooLong(tokens.len()));
        return Node::Constant(0.0);
    }
    let mut parser = TokenParser {
        tokens: &tokens,
        position: 0,
        depth: 0,
        nesting: 0,
        diagnostics,
    };
    parser.expression(0)
}

#[derive(Clone, Copy, Debug)]
struct Operator {
    op: BinaryOp,
    left_power: u8,
    right_power: u8,
}

impl Operator {
    fn left(op: BinaryOp, precedence: u8) -> Self {
        Self {
            op,
            left_power: precedence,
            right_power: precedence + 1,
        }
    }

    fn right(op: BinaryOp, precedence: u8) -> Self {
        Self {
            op,
            left_power: precedence + 1,
            right_power: precedence,
        }
    }
}

/// Binding power of a leading `-`: tighter than `+ -`, looser than `* /`.
const LEADING_NEGATION_POWER: u8 = 15;
/// Binding power of a `-` that follows another operator: tighter than
/// everything, so it only takes the next primary.
const TIGHT_NEGATION_POWER: u8 = 40;

static INFIX_OPERATORS: Lazy<HashMap<TokenKind, Operator>> = Lazy::new(|| {
    use BinaryOp::*;

    HashMap::from([
        (TokenKind::Add, Operator::left(Add, 10)),
        (TokenKind::Subtract, Operator::left(Sub, 10)),
        (TokenKind::Multiply, Operator::left(Mul, 20)),
        (TokenKind::Divide, Operator::left(Div, 20)),
        (TokenKind::Power, Operator::right(Pow, 30)),
    ])
});

/// Precedence climbing over a token slice.
struct TokenParser<'t, 'a, 'd> {
    tokens: &'t [Token<'a>],
    position: usize,
    /// Number of currently open groups.
    depth: usize,
    /// Number of active `expression` calls.
    nesting: usize,
    diagnostics: &'d mut Vec<ParseError>,
}

impl<'t, 'a, 'd> TokenParser<'t, 'a, 'd> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expression(&mut self, min_power: u8) -> Node {
        if self.nesting >= MAX_NESTING {
            self.skip_rest_of_group();
            self.diagnostics.push(ParseError::TooDeep);
            return Node::Constant(0.0);
        }
        self.nesting += 1;
        let node = self.climb(min_power);
        self.nesting -= 1;
        node
    }

    fn climb(&mut self, min_power: u8) -> Node {
        let mut lhs = self.prefix();
        loop {
            let Some(token) = self.peek() else { break };
            let Some(operator) = INFIX_OPERATORS.get(&token.kind) else {
                break;
            };
            if operator.left_power < min_power {
                break;
            }
            self.bump();
            let rhs = self.expression(operator.right_power);
            lhs = Node::binary(operator.op, lhs, rhs);
        }
        lhs
    }

    fn prefix(&mut self) -> Node {
        let power = match self.peek().map(|t| t.kind) {
            Some(TokenKind::LeadingNegation) => LEADING_NEGATION_POWER,
            Some(TokenKind::TightNegation) => TIGHT_NEGATION_POWER,
            _ => return self.operand(),
        };
        self.bump();
        let only = self.expression(power);
        Node::binary(BinaryOp::Sub, Node::Constant(0.0), only)
    }

    /// True if the next token ends an operand.
    fn at_operand_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(token) => {
                (token.kind == TokenKind::Close && self.depth > 0)
                    || INFIX_OPERATORS.contains_key(&token.kind)
            }
        }
    }

    /// One primary, or zero if the run of tokens up to the next operator is
    /// anything other than exactly one primary.
    fn operand(&mut self) -> Node {
        let start = self.position;
        let primary = self.primary();
        if let Some(node) = primary {
            if self.at_operand_end() {
                return node;
            }
        }
        while !self.at_operand_end() {
            self.skip_token_or_group();
        }
        let text: String = self.tokens[start..self.position]
            .iter()
            .map(|t| t.text)
            .collect();
        self.diagnostics.push(ParseError::UnrecognizedToken(text));
        Node::Constant(0.0)
    }

    /// Skips up to, but not including, the `)` closing the current group.
    fn skip_rest_of_group(&mut self) {
        let mut open = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Close if open == 0 => break,
                TokenKind::Close => open -= 1,
                TokenKind::Open => open += 1,
                _ => {}
            }
            self.bump();
        }
    }

    fn skip_token_or_group(&mut self) {
        if let Some(Token {
            kind: TokenKind::Open,
            ..
        }) = self.bump()
        {
            let mut open = 1usize;
            while open > 0 {
                match self.bump().map(|t| t.kind) {
                    Some(TokenKind::Open) => open += 1,
                    Some(TokenKind::Close) => open -= 1,
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    /// `None` for a token that cannot start an operand at all.
    fn primary(&mut self) -> Option<Node> {
        let Some(token) = self.peek() else {
            return Some(Node::Constant(0.0));
        };
        match token.kind {
            TokenKind::Close if self.depth == 0 => {
                self.bump();
                self.diagnostics.push(ParseError::UnexpectedCloseParen);
                None
            }
            // Empty operand, such as `()` or the left side of `*3`.
            TokenKind::Close
            | TokenKind::Add
            | TokenKind::Subtract
            | TokenKind::Multiply
            | TokenKind::Divide
            | TokenKind::Power => Some(Node::Constant(0.0)),
            TokenKind::Number => {
                self.bump();
                match token.text.parse::<f64>() {
                    Ok(value) if value.is_finite() => Some(Node::Constant(value)),
                    _ => {
                        self.diagnostics
                            .push(ParseError::InvalidNumber(token.text.to_string()));
                        Some(Node::Constant(0.0))
                    }
                }
            }
            TokenKind::Identifier => {
                self.bump();
                if matches!(self.peek(), Some(t) if t.kind == TokenKind::Open) {
                    self.bump();
                    let function = Function::from_name(token.text);
                    if let Function::Unknown(name) = &function {
                        self.diagnostics
                            .push(ParseError::UnknownFunction(name.clone()));
                    }
                    let only = self.group_body();
                    return Some(Node::function(function, only));
                }
                variable(token.text).map(Node::Variable)
            }
            TokenKind::Open => {
                self.bump();
                Some(self.group_body())
            }
            // Only produced directly after an operator or an open group, both
            // of which are handled before reaching a primary.
            TokenKind::LeadingNegation | TokenKind::TightNegation => {
                self.bump();
                None
            }
            TokenKind::Unknown => {
                self.bump();
                None
            }
        }
    }

    /// Everything after an already consumed `(`, through its `)`.
    fn group_body(&mut self) -> Node {
        self.depth += 1;
        let inner = self.expression(0);
        self.depth -= 1;
        match self.peek() {
            Some(Token {
                kind: TokenKind::Close,
                ..
            }) => {
                self.bump();
            }
            _ => self.diagnostics.push(ParseError::MissingCloseParen),
        }
        inner
    }
}

fn variable(name: &str) -> Option<Variable> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some('e'), None) => Some(Variable::E),
        (Some(c), None) => Some(Variable::Letter(c)),
        _ if name == "pi" => Some(Variable::Pi),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bindings;

    fn eval(input: &str, x: f64) -> f64 {
        let parsed = Expression::parse(input, AngleMode::Radians);
        assert!(parsed.is_clean(), "{input}: {:?}", parsed.diagnostics);
        parsed.tree.evaluate(&Bindings::new().with('x', x))
    }

    fn tree(input: &str) -> Node {
        Expression::parse(input, AngleMode::Radians).tree.root
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2*x+3", 4.0), 11.0);
        assert_eq!(eval("1 * 2 + 3 * 4", 0.0), 14.0);
        assert_eq!(eval("8 / 4 * 3", 0.0), 6.0);
        assert_eq!(eval("1-2-3", 0.0), -4.0);
        assert_eq!(eval("4 ^ 3 ^ 2", 0.0), 262144.0);
        assert_eq!(eval("x^2", 5.0), 25.0);
        assert_eq!(eval("(x+1)*(x-1)", 3.0), 8.0);
    }

    #[test]
    fn auto_balanced_parentheses() {
        assert_eq!(tree("(1+2"), tree("(1+2)"));
        assert_eq!(eval("(1+2", 0.0), 3.0);
        assert_eq!(eval("2*(x+(1", 1.0), 4.0);
    }

    #[test]
    fn implicit_multiplication() {
        assert_eq!(tree("2x"), tree("2*x"));
        assert_eq!(tree("x(x+1)"), tree("x*(x+1)"));
        assert_eq!(tree("(x+1)(x-1)"), tree("(x+1)*(x-1)"));
        assert_eq!(tree("2sin(x)"), tree("2*sin(x)"));
        assert_eq!(tree("3xy"), tree("3*x*y"));
    }

    #[test]
    fn unary_minus() {
        assert_eq!(eval("-x+1", 2.0), -1.0);
        assert_eq!(eval("-x^2", 3.0), -9.0);
        assert_eq!(eval("2*-x^2", 3.0), 18.0);
        assert_eq!(eval("2^-1", 0.0), 0.5);
        assert_eq!(eval("(-2)*3", 0.0), -6.0);
        assert_eq!(eval("x--1", 1.0), 2.0);
        assert_eq!(eval("-2*3+1", 0.0), -5.0);
    }

    #[test]
    fn functions_and_constants() {
        assert_eq!(eval("sqrt(16)", 0.0), 4.0);
        assert_eq!(eval("abs(-x)", 2.5), 2.5);
        assert_eq!(eval("fact(5)", 0.0), 120.0);
        assert!((eval("sin(pi/2)", 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("ln(e)", 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("2pi", 0.0) - 2.0 * std::f64::consts::PI).abs() < 1e-12);
        assert!((eval("√(x)", 9.0) - 3.0).abs() < 1e-12);
        assert_eq!(eval("x²", 3.0), 9.0);
    }

    #[test]
    fn degrees() {
        let parsed = Expression::parse("sin(x)+acos(0)", AngleMode::Degrees);
        let value = parsed.tree.evaluate(&Bindings::new().with('x', 30.0));
        assert!((value - 90.5).abs() < 1e-9, "{value}");
    }

    #[test]
    fn numeric_edge_cases() {
        assert_eq!(eval("1/0", 0.0), f64::INFINITY);
        assert!(eval("sqrt(-1)", 0.0).is_nan());
        assert!(eval("fact(-1)", 0.0).is_nan());
    }

    #[test]
    fn empty_operands_are_zero() {
        assert_eq!(eval("", 0.0), 0.0);
        assert_eq!(eval("()", 0.0), 0.0);
        assert_eq!(eval("2**3", 0.0), 0.0);
        assert_eq!(eval("x+", 4.0), 4.0);
    }

    #[test]
    fn unrecognized_tokens_become_zero() {
        let parsed = Expression::parse("x2+1", AngleMode::Radians);
        assert_eq!(
            parsed.diagnostics,
            vec![ParseError::UnrecognizedToken("x2".to_string())]
        );
        assert_eq!(parsed.tree.evaluate_without_vars(), 1.0);

        let parsed = Expression::parse("ab*3+sin2(x)+#", AngleMode::Radians);
        assert_eq!(parsed.diagnostics.len(), 3, "{:?}", parsed.diagnostics);
        assert_eq!(parsed.tree.evaluate_without_vars(), 0.0);
    }

    #[test]
    fn unknown_function_is_nan() {
        let parsed = Expression::parse("foo(1)+1", AngleMode::Radians);
        assert_eq!(
            parsed.diagnostics,
            vec![ParseError::UnknownFunction("foo".to_string())]
        );
        assert!(parsed.tree.evaluate_without_vars().is_nan());
    }

    #[test]
    fn misordered_parentheses_recover() {
        let parsed = Expression::parse(")x(", AngleMode::Radians);
        assert!(parsed.diagnostics.contains(&ParseError::UnexpectedCloseParen));
        assert!(parsed.diagnostics.contains(&ParseError::MissingCloseParen));
        assert_eq!(parsed.tree.evaluate(&Bindings::new().with('x', 3.0)), 0.0);
    }

    #[test]
    fn equations() {
        let parsed = Equation::parse("x^2 + y^2 = 1", AngleMode::Radians);
        assert!(parsed.is_clean());
        let circle = parsed.tree;
        assert_eq!(circle.form, EquationForm::Implicit);
        assert_eq!(circle.implicit_value(1.0, 0.0, &Bindings::new()), 0.0);
        assert_eq!(circle.implicit_value(2.0, 0.0, &Bindings::new()), 3.0);

        let line = Equation::parse("2x+1", AngleMode::Radians).tree;
        assert_eq!(line.form, EquationForm::Explicit);
        assert_eq!(line.implicit_value(1.0, 3.0, &Bindings::new()), 0.0);

        // Each side is balanced on its own.
        let parsed = Equation::parse("(x+1=(y", AngleMode::Radians);
        assert!(parsed.is_clean());
        assert_eq!(parsed.tree.implicit_value(2.0, 3.0, &Bindings::new()), 0.0);
    }

    #[test]
    fn variables_are_reported() {
        let parsed = Equation::parse("a*x^2 + b = y", AngleMode::Radians);
        let vars: Vec<_> = parsed.tree.expression.variables().into_iter().collect();
        assert_eq!(vars, vec!['a', 'b', 'x', 'y']);
    }

    #[test]
    fn deep_nesting_degrades() {
        let nested = |n: usize| format!("{}x{}", "(".repeat(n), ")".repeat(n));

        let parsed = Expression::parse(&nested(150), AngleMode::Radians);
        assert!(parsed.is_clean());
        assert_eq!(parsed.tree.evaluate(&Bindings::new().with('x', 3.0)), 3.0);

        let parsed = Expression::parse(&nested(MAX_NESTING + 100), AngleMode::Radians);
        assert_eq!(parsed.diagnostics, [ParseError::TooDeep]);
        assert_eq!(parsed.tree.evaluate(&Bindings::new().with('x', 3.0)), 0.0);

        let parsed = Expression::parse(&nested(3000), AngleMode::Radians);
        assert_eq!(parsed.diagnostics, [ParseError::TooLong(6001)]);
        assert_eq!(parsed.tree, Expression::new(Node::Constant(0.0), AngleMode::Radians));

        let towers = format!("{}2", "2^".repeat(MAX_NESTING + 100));
        let parsed = Expression::parse(&towers, AngleMode::Radians);
        assert!(parsed.diagnostics.contains(&ParseError::TooDeep));

        let chain = format!("{}1", "1+".repeat(5000));
        let parsed = Expression::parse(&chain, AngleMode::Radians);
        assert_eq!(parsed.diagnostics, [ParseError::TooLong(10001)]);
    }
}
