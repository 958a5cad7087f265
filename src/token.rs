use crate::parse::ParseError;

use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to project `src`
struct TokenGrammar;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TokenKind {
    Number,
    Identifier,
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Open,
    Close,
    Unknown,
    /// A `-` opening an expression or a parenthesized group. Negates
    /// everything up to the next `+` or `-` at the same depth.
    LeadingNegation,
    /// A `-` directly after another operator. Negates only the next primary.
    TightNegation,
}

impl TokenKind {
    fn is_operator(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Subtract
                | Self::Multiply
                | Self::Divide
                | Self::Power
                | Self::LeadingNegation
                | Self::TightNegation
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, text: &'a str) -> Self {
        Self { kind, text }
    }
}

/// Splits normalized text into tokens in a single pass, then applies the
/// token-level rewrites: unary minus classification and implicit
/// multiplication.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let pairs = TokenGrammar::parse(Rule::tokens, text)
        .map_err(|e| ParseError::Grammar(e.to_string()))?;
    let mut tokens = Vec::with_capacity(text.len());
    for pair in pairs {
        let kind = match pair.as_rule() {
            Rule::number => TokenKind::Number,
            Rule::identifier => TokenKind::Identifier,
            Rule::add => TokenKind::Add,
            Rule::subtract => TokenKind::Subtract,
            Rule::multiply => TokenKind::Multiply,
            Rule::divide => TokenKind::Divide,
            Rule::power => TokenKind::Power,
            Rule::open => TokenKind::Open,
            Rule::close => TokenKind::Close,
            Rule::unknown => TokenKind::Unknown,
            Rule::EOI => continue,
            x => return Err(ParseError::Grammar(format!("unexpected token rule {x:?}"))),
        };
        tokens.push(Token::new(kind, pair.as_str()));
    }
    classify_minus(&mut tokens);
    Ok(insert_implicit_multiplication(tokens))
}

fn classify_minus(tokens: &mut [Token]) {
    let mut prev: Option<TokenKind> = None;
    for token in tokens.iter_mut() {
        if token.kind == TokenKind::Subtract {
            match prev {
                None | Some(TokenKind::Open) => token.kind = TokenKind::LeadingNegation,
                Some(kind) if kind.is_operator() => token.kind = TokenKind::TightNegation,
                _ => {}
            }
        }
        prev = Some(token.kind);
    }
}

/// Identifiers that multiply a following group instead of calling it.
const MULTIPLYING_NAMES: [&str; 5] = ["pi", "e", "a", "x", "i"];

fn insert_implicit_multiplication(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len() + tokens.len() / 4);
    let mut prev: Option<Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            let multiply = match (p.kind, token.kind) {
                (TokenKind::Number, TokenKind::Identifier | TokenKind::Open) => true,
                (TokenKind::Close, TokenKind::Open) => true,
                (TokenKind::Identifier, TokenKind::Open) => MULTIPLYING_NAMES.contains(&p.text),
                _ => false,
            };
            if multiply {
                out.push(Token::new(TokenKind::Multiply, "*"));
            }
        }
        out.push(token);
        prev = Some(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers_and_identifiers() {
        let tokens = tokenize("12.5+.5*sin(x)").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, ["12.5", "+", ".5", "*", "sin", "(", "x", ")"]);
        assert_eq!(kinds("1.2.3"), [Number, Number]);
    }

    #[test]
    fn unknown_characters_are_tokens() {
        assert_eq!(kinds("x#2"), [Identifier, Unknown, Number]);
        assert_eq!(kinds("y=x"), [Identifier, Unknown, Identifier]);
    }

    #[test]
    fn minus_classification() {
        assert_eq!(kinds("-x"), [LeadingNegation, Identifier]);
        assert_eq!(kinds("(-x)"), [Open, LeadingNegation, Identifier, Close]);
        assert_eq!(kinds("2^-3"), [Number, Power, TightNegation, Number]);
        assert_eq!(kinds("x-1"), [Identifier, Subtract, Number]);
        assert_eq!(kinds("x--1"), [Identifier, Subtract, TightNegation, Number]);
    }

    #[test]
    fn implicit_multiplication() {
        assert_eq!(kinds("2x"), [Number, Multiply, Identifier]);
        assert_eq!(kinds("2(x)"), [Number, Multiply, Open, Identifier, Close]);
        assert_eq!(kinds("(x)(x)"), [Open, Identifier, Close, Multiply, Open, Identifier, Close]);
        assert_eq!(kinds("x(1)"), [Identifier, Multiply, Open, Number, Close]);
        assert_eq!(kinds("pi(1)"), [Identifier, Multiply, Open, Number, Close]);
        assert_eq!(kinds("f(1)"), [Identifier, Open, Number, Close]);
    }
}
