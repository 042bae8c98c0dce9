// src/expr/parser.rs

use crate::error::{ReportError, Result};
use crate::model::state::ContextRoot;

type ParseResult<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Root(ContextRoot),
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional {
        then: Box<Expr>,
        condition: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call(Builtin, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Round,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "len" => Some(Self::Len),
            "round" => Some(Self::Round),
            _ => None,
        }
    }

    fn accepts(self, argc: usize) -> bool {
        match self {
            Builtin::Len => argc == 1,
            Builtin::Round => argc == 1 || argc == 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Round => "round",
        }
    }
}

impl Expr {
    /// Parses a binding expression such as `soil.soil_layers[0].NO3`.
    pub fn parse(text: &str) -> Result<Self> {
        let wrap = |reason: String| ReportError::Parse {
            expression: text.to_string(),
            reason,
        };
        let tokens = tokenize(text).map_err(wrap)?;
        let mut parser = Parser::new(tokens);
        let expr = parser.parse_expression().map_err(wrap)?;
        parser.expect_end().map_err(wrap)?;
        Ok(expr)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Integer(i64),
    Float(f64),
    Text(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Compare(BinaryOp),
}

const KEYWORDS: [&str; 7] = ["if", "else", "and", "or", "not", "True", "False"];

fn tokenize(input: &str) -> ParseResult<Vec<Token>> {
    let mut chars = input.chars().peekable();
    let mut tokens = Vec::new();
    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '<' | '>' | '=' | '!' => tokens.push(Token::Compare(read_operator(&mut chars)?)),
            '\'' | '"' => tokens.push(Token::Text(read_text(&mut chars)?)),
            '0'..='9' => tokens.push(read_number(&mut chars)?),
            _ if is_ident_start(ch) => tokens.push(Token::Ident(read_ident(&mut chars))),
            _ => return Err(format!("unexpected character '{}'", ch)),
        }
    }
    Ok(tokens)
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn read_operator(chars: &mut Chars<'_>) -> ParseResult<BinaryOp> {
    let first = chars.next().ok_or("missing operator")?;
    let followed_by_eq = matches!(chars.peek(), Some('='));
    if followed_by_eq {
        chars.next();
    }
    match (first, followed_by_eq) {
        ('<', true) => Ok(BinaryOp::Le),
        ('<', false) => Ok(BinaryOp::Lt),
        ('>', true) => Ok(BinaryOp::Ge),
        ('>', false) => Ok(BinaryOp::Gt),
        ('=', true) => Ok(BinaryOp::Eq),
        ('!', true) => Ok(BinaryOp::Ne),
        ('=', false) => Err("assignment is not allowed, use '=='".to_string()),
        _ => Err(format!("unknown operator '{}'", first)),
    }
}

fn read_text(chars: &mut Chars<'_>) -> ParseResult<String> {
    let quote = chars.next().ok_or("missing quote")?;
    let mut text = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(escaped) => text.push(escaped),
                None => break,
            },
            Some(ch) if ch == quote => return Ok(text),
            Some(ch) => text.push(ch),
            None => break,
        }
    }
    Err("unterminated string literal".to_string())
}

fn read_number(chars: &mut Chars<'_>) -> ParseResult<Token> {
    let mut buffer = String::new();
    let mut is_float = false;
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_digit() {
            buffer.push(ch);
            chars.next();
        } else if ch == '.' && !is_float {
            // `1.` followed by an identifier would be attribute access on a literal; reject early.
            let mut lookahead = chars.clone();
            lookahead.next();
            if !matches!(lookahead.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(format!("malformed number '{}.'", buffer));
            }
            is_float = true;
            buffer.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    if is_float {
        buffer
            .parse()
            .map(Token::Float)
            .map_err(|err| format!("bad number '{}': {}", buffer, err))
    } else {
        buffer
            .parse()
            .map(Token::Integer)
            .map_err(|err| format!("bad integer '{}': {}", buffer, err))
    }
}

fn read_ident(chars: &mut Chars<'_>) -> String {
    let mut ident = String::new();
    while let Some(&ch) = chars.peek() {
        if is_ident_part(ch) {
            ident.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

const fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

const fn is_ident_part(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let then = self.parse_or()?;
        if !self.consume_keyword("if") {
            return Ok(then);
        }
        let condition = self.parse_or()?;
        if !self.consume_keyword("else") {
            return Err("conditional is missing its 'else' branch".to_string());
        }
        let otherwise = self.parse_expression()?;
        Ok(Expr::Conditional {
            then: Box::new(then),
            condition: Box::new(condition),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.consume_keyword("or") {
            let rhs = self.parse_and()?;
            expr = Expr::Binary(BinaryOp::Or, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_not()?;
        while self.consume_keyword("and") {
            let rhs = self.parse_not()?;
            expr = Expr::Binary(BinaryOp::And, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.consume_keyword("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_additive()?;
        if let Some(Token::Compare(op)) = self.peek().cloned() {
            self.advance();
            let rhs = self.parse_additive()?;
            return Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_term()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let field = self.expect_ident()?;
                    expr = Expr::Field(Box::new(expr), field);
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.advance() {
            Some(Token::Integer(value)) => Ok(Expr::Integer(value)),
            Some(Token::Float(value)) => Ok(Expr::Float(value)),
            Some(Token::Text(value)) => Ok(Expr::Text(value)),
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => self.parse_name(name),
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("expression ended unexpectedly".to_string()),
        }
    }

    fn parse_name(&mut self, name: String) -> ParseResult<Expr> {
        match name.as_str() {
            "True" => return Ok(Expr::Bool(true)),
            "False" => return Ok(Expr::Bool(false)),
            keyword if KEYWORDS.contains(&keyword) => {
                return Err(format!("unexpected keyword '{}'", keyword))
            }
            _ => {}
        }

        if matches!(self.peek(), Some(Token::LParen)) {
            let builtin = Builtin::from_name(&name)
                .ok_or_else(|| format!("function '{}' is not available", name))?;
            self.advance();
            let args = self.parse_arguments()?;
            if !builtin.accepts(args.len()) {
                return Err(format!(
                    "{}() does not take {} argument(s)",
                    builtin.name(),
                    args.len()
                ));
            }
            return Ok(Expr::Call(builtin, args));
        }

        ContextRoot::from_name(&name)
            .map(Expr::Root)
            .ok_or_else(|| format!("unknown context object '{}'", name))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err("expected ',' or ')' in argument list".to_string()),
            }
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, label: &str) -> ParseResult<()> {
        match self.advance() {
            Some(ref found) if found == token => Ok(()),
            Some(found) => Err(format!("expected {}, found {:?}", label, found)),
            None => Err(format!("expected {}, found end of expression", label)),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.advance() {
            Some(Token::Ident(name)) if !KEYWORDS.contains(&name.as_str()) => Ok(name),
            Some(found) => Err(format!("expected a field name, found {:?}", found)),
            None => Err("expected a field name, found end of expression".to_string()),
        }
    }

    fn expect_end(&self) -> ParseResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(format!("unexpected trailing token {:?}", token)),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(base: Expr, name: &str) -> Expr {
        Expr::Field(Box::new(base), name.to_string())
    }

    #[test]
    fn parses_layer_path() {
        let expr = Expr::parse("soil.soil_layers[0].NO3").unwrap();
        let expected = field(
            Expr::Index(
                Box::new(field(Expr::Root(ContextRoot::Soil), "soil_layers")),
                Box::new(Expr::Integer(0)),
            ),
            "NO3",
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn parses_conditional_with_dict_key() {
        let expr = Expr::parse("pen.ration['objective'] if pen.pen_populated else 0").unwrap();
        match expr {
            Expr::Conditional {
                then,
                condition,
                otherwise,
            } => {
                assert_eq!(
                    *then,
                    Expr::Index(
                        Box::new(field(Expr::Root(ContextRoot::Pen), "ration")),
                        Box::new(Expr::Text("objective".to_string())),
                    )
                );
                assert_eq!(*condition, field(Expr::Root(ContextRoot::Pen), "pen_populated"));
                assert_eq!(*otherwise, Expr::Integer(0));
            }
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn arithmetic_binds_tighter_than_indexing_brackets() {
        let expr = Expr::parse("weather.rainfall[time.year - 1][time.day - 1]").unwrap();
        assert!(matches!(expr, Expr::Index(_, ref idx) if matches!(**idx, Expr::Binary(BinaryOp::Sub, _, _))));
    }

    #[test]
    fn parses_builtins_with_arity() {
        assert!(matches!(
            Expr::parse("round(soil.p_act_annual, 3)").unwrap(),
            Expr::Call(Builtin::Round, ref args) if args.len() == 2
        ));
        assert!(matches!(
            Expr::parse("len(pen.animals_in_pen)").unwrap(),
            Expr::Call(Builtin::Len, ref args) if args.len() == 1
        ));
        assert!(Expr::parse("len(pen.a, pen.b)").is_err());
    }

    #[test]
    fn rejects_anything_outside_the_language() {
        for text in [
            "__import__('os')",
            "globals",
            "soil.x = 1",
            "soil.",
            "soil[0",
            "1 if soil.x",
            "'open",
            "soil.x; soil.y",
            "lambda",
        ] {
            assert!(Expr::parse(text).is_err(), "{} should not parse", text);
        }
    }

    #[test]
    fn parse_error_carries_expression_text() {
        let err = Expr::parse("open('x')").unwrap_err();
        assert!(err.to_string().contains("open('x')"));
    }
}
