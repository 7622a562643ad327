//! `$filter` and `$orderby` expression parsing.
//!
//! Grammar (keywords are lowercase, whitespace separates tokens):
//!
//! ```text
//! or_expr    := and_expr ( "or" and_expr )*
//! and_expr   := unary ( "and" unary )*
//! unary      := "not" unary | primary
//! primary    := "(" or_expr ")" | function | comparison
//! function   := ("contains" | "startswith" | "endswith") "(" property "," string ")"
//! comparison := operand ("eq" | "ne" | "gt" | "ge" | "lt" | "le") operand
//! operand    := property | integer | string | "null"
//! order_by   := property [ "asc" | "desc" ] ( "," property [ "asc" | "desc" ] )*
//! ```
//!
//! Properties are resolved against an [`EntitySchema`] while parsing, so the
//! resulting tree is already type-checked.
//!
//! Requests are served on small coroutine stacks, so a `$filter` is bounded
//! before the recursive descent starts: at most [`MAX_FILTER_LEN`] bytes,
//! [`MAX_DEPTH`] levels of parentheses and `not`, and [`MAX_OPERATORS`]
//! logical operators in total.

use super::error::ValidationError;
use crate::entity::{EdmType, EntitySchema, PropertyDef};

const FILTER: &str = "$filter";
const ORDER_BY: &str = "$orderby";

/// Longest accepted `$filter`, in bytes.
pub const MAX_FILTER_LEN: usize = 2048;

/// Deepest accepted nesting of `(` and `not`.
pub const MAX_DEPTH: usize = 8;

/// Most `and`, `or` and `not` operators in one `$filter`.
pub const MAX_OPERATORS: usize = 32;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "eq" => CompareOp::Eq,
            "ne" => CompareOp::Ne,
            "gt" => CompareOp::Gt,
            "ge" => CompareOp::Ge,
            "lt" => CompareOp::Lt,
            "le" => CompareOp::Le,
            _ => return None,
        })
    }

    /// Operator with its operands swapped (`5 lt id` is `id gt 5`).
    fn flipped(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            other => other,
        }
    }
}

/// String predicate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFunction {
    Contains,
    StartsWith,
    EndsWith,
}

impl StringFunction {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "contains" => Some(StringFunction::Contains),
            "startswith" => Some(StringFunction::StartsWith),
            "endswith" => Some(StringFunction::EndsWith),
            _ => None,
        }
    }
}

/// Literal operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Str(String),
    Null,
}

impl Literal {
    fn describe(&self) -> &'static str {
        match self {
            Literal::Int(_) => "integer literal",
            Literal::Str(_) => "string literal",
            Literal::Null => "null",
        }
    }
}

/// Type-checked filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    Compare {
        property: &'static PropertyDef,
        op: CompareOp,
        value: Literal,
    },
    /// `property eq null` / `property ne null`
    IsNull {
        property: &'static PropertyDef,
        negated: bool,
    },
    Function {
        function: StringFunction,
        property: &'static PropertyDef,
        argument: String,
    },
    Not(Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByItem {
    pub property: &'static PropertyDef,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{s}'"),
            Token::Int(i) => format!("'{i}'"),
            Token::Str(s) => format!("'{}'", s.replace('\'', "''")),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

fn syntax(option: &'static str, position: usize, message: impl Into<String>) -> ValidationError {
    ValidationError::Syntax {
        option,
        position,
        message: message.into(),
    }
}

/// Split `input` into `(byte offset, token)` pairs.
fn tokenize(option: &'static str, input: &str) -> Result<Vec<(usize, Token)>, ValidationError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((pos, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((pos, Token::RParen));
            }
            ',' => {
                chars.next();
                tokens.push((pos, Token::Comma));
            }
            '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\'')) => {
                            // '' is an escaped quote
                            if matches!(chars.peek(), Some((_, '\''))) {
                                chars.next();
                                value.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some((_, ch)) => value.push(ch),
                        None => return Err(syntax(option, pos, "unterminated string literal")),
                    }
                }
                tokens.push((pos, Token::Str(value)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text
                    .parse::<i64>()
                    .map_err(|_| syntax(option, pos, format!("invalid integer literal '{text}'")))?;
                tokens.push((pos, Token::Int(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, w)) = chars.peek() {
                    if w.is_alphanumeric() || w == '_' {
                        word.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((pos, Token::Ident(word)));
            }
            other => return Err(syntax(option, pos, format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

/// Reject token streams whose parse tree would be too deep.
///
/// Mirrors the recursion of [`Parser::unary`] and [`Parser::primary`]: every
/// open parenthesis is one level, and every pending `not` is one more level
/// until the `and`/`or` or `)` that ends its operand.
fn check_nesting(option: &'static str, tokens: &[(usize, Token)]) -> Result<(), ValidationError> {
    // pending `not`s per open group; index 0 is the top level
    let mut groups: Vec<usize> = vec![0];
    let mut operators = 0;

    for (position, token) in tokens {
        match token {
            Token::LParen => groups.push(0),
            Token::RParen if groups.len() > 1 => {
                groups.pop();
            }
            Token::Ident(w) if w == "not" => {
                operators += 1;
                if let Some(pending) = groups.last_mut() {
                    *pending += 1;
                }
            }
            Token::Ident(w) if w == "and" || w == "or" => {
                operators += 1;
                if let Some(pending) = groups.last_mut() {
                    *pending = 0;
                }
            }
            _ => {}
        }

        let depth = groups.len() - 1 + groups.iter().sum::<usize>();
        if depth > MAX_DEPTH {
            return Err(syntax(
                option,
                *position,
                format!("expression is nested more than {MAX_DEPTH} levels deep"),
            ));
        }
        if operators > MAX_OPERATORS {
            return Err(syntax(
                option,
                *position,
                format!("expression has more than {MAX_OPERATORS} logical operators"),
            ));
        }
    }
    Ok(())
}

enum Operand {
    Property(&'static PropertyDef),
    Literal(Literal),
}

struct Parser<'a> {
    option: &'static str,
    schema: &'a EntitySchema,
    tokens: Vec<(usize, Token)>,
    index: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn new(option: &'static str, schema: &'a EntitySchema, input: &str) -> Result<Self, ValidationError> {
        let tokens = tokenize(option, input)?;
        check_nesting(option, &tokens)?;
        Ok(Self {
            option,
            schema,
            tokens,
            index: 0,
            end: input.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.index).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == keyword)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ValidationError> {
        let position = self.position();
        match self.next() {
            Some((_, token)) if token == expected => Ok(()),
            Some((_, token)) => Err(syntax(
                self.option,
                position,
                format!("expected {} but found {}", expected.describe(), token.describe()),
            )),
            None => Err(syntax(
                self.option,
                position,
                format!("expected {} but reached the end", expected.describe()),
            )),
        }
    }

    fn finish(&self) -> Result<(), ValidationError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(syntax(
                self.option,
                self.position(),
                format!("unexpected {}", token.describe()),
            )),
        }
    }

    fn resolve(&self, name: &str) -> Result<&'static PropertyDef, ValidationError> {
        self.schema
            .property(name)
            .ok_or_else(|| ValidationError::UnknownProperty {
                option: self.option,
                property: name.to_string(),
            })
    }

    fn or_expr(&mut self) -> Result<FilterExpr, ValidationError> {
        let mut left = self.and_expr()?;
        while self.peek_keyword("or") {
            self.next();
            let right = self.and_expr()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<FilterExpr, ValidationError> {
        let mut left = self.unary()?;
        while self.peek_keyword("and") {
            self.next();
            let right = self.unary()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<FilterExpr, ValidationError> {
        if self.peek_keyword("not") {
            self.next();
            return Ok(FilterExpr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<FilterExpr, ValidationError> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.or_expr()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        if let Some(Token::Ident(word)) = self.peek() {
            if let Some(function) = StringFunction::from_name(word) {
                if matches!(self.tokens.get(self.index + 1), Some((_, Token::LParen))) {
                    self.next();
                    return self.function(function);
                }
            }
        }

        self.comparison()
    }

    fn function(&mut self, function: StringFunction) -> Result<FilterExpr, ValidationError> {
        self.expect(Token::LParen)?;
        let position = self.position();
        let property = match self.operand()? {
            Operand::Property(p) => p,
            Operand::Literal(_) => {
                return Err(syntax(self.option, position, "expected a property as first argument"))
            }
        };
        if property.edm_type != EdmType::String {
            return Err(ValidationError::TypeMismatch {
                property: property.name.to_string(),
                expected: property.edm_type,
                found: "string function",
            });
        }
        self.expect(Token::Comma)?;
        let position = self.position();
        let argument = match self.next() {
            Some((_, Token::Str(s))) => s,
            Some((_, other)) => {
                return Err(syntax(
                    self.option,
                    position,
                    format!("expected a string literal but found {}", other.describe()),
                ))
            }
            None => return Err(syntax(self.option, position, "expected a string literal")),
        };
        self.expect(Token::RParen)?;
        Ok(FilterExpr::Function {
            function,
            property,
            argument,
        })
    }

    fn operand(&mut self) -> Result<Operand, ValidationError> {
        let position = self.position();
        match self.next() {
            Some((_, Token::Int(i))) => Ok(Operand::Literal(Literal::Int(i))),
            Some((_, Token::Str(s))) => Ok(Operand::Literal(Literal::Str(s))),
            Some((_, Token::Ident(w))) if w == "null" => Ok(Operand::Literal(Literal::Null)),
            Some((_, Token::Ident(w))) => Ok(Operand::Property(self.resolve(&w)?)),
            Some((_, other)) => Err(syntax(
                self.option,
                position,
                format!("expected a property or literal but found {}", other.describe()),
            )),
            None => Err(syntax(self.option, position, "expected a property or literal")),
        }
    }

    fn comparison(&mut self) -> Result<FilterExpr, ValidationError> {
        let left = self.operand()?;

        let position = self.position();
        let op = match self.next() {
            Some((_, Token::Ident(w))) => CompareOp::from_keyword(&w).ok_or_else(|| {
                syntax(self.option, position, format!("unknown operator '{w}'"))
            })?,
            Some((_, other)) => {
                return Err(syntax(
                    self.option,
                    position,
                    format!("expected a comparison operator but found {}", other.describe()),
                ))
            }
            None => return Err(syntax(self.option, position, "expected a comparison operator")),
        };

        let right = self.operand()?;

        let (property, op, value) = match (left, right) {
            (Operand::Property(p), Operand::Literal(v)) => (p, op, v),
            (Operand::Literal(v), Operand::Property(p)) => (p, op.flipped(), v),
            _ => {
                return Err(syntax(
                    self.option,
                    position,
                    "a comparison needs exactly one property and one literal",
                ))
            }
        };

        check_literal(property, op, &value)?;

        Ok(match value {
            Literal::Null => FilterExpr::IsNull {
                property,
                negated: op == CompareOp::Ne,
            },
            value => FilterExpr::Compare { property, op, value },
        })
    }

    fn order_by(&mut self) -> Result<Vec<OrderByItem>, ValidationError> {
        let mut items: Vec<OrderByItem> = Vec::new();
        loop {
            let position = self.position();
            let property = match self.next() {
                Some((_, Token::Ident(w))) => self.resolve(&w)?,
                Some((_, other)) => {
                    return Err(syntax(
                        self.option,
                        position,
                        format!("expected a property but found {}", other.describe()),
                    ))
                }
                None => return Err(syntax(self.option, position, "expected a property")),
            };
            if items.iter().any(|i| i.property.name == property.name) {
                return Err(ValidationError::InvalidValue {
                    option: self.option,
                    value: property.name.to_string(),
                    reason: "property is listed more than once".to_string(),
                });
            }

            let direction = if self.peek_keyword("desc") {
                self.next();
                Direction::Desc
            } else {
                if self.peek_keyword("asc") {
                    self.next();
                }
                Direction::Asc
            };
            items.push(OrderByItem { property, direction });

            if self.peek() == Some(&Token::Comma) {
                self.next();
                continue;
            }
            return Ok(items);
        }
    }
}

fn check_literal(property: &PropertyDef, op: CompareOp, value: &Literal) -> Result<(), ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        property: property.name.to_string(),
        expected: property.edm_type,
        found: value.describe(),
    };
    match (property.edm_type, value) {
        (_, Literal::Null) if matches!(op, CompareOp::Eq | CompareOp::Ne) => Ok(()),
        (_, Literal::Null) => Err(mismatch()),
        (EdmType::Int32, Literal::Int(i)) if i32::try_from(*i).is_ok() => Ok(()),
        (EdmType::Int32, Literal::Int(i)) => Err(ValidationError::InvalidValue {
            option: FILTER,
            value: i.to_string(),
            reason: format!("out of range for {}", EdmType::Int32),
        }),
        (EdmType::String, Literal::Str(_)) => Ok(()),
        _ => Err(mismatch()),
    }
}

/// Parse a `$filter` value against `schema`.
pub fn parse_filter(input: &str, schema: &EntitySchema) -> Result<FilterExpr, ValidationError> {
    if input.len() > MAX_FILTER_LEN {
        return Err(ValidationError::InvalidValue {
            option: FILTER,
            value: format!("{}...", input.chars().take(32).collect::<String>()),
            reason: format!("longer than {MAX_FILTER_LEN} bytes"),
        });
    }
    let mut parser = Parser::new(FILTER, schema, input)?;
    if parser.peek().is_none() {
        return Err(syntax(FILTER, 0, "empty expression"));
    }
    let expr = parser.or_expr()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse an `$orderby` value against `schema`.
pub fn parse_order_by(input: &str, schema: &EntitySchema) -> Result<Vec<OrderByItem>, ValidationError> {
    let mut parser = Parser::new(ORDER_BY, schema, input)?;
    let items = parser.order_by()?;
    parser.finish()?;
    Ok(items)
}
