//! Expression syntax tree and parser.
//!
//! A Pratt parser over the token stream from [`lexer`](super::lexer). The
//! grammar is the expression subset markup bindings use; statements other
//! than `;`-separated expressions inside arrow bodies are not supported.

use std::sync::Arc;

use super::lexer::{tokenize, Spanned, Token};
use crate::error::EvalError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PropertyKey {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: PropertyKey,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Arrow {
        params: Arc<[String]>,
        body: Arc<[Expr]>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `;`-separated sequence; evaluates to the last value.
    Sequence(Vec<Expr>),
}

/// Parse `src` into a single expression.
pub(crate) fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, index: 0 };
    let expr = parser.sequence()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
}

// binding powers, loosest first
const BP_ASSIGN: u8 = 1;
const BP_TERNARY: u8 = 2;
const BP_NULLISH: u8 = 3;
const BP_OR: u8 = 4;
const BP_AND: u8 = 5;
const BP_EQUALITY: u8 = 6;
const BP_RELATIONAL: u8 = 7;
const BP_ADDITIVE: u8 = 8;
const BP_MULTIPLICATIVE: u8 = 9;
const BP_PREFIX: u8 = 10;

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.index + offset).min(self.tokens.len() - 1)].token
    }

    fn position(&self) -> usize {
        self.tokens[self.index.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn at(&self, punct: &str) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == punct)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.at(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), EvalError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected `{punct}`")))
        }
    }

    fn expect_eof(&self) -> Result<(), EvalError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("expected end of expression")),
        }
    }

    fn unexpected(&self, message: &str) -> EvalError {
        let found = match self.peek() {
            Token::Eof => "end of input".to_string(),
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string {s:?}"),
            Token::Ident(name) => format!("`{name}`"),
            Token::Punct(p) => format!("`{p}`"),
        };
        EvalError::syntax(self.position(), format!("{message}, found {found}"))
    }

    fn sequence(&mut self) -> Result<Expr, EvalError> {
        let mut items = vec![self.expression(0)?];
        while self.eat(";") {
            if matches!(self.peek(), Token::Eof) || self.at("}") {
                break;
            }
            items.push(self.expression(0)?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Sequence(items)
        })
    }

    fn expression(&mut self, min_bp: u8) -> Result<Expr, EvalError> {
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }

        let mut lhs = self.prefix()?;

        loop {
            let Token::Punct(op) = *self.peek() else { break };

            if let Some(assign) = assign_op(op) {
                if min_bp > BP_ASSIGN {
                    break;
                }
                if !matches!(lhs, Expr::Ident(_) | Expr::Member { .. }) {
                    return Err(EvalError::NotAssignable(format!("{lhs:?}")));
                }
                self.advance();
                let value = self.expression(BP_ASSIGN)?;
                lhs = Expr::Assign {
                    op: assign,
                    target: Box::new(lhs),
                    value: Box::new(value),
                };
                continue;
            }

            if op == "?" {
                if min_bp > BP_TERNARY {
                    break;
                }
                self.advance();
                let consequent = self.expression(BP_ASSIGN)?;
                self.expect(":")?;
                let alternate = self.expression(BP_ASSIGN)?;
                lhs = Expr::Conditional {
                    test: Box::new(lhs),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                };
                continue;
            }

            let Some((bp, kind)) = infix(op) else { break };
            if bp <= min_bp {
                break;
            }
            self.advance();
            let rhs = self.expression(bp)?;
            lhs = match kind {
                Infix::Binary(op) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                Infix::Logical(op) => Expr::Logical(op, Box::new(lhs), Box::new(rhs)),
            };
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Token::Punct("!") => Some(UnaryOp::Not),
            Token::Punct("-") => Some(UnaryOp::Neg),
            Token::Punct("+") => Some(UnaryOp::Plus),
            Token::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.expression(BP_PREFIX)?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        let primary = self.primary()?;
        self.postfix(primary)
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, EvalError> {
        loop {
            if self.eat(".") {
                let name = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: PropertyKey::Named(name),
                    optional: false,
                };
            } else if self.eat("?.") {
                let property = if self.eat("[") {
                    let key = self.expression(0)?;
                    self.expect("]")?;
                    PropertyKey::Computed(Box::new(key))
                } else {
                    PropertyKey::Named(self.property_name()?)
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    optional: true,
                };
            } else if self.eat("[") {
                let key = self.expression(0)?;
                self.expect("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: PropertyKey::Computed(Box::new(key)),
                    optional: false,
                };
            } else if self.eat("(") {
                let args = self.list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn property_name(&mut self) -> Result<String, EvalError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("expected property name")),
        }
    }

    /// Comma-separated expressions up to `close`, allowing a trailing comma.
    fn list(&mut self, close: &str) -> Result<Vec<Expr>, EvalError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression(BP_ASSIGN - 1)?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let token = self.peek().clone();
        if matches!(token, Token::Eof) {
            return Err(EvalError::syntax(self.position(), "unexpected end of expression"));
        }
        if matches!(token, Token::Punct(p) if !matches!(p, "(" | "[" | "{")) {
            return Err(self.unexpected("expected expression"));
        }
        self.advance();
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::from(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Ident(name),
            }),
            Token::Punct("(") => {
                let inner = self.expression(0)?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => Ok(Expr::Array(self.list("]")?)),
            _ => self.object(),
        }
    }

    fn object(&mut self) -> Result<Expr, EvalError> {
        let mut entries = Vec::new();
        while !self.eat("}") {
            let key = match self.peek().clone() {
                Token::Ident(name) => name,
                Token::Str(s) => s,
                Token::Number(n) => Value::Number(n).to_js_string(),
                _ => return Err(self.unexpected("expected object key")),
            };
            self.advance();
            let value = if self.eat(":") {
                self.expression(BP_ASSIGN - 1)?
            } else {
                // shorthand `{ key }`
                Expr::Ident(key.clone())
            };
            entries.push((key, value));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }

    /// Parse an arrow function if one starts here.
    fn try_arrow(&mut self) -> Result<Option<Expr>, EvalError> {
        let params = match (self.peek(), self.peek_at(1)) {
            (Token::Ident(name), Token::Punct("=>")) => {
                let params = vec![name.clone()];
                self.index += 2;
                params
            }
            (Token::Punct("("), _) => {
                let Some(len) = self.arrow_params_len() else {
                    return Ok(None);
                };
                let params = self.tokens[self.index + 1..self.index + len]
                    .iter()
                    .filter_map(|t| match &t.token {
                        Token::Ident(name) => Some(name.clone()),
                        _ => None,
                    })
                    .collect();
                self.index += len + 2;
                params
            }
            _ => return Ok(None),
        };

        let body = if self.eat("{") {
            let body = if self.at("}") {
                Vec::new()
            } else {
                match self.sequence()? {
                    Expr::Sequence(items) => items,
                    single => vec![single],
                }
            };
            self.expect("}")?;
            body
        } else {
            vec![self.expression(BP_ASSIGN - 1)?]
        };

        Ok(Some(Expr::Arrow {
            params: params.into(),
            body: body.into(),
        }))
    }

    /// With the cursor on `(`, the offset of the matching `)` when the
    /// parenthesised group is an arrow parameter list followed by `=>`.
    fn arrow_params_len(&self) -> Option<usize> {
        let mut offset = 1;
        let mut expect_ident = true;
        loop {
            match self.peek_at(offset) {
                Token::Punct(")") => break,
                Token::Ident(_) if expect_ident => expect_ident = false,
                Token::Punct(",") if !expect_ident => expect_ident = true,
                _ => return None,
            }
            offset += 1;
        }
        matches!(self.peek_at(offset + 1), Token::Punct("=>")).then_some(offset)
    }
}

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn infix(op: &str) -> Option<(u8, Infix)> {
    let entry = match op {
        "??" => (BP_NULLISH, Infix::Logical(LogicalOp::Nullish)),
        "||" => (BP_OR, Infix::Logical(LogicalOp::Or)),
        "&&" => (BP_AND, Infix::Logical(LogicalOp::And)),
        "==" => (BP_EQUALITY, Infix::Binary(BinaryOp::Eq)),
        "!=" => (BP_EQUALITY, Infix::Binary(BinaryOp::Ne)),
        "===" => (BP_EQUALITY, Infix::Binary(BinaryOp::StrictEq)),
        "!==" => (BP_EQUALITY, Infix::Binary(BinaryOp::StrictNe)),
        "<" => (BP_RELATIONAL, Infix::Binary(BinaryOp::Lt)),
        "<=" => (BP_RELATIONAL, Infix::Binary(BinaryOp::Le)),
        ">" => (BP_RELATIONAL, Infix::Binary(BinaryOp::Gt)),
        ">=" => (BP_RELATIONAL, Infix::Binary(BinaryOp::Ge)),
        "+" => (BP_ADDITIVE, Infix::Binary(BinaryOp::Add)),
        "-" => (BP_ADDITIVE, Infix::Binary(BinaryOp::Sub)),
        "*" => (BP_MULTIPLICATIVE, Infix::Binary(BinaryOp::Mul)),
        "/" => (BP_MULTIPLICATIVE, Infix::Binary(BinaryOp::Div)),
        "%" => (BP_MULTIPLICATIVE, Infix::Binary(BinaryOp::Rem)),
        _ => return None,
    };
    Some(entry)
}

fn assign_op(op: &str) -> Option<AssignOp> {
    match op {
        "=" => Some(AssignOp::Set),
        "+=" => Some(AssignOp::Add),
        "-=" => Some(AssignOp::Sub),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.into()))
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Number(n)))
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            parse("1 + 2 * 3 - 4").unwrap(),
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(
                    BinaryOp::Add,
                    num(1.0),
                    Box::new(Expr::Binary(BinaryOp::Mul, num(2.0), num(3.0))),
                )),
                num(4.0),
            )
        );
    }

    #[test]
    fn ternary_binds_looser_than_logic() {
        let expr = parse("a && b ? c : d").unwrap();
        assert!(matches!(expr, Expr::Conditional { ref test, .. } if matches!(**test, Expr::Logical(LogicalOp::And, _, _))));
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse("a = b = 1").unwrap();
        let Expr::Assign { target, value, .. } = expr else {
            panic!("expected assignment");
        };
        assert_eq!(target, ident("a"));
        assert!(matches!(*value, Expr::Assign { .. }));
    }

    #[test]
    fn member_and_call_chains() {
        let expr = parse("user?.items[0].name.toUpperCase()").unwrap();
        let Expr::Call { callee, args } = expr else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert!(matches!(*callee, Expr::Member { property: PropertyKey::Named(ref n), .. } if n == "toUpperCase"));
    }

    #[test]
    fn arrow_functions() {
        let single = parse("e => count += 1").unwrap();
        assert!(matches!(single, Expr::Arrow { ref params, .. } if params.len() == 1));

        let multi = parse("(a, b) => { a; b }").unwrap();
        let Expr::Arrow { params, body } = multi else {
            panic!("expected arrow");
        };
        assert_eq!(&*params, &["a".to_string(), "b".to_string()]);
        assert_eq!(body.len(), 2);

        let grouped = parse("(a) + 1").unwrap();
        assert!(matches!(grouped, Expr::Binary(BinaryOp::Add, _, _)));
    }

    #[test]
    fn object_literals() {
        let expr = parse("{ a: 1, 'b-c': 2, d, }").unwrap();
        let Expr::Object(entries) = expr else {
            panic!("expected object");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b-c", "d"]);
    }

    #[test]
    fn sequences() {
        assert!(matches!(parse("a = 1; b = 2;").unwrap(), Expr::Sequence(ref items) if items.len() == 2));
    }

    #[test]
    fn errors() {
        assert!(matches!(parse("1 +"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("(a"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("a b"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("1 = 2"), Err(EvalError::NotAssignable(_))));
    }
}
