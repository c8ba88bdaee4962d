use super::{Expr, Op};
use crate::error::SynthError;

/// Longest AND/OR chain a single node may absorb.
const MAX_CHAIN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Var(String),
    Op(Op),
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

/// Parse an infix equation into an expression tree.
///
/// Precedence from lowest to highest: `+` (OR), `&` (AND), `^` (XOR); `|` and `*` are
/// accepted as aliases of `+` and `&`. A chain of up to three equal AND/OR operators
/// becomes a single node, XOR chains nest to the left. Parenthesized groups are kept as
/// separate nodes.
pub fn parse(text: &str) -> Result<Expr, SynthError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(SynthError::syntax(0, "empty equation"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        let message = match token.kind {
            TokenKind::RParen => "unmatched `)`".to_string(),
            _ => "unexpected token after expression".to_string(),
        };
        return Err(SynthError::syntax(token.position, message));
    }
    trace!("parsed `{}` as `{}`", text, expr);
    Ok(expr)
}

fn tokenize(text: &str) -> Result<Vec<Token>, SynthError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((position, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => continue,
            'A'..='Z' => {
                let mut name = String::from(c);
                while let Some(&(_, n)) = chars.peek() {
                    if n.is_ascii_uppercase() || n.is_ascii_digit() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Var(name)
            }
            '&' | '*' => TokenKind::Op(Op::And),
            '+' | '|' => TokenKind::Op(Op::Or),
            '^' => TokenKind::Op(Op::Xor),
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '!' | '~' | '\'' => {
                return Err(SynthError::syntax(position, "negation is not supported"));
            }
            _ => {
                return Err(SynthError::syntax(
                    position,
                    format!("unexpected character `{c}`"),
                ));
            }
        };
        tokens.push(Token { kind, position });
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_is(&self, op: Op) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Op(o), .. }) if *o == op)
    }

    fn parse_or(&mut self) -> Result<Expr, SynthError> {
        self.parse_chain(Op::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, SynthError> {
        self.parse_chain(Op::And, Self::parse_xor)
    }

    fn parse_chain(
        &mut self,
        op: Op,
        operand: fn(&mut Self) -> Result<Expr, SynthError>,
    ) -> Result<Expr, SynthError> {
        let mut operands = vec![operand(self)?];
        while self.next_is(op) {
            let position = self.tokens[self.pos].position;
            self.pos += 1;
            if operands.len() == MAX_CHAIN {
                return Err(SynthError::syntax(
                    position,
                    format!(
                        "`{}` chain exceeds {MAX_CHAIN} operands, add parentheses",
                        op.symbol()
                    ),
                ));
            }
            operands.push(operand(self)?);
        }
        Ok(if operands.len() == 1 {
            operands.swap_remove(0)
        } else {
            Expr::with_op(op, operands)
        })
    }

    fn parse_xor(&mut self) -> Result<Expr, SynthError> {
        let mut lhs = self.parse_factor()?;
        while self.next_is(Op::Xor) {
            self.pos += 1;
            let rhs = self.parse_factor()?;
            lhs = Expr::xor(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, SynthError> {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err(SynthError::syntax(self.end, "unexpected end of equation"));
        };
        self.pos += 1;
        match token.kind {
            TokenKind::Var(name) => Ok(Expr::Var(name)),
            TokenKind::LParen => {
                let expr = self.parse_or()?;
                match self.peek() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => {
                        self.pos += 1;
                        Ok(expr)
                    }
                    _ => Err(SynthError::syntax(token.position, "unmatched `(`")),
                }
            }
            TokenKind::RParen => Err(SynthError::syntax(token.position, "unexpected `)`")),
            TokenKind::Op(op) => Err(SynthError::syntax(
                token.position,
                format!("missing operand before `{}`", op.symbol()),
            )),
        }
    }
}
