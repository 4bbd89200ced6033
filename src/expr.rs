//! Expression AST, recursive-descent/precedence-climbing parser, and
//! evaluator (spec §4.C).

use crate::error::ErrorKind;
use crate::token::{Symbol, Token};
use crate::value::{Name, Value};

/// Names reserved as built-in function calls; an identifier immediately
/// followed by `(` that matches one of these is a function call, never
/// an array reference (the dialect reserves these words).
const BUILTINS: &[&str] = &[
    "INT", "ABS", "SGN", "SQR", "SIN", "COS", "TAN", "ATN", "LOG", "EXP", "RND", "PEEK", "POS",
    "FRE", "SCRN", "LEN", "VAL", "ASC", "CHR$", "STR$", "LEFT$", "RIGHT$", "MID$",
];

fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(Vec<u8>),
    Var(Name),
    ArrayRef(Name, Vec<Expr>),
    Call(String, Vec<Expr>),
    FnCall(Name, Box<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Recursive-descent parser over an already-tokenized statement part.
/// Consumes from the front; `parse_expr` leaves the cursor positioned
/// right after the last token of the expression, so statement parsing
/// can check what follows (a `,`, `;`, `THEN`, end of part, ...).
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    pub fn eat_symbol(&mut self, sym: Symbol) -> bool {
        if self.peek() == Some(&Token::Symbol(sym)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_symbol(&mut self, sym: Symbol) -> Result<(), ErrorKind> {
        if self.eat_symbol(sym) {
            Ok(())
        } else {
            Err(ErrorKind::Syntax)
        }
    }

    /// Consumes `word` (case-insensitively) if it's the next identifier
    /// token, returning whether it matched.
    pub fn eat_ident(&mut self, word: &str) -> bool {
        if self.peek_ident().is_some_and(|s| s.eq_ignore_ascii_case(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ErrorKind> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ErrorKind> {
        let mut lhs = self.parse_and()?;
        while self.eat_ident("OR") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ErrorKind> {
        let mut lhs = self.parse_compare()?;
        while self.eat_ident("AND") {
            let rhs = self.parse_compare()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> Result<Expr, ErrorKind> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Eq)) => BinOp::Eq,
                Some(Token::Symbol(Symbol::Ne)) => BinOp::Ne,
                Some(Token::Symbol(Symbol::Lt)) => BinOp::Lt,
                Some(Token::Symbol(Symbol::Gt)) => BinOp::Gt,
                Some(Token::Symbol(Symbol::Le)) => BinOp::Le,
                Some(Token::Symbol(Symbol::Ge)) => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_add()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr, ErrorKind> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Plus)) => BinOp::Add,
                Some(Token::Symbol(Symbol::Minus)) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, ErrorKind> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Star)) => BinOp::Mul,
                Some(Token::Symbol(Symbol::Slash)) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_pow()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `^` is right-associative, unlike every other level.
    fn parse_pow(&mut self) -> Result<Expr, ErrorKind> {
        let lhs = self.parse_not()?;
        if self.eat_symbol(Symbol::Caret) {
            let rhs = self.parse_pow()?;
            Ok(Expr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn parse_not(&mut self) -> Result<Expr, ErrorKind> {
        if self.eat_ident("NOT") {
            let inner = self.parse_unary()?;
            Ok(Expr::Not(Box::new(inner)))
        } else {
            self.parse_unary()
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ErrorKind> {
        if self.eat_symbol(Symbol::Minus) {
            let inner = self.parse_unary()?;
            Ok(Expr::Neg(Box::new(inner)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ErrorKind> {
        match self.advance().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Symbol(Symbol::LParen)) => {
                let inner = self.parse_expr()?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("FN") => {
                let name = match self.advance().cloned() {
                    Some(Token::Ident(n)) => Name::new(&n),
                    _ => return Err(ErrorKind::Syntax),
                };
                self.expect_symbol(Symbol::LParen)?;
                let arg = self.parse_expr()?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(Expr::FnCall(name, Box::new(arg)))
            }
            Some(Token::Ident(word)) if is_builtin(&word.to_ascii_uppercase()) => {
                let canon = word.to_ascii_uppercase();
                self.expect_symbol(Symbol::LParen)?;
                let mut args = Vec::new();
                if !self.eat_symbol(Symbol::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat_symbol(Symbol::Comma) {
                            continue;
                        }
                        self.expect_symbol(Symbol::RParen)?;
                        break;
                    }
                }
                Ok(Expr::Call(canon, args))
            }
            Some(Token::Ident(word)) => {
                let name = Name::new(&word);
                if self.peek() == Some(&Token::Symbol(Symbol::LParen)) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat_symbol(Symbol::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.eat_symbol(Symbol::Comma) {
                                continue;
                            }
                            self.expect_symbol(Symbol::RParen)?;
                            break;
                        }
                    }
                    Ok(Expr::ArrayRef(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            _ => Err(ErrorKind::Syntax),
        }
    }
}

/// Callback surface the evaluator needs from the owning interpreter:
/// variable/array storage, memory reads, and the handful of built-ins
/// that depend on interpreter or run-loop state rather than pure math.
pub trait EvalContext {
    fn get_scalar(&self, name: &Name) -> Value;
    fn get_array(&mut self, name: &Name, indices: &[usize]) -> Result<Value, ErrorKind>;
    fn peek_dynamic(&mut self, address: u16) -> u8;
    fn pos(&self) -> usize;
    fn fre(&self) -> f64;
    fn scrn(&self, x: i32, y: i32) -> i32;
    fn rnd(&mut self, x: f64) -> f64;
    fn call_fn(&mut self, name: &Name, arg: Value) -> Result<Value, ErrorKind>;
}

/// Evaluates `expr` against `ctx`, per the contracts in spec §4.C.
pub fn eval(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value, ErrorKind> {
    match expr {
        Expr::Number(n) => Ok(Value::number(*n)),
        Expr::Str(s) => Ok(Value::string(s.clone())),
        Expr::Var(name) => Ok(ctx.get_scalar(name)),
        Expr::ArrayRef(name, idx_exprs) => {
            let idx = eval_indices(idx_exprs, ctx)?;
            ctx.get_array(name, &idx)
        }
        Expr::FnCall(name, arg_expr) => {
            let arg = eval(arg_expr, ctx)?;
            ctx.call_fn(name, arg)
        }
        Expr::Neg(inner) => {
            let v = eval(inner, ctx)?;
            let n = num(&v)?;
            Ok(Value::number(-n))
        }
        Expr::Not(inner) => {
            let v = eval(inner, ctx)?;
            Ok(bool_value(!v.truthy()))
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx),
        Expr::Call(name, args) => eval_call(name, args, ctx),
    }
}

fn eval_indices(exprs: &[Expr], ctx: &mut dyn EvalContext) -> Result<Vec<usize>, ErrorKind> {
    let mut out = Vec::with_capacity(exprs.len());
    for e in exprs {
        let v = eval(e, ctx)?;
        let n = num(&v)?;
        if n < 0.0 {
            return Err(ErrorKind::BadSubscript);
        }
        out.push(n.trunc() as usize);
    }
    Ok(out)
}

fn num(v: &Value) -> Result<f64, ErrorKind> {
    v.as_number().ok_or(ErrorKind::TypeMismatch)
}

fn bool_value(b: bool) -> Value {
    Value::number(if b { 1.0 } else { 0.0 })
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &mut dyn EvalContext,
) -> Result<Value, ErrorKind> {
    use BinOp::*;
    let l = eval(lhs, ctx)?;
    let r = eval(rhs, ctx)?;
    match op {
        Add => {
            if l.is_string() || r.is_string() {
                let mut s = l.as_bytes().ok_or(ErrorKind::TypeMismatch)?.to_vec();
                s.extend_from_slice(r.as_bytes().ok_or(ErrorKind::TypeMismatch)?);
                Ok(Value::string(s))
            } else {
                Ok(Value::number(num(&l)? + num(&r)?))
            }
        }
        Sub => Ok(Value::number(num(&l)? - num(&r)?)),
        Mul => Ok(Value::number(num(&l)? * num(&r)?)),
        Div => {
            let d = num(&r)?;
            if d == 0.0 {
                return Err(ErrorKind::DivisionByZero);
            }
            Ok(Value::number(num(&l)? / d))
        }
        Pow => Ok(Value::number(num(&l)?.powf(num(&r)?))),
        Eq | Ne | Lt | Gt | Le | Ge => {
            let ordering = if l.is_string() && r.is_string() {
                l.as_bytes().unwrap().cmp(r.as_bytes().unwrap())
            } else if !l.is_string() && !r.is_string() {
                num(&l)?
                    .partial_cmp(&num(&r)?)
                    .unwrap_or(std::cmp::Ordering::Equal)
            } else {
                return Err(ErrorKind::TypeMismatch);
            };
            use std::cmp::Ordering::*;
            let result = match (op, ordering) {
                (Eq, Equal) => true,
                (Ne, Equal) => false,
                (Ne, _) => true,
                (Lt, Less) => true,
                (Gt, Greater) => true,
                (Le, Less) | (Le, Equal) => true,
                (Ge, Greater) | (Ge, Equal) => true,
                _ => false,
            };
            Ok(bool_value(result))
        }
        And => Ok(bool_value(l.truthy() && r.truthy())),
        Or => Ok(bool_value(l.truthy() || r.truthy())),
    }
}

fn eval_call(name: &str, args: &[Expr], ctx: &mut dyn EvalContext) -> Result<Value, ErrorKind> {
    let mut vals = Vec::with_capacity(args.len());
    for a in args {
        vals.push(eval(a, ctx)?);
    }
    let n = |i: usize| -> Result<f64, ErrorKind> {
        vals.get(i).ok_or(ErrorKind::Syntax).and_then(num)
    };
    let s = |i: usize| -> Result<&[u8], ErrorKind> {
        vals.get(i)
            .and_then(Value::as_bytes)
            .ok_or(ErrorKind::TypeMismatch)
    };
    match name {
        "INT" => {
            let x = n(0)?;
            Ok(Value::number(if x >= 0.0 { x.trunc() } else { x.floor() }))
        }
        "ABS" => Ok(Value::number(n(0)?.abs())),
        "SGN" => {
            let x = n(0)?;
            Ok(Value::number(if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }))
        }
        "SQR" => {
            let x = n(0)?;
            if x < 0.0 {
                return Err(ErrorKind::IllegalQuantity);
            }
            Ok(Value::number(x.sqrt()))
        }
        "SIN" => Ok(Value::number(n(0)?.sin())),
        "COS" => Ok(Value::number(n(0)?.cos())),
        "TAN" => Ok(Value::number(n(0)?.tan())),
        "ATN" => Ok(Value::number(n(0)?.atan())),
        "LOG" => {
            let x = n(0)?;
            if x <= 0.0 {
                return Err(ErrorKind::IllegalQuantity);
            }
            Ok(Value::number(x.ln()))
        }
        "EXP" => Ok(Value::number(n(0)?.exp())),
        "RND" => Ok(Value::number(ctx.rnd(n(0)?))),
        "PEEK" => {
            let addr = crate::constants::fold_address(n(0)? as i32);
            Ok(Value::number(ctx.peek_dynamic(addr) as f64))
        }
        "POS" => Ok(Value::number(ctx.pos() as f64)),
        "FRE" => Ok(Value::number(ctx.fre())),
        "SCRN" => Ok(Value::number(ctx.scrn(n(0)? as i32, n(1)? as i32) as f64)),
        "LEN" => Ok(Value::number(s(0)?.len() as f64)),
        "VAL" => Ok(Value::number(crate::value::val(s(0)?))),
        "ASC" => {
            let bytes = s(0)?;
            Ok(Value::number(*bytes.first().unwrap_or(&0) as f64))
        }
        "CHR$" => Ok(Value::string(vec![n(0)? as u8])),
        "STR$" => Ok(Value::string(
            crate::value::format_number(n(0)?).into_bytes(),
        )),
        "LEFT$" => {
            let bytes = s(0)?;
            let count = (n(1)? as usize).min(bytes.len());
            Ok(Value::string(bytes[..count].to_vec()))
        }
        "RIGHT$" => {
            let bytes = s(0)?;
            let count = (n(1)? as usize).min(bytes.len());
            Ok(Value::string(bytes[bytes.len() - count..].to_vec()))
        }
        "MID$" => {
            let bytes = s(0)?;
            let start = (n(1)? as usize).saturating_sub(1).min(bytes.len());
            let len = if vals.len() > 2 {
                n(2)? as usize
            } else {
                bytes.len() - start
            };
            let end = (start + len).min(bytes.len());
            Ok(Value::string(bytes[start..end].to_vec()))
        }
        _ => Err(ErrorKind::UndefinedFunction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx;
    impl EvalContext for Ctx {
        fn get_scalar(&self, _name: &Name) -> Value {
            Value::number(0.0)
        }
        fn get_array(&mut self, _name: &Name, _indices: &[usize]) -> Result<Value, ErrorKind> {
            Ok(Value::number(0.0))
        }
        fn peek_dynamic(&mut self, _address: u16) -> u8 {
            0
        }
        fn pos(&self) -> usize {
            0
        }
        fn fre(&self) -> f64 {
            30000.0
        }
        fn scrn(&self, _x: i32, _y: i32) -> i32 {
            0
        }
        fn rnd(&mut self, _x: f64) -> f64 {
            0.5
        }
        fn call_fn(&mut self, _name: &Name, _arg: Value) -> Result<Value, ErrorKind> {
            Err(ErrorKind::UndefinedFunction)
        }
    }

    fn eval_str(src: &str) -> Value {
        let tokens = crate::lexer::tokenize(src).unwrap();
        let mut parser = Parser::new(&tokens);
        let expr = parser.parse_expr().unwrap();
        eval(&expr, &mut Ctx).unwrap()
    }

    #[test]
    fn precedence_mul_before_add() {
        assert_eq!(eval_str("1+2*3"), Value::number(7.0));
    }

    #[test]
    fn caret_is_right_associative() {
        // 2^3^2 = 2^(3^2) = 2^9 = 512, not (2^3)^2 = 64.
        assert_eq!(eval_str("2^3^2"), Value::number(512.0));
    }

    #[test]
    fn string_plus_concatenates() {
        assert_eq!(eval_str(r#""A"+"B""#), Value::string("AB"));
    }

    #[test]
    fn comparisons_yield_one_or_zero() {
        assert_eq!(eval_str("3>2"), Value::number(1.0));
        assert_eq!(eval_str("3<2"), Value::number(0.0));
    }

    #[test]
    fn int_floors_toward_negative_infinity() {
        assert_eq!(eval_str("INT(-1.5)"), Value::number(-2.0));
        assert_eq!(eval_str("INT(1.5)"), Value::number(1.0));
    }

    #[test]
    fn mid_left_right_dollar() {
        assert_eq!(eval_str(r#"MID$("HELLO",2,3)"#), Value::string("ELL"));
        assert_eq!(eval_str(r#"LEFT$("HI",5)"#), Value::string("HI"));
        assert_eq!(eval_str(r#"RIGHT$("HI",5)"#), Value::string("HI"));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let tokens = crate::lexer::tokenize("1/0").unwrap();
        let mut parser = Parser::new(&tokens);
        let expr = parser.parse_expr().unwrap();
        assert_eq!(eval(&expr, &mut Ctx).unwrap_err(), ErrorKind::DivisionByZero);
    }

    #[test]
    fn hex_literal() {
        assert_eq!(eval_str("$FF"), Value::number(255.0));
    }
}
