//! Statement AST and parser (spec §4.D).
//!
//! A statement part's raw text (see [`crate::lexer::split_statements`])
//! is tokenized and handed to [`parse_statement`], which dispatches on
//! the first word exactly as the runtime will: case-insensitively, with
//! `?` as an alias for `PRINT`.

use crate::error::ErrorKind;
use crate::expr::{Expr, Parser};
use crate::lexer;
use crate::token::{Symbol, Token};
use crate::value::Name;

#[derive(Clone, Debug, PartialEq)]
pub enum LValue {
    Scalar(Name),
    Array(Name, Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PrintItem {
    Value(Expr),
    Tab(Expr),
    Spc(Expr),
    Comma,
    Semicolon,
}

/// The target of an `IF ... THEN x`: either a bare line number (a
/// `GOTO`) or an inline statement to execute immediately.
#[derive(Clone, Debug, PartialEq)]
pub enum IfThen {
    Goto(u32),
    Statement(Box<Statement>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Let {
        target: LValue,
        value: Expr,
    },
    Print(Vec<PrintItem>),
    Goto(Expr),
    Gosub(Expr),
    Return,
    If {
        cond: Expr,
        then_branch: IfThen,
    },
    For {
        var: Name,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
    },
    Next(Vec<Name>),
    Input {
        prompt: Option<Vec<u8>>,
        vars: Vec<LValue>,
    },
    Get(LValue),
    Read(Vec<LValue>),
    Data(String),
    Restore,
    Dim(Vec<(Name, Vec<Expr>)>),
    On {
        selector: Expr,
        is_gosub: bool,
        targets: Vec<Expr>,
    },
    DefFn {
        name: Name,
        param: Name,
        body: Expr,
    },
    OnErrGoto(Expr),
    Resume,
    Poke(Expr, Expr),
    Call(Expr),
    HimemSet(Expr),
    LomemSet(Expr),
    Home,
    TextMode,
    Gr,
    Hgr,
    Hgr2,
    ColorEq(Expr),
    HcolorEq(Expr),
    Plot(Expr, Expr),
    Hlin(Expr, Expr, Expr),
    Vlin(Expr, Expr, Expr),
    Hplot(HplotForm),
    Htab(Expr),
    Vtab(Expr),
    Inverse,
    NormalMode,
    Flash,
    Draw(Expr, Option<(Expr, Expr)>),
    XDraw(Expr, Option<(Expr, Expr)>),
    ScaleEq(Expr),
    RotEq(Expr),
    End,
    Stop,
    Cont,
    Trace,
    Notrace,
    Rem(String),
    /// Flags/no-ops that are only meaningful to a concrete host
    /// environment (`WAIT`, `PR#`, `IN#`, `LOAD`, `SAVE`): kept as raw
    /// text so a host can act on them without the core guessing intent.
    HostNoOp(String, String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum HplotForm {
    Point(Expr, Expr),
    Line(Expr, Expr, Expr, Expr),
    LineFromLast(Expr, Expr),
}

pub fn parse_statement(text: &str) -> Result<Statement, ErrorKind> {
    let trimmed = text.trim_start();
    let leading = leading_alpha_or_symbol(trimmed);
    if leading.eq_ignore_ascii_case("REM") {
        let rest = trimmed
            .get(leading.len()..)
            .unwrap_or("")
            .trim_start_matches(' ');
        return Ok(Statement::Rem(rest.to_string()));
    }
    if leading.eq_ignore_ascii_case("DATA") {
        let rest = trimmed.get(leading.len()..).unwrap_or("");
        return Ok(Statement::Data(rest.trim_start().to_string()));
    }
    // `PR#`/`IN#` take a literal slot number; `#` is not a token the
    // lexer otherwise needs to know about, so these are peeled off
    // before tokenizing rather than taught to the general scanner.
    if trimmed.len() >= 3 && trimmed[..3].eq_ignore_ascii_case("PR#") {
        return Ok(Statement::HostNoOp("PR#".into(), trimmed[3..].trim().to_string()));
    }
    if trimmed.len() >= 3 && trimmed[..3].eq_ignore_ascii_case("IN#") {
        return Ok(Statement::HostNoOp("IN#".into(), trimmed[3..].trim().to_string()));
    }
    for kw in ["WAIT", "LOAD", "SAVE"] {
        if leading.eq_ignore_ascii_case(kw) {
            let rest = trimmed.get(leading.len()..).unwrap_or("").trim().to_string();
            return Ok(Statement::HostNoOp(kw.to_string(), rest));
        }
    }

    // `?` is the PRINT alias (spec §4.D); rewrite it to the keyword so
    // the rest of the pipeline never has to special-case a bare symbol
    // in keyword position.
    let rewritten;
    let to_tokenize = if leading == "?" {
        rewritten = format!("PRINT{}", &trimmed[1..]);
        rewritten.as_str()
    } else {
        trimmed
    };
    let kw = if leading == "?" {
        "PRINT".to_string()
    } else {
        leading.to_ascii_uppercase()
    };

    let tokens = lexer::tokenize(to_tokenize)?;
    let mut p = Parser::new(&tokens);
    parse_from_tokens(&mut p, &kw)
}

/// The first word of a statement part: either a run of alphabetic
/// characters (a keyword or an identifier, for an implicit `LET`) or
/// the single `?` character (the `PRINT` alias).
fn leading_alpha_or_symbol(text: &str) -> String {
    if text.starts_with('?') {
        return "?".to_string();
    }
    let mut end = 0;
    for (i, c) in text.char_indices() {
        if c.is_ascii_alphabetic() {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    text[..end].to_string()
}

fn parse_from_tokens(p: &mut Parser, kw: &str) -> Result<Statement, ErrorKind> {
    match kw {
        "PRINT" => {
            p.advance();
            Ok(Statement::Print(parse_print_items(p)?))
        }
        "LET" => {
            p.advance();
            parse_assignment(p)
        }
        "GOTO" => {
            p.advance();
            Ok(Statement::Goto(p.parse_expr()?))
        }
        "GOSUB" => {
            p.advance();
            Ok(Statement::Gosub(p.parse_expr()?))
        }
        "RETURN" => {
            p.advance();
            Ok(Statement::Return)
        }
        "IF" => {
            p.advance();
            parse_if(p)
        }
        "FOR" => {
            p.advance();
            parse_for(p)
        }
        "NEXT" => {
            p.advance();
            parse_next(p)
        }
        "INPUT" => {
            p.advance();
            parse_input(p)
        }
        "GET" => {
            p.advance();
            Ok(Statement::Get(parse_lvalue(p)?))
        }
        "READ" => {
            p.advance();
            let mut vars = vec![parse_lvalue(p)?];
            while p.eat_symbol(Symbol::Comma) {
                vars.push(parse_lvalue(p)?);
            }
            Ok(Statement::Read(vars))
        }
        "RESTORE" => {
            p.advance();
            Ok(Statement::Restore)
        }
        "DIM" => {
            p.advance();
            parse_dim(p)
        }
        "ON" => {
            p.advance();
            parse_on(p)
        }
        "DEF" => {
            p.advance();
            parse_def_fn(p)
        }
        "ONERR" => {
            p.advance();
            if !p.eat_ident("GOTO") {
                return Err(ErrorKind::Syntax);
            }
            Ok(Statement::OnErrGoto(p.parse_expr()?))
        }
        "RESUME" => {
            p.advance();
            Ok(Statement::Resume)
        }
        "POKE" => {
            p.advance();
            let addr = p.parse_expr()?;
            p.expect_symbol(Symbol::Comma)?;
            let val = p.parse_expr()?;
            Ok(Statement::Poke(addr, val))
        }
        "CALL" => {
            p.advance();
            Ok(Statement::Call(p.parse_expr()?))
        }
        "HIMEM" => {
            p.advance();
            p.expect_symbol(Symbol::Colon)?;
            Ok(Statement::HimemSet(p.parse_expr()?))
        }
        "LOMEM" => {
            p.advance();
            p.expect_symbol(Symbol::Colon)?;
            Ok(Statement::LomemSet(p.parse_expr()?))
        }
        "HOME" => {
            p.advance();
            Ok(Statement::Home)
        }
        "TEXT" => {
            p.advance();
            Ok(Statement::TextMode)
        }
        "GR" => {
            p.advance();
            Ok(Statement::Gr)
        }
        "HGR" => {
            p.advance();
            Ok(Statement::Hgr)
        }
        "HGR2" => {
            p.advance();
            Ok(Statement::Hgr2)
        }
        "COLOR" => {
            p.advance();
            p.expect_symbol(Symbol::Eq)?;
            Ok(Statement::ColorEq(p.parse_expr()?))
        }
        "HCOLOR" => {
            p.advance();
            p.expect_symbol(Symbol::Eq)?;
            Ok(Statement::HcolorEq(p.parse_expr()?))
        }
        "PLOT" => {
            p.advance();
            let x = p.parse_expr()?;
            p.expect_symbol(Symbol::Comma)?;
            let y = p.parse_expr()?;
            Ok(Statement::Plot(x, y))
        }
        "HLIN" => {
            p.advance();
            let x1 = p.parse_expr()?;
            p.expect_symbol(Symbol::Comma)?;
            let x2 = p.parse_expr()?;
            if !p.eat_ident("AT") {
                return Err(ErrorKind::Syntax);
            }
            let y = p.parse_expr()?;
            Ok(Statement::Hlin(x1, x2, y))
        }
        "VLIN" => {
            p.advance();
            let y1 = p.parse_expr()?;
            p.expect_symbol(Symbol::Comma)?;
            let y2 = p.parse_expr()?;
            if !p.eat_ident("AT") {
                return Err(ErrorKind::Syntax);
            }
            let x = p.parse_expr()?;
            Ok(Statement::Vlin(y1, y2, x))
        }
        "HPLOT" => {
            p.advance();
            parse_hplot(p)
        }
        "HTAB" => {
            p.advance();
            Ok(Statement::Htab(p.parse_expr()?))
        }
        "VTAB" => {
            p.advance();
            Ok(Statement::Vtab(p.parse_expr()?))
        }
        "INVERSE" => {
            p.advance();
            Ok(Statement::Inverse)
        }
        "NORMAL" => {
            p.advance();
            Ok(Statement::NormalMode)
        }
        "FLASH" => {
            p.advance();
            Ok(Statement::Flash)
        }
        "DRAW" => {
            p.advance();
            let shape = p.parse_expr()?;
            let at = parse_optional_at(p)?;
            Ok(Statement::Draw(shape, at))
        }
        "XDRAW" => {
            p.advance();
            let shape = p.parse_expr()?;
            let at = parse_optional_at(p)?;
            Ok(Statement::XDraw(shape, at))
        }
        "SCALE" => {
            p.advance();
            p.expect_symbol(Symbol::Eq)?;
            Ok(Statement::ScaleEq(p.parse_expr()?))
        }
        "ROT" => {
            p.advance();
            p.expect_symbol(Symbol::Eq)?;
            Ok(Statement::RotEq(p.parse_expr()?))
        }
        "END" => {
            p.advance();
            Ok(Statement::End)
        }
        "STOP" => {
            p.advance();
            Ok(Statement::Stop)
        }
        "CONT" => {
            p.advance();
            Ok(Statement::Cont)
        }
        "TRACE" => {
            p.advance();
            Ok(Statement::Trace)
        }
        "NOTRACE" => {
            p.advance();
            Ok(Statement::Notrace)
        }
        "" => Err(ErrorKind::Syntax),
        _ => {
            // No keyword matched: an implicit `LET` (e.g. `X = 1`).
            parse_assignment(p)
        }
    }
}

fn parse_lvalue(p: &mut Parser) -> Result<LValue, ErrorKind> {
    let word = match p.advance().cloned() {
        Some(Token::Ident(w)) => w,
        _ => return Err(ErrorKind::Syntax),
    };
    let name = Name::new(&word);
    if p.eat_symbol(Symbol::LParen) {
        let mut idx = vec![p.parse_expr()?];
        while p.eat_symbol(Symbol::Comma) {
            idx.push(p.parse_expr()?);
        }
        p.expect_symbol(Symbol::RParen)?;
        Ok(LValue::Array(name, idx))
    } else {
        Ok(LValue::Scalar(name))
    }
}

fn parse_assignment(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let target = parse_lvalue(p)?;
    p.expect_symbol(Symbol::Eq)?;
    let value = p.parse_expr()?;
    Ok(Statement::Let { target, value })
}

fn parse_print_items(p: &mut Parser) -> Result<Vec<PrintItem>, ErrorKind> {
    let mut items = Vec::new();
    if p.at_end() {
        return Ok(items);
    }
    loop {
        if p.at_end() {
            break;
        }
        if p.eat_symbol(Symbol::Comma) {
            items.push(PrintItem::Comma);
            continue;
        }
        if p.eat_symbol(Symbol::Semicolon) {
            items.push(PrintItem::Semicolon);
            continue;
        }
        if p.eat_ident("TAB") {
            p.expect_symbol(Symbol::LParen)?;
            let n = p.parse_expr()?;
            p.expect_symbol(Symbol::RParen)?;
            items.push(PrintItem::Tab(n));
            continue;
        }
        if p.eat_ident("SPC") {
            p.expect_symbol(Symbol::LParen)?;
            let n = p.parse_expr()?;
            p.expect_symbol(Symbol::RParen)?;
            items.push(PrintItem::Spc(n));
            continue;
        }
        items.push(PrintItem::Value(p.parse_expr()?));
    }
    Ok(items)
}

fn parse_if(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let cond = p.parse_expr()?;
    p.eat_ident("THEN");
    // A bare line number after THEN (or after IF with THEN omitted, as
    // the dialect also tolerates) is a GOTO target; anything else is an
    // inline statement.
    if let Some(Token::Number(n)) = p.peek().cloned() {
        if n >= 0.0 && n.fract() == 0.0 {
            p.advance();
            return Ok(Statement::If {
                cond,
                then_branch: IfThen::Goto(n as u32),
            });
        }
    }
    if p.eat_ident("GOTO") {
        let target = p.parse_expr()?;
        return Ok(Statement::If {
            cond,
            then_branch: IfThen::Statement(Box::new(Statement::Goto(target))),
        });
    }
    let inner = parse_inline_statement(p)?;
    Ok(Statement::If {
        cond,
        then_branch: IfThen::Statement(Box::new(inner)),
    })
}

/// Parses one statement from whatever tokens remain (used for the
/// inline statement after `IF ... THEN`). Re-dispatches on the leading
/// identifier exactly like [`parse_from_tokens`], since any statement
/// form is legal there.
fn parse_inline_statement(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let word = p.peek_ident().map(str::to_string);
    match word {
        Some(w) => parse_from_tokens(p, &w.to_ascii_uppercase()),
        None => Err(ErrorKind::Syntax),
    }
}

fn parse_for(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let var = match p.advance().cloned() {
        Some(Token::Ident(w)) => Name::new(&w),
        _ => return Err(ErrorKind::Syntax),
    };
    p.expect_symbol(Symbol::Eq)?;
    let from = p.parse_expr()?;
    if !p.eat_ident("TO") {
        return Err(ErrorKind::Syntax);
    }
    let to = p.parse_expr()?;
    let step = if p.eat_ident("STEP") {
        Some(p.parse_expr()?)
    } else {
        None
    };
    Ok(Statement::For { var, from, to, step })
}

fn parse_next(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let mut names = Vec::new();
    if let Some(Token::Ident(w)) = p.peek().cloned() {
        p.advance();
        names.push(Name::new(&w));
        while p.eat_symbol(Symbol::Comma) {
            match p.advance().cloned() {
                Some(Token::Ident(w)) => names.push(Name::new(&w)),
                _ => return Err(ErrorKind::Syntax),
            }
        }
    }
    Ok(Statement::Next(names))
}

fn parse_input(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let prompt = if let Some(Token::Str(s)) = p.peek().cloned() {
        p.advance();
        if p.eat_symbol(Symbol::Semicolon) {
            Some(s)
        } else {
            // A string immediately followed by something other than
            // `;` was not a prompt; there is no sensible fallback, so
            // treat it as a syntax error rather than guess.
            return Err(ErrorKind::Syntax);
        }
    } else {
        None
    };
    let mut vars = vec![parse_lvalue(p)?];
    while p.eat_symbol(Symbol::Comma) {
        vars.push(parse_lvalue(p)?);
    }
    Ok(Statement::Input { prompt, vars })
}

fn parse_dim(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let mut decls = Vec::new();
    loop {
        let name = match p.advance().cloned() {
            Some(Token::Ident(w)) => Name::new(&w),
            _ => return Err(ErrorKind::Syntax),
        };
        p.expect_symbol(Symbol::LParen)?;
        let mut bounds = vec![p.parse_expr()?];
        while p.eat_symbol(Symbol::Comma) {
            bounds.push(p.parse_expr()?);
        }
        p.expect_symbol(Symbol::RParen)?;
        decls.push((name, bounds));
        if !p.eat_symbol(Symbol::Comma) {
            break;
        }
    }
    Ok(Statement::Dim(decls))
}

fn parse_on(p: &mut Parser) -> Result<Statement, ErrorKind> {
    let selector = p.parse_expr()?;
    let is_gosub = if p.eat_ident("GOTO") {
        false
    } else if p.eat_ident("GOSUB") {
        true
    } else {
        return Err(ErrorKind::Syntax);
    };
    let mut targets = vec![p.parse_expr()?];
    while p.eat_symbol(Symbol::Comma) {
        targets.push(p.parse_expr()?);
    }
    Ok(Statement::On {
        selector,
        is_gosub,
        targets,
    })
}

fn parse_def_fn(p: &mut Parser) -> Result<Statement, ErrorKind> {
    if !p.eat_ident("FN") {
        return Err(ErrorKind::Syntax);
    }
    let name = match p.advance().cloned() {
        Some(Token::Ident(w)) => Name::new(&w),
        _ => return Err(ErrorKind::Syntax),
    };
    p.expect_symbol(Symbol::LParen)?;
    let param = match p.advance().cloned() {
        Some(Token::Ident(w)) => Name::new(&w),
        _ => return Err(ErrorKind::Syntax),
    };
    p.expect_symbol(Symbol::RParen)?;
    p.expect_symbol(Symbol::Eq)?;
    let body = p.parse_expr()?;
    Ok(Statement::DefFn { name, param, body })
}

fn parse_optional_at(p: &mut Parser) -> Result<Option<(Expr, Expr)>, ErrorKind> {
    if p.eat_ident("AT") {
        let x = p.parse_expr()?;
        p.expect_symbol(Symbol::Comma)?;
        let y = p.parse_expr()?;
        Ok(Some((x, y)))
    } else {
        Ok(None)
    }
}

/// `HPLOT` needs to distinguish three argument shapes after the keyword
/// (spec §4.D): `x,y`, `x1,y1 TO x2,y2`, and `TO x2,y2` (continuing from
/// the last plotted point with the last plot color).
fn parse_hplot(p: &mut Parser) -> Result<Statement, ErrorKind> {
    if p.eat_ident("TO") {
        let x = p.parse_expr()?;
        p.expect_symbol(Symbol::Comma)?;
        let y = p.parse_expr()?;
        return Ok(Statement::Hplot(HplotForm::LineFromLast(x, y)));
    }
    let x1 = p.parse_expr()?;
    p.expect_symbol(Symbol::Comma)?;
    let y1 = p.parse_expr()?;
    if p.eat_ident("TO") {
        let x2 = p.parse_expr()?;
        p.expect_symbol(Symbol::Comma)?;
        let y2 = p.parse_expr()?;
        Ok(Statement::Hplot(HplotForm::Line(x1, y1, x2, y2)))
    } else {
        Ok(Statement::Hplot(HplotForm::Point(x1, y1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn parses_implicit_let() {
        let stmt = parse_statement("X = 1 + 2").unwrap();
        assert_eq!(
            stmt,
            Statement::Let {
                target: LValue::Scalar(Name::new("X")),
                value: Expr::Binary(
                    crate::expr::BinOp::Add,
                    Box::new(Expr::Number(1.0)),
                    Box::new(Expr::Number(2.0))
                ),
            }
        );
    }

    #[test]
    fn parses_print_alias() {
        let stmt = parse_statement("?1;2").unwrap();
        match stmt {
            Statement::Print(items) => assert_eq!(items.len(), 3),
            other => panic!("expected Print, got {:?}", other),
        }
    }

    #[test]
    fn parses_for_with_step() {
        let stmt = parse_statement("FOR I = 1 TO 10 STEP 2").unwrap();
        assert_eq!(
            stmt,
            Statement::For {
                var: Name::new("I"),
                from: Expr::Number(1.0),
                to: Expr::Number(10.0),
                step: Some(Expr::Number(2.0)),
            }
        );
    }

    #[test]
    fn parses_if_then_goto_number() {
        let stmt = parse_statement("IF X THEN 100").unwrap();
        assert_eq!(
            stmt,
            Statement::If {
                cond: Expr::Var(Name::new("X")),
                then_branch: IfThen::Goto(100),
            }
        );
    }

    #[test]
    fn parses_himem_colon_syntax() {
        let stmt = parse_statement("HIMEM: 38400").unwrap();
        assert_eq!(stmt, Statement::HimemSet(Expr::Number(38400.0)));
    }

    #[test]
    fn parses_hplot_three_forms() {
        assert_eq!(
            parse_statement("HPLOT 1,2").unwrap(),
            Statement::Hplot(HplotForm::Point(Expr::Number(1.0), Expr::Number(2.0)))
        );
        assert_eq!(
            parse_statement("HPLOT 1,2 TO 3,4").unwrap(),
            Statement::Hplot(HplotForm::Line(
                Expr::Number(1.0),
                Expr::Number(2.0),
                Expr::Number(3.0),
                Expr::Number(4.0)
            ))
        );
        assert_eq!(
            parse_statement("HPLOT TO 3,4").unwrap(),
            Statement::Hplot(HplotForm::LineFromLast(Expr::Number(3.0), Expr::Number(4.0)))
        );
    }

    #[test]
    fn parses_rem_preserving_colons() {
        let stmt = parse_statement("REM a:b:c").unwrap();
        assert_eq!(stmt, Statement::Rem("a:b:c".to_string()));
    }

    #[test]
    fn parses_data_literal() {
        let stmt = parse_statement("DATA 1,2,HELLO").unwrap();
        assert_eq!(stmt, Statement::Data("1,2,HELLO".to_string()));
    }
}
