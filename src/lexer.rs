//! Statement splitting and tokenizing (spec §4.B).
//!
//! A program line is first split into colon-separated statement parts,
//! then each part is tokenized independently. Both passes are
//! quote-aware: a `:` or any other character inside a `"..."` string
//! literal is just string content, never a separator. `REM` and `DATA`
//! additionally consume the rest of the line verbatim once seen, since
//! neither dialect feature tokenizes its trailing text as code.

use crate::error::ErrorKind;
use crate::token::{Symbol, Token};

/// Splits `text` (everything after the line number) into statement
/// parts on unquoted colons. A part beginning with `REM` or `DATA`
/// (after skipping leading spaces) swallows the remainder of the line
/// as a single part, since a colon inside a `REM` comment or a `DATA`
/// literal is not a statement separator.
pub fn split_statements(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut in_quotes = false;
    let mut at_part_start = true;

    while i < chars.len() {
        let c = chars[i];
        if at_part_start && !in_quotes {
            let word = leading_word(&chars[i..]);
            if word.eq_ignore_ascii_case("REM") || word.eq_ignore_ascii_case("DATA") {
                parts.push(chars[start..].iter().collect::<String>());
                return parts;
            }
            if word.eq_ignore_ascii_case("HIMEM") || word.eq_ignore_ascii_case("LOMEM") {
                // The colon right after HIMEM/LOMEM is keyword syntax,
                // not a statement separator (spec §4.B).
                let mut j = i + word.len();
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ':' {
                    i = j + 1;
                    at_part_start = false;
                    continue;
                }
            }
            at_part_start = false;
        }
        if c == '"' {
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if !in_quotes && c == ':' {
            parts.push(chars[start..i].iter().collect::<String>());
            i += 1;
            start = i;
            at_part_start = true;
            continue;
        }
        i += 1;
    }
    parts.push(chars[start..].iter().collect::<String>());
    parts
}

/// Tokenizes one statement part (as produced by [`split_statements`])
/// into a flat token stream.
pub fn tokenize(part: &str) -> Result<Vec<Token>, ErrorKind> {
    let chars: Vec<char> = part.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    // `REM` and the literal text after `DATA` are not tokenized as code;
    // callers that need the raw text should slice the source directly
    // rather than going through `tokenize`. Detect and refuse that case
    // so a stray call can't silently drop the comment text.
    let leading = leading_word(&chars);
    if leading.eq_ignore_ascii_case("REM") {
        return Ok(vec![Token::Ident("REM".to_string())]);
    }

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '"' {
            let (s, next) = scan_string(&chars, i)?;
            tokens.push(Token::Str(s));
            i = next;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            let (n, next) = scan_number(&chars, i)?;
            tokens.push(Token::Number(n));
            i = next;
            continue;
        }
        if c == '$' && chars.get(i + 1).is_some_and(|d| d.is_ascii_hexdigit()) {
            let (n, next) = scan_hex_number(&chars, i);
            tokens.push(Token::Number(n));
            i = next;
            continue;
        }
        if c.is_ascii_alphabetic() {
            let (word, next) = scan_ident(&chars, i);
            tokens.push(Token::Ident(word));
            i = next;
            continue;
        }
        let (sym, next) = scan_symbol(&chars, i)?;
        tokens.push(Token::Symbol(sym));
        i = next;
    }
    Ok(tokens)
}

fn leading_word(chars: &[char]) -> String {
    let mut i = 0;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    let start = i;
    while i < chars.len() && chars[i].is_ascii_alphabetic() {
        i += 1;
    }
    chars[start..i].iter().collect()
}

fn scan_string(chars: &[char], start: usize) -> Result<(Vec<u8>, usize), ErrorKind> {
    let mut i = start + 1;
    let mut out = Vec::new();
    while i < chars.len() && chars[i] != '"' {
        let mut buf = [0u8; 4];
        out.extend_from_slice(chars[i].encode_utf8(&mut buf).as_bytes());
        i += 1;
    }
    if i >= chars.len() {
        // Unterminated string literals run to end of line (spec §4.B).
        return Ok((out, i));
    }
    Ok((out, i + 1))
}

fn scan_number(chars: &[char], start: usize) -> Result<(f64, usize), ErrorKind> {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'E' || chars[i] == 'e') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    let text: String = chars[start..i].iter().collect();
    let value = text.parse::<f64>().map_err(|_| ErrorKind::Syntax)?;
    Ok((value, i))
}

/// Scans a `$`-prefixed hexadecimal numeric literal (spec §4.A), e.g.
/// `$FF`. The `$` itself is not part of the returned span's value.
fn scan_hex_number(chars: &[char], start: usize) -> (f64, usize) {
    let mut i = start + 1;
    while i < chars.len() && chars[i].is_ascii_hexdigit() {
        i += 1;
    }
    let text: String = chars[start + 1..i].iter().collect();
    let value = u32::from_str_radix(&text, 16).unwrap_or(0);
    (value as f64, i)
}

fn scan_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric()) {
        i += 1;
    }
    if i < chars.len() && (chars[i] == '$' || chars[i] == '%') {
        i += 1;
    }
    let word: String = chars[start..i].iter().collect();
    (word.to_ascii_uppercase(), i)
}

fn scan_symbol(chars: &[char], start: usize) -> Result<(Symbol, usize), ErrorKind> {
    let c = chars[start];
    // Comparison operators tolerate arbitrary whitespace between their two
    // characters (spec §4.B), e.g. `< =` and `<=` both mean Le.
    if c == '<' || c == '>' {
        let mut j = start + 1;
        while chars.get(j).is_some_and(|ch| ch.is_whitespace()) {
            j += 1;
        }
        match (c, chars.get(j).copied()) {
            ('<', Some('=')) => return Ok((Symbol::Le, j + 1)),
            ('>', Some('=')) => return Ok((Symbol::Ge, j + 1)),
            ('<', Some('>')) => return Ok((Symbol::Ne, j + 1)),
            _ => {}
        }
    }
    let sym = match c {
        '+' => Symbol::Plus,
        '-' => Symbol::Minus,
        '*' => Symbol::Star,
        '/' => Symbol::Slash,
        '^' => Symbol::Caret,
        '(' => Symbol::LParen,
        ')' => Symbol::RParen,
        ',' => Symbol::Comma,
        ';' => Symbol::Semicolon,
        ':' => Symbol::Colon,
        '=' => Symbol::Eq,
        '<' => Symbol::Lt,
        '>' => Symbol::Gt,
        _ => return Err(ErrorKind::Syntax),
    };
    Ok((sym, start + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_unquoted_colons() {
        let parts = split_statements(r#"A=1:B=2"#);
        assert_eq!(parts, vec!["A=1", "B=2"]);
    }

    #[test]
    fn colon_inside_string_is_not_a_separator() {
        let parts = split_statements(r#"PRINT "A:B":PRINT 1"#);
        assert_eq!(parts, vec![r#"PRINT "A:B""#, "PRINT 1"]);
    }

    #[test]
    fn rem_swallows_rest_of_line() {
        let parts = split_statements("PRINT 1:REM note: with colons");
        assert_eq!(parts, vec!["PRINT 1", "REM note: with colons"]);
    }

    #[test]
    fn tokenizes_an_assignment() {
        let tokens = tokenize("X = 3.5 + Y$").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("X".into()),
                Token::Symbol(Symbol::Eq),
                Token::Number(3.5),
                Token::Symbol(Symbol::Plus),
                Token::Ident("Y$".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_comparison_operators() {
        let tokens = tokenize("A<>B").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("A".into()),
                Token::Symbol(Symbol::Ne),
                Token::Ident("B".into()),
            ]
        );
    }

    #[test]
    fn comparison_operators_tolerate_whitespace_between_characters() {
        assert_eq!(tokenize("A < = B").unwrap()[1], Token::Symbol(Symbol::Le));
        assert_eq!(tokenize("A > = B").unwrap()[1], Token::Symbol(Symbol::Ge));
        assert_eq!(tokenize("A < > B").unwrap()[1], Token::Symbol(Symbol::Ne));
    }
}
