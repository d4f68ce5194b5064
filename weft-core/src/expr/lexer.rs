//! Tokenizer for markup expressions.

use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// Punctuation and operators, longest match first.
    Punct(&'static str),
    Eof,
}

/// A token with the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

const PUNCTUATION: &[&str] = &[
    "===", "!==", "...", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "+=", "-=", "(",
    ")", "[", "]", "{", "}", ",", ":", ";", ".", "?", "+", "-", "*", "/", "%", "<", ">", "!",
    "=",
];

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, EvalError> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut pos = 0;

    while pos < src.len() {
        let rest = &src[pos..];
        let Some(c) = rest.chars().next() else { break };

        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let start = pos;
        let token = if c.is_ascii_digit()
            || (c == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit))
        {
            let len = number_len(rest);
            let text = &rest[..len];
            let value = text
                .parse::<f64>()
                .map_err(|_| EvalError::syntax(start, format!("invalid number `{text}`")))?;
            pos += len;
            Token::Number(value)
        } else if c == '"' || c == '\'' {
            let (value, len) = string_literal(rest, start)?;
            pos += len;
            Token::Str(value)
        } else if is_ident_start(c) {
            let len = rest
                .char_indices()
                .find(|(_, ch)| !is_ident_continue(*ch))
                .map_or(rest.len(), |(i, _)| i);
            pos += len;
            Token::Ident(rest[..len].to_string())
        } else {
            // `?.` followed by a digit is a ternary, not optional chaining
            let punct = PUNCTUATION
                .iter()
                .find(|p| rest.starts_with(**p) && !(**p == "?." && bytes.get(pos + 2).is_some_and(u8::is_ascii_digit)))
                .ok_or_else(|| EvalError::syntax(start, format!("unexpected character `{c}`")))?;
            pos += punct.len();
            Token::Punct(punct)
        };

        tokens.push(Spanned {
            token,
            position: start,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        position: src.len(),
    });
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

/// Parse a quoted literal at the start of `s`, returning the value and the
/// consumed length including quotes.
fn string_literal(s: &str, start: usize) -> Result<(String, usize), EvalError> {
    let mut chars = s.char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(EvalError::syntax(start, "expected string"));
    };
    let mut out = String::new();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, i + c.len_utf8())),
            '\\' => {
                let Some((_, escaped)) = chars.next() else { break };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    '0' => out.push('\0'),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| EvalError::syntax(start + i, "invalid unicode escape"))?;
                        out.push(code);
                    }
                    other => out.push(other),
                }
            }
            other => out.push(other),
        }
    }

    Err(EvalError::syntax(start, "unterminated string"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn tokenizes_operators_longest_first() {
        assert_eq!(
            kinds("a !== b ?? c?.d"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("!=="),
                Token::Ident("b".into()),
                Token::Punct("??"),
                Token::Ident("c".into()),
                Token::Punct("?."),
                Token::Ident("d".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_literals() {
        assert_eq!(
            kinds(r#"1.5e2 'it\'s' "aA""#),
            vec![
                Token::Number(150.0),
                Token::Str("it's".into()),
                Token::Str("aA".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn helper_identifiers_keep_dollar() {
        assert_eq!(kinds("$s")[0], Token::Ident("$s".into()));
    }

    #[test]
    fn ternary_with_decimal_is_not_optional_chain() {
        assert_eq!(
            kinds("a?.5:1")[1],
            Token::Punct("?")
        );
    }

    #[test]
    fn reports_position_of_bad_input() {
        assert_eq!(
            tokenize("a # b").unwrap_err(),
            EvalError::syntax(2, "unexpected character `#`")
        );
        assert!(tokenize("'open").is_err());
    }
}
