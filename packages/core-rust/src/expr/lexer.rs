//! Tokenizer for the expression language.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Bang,
    Question,
    Coalesce,
    Colon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

/// A token plus the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let (token, end) = lex_number(source, i)?;
            tokens.push(Spanned { token, pos: start });
            i = end;
            continue;
        }

        if c == b'_' || c.is_ascii_alphabetic() {
            while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            let word = &source[start..i];
            let token = match word {
                "true" => Token::True,
                "false" => Token::False,
                "null" | "nil" => Token::Null,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ => Token::Ident(word.to_string()),
            };
            tokens.push(Spanned { token, pos: start });
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (s, end) = lex_string(source, i)?;
            tokens.push(Spanned {
                token: Token::Str(s),
                pos: start,
            });
            i = end;
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let (token, width) = match (c, next) {
            (b'=', Some(b'=')) => (Token::Eq, 2),
            (b'!', Some(b'=')) => (Token::Ne, 2),
            (b'<', Some(b'=')) => (Token::Le, 2),
            (b'>', Some(b'=')) => (Token::Ge, 2),
            (b'&', Some(b'&')) => (Token::And, 2),
            (b'|', Some(b'|')) => (Token::Or, 2),
            (b'?', Some(b'?')) => (Token::Coalesce, 2),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            (b'!', _) => (Token::Bang, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            (b'?', _) => (Token::Question, 1),
            (b':', _) => (Token::Colon, 1),
            (b',', _) => (Token::Comma, 1),
            (b'.', _) => (Token::Dot, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b'[', _) => (Token::LBracket, 1),
            (b']', _) => (Token::RBracket, 1),
            _ => {
                let ch = source[i..].chars().next().unwrap_or('?');
                return Err(ExprError::Parse {
                    pos: i,
                    message: format!("unexpected character '{ch}'"),
                });
            }
        };
        tokens.push(Spanned { token, pos: start });
        i += width;
    }

    Ok(tokens)
}

fn lex_number(source: &str, start: usize) -> Result<(Token, usize), ExprError> {
    let bytes = source.as_bytes();
    let mut i = start;
    let mut is_float = false;

    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
        i += 1;
    }
    // A dot only continues the number when a digit follows; `1.foo` is not a float.
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        is_float = true;
        i += 1;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = source[start..i].chars().filter(|&c| c != '_').collect();
    let invalid = || ExprError::Parse {
        pos: start,
        message: format!("invalid number literal '{}'", &source[start..i]),
    };
    let token = if is_float {
        Token::Float(text.parse().map_err(|_| invalid())?)
    } else {
        match text.parse::<i64>() {
            Ok(n) => Token::Int(n),
            Err(_) => Token::Float(text.parse().map_err(|_| invalid())?),
        }
    };
    Ok((token, i))
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), ExprError> {
    let quote = source.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = source[start + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, start + 1 + offset + 1)),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c => out.push(c),
        }
    }

    Err(ExprError::Parse {
        pos: start,
        message: "unterminated string literal".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn numbers_and_members() {
        assert_eq!(
            kinds("source.balance - 1_000 * 2.5"),
            vec![
                Token::Ident("source".into()),
                Token::Dot,
                Token::Ident("balance".into()),
                Token::Minus,
                Token::Int(1000),
                Token::Star,
                Token::Float(2.5),
            ]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' + "a\"b""#),
            vec![
                Token::Str("it's".into()),
                Token::Plus,
                Token::Str("a\"b".into()),
            ]
        );
    }

    #[test]
    fn operators_and_keywords() {
        assert_eq!(
            kinds("a ?? b && not c || d != nil"),
            vec![
                Token::Ident("a".into()),
                Token::Coalesce,
                Token::Ident("b".into()),
                Token::And,
                Token::Not,
                Token::Ident("c".into()),
                Token::Or,
                Token::Ident("d".into()),
                Token::Ne,
                Token::Null,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_error() {
        assert!(matches!(tokenize("'abc"), Err(ExprError::Parse { pos: 0, .. })));
    }

    #[test]
    fn unexpected_character_is_error() {
        let err = tokenize("a # b").unwrap_err();
        assert!(err.to_string().contains("unexpected character '#'"));
    }
}
