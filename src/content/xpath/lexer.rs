use crate::content::xpath::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Pipe,
    Plus,
    Minus,
    Star,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    DoubleColon,
    Dollar,
    Literal(String),
    Number(f64),
    Name(String),
}

/// Splits an expression into tokens paired with their character offset.
///
/// `*` and the operator names (`and`, `or`, `div`, `mod`) are left ambiguous
/// here; the parser resolves them by position.
pub(crate) fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, XPathError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let start = i;

        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '.' if next == Some('.') => {
                i += 2;
                Token::DotDot
            }
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let (number, end) = read_number(&chars, i);
                i = end;
                Token::Number(number)
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            ':' if next == Some(':') => {
                i += 2;
                Token::DoubleColon
            }
            '!' if next == Some('=') => {
                i += 2;
                Token::NotEq
            }
            '<' if next == Some('=') => {
                i += 2;
                Token::Le
            }
            '>' if next == Some('=') => {
                i += 2;
                Token::Ge
            }
            '"' | '\'' => {
                let Some(length) = chars[i + 1..].iter().position(|&q| q == c) else {
                    return Err(XPathError::syntax(start, "unterminated string literal"));
                };
                let literal: String = chars[i + 1..i + 1 + length].iter().collect();
                i += length + 2;
                Token::Literal(literal)
            }
            c if c.is_ascii_digit() => {
                let (number, end) = read_number(&chars, i);
                i = end;
                Token::Number(number)
            }
            c if is_name_start(c) => {
                let mut end = i + 1;
                while end < chars.len() {
                    if is_name_char(chars[end]) {
                        end += 1;
                    } else if chars[end] == ':'
                        && chars.get(end + 1).is_some_and(|&n| is_name_start(n))
                    {
                        // qualified name, `axis::` is handled as its own token
                        end += 1;
                    } else {
                        break;
                    }
                }
                let name: String = chars[i..end].iter().collect();
                i = end;
                Token::Name(name)
            }
            _ => {
                i += 1;
                match c {
                    '@' => Token::At,
                    ',' => Token::Comma,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '|' => Token::Pipe,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '=' => Token::Eq,
                    '<' => Token::Lt,
                    '>' => Token::Gt,
                    '$' => Token::Dollar,
                    other => {
                        return Err(XPathError::syntax(
                            start,
                            format!("unexpected character '{other}'"),
                        ))
                    }
                }
            }
        };

        tokens.push((start, token));
    }

    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> (f64, usize) {
    let mut end = start;
    let mut seen_dot = false;
    while end < chars.len() {
        match chars[end] {
            '0'..='9' => end += 1,
            '.' if !seen_dot && chars.get(end + 1) != Some(&'.') => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    let text: String = chars[start..end].iter().collect();
    (text.parse().unwrap_or(f64::NAN), end)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}
