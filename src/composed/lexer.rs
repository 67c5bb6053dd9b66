// src/composed/lexer.rs

//! Tokenizer for composed-task definitions.

use std::fmt;

use crate::composed::error::DefinitionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Task name, label, bare exit status or `$END` / `$FAIL`.
    Ident(String),
    /// Quoted exit status (`'FAILED'`), quotes stripped.
    Str(String),
    Colon,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `<`
    SplitOpen,
    /// `>`
    SplitClose,
    /// `->`
    Arrow,
    /// `*`
    Wildcard,
    /// `--key=value`
    Option { key: String, value: String },
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{s}'"),
            Token::Str(s) => write!(f, "quoted '{s}'"),
            Token::Colon => f.write_str("':'"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::SplitOpen => f.write_str("'<'"),
            Token::SplitClose => f.write_str("'>'"),
            Token::Arrow => f.write_str("'->'"),
            Token::Wildcard => f.write_str("'*'"),
            Token::Option { key, .. } => write!(f, "option '--{key}'"),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '$')
}

fn is_ident_start(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$')
}

/// Split a definition into tokens. Whitespace is insignificant.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, DefinitionError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|&(_, c)| c);

    while let Some(&(pos, c)) = chars.get(i) {
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token = match c {
            ':' => {
                i += 1;
                Token::Colon
            }
            '*' => {
                i += 1;
                Token::Wildcard
            }
            '<' => {
                i += 1;
                Token::SplitOpen
            }
            '>' => {
                i += 1;
                Token::SplitClose
            }
            '&' if peek(i + 1) == Some('&') => {
                i += 2;
                Token::And
            }
            '|' if peek(i + 1) == Some('|') => {
                i += 2;
                Token::Or
            }
            '-' if peek(i + 1) == Some('>') => {
                i += 2;
                Token::Arrow
            }
            '-' if peek(i + 1) == Some('-') => {
                let (token, next) = lex_option(input, &chars, i)?;
                i = next;
                token
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while let Some(&(_, ch)) = chars.get(j) {
                    if ch == quote {
                        break;
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(DefinitionError::UnterminatedString { pos });
                }
                let text: String = chars[start..j].iter().map(|&(_, ch)| ch).collect();
                i = j + 1;
                Token::Str(text)
            }
            c if is_ident_start(c) => {
                let start = i;
                while let Some(ch) = peek(i) {
                    // `a->b` is `a`, `->`, `b`.
                    if !is_ident_char(ch) || (ch == '-' && peek(i + 1) == Some('>')) {
                        break;
                    }
                    i += 1;
                }
                Token::Ident(chars[start..i].iter().map(|&(_, ch)| ch).collect())
            }
            other => return Err(DefinitionError::UnexpectedCharacter { ch: other, pos }),
        };

        tokens.push(Spanned { token, pos });
    }

    Ok(tokens)
}

/// `--key=value`; the value may be quoted and runs to the next whitespace or
/// operator otherwise.
fn lex_option(
    input: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Result<(Token, usize), DefinitionError> {
    let pos = chars[start].0;
    let mut i = start + 2;

    let key_start = i;
    while let Some(&(_, ch)) = chars.get(i) {
        if ch == '=' || ch.is_whitespace() || matches!(ch, '&' | '|' | '<' | '>') {
            break;
        }
        i += 1;
    }
    let key: String = chars[key_start..i].iter().map(|&(_, ch)| ch).collect();
    if key.is_empty() {
        return Err(DefinitionError::UnexpectedCharacter { ch: '-', pos });
    }

    let mut value = String::new();
    if chars.get(i).map(|&(_, c)| c) == Some('=') {
        i += 1;
        match chars.get(i).map(|&(_, c)| c) {
            Some(quote @ ('\'' | '"')) => {
                let quote_pos = chars[i].0;
                i += 1;
                let value_start = i;
                while chars.get(i).is_some_and(|&(_, ch)| ch != quote) {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(DefinitionError::UnterminatedString { pos: quote_pos });
                }
                value = chars[value_start..i].iter().map(|&(_, ch)| ch).collect();
                i += 1;
            }
            _ => {
                let value_start = i;
                while let Some(&(_, ch)) = chars.get(i) {
                    if ch.is_whitespace() || matches!(ch, '&' | '|' | '<' | '>') {
                        break;
                    }
                    i += 1;
                }
                let from = chars.get(value_start).map(|&(p, _)| p).unwrap_or(input.len());
                let to = chars.get(i).map(|&(p, _)| p).unwrap_or(input.len());
                value = input[from..to].to_string();
            }
        }
    }

    Ok((Token::Option { key, value }, i))
}
