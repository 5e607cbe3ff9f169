//! Hand-written tokenizer for the policy grammar (spec §4.6).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Str(String),
    Dot,
    LBrace,
    RBrace,
    EqEq,
    Gt,
    Lt,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: u32 },
    #[error("line {line}: unexpected character {ch:?}")]
    UnexpectedChar { line: u32, ch: char },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

/// `NAME` runs on letters, digits, `_` and `-` (the grammar's recommendation
/// literals like `no-access` need the hyphen); `.` is lexed separately since
/// it also separates `function`'s three components.
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, LexError> {
    let mut chars: Vec<char> = src.chars().collect();
    chars.push('\0');
    let mut out = Vec::new();
    let mut i = 0;
    let mut line = 1u32;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\0' => break,
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' && chars[i] != '\0' {
                    i += 1;
                }
            }
            '{' => {
                out.push(Spanned { token: Token::LBrace, line });
                i += 1;
            }
            '}' => {
                out.push(Spanned { token: Token::RBrace, line });
                i += 1;
            }
            '.' => {
                out.push(Spanned { token: Token::Dot, line });
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                out.push(Spanned { token: Token::EqEq, line });
                i += 2;
            }
            '>' => {
                out.push(Spanned { token: Token::Gt, line });
                i += 1;
            }
            '<' => {
                out.push(Spanned { token: Token::Lt, line });
                i += 1;
            }
            '"' => {
                let start_line = line;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') if chars.get(i + 1) == Some(&'"') => {
                            s.push('"');
                            i += 2;
                        }
                        Some('\0') | None => return Err(LexError::UnterminatedString { line: start_line }),
                        Some(&ch) => {
                            if ch == '\n' {
                                line += 1;
                            }
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                out.push(Spanned { token: Token::Str(s), line: start_line });
            }
            c if is_ident_char(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push(Spanned { token: Token::Ident(word), line });
            }
            other => return Err(LexError::UnexpectedChar { line, ch: other }),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenizes_a_predicate() {
        assert_eq!(
            toks(r#"File.x.status eq "0""#),
            vec![
                Token::Ident("File".into()),
                Token::Dot,
                Token::Ident("x".into()),
                Token::Dot,
                Token::Ident("status".into()),
                Token::Ident("eq".into()),
                Token::Str("0".into()),
            ]
        );
    }

    #[test]
    fn hyphenated_recommendation_literal_is_one_token() {
        assert_eq!(toks("no-access"), vec![Token::Ident("no-access".into())]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(toks("# a comment\nrecommend allow"), vec![Token::Ident("recommend".into()), Token::Ident("allow".into())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(tokenize(r#""abc"#), Err(LexError::UnterminatedString { .. })));
    }
}
