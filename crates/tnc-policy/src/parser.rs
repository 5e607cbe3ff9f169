//! Recursive-descent parser over the tokenizer's output (spec §4.6 grammar).

use thiserror::Error;
use tnc_types::{Recommendation, Severity};

use crate::ast::{FunctionRef, Op, PolicyNode};
use crate::lexer::{tokenize, LexError, Spanned, Token};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("lexer error: {0}")]
    Lex(#[from] LexError),
    #[error("line {line}: unexpected end of input")]
    UnexpectedEof { line: u32 },
    #[error("line {line}: expected {expected}, found {found:?}")]
    Unexpected { line: u32, expected: &'static str, found: Token },
    #[error("line {line}: unknown recommendation literal {found:?}")]
    UnknownRecommendation { line: u32, found: String },
    #[error("line {line}: unknown log severity {found:?}")]
    UnknownSeverity { line: u32, found: String },
    #[error("line {line}: unknown comparison operator {found:?}")]
    UnknownOp { line: u32, found: String },
}

/// Parse a full policy program into its statement list.
pub fn parse(src: &str) -> Result<PolicyNode, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while parser.pos < parser.tokens.len() {
        statements.push(parser.statement()?);
    }
    Ok(PolicyNode::Statements(statements))
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn line(&self) -> u32 {
        self.tokens.get(self.pos).map(|t| t.line).unwrap_or_else(|| self.tokens.last().map(|t| t.line).unwrap_or(1))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let line = self.line();
        let tok = self.tokens.get(self.pos).ok_or(ParseError::UnexpectedEof { line })?.token.clone();
        self.pos += 1;
        Ok(tok)
    }

    fn expect_brace(&mut self, open: bool) -> Result<(), ParseError> {
        let line = self.line();
        let want = if open { Token::LBrace } else { Token::RBrace };
        let expected = if open { "'{'" } else { "'}'" };
        match self.advance()? {
            t if t == want => Ok(()),
            other => Err(ParseError::Unexpected { line, expected, found: other }),
        }
    }

    fn expect_str(&mut self) -> Result<String, ParseError> {
        let line = self.line();
        match self.advance()? {
            Token::Str(s) => Ok(s),
            other => Err(ParseError::Unexpected { line, expected: "a quoted string", found: other }),
        }
    }

    fn expect_ident_any(&mut self) -> Result<String, ParseError> {
        let line = self.line();
        match self.advance()? {
            Token::Ident(w) => Ok(w),
            other => Err(ParseError::Unexpected { line, expected: "an identifier", found: other }),
        }
    }

    fn peek_is_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn statement(&mut self) -> Result<PolicyNode, ParseError> {
        let line = self.line();
        match self.peek().cloned() {
            Some(Token::Ident(ref w)) if w == "if" => {
                self.pos += 1;
                let condition = Box::new(self.disjunction()?);
                self.expect_brace(true)?;
                let mut body = Vec::new();
                while !matches!(self.peek(), Some(Token::RBrace)) {
                    body.push(self.statement()?);
                }
                self.expect_brace(false)?;
                Ok(PolicyNode::If { condition, body: Box::new(PolicyNode::Statements(body)) })
            }
            Some(Token::Ident(ref w)) if w == "recommend" => {
                self.pos += 1;
                let word = self.expect_ident_any()?;
                let rec = match word.as_str() {
                    "allow" => Recommendation::Allow,
                    "no-access" => Recommendation::NoAccess,
                    "isolate" => Recommendation::Isolate,
                    "no-recommendation" => Recommendation::NoRecommendation,
                    _ => return Err(ParseError::UnknownRecommendation { line, found: word }),
                };
                Ok(PolicyNode::Recommend(rec))
            }
            Some(Token::Ident(ref w)) if w == "log" => {
                self.pos += 1;
                let word = self.expect_ident_any()?;
                let severity = match word.as_str() {
                    "err" => Severity::Err,
                    "warning" => Severity::Warning,
                    "notice" => Severity::Notice,
                    "info" => Severity::Info,
                    "debug" => Severity::Debug,
                    _ => return Err(ParseError::UnknownSeverity { line, found: word }),
                };
                let message = self.expect_str()?;
                Ok(PolicyNode::Log(severity, message))
            }
            Some(Token::Ident(ref w)) if w == "usermessage" => {
                self.pos += 1;
                let message = self.expect_str()?;
                Ok(PolicyNode::UserMessage(message))
            }
            Some(other) => Err(ParseError::Unexpected { line, expected: "a statement", found: other }),
            None => Err(ParseError::UnexpectedEof { line }),
        }
    }

    fn disjunction(&mut self) -> Result<PolicyNode, ParseError> {
        let lhs = self.conjunction()?;
        if self.peek_is_ident("or") {
            self.pos += 1;
            let rhs = self.conjunction()?;
            Ok(PolicyNode::Or(Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn conjunction(&mut self) -> Result<PolicyNode, ParseError> {
        let lhs = self.predicate()?;
        if self.peek_is_ident("and") {
            self.pos += 1;
            let rhs = self.predicate()?;
            Ok(PolicyNode::And(Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn predicate(&mut self) -> Result<PolicyNode, ParseError> {
        let function = self.function()?;
        let op = self.op()?;
        let literal = self.expect_str()?;
        Ok(PolicyNode::Predicate { function, op, literal })
    }

    fn function(&mut self) -> Result<FunctionRef, ParseError> {
        let system = self.expect_ident_any()?;
        self.expect_dot()?;
        let subsystem = self.expect_ident_any()?;
        self.expect_dot()?;
        let arg = self.expect_ident_any()?;
        Ok(FunctionRef { system, subsystem, arg })
    }

    fn expect_dot(&mut self) -> Result<(), ParseError> {
        let line = self.line();
        match self.advance()? {
            Token::Dot => Ok(()),
            other => Err(ParseError::Unexpected { line, expected: "'.'", found: other }),
        }
    }

    fn op(&mut self) -> Result<Op, ParseError> {
        let line = self.line();
        match self.advance()? {
            Token::EqEq => Ok(Op::Eq),
            Token::Gt => Ok(Op::Gt),
            Token::Lt => Ok(Op::Lt),
            Token::Ident(w) => match w.as_str() {
                "contains" => Ok(Op::Contains),
                "like" => Ok(Op::Like),
                "eq" => Ok(Op::EqStr),
                _ => Err(ParseError::UnknownOp { line, found: w }),
            },
            other => Err(ParseError::Unexpected { line, expected: "a comparison operator", found: other }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PolicySink;

    #[derive(Default)]
    struct NullSink;
    impl PolicySink for NullSink {
        fn recommend(&mut self, _rec: Recommendation) {}
        fn log(&mut self, _severity: Severity, _message: &str) {}
        fn user_message(&mut self, _message: &str) {}
        fn request_data(&mut self, _system: &str, _subsystem: &str, _arg: &str) {}
    }

    #[test]
    fn parses_the_missing_data_loop_policy() {
        let tree = parse(r#"if File.x.status eq "0" { recommend allow }"#).unwrap();
        match tree {
            PolicyNode::Statements(stmts) => {
                assert_eq!(stmts.len(), 1);
                assert!(matches!(stmts[0], PolicyNode::If { .. }));
            }
            _ => panic!("expected a statement list"),
        }
    }

    #[test]
    fn parses_and_runs_a_disjunction_with_a_trailing_recommend() {
        let tree = parse(
            r#"
            if Registry.r.key == "1" or File.f.status == "1" {
                recommend isolate
            }
            recommend no-access
            "#,
        )
        .unwrap();
        let mut cache = crate::ast::PostureCache::new();
        let mut sink = NullSink;
        tree.evaluate(&mut cache, &mut sink);
    }

    #[test]
    fn rejects_an_unknown_recommendation_literal() {
        let err = parse("recommend maybe").unwrap_err();
        assert!(matches!(err, ParseError::UnknownRecommendation { .. }));
    }

    #[test]
    fn rejects_unbalanced_braces() {
        let err = parse(r#"if A.b.c eq "1" { recommend allow"#).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }
}
