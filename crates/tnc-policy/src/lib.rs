//! The sample verifier's policy DSL: a tokenizer, a recursive-descent
//! parser, and a tree-walking evaluator over a per-connection posture
//! cache (spec §4.6).

mod ast;
mod lexer;
mod parser;

pub use ast::{
    system_message_type, FunctionRef, Op, PolicyNode, PolicySink, PostureCache, OSC_VENDOR_ID,
    SUBTYPE_EXTCOMMAND_REQUEST, SUBTYPE_FILE_STATUS_REQUEST, SUBTYPE_PACKAGE_STATUS_REQUEST,
    SUBTYPE_REGISTRY_REQUEST, SUBTYPE_USER_MESSAGE,
};
pub use lexer::{tokenize, LexError, Token};
pub use parser::{parse, ParseError};
