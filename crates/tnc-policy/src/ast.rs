//! The policy tree: a sum type with an explicit `evaluate`, per spec §9's
//! design note preferring this over per-node function-pointer vtables.
//! `destroy` has no counterpart — Rust drops the owned tree on its own.

use std::collections::HashMap;

use tnc_types::{MessageType, Recommendation, Severity};

/// Per-connection posture cache, keyed by `"{system}.{subsystem}.{arg}"`
/// (spec §4.6).
#[derive(Debug, Default)]
pub struct PostureCache {
    values: HashMap<String, String>,
}

impl PostureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, system: &str, subsystem: &str, arg: &str, value: String) {
        self.values.insert(cache_key(system, subsystem, arg), value);
    }

    pub fn get(&self, system: &str, subsystem: &str, arg: &str) -> Option<&str> {
        self.values.get(&cache_key(system, subsystem, arg)).map(String::as_str)
    }
}

fn cache_key(system: &str, subsystem: &str, arg: &str) -> String {
    format!("{system}.{subsystem}.{arg}")
}

/// The side effects a policy tree can have while evaluating
/// (spec §4.6: `recommend`, `log`, `usermessage`, and the data-request
/// emitted by an absent `function`).
pub trait PolicySink {
    fn recommend(&mut self, rec: Recommendation);
    fn log(&mut self, severity: Severity, message: &str);
    fn user_message(&mut self, message: &str);
    fn request_data(&mut self, system: &str, subsystem: &str, arg: &str);
}

/// The OSC vendor id used by the system→message-type table (matches the
/// `TNC_9048_*` naming in the original IMC/IMV callback tables).
pub const OSC_VENDOR_ID: u32 = 9048;

pub const SUBTYPE_PACKAGE_STATUS_REQUEST: u8 = 1;
pub const SUBTYPE_FILE_STATUS_REQUEST: u8 = 2;
pub const SUBTYPE_REGISTRY_REQUEST: u8 = 3;
pub const SUBTYPE_EXTCOMMAND_REQUEST: u8 = 4;
pub const SUBTYPE_USER_MESSAGE: u8 = 5;

/// Map a policy `system` name to the wire type used to request that data
/// from the collector side (spec §4.6 "system-to-message-type table").
pub fn system_message_type(system: &str) -> Option<MessageType> {
    let subtype = match system {
        "Package" => SUBTYPE_PACKAGE_STATUS_REQUEST,
        "File" => SUBTYPE_FILE_STATUS_REQUEST,
        "Registry" => SUBTYPE_REGISTRY_REQUEST,
        "Extcommand" => SUBTYPE_EXTCOMMAND_REQUEST,
        _ => return None,
    };
    Some(MessageType::new(OSC_VENDOR_ID, subtype))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Contains,
    Like,
    Gt,
    Lt,
    EqStr,
}

#[derive(Debug, Clone)]
pub struct FunctionRef {
    pub system: String,
    pub subsystem: String,
    pub arg: String,
}

#[derive(Debug, Clone)]
pub enum PolicyNode {
    Statements(Vec<PolicyNode>),
    If { condition: Box<PolicyNode>, body: Box<PolicyNode> },
    Or(Box<PolicyNode>, Box<PolicyNode>),
    And(Box<PolicyNode>, Box<PolicyNode>),
    Predicate { function: FunctionRef, op: Op, literal: String },
    Recommend(Recommendation),
    Log(Severity, String),
    UserMessage(String),
}

impl PolicyNode {
    /// Evaluate this node, returning its truth value (statements and
    /// side-effecting leaves always return `true`, matching
    /// `pt_*_evaluate`'s unconditional `return 1` in the original).
    pub fn evaluate(&self, cache: &mut PostureCache, sink: &mut dyn PolicySink) -> bool {
        match self {
            PolicyNode::Statements(stmts) => {
                for s in stmts {
                    s.evaluate(cache, sink);
                }
                true
            }
            PolicyNode::If { condition, body } => {
                if condition.evaluate(cache, sink) {
                    body.evaluate(cache, sink);
                }
                true
            }
            PolicyNode::Or(lhs, rhs) => {
                // No short-circuit: both sides evaluate even once the
                // result is known, so every absent data item on either
                // side gets requested in the same batch (spec §4.6, §9).
                let l = lhs.evaluate(cache, sink);
                let r = rhs.evaluate(cache, sink);
                l || r
            }
            PolicyNode::And(lhs, rhs) => {
                let l = lhs.evaluate(cache, sink);
                let r = rhs.evaluate(cache, sink);
                l && r
            }
            PolicyNode::Predicate { function, op, literal } => {
                match cache.get(&function.system, &function.subsystem, &function.arg) {
                    Some(value) => compare(*op, value, literal),
                    None => {
                        sink.request_data(&function.system, &function.subsystem, &function.arg);
                        false
                    }
                }
            }
            PolicyNode::Recommend(rec) => {
                sink.recommend(*rec);
                true
            }
            PolicyNode::Log(severity, message) => {
                sink.log(*severity, message);
                true
            }
            PolicyNode::UserMessage(message) => {
                sink.user_message(message);
                true
            }
        }
    }
}

fn compare(op: Op, lhs: &str, rhs: &str) -> bool {
    match op {
        Op::Eq => lhs.trim().parse::<i64>().ok().zip(rhs.trim().parse::<i64>().ok()).is_some_and(|(a, b)| a == b),
        Op::Gt => lhs.trim().parse::<i64>().ok().zip(rhs.trim().parse::<i64>().ok()).is_some_and(|(a, b)| a > b),
        Op::Lt => lhs.trim().parse::<i64>().ok().zip(rhs.trim().parse::<i64>().ok()).is_some_and(|(a, b)| a < b),
        Op::Contains => lhs.contains(rhs),
        Op::EqStr => lhs == rhs,
        // Reserved by the grammar (spec §4.6); no known instance of the
        // original sample policies uses it.
        Op::Like => false,
    }
}
