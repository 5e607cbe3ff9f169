//! # tnc-types
//!
//! Wire-level types and the error taxonomy shared by every crate in the TNC
//! runtime: the `(vendor, subtype)` message tag, the access-recommendation
//! enums, the TNCS attribute-store ids, connection-state notifications, and
//! the `TncError`/`TncResult` pair from spec §7.
//!
//! Kept dependency-free beyond `thiserror` so every other crate in the
//! workspace can depend on it without pulling in XML, dynamic-loading, or
//! concurrency crates it doesn't need.

mod attribute;
mod error;
mod message_type;
mod recommendation;
mod state;

pub use attribute::AttributeId;
pub use error::{TncError, TncResult};
pub use message_type::{MessageType, SUBTYPE_ANY, VENDOR_ANY, VENDOR_TCG};
pub use recommendation::{Recommendation, RecommendationPolicy};
pub use state::{ConnectionState, Severity};

/// Default capacity of each side's plugin slot table (spec §3, §9: "Fixed
/// plugin cap (N=100)... retained as a compile-time parameter").
pub const DEFAULT_PLUGIN_CAP: usize = 100;

/// Plugin-ABI version this host negotiates (IF-IMC/IF-IMV v1.0).
pub const TNC_VERSION_1: u32 = 1;
