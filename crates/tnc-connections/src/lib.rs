//! # tnc-connections
//!
//! TNCC-side and TNCS-side connection contexts, and the registry that owns
//! them (spec §2 C7, §3, §4.4 state diagram).

mod registry;
mod tncc;
mod tncs;

pub use registry::ConnectionRegistry;
pub use tncc::TnccConnection;
pub use tncs::TncsConnection;
