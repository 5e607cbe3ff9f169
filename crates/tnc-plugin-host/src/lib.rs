//! # tnc-plugin-host
//!
//! Dynamic loading and IF-IMC/IF-IMV ABI binding (spec §2 C4, §4.2).
//!
//! Each side keeps its plugin records behind a single process-wide
//! `parking_lot::Mutex`, matching the original library's global state (spec
//! §9 "Global mutable registries and singletons"): `OnceLock` lazily builds
//! the lock, and every host method follows the same discipline — look the
//! plugin's function pointer up under the lock, drop the lock, then call
//! into the plugin (§4.1 re-entrancy rule, "never call out to a plugin
//! while holding the global lock").
//!
//! This crate knows nothing about batches, connections, or the aggregator:
//! it exposes [`ports::ImcPort`]/[`ports::ImvPort`] as driven ports that
//! `tncc`/`tncs` implement, the same inversion the teacher uses in
//! `qc-07-bloom-filters` to keep its core ignorant of its adapters.

mod abi;
mod config;
mod imc;
mod imv;
mod ports;

pub use abi::connection_state_to_u32;
pub use imc::ImcHost;
pub use imv::ImvHost;
pub use ports::{ImcPort, ImvPort};
