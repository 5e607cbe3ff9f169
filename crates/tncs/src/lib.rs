//! # tncs
//!
//! TNCS (server)-side runtime wiring (spec §10): a [`server::TncServer`]
//! composing `tnc-plugin-host`'s IMV host with `tnc-router`, `tnc-batch`,
//! `tnc-connections`, and `tnc-aggregator`, plus an in-process sample IMV
//! that evaluates a `tnc-policy` tree.

mod server;
pub mod sample;

pub use server::TncServer;
