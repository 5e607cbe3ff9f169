//! # tncc
//!
//! TNCC (client)-side runtime wiring (spec §10): a [`client::TncClient`]
//! composing `tnc-plugin-host`'s IMC host with `tnc-router`, `tnc-batch`, and
//! `tnc-connections` behind the `begin_session`/`receive_batch` operations,
//! plus an in-process sample IMC used by the binary and by tests.

mod client;
pub mod sample;

pub use client::TncClient;
