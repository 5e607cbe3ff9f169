//! # TNC runtime test suite
//!
//! End-to-end handshake scenarios (spec.md §8 S1-S6) exercised against the
//! real `tncc`/`tncs` runtime crates plus targeted tests of the lower-level
//! crates (`tnc-router`, `tnc-batch`, `tnc-aggregator`) for properties an
//! in-process run can't otherwise reach.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p tnc-tests
//! ```

#![allow(dead_code)]

pub mod integration;
