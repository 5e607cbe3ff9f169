//! Integration test modules, one per spec.md §8 scenario group.

mod aggregation;
mod batch_protocol;
mod concurrency;
mod handshake;
