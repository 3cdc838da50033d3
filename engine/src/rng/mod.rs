//! Deterministic random number generation
//!
//! Uses the xorshift64* algorithm. Every simulation instance owns exactly one
//! generator; `Leave` draws and any callable that asks its context for
//! randomness go through it, so a seed fully determines a run.

mod xorshift;

pub use xorshift::RngManager;
