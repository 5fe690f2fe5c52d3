//! Integration tests for hypebot.
//!
//! These wire the real facade, scheduler and service over a mock exchange
//! and the in-memory store.

pub mod common;
