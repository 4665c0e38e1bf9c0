//! Integration test utilities for the gateway client
//!
//! This crate provides a scripted in-memory transport so lifecycle tests
//! can play the server side of a connection without a network.

pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
