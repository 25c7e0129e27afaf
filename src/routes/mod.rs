//! HTTP route handlers.
//!
//! One sub-module per endpoint group. The helper is an unauthenticated
//! loopback service: its only caller is the browser UI on the same machine.

pub mod health;
pub mod secrets;
pub mod tunnel;
