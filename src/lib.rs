//! cmdgate — command firewall daemon.
//!
//! Intercepted shell and agent commands are checked against an ordered
//! rule set and allowed, denied, or suspended for live human approval.
//! This library exposes the core components for the binaries and the
//! integration tests; the CLI entrypoint is in `main.rs`.

pub mod approval;
pub mod audit;
pub mod bus;
pub mod daemon;
pub mod rules;
pub mod utils;
