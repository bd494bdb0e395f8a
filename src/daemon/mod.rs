pub mod client;
pub mod dispatcher;
pub mod monitor;
pub mod protocol;
pub mod server;

pub use client::DecisionClient;
pub use server::{Daemon, DaemonConfig, DaemonState};
