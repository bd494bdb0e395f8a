//! Decision client — talks to the daemon's front-end socket.
//!
//! Used by the shim and hook binaries, `cmdgate status`, and the
//! integration tests. Synchronous on purpose: a front-end asks one
//! question and waits for the answer, so a connection per request is
//! simple and reliable.

use crate::daemon::protocol::*;
use crate::rules::types::CommandRequest;
use crate::utils::paths::{decision_socket, runtime_dir};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

pub struct DecisionClient {
    socket_path: PathBuf,
}

impl DecisionClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Client for the conventional socket location: `$CMDGATE_SOCKET`, or
    /// `decision.sock` under the runtime directory.
    pub fn from_env() -> Self {
        match std::env::var("CMDGATE_SOCKET") {
            Ok(path) => Self::new(path),
            Err(_) => Self::new(decision_socket(&runtime_dir())),
        }
    }

    /// Ask the daemon whether a command may run. Blocks through any
    /// approval round; the reply is always a final allow or deny.
    pub fn decide(&self, command: CommandRequest) -> Result<DecisionResponse> {
        let request = FrontendRequest::Decide(DecisionRequest {
            request_id: None,
            command,
        });
        let line = self.round_trip(&request)?;
        if let Ok(rejected) = serde_json::from_str::<ErrorReply>(&line) {
            bail!("daemon rejected request: {}", rejected.error);
        }
        serde_json::from_str(&line).context("Failed to parse decision response")
    }

    /// Query loaded-rule and pending-approval counts.
    pub fn status(&self) -> Result<StatusReport> {
        let line = self.round_trip(&FrontendRequest::Status)?;
        serde_json::from_str(&line).context("Failed to parse status report")
    }

    fn round_trip(&self, request: &FrontendRequest) -> Result<String> {
        let mut stream = UnixStream::connect(&self.socket_path).with_context(|| {
            format!(
                "Failed to connect to cmdgate at {}. Is the daemon running?",
                self.socket_path.display()
            )
        })?;

        let json = serde_json::to_string(request)?;
        stream.write_all(json.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}
