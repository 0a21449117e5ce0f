//! Startup and runtime failures, mapped to spec.md §6 exit codes at the
//! `main` boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to load configuration: {0}")]
    Config(String),

    #[error("failed to initialize telemetry: {0}")]
    Telemetry(#[from] quantum_telemetry::TelemetryError),

    #[error("failed to bind gossip listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("fatal invariant violation: {0}")]
    Fatal(String),

    #[error("operator requested shutdown")]
    OperatorAbort,
}

/// Exit codes per spec.md §6: 0 clean shutdown, 1 startup failure, 2 fatal
/// runtime error, 3 operator abort.
impl NodeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            NodeError::Config(_) | NodeError::Telemetry(_) | NodeError::Bind { .. } => 1,
            NodeError::Fatal(_) => 2,
            NodeError::OperatorAbort => 3,
        }
    }
}
