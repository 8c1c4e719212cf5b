use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum WorkerError {
    #[error("failed to connect to coordinator at {0}")]
    #[diagnostic(code(workmesh::worker::connect))]
    Connect(String),

    #[error("control channel closed unexpectedly")]
    #[diagnostic(code(workmesh::worker::channel_closed))]
    ChannelClosed,

    #[error("unknown task code: {0}")]
    #[diagnostic(code(workmesh::worker::unknown_code))]
    UnknownCode(String),

    #[error("task execution failed: {0}")]
    #[diagnostic(code(workmesh::worker::execution))]
    Execution(String),

    #[error("malformed control-channel payload: {0}")]
    #[diagnostic(code(workmesh::worker::protocol))]
    Protocol(#[from] serde_json::Error),
}
