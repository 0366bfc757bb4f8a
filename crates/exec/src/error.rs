//! Error types for the exec channel.

/// Errors produced by the exec channel.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("remote command failed (exit code {}): {stderr}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    RemoteExit { code: Option<i32>, stderr: String },

    #[error("remote command timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}
