use thiserror::Error;

/// Infrastructure failures. None of these are the submitted code's fault;
/// they surface to callers as `SYSTEM_ERROR`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Evaluation worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
