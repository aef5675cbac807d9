use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    // Message format is load-bearing: callers match on "timeout after <ms>ms".
    #[error("Execution timeout after {ms}ms")]
    Timeout { ms: u64 },

    // Executor errors
    #[error("Plan cancelled")]
    Cancelled,

    #[error("Executor error: {0}")]
    Executor(String),

    // Memory errors
    #[error("Memory error: {0}")]
    Memory(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WeftError>;
