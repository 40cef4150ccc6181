use thiserror::Error;

/// Errors that abort a provisioning run.
///
/// Every variant is fatal. The binary prints the message once and exits
/// non-zero; nothing applied by earlier stages is undone.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unsupported architecture: {0} (expected aarch64/arm64 or x86_64)")]
    UnsupportedArchitecture(String),

    #[error("required tool '{0}' not found in PATH")]
    MissingPrerequisite(String),

    #[error("command failed ({code}): {command}{}", stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        code: String,
        stderr: String,
    },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model runtime not responding at {url}: {reason} (check: {log_hint})")]
    RuntimeUnreachable {
        url: String,
        /// Command that shows the runtime's own log.
        log_hint: String,
        reason: String,
    },

    #[error("model '{model}' was pulled but '{base}' is missing from the runtime's model list")]
    ModelNotListed { model: String, base: String },

    #[error("runtime API error: {0}")]
    Http(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{}", trimmed)
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
