//! Error types for the console engine.

use std::io;

use crate::jobs::JobId;

/// Malformed input rejected by the line parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("multiple output redirections are not allowed")]
    MultipleRedirects,

    #[error("missing output redirection target")]
    MissingRedirectTarget,

    #[error("invalid command syntax: {0:?}")]
    InvalidSyntax(String),
}

/// Failures reported by the job supervisor.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id} failed (exit code {})", exit_label(.code))]
    Failed { id: JobId, code: Option<i32> },

    #[error("job {0} was killed")]
    Killed(JobId),

    #[error("job {id}: {source}")]
    Io {
        id: JobId,
        #[source]
        source: io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Errors produced while executing a line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{name}: {message}")]
    Command { name: String, message: String },

    #[error("usage: {usage}")]
    Usage { name: String, usage: String },

    #[error("job error: {0}")]
    Job(#[from] JobError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("nested execution deeper than {0} levels")]
    RecursionLimit(usize),

    #[error("background execution supports a single command without pipes or ';'")]
    BackgroundPipeline,
}

impl Error {
    /// Shorthand for a handler failure.
    pub fn command(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Command {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, Error>;
