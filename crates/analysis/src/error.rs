use std::path::PathBuf;

/// Errors parsing a single log line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line has no timestamp prefix")]
    MissingTimestamp,

    #[error("invalid timestamp {stamp:?}: {reason}")]
    Timestamp { stamp: String, reason: String },

    #[error("malformed {action:?} line: {reason}")]
    Malformed { action: String, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(action: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            action: action.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Errors loading log files.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no log files given")]
    NoInput,
}
