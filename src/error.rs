use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the install/update pipeline can report.
///
/// Messages are single-line so `main` can print them verbatim.
#[derive(Debug, Error)]
pub enum PptError {
    #[error("malformed release URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("transfer of {url} failed: {reason}")]
    Transfer { url: String, reason: String },

    #[error("unsupported archive format: {}", path.display())]
    UnsupportedArchive { path: PathBuf },

    #[error("no executable found in {}", archive.display())]
    NoExecutableFound { archive: PathBuf },

    #[error("package record '{name}' has an empty '{field}' field")]
    InvalidRecord { name: String, field: &'static str },

    #[error("manifest at {} is corrupt: {reason}", path.display())]
    ManifestCorrupt { path: PathBuf, reason: String },

    #[error("'{program}' is not installed")]
    NotInstalled { program: String },

    #[error("cannot compare version '{version}': not a semantic version")]
    VersionParse { version: String },

    #[error("{} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PptError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PptError::Io {
            context: context.into(),
            source,
        }
    }

    /// Transfer failure from a client error, keeping its underlying cause.
    pub fn request(url: &str, error: &dyn std::error::Error) -> Self {
        PptError::transfer(url, error_chain(error))
    }

    pub fn transfer(url: &str, reason: impl ToString) -> Self {
        PptError::Transfer {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// `error` followed by each of its causes, skipping causes whose text is
/// already part of the message.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut cause = error.source();
    while let Some(e) = cause {
        let text = e.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        cause = e.source();
    }
    message
}

pub type Result<T> = std::result::Result<T, PptError>;
