use thiserror::Error;

/// Fatal errors raised by the pipeline stages.
///
/// Skipped records are not errors; see [`crate::project::SkipReason`].
#[derive(Error, Debug)]
pub enum BakeError {
    #[error("source unavailable ({location}): {reason}")]
    SourceUnavailable { location: String, reason: String },

    #[error("failed to stage archive: {0}")]
    Staging(#[source] std::io::Error),

    #[error("archive corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("no archive entry matches {pattern:?}")]
    ArchiveEntryNotFound { pattern: String },

    #[error("malformed JSON{}: {message}", at_offset(.offset))]
    MalformedJson { offset: Option<u64>, message: String },

    #[error("failed to write output: {0}")]
    SinkWrite(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BakeError {
    pub(crate) fn malformed(offset: u64, message: impl Into<String>) -> Self {
        BakeError::MalformedJson {
            offset: Some(offset),
            message: message.into(),
        }
    }

    pub(crate) fn source_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        BakeError::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for BakeError {
    fn from(err: zip::result::ZipError) -> Self {
        BakeError::ArchiveCorrupt(err.to_string())
    }
}

fn at_offset(offset: &Option<u64>) -> String {
    match offset {
        Some(o) => format!(" at byte {o}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, BakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_with_offset() {
        let err = BakeError::malformed(42, "unexpected end of input");
        assert_eq!(err.to_string(), "malformed JSON at byte 42: unexpected end of input");
    }

    #[test]
    fn test_malformed_display_without_offset() {
        let err = BakeError::MalformedJson {
            offset: None,
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "malformed JSON: bad");
    }
}
