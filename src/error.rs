use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the layout and composition core.
///
/// `Validation` and `Resource` abort a batch before anything is written;
/// `Measurement`, `Composite` and `Io` are per-item failures that a batch
/// logs and skips.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("resource unavailable: {0}")]
    Resource(String),

    #[error("text measurement failed: {0}")]
    Measurement(String),

    #[error("composition failed: {0}")]
    Composite(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ComposeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a batch may skip this failure and carry on with the next item.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::Measurement(_) | Self::Composite(_) | Self::Io { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_item_classification() {
        assert!(ComposeError::Measurement("nan".into()).is_per_item());
        assert!(ComposeError::io("x.png", std::io::Error::other("disk full")).is_per_item());
        assert!(!ComposeError::Validation("empty".into()).is_per_item());
        assert!(!ComposeError::Resource("missing".into()).is_per_item());
    }

    #[test]
    fn io_message_names_path() {
        let err = ComposeError::io("out/image_1.png", std::io::Error::other("denied"));
        assert_eq!(err.to_string(), "failed to write out/image_1.png: denied");
    }
}
