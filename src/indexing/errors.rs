//! Failure classification for indexing runs.

use std::fmt;
use thiserror::Error;

use super::job::JobStatus;
use crate::indexer::ExtractionError;
use crate::storage::StoreError;
use crate::symbol::ProjectId;

/// A fault that fails the whole indexing job.
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("external service failure: {0:#}")]
    ExternalService(#[from] anyhow::Error),

    #[error("job cannot move from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Stage where a per-file fault happened
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ProcessingStage {
    FileRead,
    Extraction,
    Storage,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingStage::FileRead => write!(f, "file read"),
            ProcessingStage::Extraction => write!(f, "extraction"),
            ProcessingStage::Storage => write!(f, "storage"),
        }
    }
}

/// A fault confined to one file; counted in the job stats, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: String,
    pub error: String,
    pub stage: ProcessingStage,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.stage, self.error)
    }
}

/// Outcome of a fault raised while processing a single file.
pub(crate) enum FileFault {
    /// Count it and move on to the next file
    Isolated(FileError),
    /// Abort the job
    Fatal(IndexingError),
}

impl FileFault {
    pub(crate) fn from_extraction(path: &str, err: ExtractionError) -> Self {
        FileFault::Isolated(FileError {
            path: path.to_string(),
            error: err.to_string(),
            stage: ProcessingStage::Extraction,
        })
    }

    pub(crate) fn from_store(path: &str, err: StoreError) -> Self {
        if err.is_per_record() {
            FileFault::Isolated(FileError {
                path: path.to_string(),
                error: err.to_string(),
                stage: ProcessingStage::Storage,
            })
        } else {
            FileFault::Fatal(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_faults_are_classified() {
        let rejected = FileFault::from_store("a.py", StoreError::Rejected("bad row".into()));
        assert!(matches!(
            rejected,
            FileFault::Isolated(FileError { stage: ProcessingStage::Storage, .. })
        ));

        let down = FileFault::from_store("a.py", StoreError::Unavailable("down".into()));
        assert!(matches!(down, FileFault::Fatal(IndexingError::Store(_))));
    }

    #[test]
    fn test_error_messages() {
        let err = IndexingError::ProjectNotFound(3);
        assert_eq!(err.to_string(), "project 3 not found");

        let err = IndexingError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Processing,
        };
        assert_eq!(err.to_string(), "job cannot move from completed to processing");

        let err = IndexingError::from(anyhow::anyhow!("timeout").context("embedding call"));
        assert_eq!(err.to_string(), "external service failure: embedding call: timeout");
    }

    #[test]
    fn test_file_error_display() {
        let err = FileError {
            path: "src/a.rs".into(),
            error: "boom".into(),
            stage: ProcessingStage::FileRead,
        };
        assert_eq!(err.to_string(), "src/a.rs (file read): boom");
    }
}
