//! Indexing jobs and the pipeline that runs them

pub mod errors;
pub mod job;
pub mod pipeline;

pub use errors::{FileError, IndexingError, ProcessingStage};
pub use job::{IndexScope, IndexingJob, IndexingStats, JobId, JobLease, JobStatus, LEASE_EXPIRED};
pub use pipeline::IndexingPipeline;
