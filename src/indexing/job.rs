//! Indexing job state machine.
//!
//! `Pending -> Processing -> {Completed, Failed}`; a pending job may also fail
//! directly. Terminal states accept no further transitions. Every persisted
//! update bumps `version`, and a processing job holds a lease whose heartbeat
//! lets a restarted worker detect and reap abandoned runs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::IndexingError;
use crate::symbol::ProjectId;

pub type JobId = Uuid;

/// `last_error` recorded on a reaped job.
pub const LEASE_EXPIRED: &str = "lease expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Ownership claim of a processing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLease {
    pub owner: String,
    pub heartbeat_at: DateTime<Utc>,
}

/// Counters persisted after every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingStats {
    pub total_files: usize,
    pub files_processed: usize,
    pub symbols_found: usize,
    pub references_found: usize,
    pub errors: usize,
    pub symbols_pruned: usize,
    pub commits_indexed: usize,
}

/// Which files a job covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "files")]
pub enum IndexScope {
    Full,
    Changed(Vec<String>),
}

impl IndexScope {
    /// Full reindex when forced or when no changed files are given.
    pub fn from_request(changed_files: Option<Vec<String>>, force_full_reindex: bool) -> Self {
        match changed_files {
            Some(files) if !force_full_reindex && !files.is_empty() => IndexScope::Changed(files),
            _ => IndexScope::Full,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, IndexScope::Full)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingJob {
    pub id: JobId,
    pub project_id: ProjectId,
    pub status: JobStatus,
    pub scope: IndexScope,
    pub commit_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: IndexingStats,
    pub last_error: Option<String>,
    /// Bumped by the store on every persisted update
    pub version: u64,
    pub lease: Option<JobLease>,
}

impl IndexingJob {
    pub fn new(project_id: ProjectId, scope: IndexScope, commit_hash: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            status: JobStatus::Pending,
            scope,
            commit_hash,
            started_at: Utc::now(),
            finished_at: None,
            stats: IndexingStats::default(),
            last_error: None,
            version: 0,
            lease: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), IndexingError> {
        if !self.status.can_transition_to(next) {
            return Err(IndexingError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Claim the job for `owner` and move it to `Processing`.
    pub fn start(&mut self, owner: &str, now: DateTime<Utc>) -> Result<(), IndexingError> {
        self.transition(JobStatus::Processing)?;
        self.lease = Some(JobLease {
            owner: owner.to_string(),
            heartbeat_at: now,
        });
        Ok(())
    }

    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        if let Some(lease) = &mut self.lease {
            lease.heartbeat_at = now;
        }
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), IndexingError> {
        self.transition(JobStatus::Completed)?;
        self.finished_at = Some(now);
        self.lease = None;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), IndexingError> {
        self.transition(JobStatus::Failed)?;
        self.last_error = Some(error.into());
        self.finished_at = Some(now);
        self.lease = None;
        Ok(())
    }

    /// A processing job whose lease heartbeat is older than `ttl`.
    pub fn is_orphaned(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        match &self.lease {
            Some(lease) => now - lease.heartbeat_at > ttl,
            None => true,
        }
    }
}
