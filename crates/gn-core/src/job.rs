use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::TimedOut)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Complete | Self::Failed | Self::TimedOut => 2,
        }
    }
}

/// A remote generation request tracked by the id the service assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    id: String,
    status: JobStatus,
    retries: u32,
    progress: Option<i64>,
}

impl GenerationJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            retries: 0,
            progress: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Number of transient poll responses seen so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Last progress value reported by the service
    pub fn progress(&self) -> Option<i64> {
        self.progress
    }

    /// Moves the job forward. Returns false and leaves the job untouched when
    /// the transition would go backward or leave a terminal state.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            return false;
        }
        self.status = next;
        true
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub fn record_progress(&mut self, progress: Option<i64>) {
        if progress.is_some() {
            self.progress = progress;
        }
    }
}
