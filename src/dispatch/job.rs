use crate::swap::models::EraseReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monitored population a subscription and its workers belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cohort {
    Whale,
    Kol,
}

impl Cohort {
    pub const ALL: [Cohort; 2] = [Cohort::Whale, Cohort::Kol];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Whale => "whale",
            Self::Kol => "kol",
        }
    }

    /// Erase reason when the secondary address check fails.
    pub fn not_found_reason(self) -> EraseReason {
        match self {
            Self::Whale => EraseReason::WhaleNotFound,
            Self::Kol => EraseReason::KolNotFound,
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (signature, monitored address) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub signature: String,
    pub monitored_address: String,
    pub source: Cohort,
    pub enqueued_at: DateTime<Utc>,
}

impl ProcessingJob {
    pub fn new(signature: impl Into<String>, monitored_address: impl Into<String>, source: Cohort) -> Self {
        Self {
            signature: signature.into(),
            monitored_address: monitored_address.into(),
            source,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_survives_queue_serialization() {
        let job = ProcessingJob::new("sig", "Whale", Cohort::Kol);
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"source\":\"kol\""));
        let back: ProcessingJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn cohorts_map_to_their_not_found_reason() {
        assert_eq!(Cohort::Whale.not_found_reason(), EraseReason::WhaleNotFound);
        assert_eq!(Cohort::Kol.not_found_reason(), EraseReason::KolNotFound);
    }
}
