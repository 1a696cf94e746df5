use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Sent,
    Failed(String),
}

impl OutcomeStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, OutcomeStatus::Sent)
    }
}

// Wire format is "sent" or "failed - <reason>".
impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Sent => f.write_str("sent"),
            OutcomeStatus::Failed(reason) => write!(f, "failed - {}", reason),
        }
    }
}

impl Serialize for OutcomeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Terminal result for one recipient. `index` is the record's position in the
/// submitted recipient list and identifies it even when `email` is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub index: usize,
    pub email: String,
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    #[serde(rename = "results")]
    pub outcomes: Vec<OutcomeRecord>,
}

impl BatchReport {
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }
}
