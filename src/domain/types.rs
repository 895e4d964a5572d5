//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Persistence backend serving an entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Relational,
    WideColumn,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Relational => "relational",
            Backend::WideColumn => "wide_column",
        }
    }
}

impl TryFrom<&str> for Backend {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "relational" => Ok(Backend::Relational),
            "wide_column" => Ok(Backend::WideColumn),
            _ => Err(()),
        }
    }
}

/// Entity families whose backend is chosen at runtime by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityFamily {
    NewsFeed,
    Friendship,
}

impl EntityFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityFamily::NewsFeed => "newsfeed",
            EntityFamily::Friendship => "friendship",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FanoutMain,
    FanoutBatch,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::FanoutMain => "fanout_main",
            JobType::FanoutBatch => "fanout_batch",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "fanout_main" => Ok(JobType::FanoutMain),
            "fanout_batch" => Ok(JobType::FanoutBatch),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_round_trip() {
        for backend in [Backend::Relational, Backend::WideColumn] {
            assert_eq!(Backend::try_from(backend.as_str()), Ok(backend));
        }
        assert!(Backend::try_from("hbase").is_err());
    }

    #[test]
    fn job_type_names_are_queue_names() {
        assert_eq!(JobType::FanoutMain.as_str(), "fanout_main");
        assert_eq!(JobType::try_from("fanout_batch"), Ok(JobType::FanoutBatch));
    }
}
