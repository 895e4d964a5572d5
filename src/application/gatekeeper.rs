//! Percentage feature gates.

use std::sync::Arc;

use tracing::info;

use crate::application::repos::{GateRepo, RepoError};
use crate::domain::entities::GateRecord;

pub const FULL_PERCENT: u8 = 100;

/// Named gates opened to a percentage of users.
///
/// Every check reads the repository, so changes apply to the next call.
/// Unknown gates are closed.
#[derive(Clone)]
pub struct GateKeeper {
    repo: Arc<dyn GateRepo>,
}

impl GateKeeper {
    pub fn new(repo: Arc<dyn GateRepo>) -> Self {
        Self { repo }
    }

    pub async fn percent(&self, name: &str) -> Result<u8, RepoError> {
        Ok(self
            .repo
            .find_gate(name)
            .await?
            .map(|gate| gate.percent.min(FULL_PERCENT))
            .unwrap_or(0))
    }

    /// Whether the gate is open for everyone.
    pub async fn is_switch_on(&self, name: &str) -> Result<bool, RepoError> {
        Ok(self.percent(name).await? >= FULL_PERCENT)
    }

    /// Whether `user_id` falls inside the gate's percentage bucket.
    pub async fn in_gate(&self, name: &str, user_id: i64) -> Result<bool, RepoError> {
        let percent = self.percent(name).await?;
        Ok(user_id.rem_euclid(100) < i64::from(percent))
    }

    pub async fn set_percent(&self, name: &str, percent: u8) -> Result<(), RepoError> {
        let mut gate = self
            .repo
            .find_gate(name)
            .await?
            .unwrap_or_else(|| GateRecord::closed(name));
        gate.percent = percent.min(FULL_PERCENT);
        self.repo.upsert_gate(&gate).await?;
        info!(
            target = "feedline::application::gatekeeper",
            gate = name,
            percent = gate.percent,
            "gate updated"
        );
        Ok(())
    }

    pub async fn turn_on(&self, name: &str) -> Result<(), RepoError> {
        self.set_percent(name, FULL_PERCENT).await
    }

    pub async fn turn_off(&self, name: &str) -> Result<(), RepoError> {
        self.set_percent(name, 0).await
    }

    /// Create gates that do not exist yet; existing gates keep their percent.
    pub async fn seed(&self, seeds: &[(String, u8)]) -> Result<(), RepoError> {
        for (name, percent) in seeds {
            if self.repo.find_gate(name).await?.is_none() {
                self.set_percent(name, *percent).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryRepositories;

    fn gates() -> GateKeeper {
        GateKeeper::new(Arc::new(MemoryRepositories::new()))
    }

    #[tokio::test]
    async fn unknown_gates_are_closed() {
        let gates = gates();
        assert!(!gates.is_switch_on("missing").await.unwrap());
        assert!(!gates.in_gate("missing", 0).await.unwrap());
    }

    #[tokio::test]
    async fn partial_gate_buckets_by_user_id() {
        let gates = gates();
        gates.set_percent("beta", 30).await.unwrap();

        assert!(!gates.is_switch_on("beta").await.unwrap());
        assert!(gates.in_gate("beta", 129).await.unwrap());
        assert!(!gates.in_gate("beta", 130).await.unwrap());
    }

    #[tokio::test]
    async fn flips_take_effect_immediately() {
        let gates = gates();
        gates.turn_on("switch").await.unwrap();
        assert!(gates.is_switch_on("switch").await.unwrap());
        gates.turn_off("switch").await.unwrap();
        assert!(!gates.is_switch_on("switch").await.unwrap());
    }

    #[tokio::test]
    async fn seeding_keeps_existing_percentages() {
        let gates = gates();
        gates.set_percent("a", 40).await.unwrap();
        gates
            .seed(&[("a".to_string(), 100), ("b".to_string(), 100)])
            .await
            .unwrap();

        assert_eq!(gates.percent("a").await.unwrap(), 40);
        assert!(gates.is_switch_on("b").await.unwrap());
    }
}
