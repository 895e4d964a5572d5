use tracing::debug;

use crate::application::gatekeeper::GateKeeper;
use crate::application::repos::RepoError;
use crate::config::GateSettings;
use crate::domain::types::{Backend, EntityFamily};

/// Picks the backend serving an entity family from its gate.
///
/// The gate is read on every call. Callers that span several writes must
/// select once and carry the result.
#[derive(Clone)]
pub struct StoreSelector {
    gates: GateKeeper,
    newsfeed_gate: String,
    friendship_gate: String,
}

impl StoreSelector {
    pub fn new(gates: GateKeeper, settings: &GateSettings) -> Self {
        Self {
            gates,
            newsfeed_gate: settings.newsfeed_gate.clone(),
            friendship_gate: settings.friendship_gate.clone(),
        }
    }

    pub fn gate_name(&self, family: EntityFamily) -> &str {
        match family {
            EntityFamily::NewsFeed => &self.newsfeed_gate,
            EntityFamily::Friendship => &self.friendship_gate,
        }
    }

    pub async fn select(&self, family: EntityFamily) -> Result<Backend, RepoError> {
        let gate = self.gate_name(family);
        let backend = if self.gates.is_switch_on(gate).await? {
            Backend::WideColumn
        } else {
            Backend::Relational
        };
        debug!(
            target = "feedline::application::selector",
            family = family.as_str(),
            gate,
            backend = backend.as_str(),
            "backend selected"
        );
        Ok(backend)
    }

    pub fn gates(&self) -> &GateKeeper {
        &self.gates
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::infra::memory::MemoryRepositories;

    fn settings() -> GateSettings {
        GateSettings {
            newsfeed_gate: "switch_newsfeed_to_hbase".into(),
            friendship_gate: "switch_friendship_to_hbase".into(),
            seeds: Vec::new(),
        }
    }

    #[tokio::test]
    async fn families_follow_their_own_gate() {
        let gates = GateKeeper::new(Arc::new(MemoryRepositories::new()));
        let selector = StoreSelector::new(gates.clone(), &settings());

        assert_eq!(
            selector.select(EntityFamily::NewsFeed).await.unwrap(),
            Backend::Relational
        );

        gates.turn_on("switch_newsfeed_to_hbase").await.unwrap();
        assert_eq!(
            selector.select(EntityFamily::NewsFeed).await.unwrap(),
            Backend::WideColumn
        );
        assert_eq!(
            selector.select(EntityFamily::Friendship).await.unwrap(),
            Backend::Relational
        );
    }

    #[tokio::test]
    async fn partially_open_gate_keeps_relational() {
        let gates = GateKeeper::new(Arc::new(MemoryRepositories::new()));
        gates.set_percent("switch_newsfeed_to_hbase", 99).await.unwrap();
        let selector = StoreSelector::new(gates, &settings());

        assert_eq!(
            selector.select(EntityFamily::NewsFeed).await.unwrap(),
            Backend::Relational
        );
    }
}
