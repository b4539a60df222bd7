use std::collections::HashMap;
use std::sync::Arc;

use forge_core::{ForgeError, TaskKind};

use crate::agent::Agent;

/// Write-once `TaskKind -> Arc<dyn Agent>` map. Construction fails if any
/// task kind lacks a registered agent — the registry is validated once, at
/// startup, rather than discovering a missing worker mid-job.
pub struct AgentRegistry {
    agents: HashMap<TaskKind, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Builds a registry from `agents`, failing if any [`TaskKind`] has no
    /// corresponding entry (by `Agent::kind`) or if two agents claim the
    /// same kind.
    pub fn build(agents: Vec<Arc<dyn Agent>>) -> Result<Self, ForgeError> {
        let mut map = HashMap::with_capacity(agents.len());
        for agent in agents {
            let kind = agent.kind();
            if map.insert(kind, agent).is_some() {
                return Err(ForgeError::Internal(format!(
                    "duplicate agent registration for task kind {kind}"
                )));
            }
        }
        for kind in TaskKind::ALL {
            if !map.contains_key(&kind) {
                return Err(ForgeError::Internal(format!(
                    "no agent registered for task kind {kind}"
                )));
            }
        }
        Ok(Self { agents: map })
    }

    /// Looks up the agent for `kind`. Panics if `kind` is somehow absent —
    /// `build` guarantees every `TaskKind` is present, so this can only fail
    /// if that invariant was violated.
    pub fn get(&self, kind: TaskKind) -> Arc<dyn Agent> {
        self.agents
            .get(&kind)
            .unwrap_or_else(|| unreachable!("AgentRegistry::build guarantees every kind is present"))
            .clone()
    }

    /// Number of registered agents. Always `TaskKind::ALL.len()` once built.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Never true for a registry built by [`AgentRegistry::build`].
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Every registered task kind, in `TaskKind::ALL` order.
    pub fn kinds(&self) -> Vec<TaskKind> {
        TaskKind::ALL.into_iter().filter(|k| self.agents.contains_key(k)).collect()
    }
}
