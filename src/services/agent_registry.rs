//! Registry of live agents, their capabilities and load.
//!
//! The registry is a plain value owned by the scheduler state, so registry
//! changes and assignment bookkeeping always happen in the same critical
//! section. Agents are kept in registration order, which is the tie-break
//! order for agent selection.

use crate::domain::models::{AgentProfile, Subtask};

/// A registered agent and its load counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAgent {
    pub profile: AgentProfile,
    /// Number of assigned or running assignments bound to this agent
    pub load: usize,
}

#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, or replace the capability of an already
    /// registered one.
    ///
    /// `authoritative_load` is the number of active assignments the
    /// scheduler holds for this id. A re-registered agent keeps its
    /// registration position. Returns `true` for a new registration.
    pub fn register(&mut self, profile: AgentProfile, authoritative_load: usize) -> bool {
        if let Some(existing) = self.agents.iter_mut().find(|a| a.profile.id == profile.id) {
            existing.profile = profile;
            existing.load = authoritative_load;
            return false;
        }
        self.agents.push(RegisteredAgent {
            profile,
            load: authoritative_load,
        });
        true
    }

    /// Remove an agent from eligibility. In-flight work is left to the
    /// scheduler.
    pub fn unregister(&mut self, agent_id: &str) -> Option<RegisteredAgent> {
        let idx = self.agents.iter().position(|a| a.profile.id == agent_id)?;
        Some(self.agents.remove(idx))
    }

    /// Current load; 0 for unknown agents.
    pub fn current_load(&self, agent_id: &str) -> usize {
        self.get(agent_id).map_or(0, |a| a.load)
    }

    pub fn get(&self, agent_id: &str) -> Option<&RegisteredAgent> {
        self.agents.iter().find(|a| a.profile.id == agent_id)
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.get(agent_id).is_some()
    }

    /// Registered profiles in registration order.
    pub fn list_available(&self) -> Vec<AgentProfile> {
        self.agents.iter().map(|a| a.profile.clone()).collect()
    }

    /// Registered agents in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAgent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Least-loaded agent able to run `subtask`, ties going to the earliest
    /// registered. `None` means the subtask has to wait.
    pub fn least_loaded_capable(&self, subtask: &Subtask) -> Option<&RegisteredAgent> {
        self.agents
            .iter()
            .filter(|a| a.profile.can_run(subtask))
            .min_by_key(|a| a.load)
    }

    pub(crate) fn increment_load(&mut self, agent_id: &str) -> bool {
        match self.agents.iter_mut().find(|a| a.profile.id == agent_id) {
            Some(agent) => {
                agent.load += 1;
                true
            }
            None => false,
        }
    }

    /// Decrement load, floored at zero.
    pub(crate) fn decrement_load(&mut self, agent_id: &str) {
        if let Some(agent) = self.agents.iter_mut().find(|a| a.profile.id == agent_id) {
            agent.load = agent.load.saturating_sub(1);
        }
    }
}
