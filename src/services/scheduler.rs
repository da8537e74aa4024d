//! Scheduler service.
//!
//! The single scheduling authority: tracks the subtasks of admitted graphs,
//! binds runnable subtasks to capable least-loaded agents, and moves work
//! when agents leave. Registry, scheduling entries and assignments live in
//! one state value behind one lock, so an assignment and its load increment
//! are never observable apart. Events are published while the lock is held,
//! which keeps emission order equal to processing order.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentProfile, AssignmentId, AssignmentStatus, ScheduledAssignment, Subtask, SubtaskGraph,
    SubtaskKey, SubtaskStatus,
};

use super::agent_registry::AgentRegistry;
use super::event_bus::{EventBus, SchedulingEvent};

/// Point-in-time snapshot for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Tracked assignments in any status; pruned tasks no longer count
    pub total_assignments: usize,
    /// Assignments currently assigned or running
    pub active_assignments: usize,
    /// Load of every registered agent
    pub per_agent_load: BTreeMap<String, usize>,
    /// Subtasks waiting for an agent
    pub runnable_count: usize,
}

/// Outcome of removing an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnregisterReport {
    /// Subtasks moved to another agent, with the new agent id
    pub reassigned: Vec<(SubtaskKey, String)>,
    /// Subtasks returned to runnable with no agent bound
    pub released: Vec<SubtaskKey>,
}

#[derive(Debug)]
struct SubtaskEntry {
    subtask: Subtask,
    status: SubtaskStatus,
    /// Active assignment, if bound
    assignment: Option<AssignmentId>,
    /// `task.scheduling_failed` already emitted for the current wait
    waiting: bool,
}

#[derive(Debug, Default)]
struct SchedulerState {
    registry: AgentRegistry,
    entries: HashMap<SubtaskKey, SubtaskEntry>,
    /// Admission order of entries
    order: Vec<SubtaskKey>,
    assignments: HashMap<AssignmentId, ScheduledAssignment>,
    /// Creation order of assignments
    assignment_order: Vec<AssignmentId>,
}

impl SchedulerState {
    fn key_of(subtask: &Subtask) -> SubtaskKey {
        SubtaskKey::new(subtask.task_id.clone(), subtask.id.clone())
    }

    /// Dependencies of `subtask` that have not completed.
    fn pending_dependencies(&self, subtask: &Subtask) -> Vec<String> {
        subtask
            .depends_on
            .iter()
            .filter(|dep| {
                let key = SubtaskKey::new(subtask.task_id.clone(), (*dep).clone());
                !self
                    .entries
                    .get(&key)
                    .is_some_and(|entry| entry.status == SubtaskStatus::Completed)
            })
            .cloned()
            .collect()
    }

    fn insert_entry(&mut self, subtask: Subtask) -> SubtaskStatus {
        let status = if self.pending_dependencies(&subtask).is_empty() {
            SubtaskStatus::Runnable
        } else {
            SubtaskStatus::Pending
        };
        let key = Self::key_of(&subtask);
        self.entries.insert(
            key.clone(),
            SubtaskEntry {
                subtask,
                status,
                assignment: None,
                waiting: false,
            },
        );
        self.order.push(key);
        status
    }

    fn active_load(&self, agent_id: &str) -> usize {
        self.assignments
            .values()
            .filter(|a| a.is_active() && a.agent_id == agent_id)
            .count()
    }

    /// Record an assignment and its load increment as one step.
    fn bind(&mut self, key: &SubtaskKey, agent_id: &str, events: &EventBus) -> DomainResult<ScheduledAssignment> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| DomainError::SubtaskNotFound(key.to_string()))?;
        if !self.registry.increment_load(agent_id) {
            return Err(DomainError::AgentNotFound(agent_id.to_string()));
        }

        let assignment = ScheduledAssignment::new(key.clone(), agent_id);
        entry.status = SubtaskStatus::Assigned;
        entry.assignment = Some(assignment.id);
        entry.waiting = false;

        self.assignments.insert(assignment.id, assignment.clone());
        self.assignment_order.push(assignment.id);

        info!(subtask = %key, agent_id, assignment_id = %assignment.id, "Subtask assigned");
        events.publish(SchedulingEvent::TaskAssigned {
            task_id: key.task_id.clone(),
            subtask_id: key.subtask_id.clone(),
            agent_id: agent_id.to_string(),
        });

        Ok(assignment)
    }

    /// Announce that a runnable subtask has to wait, once per waiting episode.
    fn mark_waiting(&mut self, key: &SubtaskKey, reason: String, events: &EventBus) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.waiting {
            return;
        }
        entry.waiting = true;

        warn!(subtask = %key, reason = %reason, "Subtask waiting for a capable agent");
        events.publish(SchedulingEvent::TaskSchedulingFailed {
            task_id: key.task_id.clone(),
            subtask_id: key.subtask_id.clone(),
            reason,
        });
    }

    /// Promote pending subtasks of `task_id` whose dependencies all completed.
    fn promote_unblocked(&mut self, task_id: &str) -> Vec<SubtaskKey> {
        let candidates: Vec<SubtaskKey> = self
            .order
            .iter()
            .filter(|key| key.task_id == task_id)
            .filter(|key| {
                self.entries.get(*key).is_some_and(|entry| {
                    entry.status == SubtaskStatus::Pending
                        && self.pending_dependencies(&entry.subtask).is_empty()
                })
            })
            .cloned()
            .collect();

        for key in &candidates {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.status = SubtaskStatus::Runnable;
            }
        }
        candidates
    }

    /// Runnable keys ordered by priority (highest first), then admission.
    fn runnable_keys(&self) -> Vec<SubtaskKey> {
        let mut runnable: Vec<(usize, &SubtaskKey)> = self
            .order
            .iter()
            .enumerate()
            .filter(|(_, key)| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| entry.status == SubtaskStatus::Runnable)
            })
            .collect();
        runnable.sort_by_key(|(position, key)| {
            let priority = self.entries.get(*key).map(|e| e.subtask.priority);
            (std::cmp::Reverse(priority), *position)
        });
        runnable.into_iter().map(|(_, key)| key.clone()).collect()
    }

    /// Forget tasks whose subtasks have all completed. Returns their ids in
    /// admission order.
    fn prune_completed_tasks(&mut self) -> Vec<String> {
        let mut all_completed: HashMap<&str, bool> = HashMap::new();
        let mut task_ids = Vec::new();
        for key in &self.order {
            let completed = self
                .entries
                .get(key)
                .is_some_and(|entry| entry.status == SubtaskStatus::Completed);
            match all_completed.entry(key.task_id.as_str()) {
                Entry::Vacant(slot) => {
                    task_ids.push(key.task_id.clone());
                    slot.insert(completed);
                }
                Entry::Occupied(mut slot) => *slot.get_mut() &= completed,
            }
        }
        let finished: Vec<String> = task_ids
            .into_iter()
            .filter(|task_id| all_completed.get(task_id.as_str()).copied().unwrap_or(false))
            .collect();
        if finished.is_empty() {
            return finished;
        }

        let pruned: HashSet<&str> = finished.iter().map(String::as_str).collect();
        self.order.retain(|key| !pruned.contains(key.task_id.as_str()));
        self.entries.retain(|key, _| !pruned.contains(key.task_id.as_str()));
        self.assignments
            .retain(|_, assignment| !pruned.contains(assignment.subtask.task_id.as_str()));
        let assignments = &self.assignments;
        self.assignment_order.retain(|id| assignments.contains_key(id));
        finished
    }

    fn active_assignment_mut(&mut self, id: AssignmentId) -> DomainResult<&mut ScheduledAssignment> {
        let assignment = self
            .assignments
            .get_mut(&id)
            .ok_or_else(|| DomainError::AssignmentNotFound(id.to_string()))?;
        if !assignment.is_active() {
            return Err(DomainError::InvalidStateTransition {
                from: assignment.status.to_string(),
                to: "terminal".to_string(),
                reason: format!("assignment {id} is no longer active"),
            });
        }
        Ok(assignment)
    }
}

/// Assigns subtasks to agents and keeps agent load consistent.
pub struct Scheduler {
    state: RwLock<SchedulerState>,
    events: Arc<EventBus>,
}

impl Scheduler {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            state: RwLock::new(SchedulerState::default()),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // ---- agents ----

    /// Register an agent, or replace an existing agent's capability.
    ///
    /// The load is reset to the number of active assignments this scheduler
    /// holds for the id. Returns `true` for a new registration.
    pub async fn register_agent(&self, profile: AgentProfile) -> bool {
        let mut state = self.state.write().await;
        let authoritative = state.active_load(&profile.id);
        let agent_id = profile.id.clone();
        let capability = profile.capability.to_string();
        let is_new = state.registry.register(profile, authoritative);

        info!(agent_id = %agent_id, capability = %capability, is_new, "Agent registered");
        self.events
            .publish(SchedulingEvent::AgentRegistered { agent_id });
        is_new
    }

    /// Remove an agent and move its in-flight work.
    ///
    /// The agent leaves the registry first, then each of its active
    /// assignments (in creation order) is moved to the least-loaded capable
    /// agent. Assignments with no replacement are released and their
    /// subtasks return to runnable.
    pub async fn unregister_agent(&self, agent_id: &str) -> DomainResult<UnregisterReport> {
        let mut state = self.state.write().await;
        if state.registry.unregister(agent_id).is_none() {
            return Err(DomainError::AgentNotFound(agent_id.to_string()));
        }

        info!(agent_id, "Agent unregistered");
        self.events.publish(SchedulingEvent::AgentUnregistered {
            agent_id: agent_id.to_string(),
        });

        let orphaned: Vec<AssignmentId> = state
            .assignment_order
            .iter()
            .filter(|id| {
                state
                    .assignments
                    .get(*id)
                    .is_some_and(|a| a.is_active() && a.agent_id == agent_id)
            })
            .copied()
            .collect();

        let mut report = UnregisterReport::default();
        for assignment_id in orphaned {
            let Some(key) = state.assignments.get(&assignment_id).map(|a| a.subtask.clone()) else {
                continue;
            };
            let replacement = state.entries.get(&key).and_then(|entry| {
                state
                    .registry
                    .least_loaded_capable(&entry.subtask)
                    .map(|agent| agent.profile.id.clone())
            });

            match replacement {
                Some(new_agent) => {
                    if let Some(assignment) = state.assignments.get_mut(&assignment_id) {
                        assignment.transition(AssignmentStatus::Assigned)?;
                        assignment.agent_id = new_agent.clone();
                    }
                    state.registry.increment_load(&new_agent);
                    if let Some(entry) = state.entries.get_mut(&key) {
                        entry.status = SubtaskStatus::Assigned;
                    }

                    info!(subtask = %key, from = agent_id, to = %new_agent, "Subtask reassigned");
                    self.events.publish(SchedulingEvent::TaskReassigned {
                        task_id: key.task_id.clone(),
                        subtask_id: key.subtask_id.clone(),
                        from_agent_id: agent_id.to_string(),
                        to_agent_id: new_agent.clone(),
                    });
                    report.reassigned.push((key, new_agent));
                }
                None => {
                    if let Some(assignment) = state.assignments.get_mut(&assignment_id) {
                        assignment.transition(AssignmentStatus::Released)?;
                    }
                    if let Some(entry) = state.entries.get_mut(&key) {
                        entry.status = SubtaskStatus::Runnable;
                        entry.assignment = None;
                        entry.waiting = false;
                    }
                    state.mark_waiting(
                        &key,
                        format!("agent {agent_id} unregistered and no capable replacement is available"),
                        &self.events,
                    );
                    report.released.push(key);
                }
            }
        }

        Ok(report)
    }

    pub async fn current_load(&self, agent_id: &str) -> usize {
        self.state.read().await.registry.current_load(agent_id)
    }

    /// Registered agents in registration order.
    pub async fn list_agents(&self) -> Vec<AgentProfile> {
        self.state.read().await.registry.list_available()
    }

    // ---- subtasks ----

    /// Track every subtask of a graph. Returns the keys that are runnable
    /// right away.
    pub async fn admit_graph(&self, graph: &SubtaskGraph) -> DomainResult<Vec<SubtaskKey>> {
        let mut state = self.state.write().await;
        if let Some(existing) = graph
            .subtasks()
            .iter()
            .map(SchedulerState::key_of)
            .find(|key| state.entries.contains_key(key))
        {
            return Err(DomainError::DuplicateSubtaskId(existing.to_string()));
        }

        let mut runnable = Vec::new();
        for subtask in graph.subtasks() {
            let key = SchedulerState::key_of(subtask);
            if state.insert_entry(subtask.clone()) == SubtaskStatus::Runnable {
                runnable.push(key);
            }
        }

        debug!(task_id = graph.task_id(), subtasks = graph.len(), runnable = runnable.len(), "Graph admitted");
        Ok(runnable)
    }

    /// Least-loaded capable agent for `subtask`, ties going to the earliest
    /// registered. `None` is a wait signal, not an error.
    pub async fn select_agent(&self, subtask: &Subtask) -> Option<String> {
        let state = self.state.read().await;
        state
            .registry
            .least_loaded_capable(subtask)
            .map(|agent| agent.profile.id.clone())
    }

    /// Bind a runnable subtask to an agent.
    ///
    /// Without `agent_id` the least-loaded capable agent is chosen. A
    /// subtask not yet admitted is adopted first. Fails with
    /// [`DomainError::NoCapableAgent`] when no registered agent can run it;
    /// the subtask then stays runnable for later passes.
    pub async fn assign(&self, subtask: &Subtask, agent_id: Option<&str>) -> DomainResult<ScheduledAssignment> {
        let mut state = self.state.write().await;
        let key = SchedulerState::key_of(subtask);
        if !state.entries.contains_key(&key) {
            state.insert_entry(subtask.clone());
        }

        let (status, tracked) = match state.entries.get(&key) {
            Some(entry) => (entry.status, entry.subtask.clone()),
            None => return Err(DomainError::SubtaskNotFound(key.to_string())),
        };
        match status {
            SubtaskStatus::Runnable => {}
            SubtaskStatus::Pending => {
                return Err(DomainError::DependenciesNotSatisfied {
                    subtask_id: key.subtask_id.clone(),
                    pending: state.pending_dependencies(&tracked),
                });
            }
            other => {
                return Err(DomainError::InvalidStateTransition {
                    from: other.to_string(),
                    to: SubtaskStatus::Assigned.to_string(),
                    reason: format!("subtask {key} is not runnable"),
                });
            }
        }

        let chosen = match agent_id {
            Some(id) => {
                let agent = state
                    .registry
                    .get(id)
                    .ok_or_else(|| DomainError::AgentNotFound(id.to_string()))?;
                if !agent.profile.can_run(&tracked) {
                    state.mark_waiting(&key, format!("agent {id} lacks the required capability"), &self.events);
                    return Err(DomainError::NoCapableAgent {
                        subtask_id: key.subtask_id.clone(),
                    });
                }
                id.to_string()
            }
            None => match state.registry.least_loaded_capable(&tracked) {
                Some(agent) => agent.profile.id.clone(),
                None => {
                    state.mark_waiting(&key, "no capable agent registered".to_string(), &self.events);
                    return Err(DomainError::NoCapableAgent {
                        subtask_id: key.subtask_id.clone(),
                    });
                }
            },
        };

        state.bind(&key, &chosen, &self.events)
    }

    /// Mark an assignment as running.
    pub async fn start(&self, assignment_id: AssignmentId) -> DomainResult<ScheduledAssignment> {
        let mut state = self.state.write().await;
        let assignment = state.active_assignment_mut(assignment_id)?;
        if assignment.status != AssignmentStatus::Assigned {
            return Err(DomainError::InvalidStateTransition {
                from: assignment.status.to_string(),
                to: AssignmentStatus::Running.to_string(),
                reason: "only assigned work can start".to_string(),
            });
        }
        assignment.transition(AssignmentStatus::Running)?;
        let assignment = assignment.clone();

        if let Some(entry) = state.entries.get_mut(&assignment.subtask) {
            entry.status = SubtaskStatus::Running;
        }

        self.events.publish(SchedulingEvent::TaskStarted {
            task_id: assignment.subtask.task_id.clone(),
            subtask_id: assignment.subtask.subtask_id.clone(),
            agent_id: assignment.agent_id.clone(),
        });
        Ok(assignment)
    }

    /// Complete an assignment and release its load.
    ///
    /// Returns the subtasks of the same task that became runnable.
    pub async fn complete(
        &self,
        assignment_id: AssignmentId,
        result: serde_json::Value,
    ) -> DomainResult<Vec<SubtaskKey>> {
        let mut state = self.state.write().await;
        let assignment = state.active_assignment_mut(assignment_id)?;
        assignment.transition(AssignmentStatus::Completed)?;
        assignment.result = Some(result);
        let key = assignment.subtask.clone();
        let agent_id = assignment.agent_id.clone();

        state.registry.decrement_load(&agent_id);
        if let Some(entry) = state.entries.get_mut(&key) {
            entry.status = SubtaskStatus::Completed;
            entry.assignment = None;
        }

        info!(subtask = %key, agent_id = %agent_id, "Subtask completed");
        self.events.publish(SchedulingEvent::TaskCompleted {
            task_id: key.task_id.clone(),
            subtask_id: key.subtask_id.clone(),
            agent_id,
        });

        Ok(state.promote_unblocked(&key.task_id))
    }

    /// Fail an assignment. Dependents stay pending until the subtask is
    /// retried.
    pub async fn fail(&self, assignment_id: AssignmentId, error: impl Into<String>) -> DomainResult<()> {
        let error = error.into();
        let mut state = self.state.write().await;
        let assignment = state.active_assignment_mut(assignment_id)?;
        assignment.transition(AssignmentStatus::Failed)?;
        assignment.error = Some(error.clone());
        let key = assignment.subtask.clone();
        let agent_id = assignment.agent_id.clone();

        state.registry.decrement_load(&agent_id);
        if let Some(entry) = state.entries.get_mut(&key) {
            entry.status = SubtaskStatus::Failed;
            entry.assignment = None;
        }

        warn!(subtask = %key, agent_id = %agent_id, error = %error, "Subtask failed");
        self.events.publish(SchedulingEvent::TaskFailed {
            task_id: key.task_id.clone(),
            subtask_id: key.subtask_id.clone(),
            agent_id,
            error,
        });
        Ok(())
    }

    /// Make a failed subtask runnable again.
    pub async fn retry(&self, task_id: &str, subtask_id: &str) -> DomainResult<()> {
        let key = SubtaskKey::new(task_id, subtask_id);
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&key)
            .ok_or_else(|| DomainError::SubtaskNotFound(key.to_string()))?;
        if entry.status != SubtaskStatus::Failed {
            return Err(DomainError::InvalidStateTransition {
                from: entry.status.to_string(),
                to: SubtaskStatus::Runnable.to_string(),
                reason: "only failed subtasks can be retried".to_string(),
            });
        }
        entry.status = SubtaskStatus::Runnable;
        entry.waiting = false;
        info!(subtask = %key, "Subtask queued for retry");
        Ok(())
    }

    /// Assign every runnable subtask that has a capable agent, highest
    /// priority first, then in admission order. Subtasks left waiting emit
    /// `task.scheduling_failed` once per waiting episode.
    pub async fn schedule_pass(&self) -> Vec<ScheduledAssignment> {
        let mut state = self.state.write().await;
        let mut created = Vec::new();

        for key in state.runnable_keys() {
            let chosen = state.entries.get(&key).and_then(|entry| {
                state
                    .registry
                    .least_loaded_capable(&entry.subtask)
                    .map(|agent| agent.profile.id.clone())
            });
            match chosen {
                Some(agent_id) => match state.bind(&key, &agent_id, &self.events) {
                    Ok(assignment) => created.push(assignment),
                    Err(err) => warn!(subtask = %key, error = %err, "Failed to bind subtask"),
                },
                None => state.mark_waiting(&key, "no capable agent registered".to_string(), &self.events),
            }
        }

        if !created.is_empty() {
            debug!(assigned = created.len(), "Scheduling pass complete");
        }
        created
    }

    // ---- observation ----

    /// Snapshot for observers. Takes the read lock only.
    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.read().await;
        SchedulerStatus {
            total_assignments: state.assignments.len(),
            active_assignments: state.assignments.values().filter(|a| a.is_active()).count(),
            per_agent_load: state
                .registry
                .iter()
                .map(|agent| (agent.profile.id.clone(), agent.load))
                .collect(),
            runnable_count: state
                .entries
                .values()
                .filter(|entry| entry.status == SubtaskStatus::Runnable)
                .count(),
        }
    }

    pub async fn assignment(&self, id: AssignmentId) -> Option<ScheduledAssignment> {
        self.state.read().await.assignments.get(&id).cloned()
    }

    /// Assignments in creation order.
    pub async fn assignments(&self) -> Vec<ScheduledAssignment> {
        let state = self.state.read().await;
        state
            .assignment_order
            .iter()
            .filter_map(|id| state.assignments.get(id).cloned())
            .collect()
    }

    /// Active assignment bound to a subtask, if any.
    pub async fn active_assignment_for(&self, task_id: &str, subtask_id: &str) -> Option<ScheduledAssignment> {
        let state = self.state.read().await;
        let entry = state.entries.get(&SubtaskKey::new(task_id, subtask_id))?;
        entry.assignment.and_then(|id| state.assignments.get(&id).cloned())
    }

    pub async fn subtask_status(&self, task_id: &str, subtask_id: &str) -> Option<SubtaskStatus> {
        let state = self.state.read().await;
        state
            .entries
            .get(&SubtaskKey::new(task_id, subtask_id))
            .map(|entry| entry.status)
    }

    /// Drop the entries and assignments of tasks whose subtasks have all
    /// completed, so long-running schedulers do not grow without bound.
    /// A pruned task id can be admitted again.
    pub async fn prune_completed_tasks(&self) -> Vec<String> {
        let mut state = self.state.write().await;
        let pruned = state.prune_completed_tasks();
        if !pruned.is_empty() {
            info!(tasks = ?pruned, "Pruned completed tasks");
        }
        pruned
    }

    /// Recompute every agent's load from the assignments and compare it
    /// with the registry counters.
    pub async fn verify_load_invariant(&self) -> DomainResult<()> {
        let state = self.state.read().await;

        for agent in state.registry.iter() {
            let actual = state.active_load(&agent.profile.id);
            if actual != agent.load {
                return Err(DomainError::LoadInvariantViolated {
                    agent_id: agent.profile.id.clone(),
                    recorded: agent.load,
                    actual,
                });
            }
        }

        if let Some(orphan) = state
            .assignments
            .values()
            .find(|a| a.is_active() && !state.registry.contains(&a.agent_id))
        {
            return Err(DomainError::LoadInvariantViolated {
                agent_id: orphan.agent_id.clone(),
                recorded: 0,
                actual: state.active_load(&orphan.agent_id),
            });
        }

        debug!(agents = state.registry.len(), "Load invariant holds");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GraphSource, SubtaskKind, SubtaskPriority};
    use crate::services::dependency_resolver::DependencyResolver;
    use crate::services::event_bus::{EventName, EventSubscription};

    fn scheduler() -> (Scheduler, EventSubscription) {
        let bus = Arc::new(EventBus::new());
        let rx = bus.subscribe_all();
        (Scheduler::new(bus), rx)
    }

    fn implementation(id: &str) -> Subtask {
        Subtask::new(id, "t1", id).with_kind(SubtaskKind::Implementation)
    }

    fn names(rx: &mut EventSubscription) -> Vec<EventName> {
        rx.drain().into_iter().map(|e| e.name()).collect()
    }

    #[tokio::test]
    async fn test_assign_with_no_agents() {
        let (scheduler, mut rx) = scheduler();
        let result = scheduler.assign(&implementation("s1"), None).await;

        assert!(matches!(result, Err(DomainError::NoCapableAgent { .. })));
        assert_eq!(names(&mut rx), vec![EventName::TaskSchedulingFailed]);
        assert_eq!(scheduler.status().await.runnable_count, 1);
    }

    #[tokio::test]
    async fn test_assign_picks_least_loaded() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::with_tags("a", ["implementation"])).await;
        scheduler.register_agent(AgentProfile::with_tags("b", ["implementation"])).await;
        scheduler.assign(&implementation("s1"), Some("b")).await.unwrap();
        scheduler.assign(&implementation("s2"), Some("b")).await.unwrap();

        let assignment = scheduler.assign(&implementation("s3"), None).await.unwrap();
        assert_eq!(assignment.agent_id, "a");
        assert_eq!(scheduler.current_load("a").await, 1);
        assert_eq!(scheduler.current_load("b").await, 2);
        scheduler.verify_load_invariant().await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_agent_must_exist_and_be_capable() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::with_tags("tester", ["testing"])).await;

        let result = scheduler.assign(&implementation("s1"), Some("ghost")).await;
        assert!(matches!(result, Err(DomainError::AgentNotFound(_))));

        let result = scheduler.assign(&implementation("s1"), Some("tester")).await;
        assert!(matches!(result, Err(DomainError::NoCapableAgent { .. })));
        assert_eq!(scheduler.current_load("tester").await, 0);
    }

    #[tokio::test]
    async fn test_double_assign_rejected() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;
        scheduler.assign(&implementation("s1"), None).await.unwrap();

        let result = scheduler.assign(&implementation("s1"), None).await;
        assert!(matches!(result, Err(DomainError::InvalidStateTransition { .. })));
        assert_eq!(scheduler.current_load("a").await, 1);
    }

    #[tokio::test]
    async fn test_lifecycle_unblocks_dependents() {
        let (scheduler, mut rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;

        let graph = DependencyResolver::new()
            .build_graph(
                "t1",
                vec![
                    implementation("setup"),
                    implementation("build").with_dependencies(["setup"]),
                ],
                GraphSource::Oracle,
            )
            .unwrap();
        let runnable = scheduler.admit_graph(&graph).await.unwrap();
        assert_eq!(runnable, vec![SubtaskKey::new("t1", "setup")]);

        let blocked = scheduler.assign(graph.get("build").unwrap(), None).await;
        assert!(matches!(
            blocked,
            Err(DomainError::DependenciesNotSatisfied { ref pending, .. }) if pending == &vec!["setup".to_string()]
        ));

        let created = scheduler.schedule_pass().await;
        assert_eq!(created.len(), 1);
        let setup = created[0].id;

        scheduler.start(setup).await.unwrap();
        assert_eq!(scheduler.subtask_status("t1", "setup").await, Some(SubtaskStatus::Running));

        let unblocked = scheduler.complete(setup, serde_json::json!({"ok": true})).await.unwrap();
        assert_eq!(unblocked, vec![SubtaskKey::new("t1", "build")]);
        assert_eq!(scheduler.current_load("a").await, 0);

        let done = scheduler.assignment(setup).await.unwrap();
        assert_eq!(done.status, AssignmentStatus::Completed);
        assert_eq!(done.result, Some(serde_json::json!({"ok": true})));

        assert_eq!(
            names(&mut rx),
            vec![
                EventName::AgentRegistered,
                EventName::TaskAssigned,
                EventName::TaskStarted,
                EventName::TaskCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_twice_rejected() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;
        let assignment = scheduler.assign(&implementation("s1"), None).await.unwrap();

        scheduler.complete(assignment.id, serde_json::Value::Null).await.unwrap();
        let again = scheduler.complete(assignment.id, serde_json::Value::Null).await;
        assert!(matches!(again, Err(DomainError::InvalidStateTransition { .. })));
        assert_eq!(scheduler.current_load("a").await, 0);

        let missing = scheduler.complete(AssignmentId::new(), serde_json::Value::Null).await;
        assert!(matches!(missing, Err(DomainError::AssignmentNotFound(_))));
    }

    #[tokio::test]
    async fn test_failure_blocks_until_retry() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;
        let graph = DependencyResolver::new()
            .build_graph(
                "t1",
                vec![implementation("first"), implementation("second").with_dependencies(["first"])],
                GraphSource::Oracle,
            )
            .unwrap();
        scheduler.admit_graph(&graph).await.unwrap();

        let first = scheduler.schedule_pass().await.remove(0);
        scheduler.fail(first.id, "compiler crashed").await.unwrap();
        assert_eq!(scheduler.current_load("a").await, 0);
        assert_eq!(scheduler.subtask_status("t1", "second").await, Some(SubtaskStatus::Pending));
        assert!(scheduler.schedule_pass().await.is_empty());

        scheduler.retry("t1", "first").await.unwrap();
        let retried = scheduler.schedule_pass().await;
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].subtask, SubtaskKey::new("t1", "first"));

        let not_failed = scheduler.retry("t1", "second").await;
        assert!(matches!(not_failed, Err(DomainError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_unregister_reassigns_in_creation_order() {
        let (scheduler, mut rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("x")).await;
        let first = scheduler.assign(&implementation("s1"), None).await.unwrap();
        let second = scheduler.assign(&implementation("s2"), None).await.unwrap();
        scheduler.start(first.id).await.unwrap();
        scheduler.register_agent(AgentProfile::with_tags("y", ["implementation"])).await;
        rx.drain();

        let report = scheduler.unregister_agent("x").await.unwrap();
        assert_eq!(
            report.reassigned,
            vec![
                (SubtaskKey::new("t1", "s1"), "y".to_string()),
                (SubtaskKey::new("t1", "s2"), "y".to_string()),
            ]
        );
        assert!(report.released.is_empty());
        assert_eq!(scheduler.current_load("y").await, 2);
        assert_eq!(scheduler.assignment(second.id).await.unwrap().agent_id, "y");
        assert_eq!(
            scheduler.assignment(first.id).await.unwrap().status,
            AssignmentStatus::Assigned
        );
        assert_eq!(
            names(&mut rx),
            vec![
                EventName::AgentUnregistered,
                EventName::TaskReassigned,
                EventName::TaskReassigned,
            ]
        );
        scheduler.verify_load_invariant().await.unwrap();
    }

    #[tokio::test]
    async fn test_unregister_without_replacement_releases() {
        let (scheduler, mut rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("x")).await;
        scheduler.register_agent(AgentProfile::with_tags("docs", ["documentation"])).await;
        let assignment = scheduler.assign(&implementation("s1"), Some("x")).await.unwrap();
        rx.drain();

        let report = scheduler.unregister_agent("x").await.unwrap();
        assert_eq!(report.released, vec![SubtaskKey::new("t1", "s1")]);
        assert_eq!(
            scheduler.assignment(assignment.id).await.unwrap().status,
            AssignmentStatus::Released
        );
        assert_eq!(scheduler.subtask_status("t1", "s1").await, Some(SubtaskStatus::Runnable));
        assert_eq!(
            names(&mut rx),
            vec![EventName::AgentUnregistered, EventName::TaskSchedulingFailed]
        );

        // A later registration lets the next pass pick it up
        scheduler.register_agent(AgentProfile::with_tags("z", ["implementation"])).await;
        let created = scheduler.schedule_pass().await;
        assert_eq!(created[0].agent_id, "z");
        scheduler.verify_load_invariant().await.unwrap();
    }

    #[tokio::test]
    async fn test_unregister_unknown_agent() {
        let (scheduler, _rx) = scheduler();
        let result = scheduler.unregister_agent("ghost").await;
        assert!(matches!(result, Err(DomainError::AgentNotFound(_))));
    }

    #[tokio::test]
    async fn test_reregister_keeps_load() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;
        scheduler.assign(&implementation("s1"), None).await.unwrap();

        assert!(!scheduler.register_agent(AgentProfile::any("a")).await);
        assert_eq!(scheduler.current_load("a").await, 1);
        scheduler.verify_load_invariant().await.unwrap();
    }

    #[tokio::test]
    async fn test_schedule_pass_orders_by_priority_and_waits_once() {
        let (scheduler, mut rx) = scheduler();
        let graph = DependencyResolver::new()
            .build_graph(
                "t1",
                vec![
                    implementation("low").with_priority(SubtaskPriority::Low),
                    implementation("critical").with_priority(SubtaskPriority::Critical),
                    implementation("medium"),
                ],
                GraphSource::Oracle,
            )
            .unwrap();
        scheduler.admit_graph(&graph).await.unwrap();

        assert!(scheduler.schedule_pass().await.is_empty());
        assert!(scheduler.schedule_pass().await.is_empty());
        let waiting = names(&mut rx);
        assert_eq!(waiting.len(), 3);
        assert!(waiting.iter().all(|n| *n == EventName::TaskSchedulingFailed));

        scheduler.register_agent(AgentProfile::any("a")).await;
        let order: Vec<String> = scheduler
            .schedule_pass()
            .await
            .into_iter()
            .map(|a| a.subtask.subtask_id)
            .collect();
        assert_eq!(order, vec!["critical", "medium", "low"]);
    }

    #[tokio::test]
    async fn test_admit_graph_twice_rejected() {
        let (scheduler, _rx) = scheduler();
        let graph = DependencyResolver::new()
            .build_graph("t1", vec![implementation("a")], GraphSource::Atomic)
            .unwrap();
        scheduler.admit_graph(&graph).await.unwrap();
        assert!(matches!(
            scheduler.admit_graph(&graph).await,
            Err(DomainError::DuplicateSubtaskId(_))
        ));
    }

    #[tokio::test]
    async fn test_same_subtask_id_in_different_tasks() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;

        let one = Subtask::new("setup", "t1", "Setup");
        let two = Subtask::new("setup", "t2", "Setup");
        scheduler.assign(&one, None).await.unwrap();
        scheduler.assign(&two, None).await.unwrap();
        assert_eq!(scheduler.current_load("a").await, 2);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;
        scheduler.register_agent(AgentProfile::with_tags("b", ["testing"])).await;
        let assignment = scheduler.assign(&implementation("s1"), None).await.unwrap();
        scheduler.complete(assignment.id, serde_json::Value::Null).await.unwrap();
        scheduler.assign(&implementation("s2"), None).await.unwrap();
        let _ = scheduler
            .assign(&Subtask::new("s3", "t1", "Docs").with_kind(SubtaskKind::Documentation), Some("b"))
            .await;

        let status = scheduler.status().await;
        assert_eq!(status.total_assignments, 2);
        assert_eq!(status.active_assignments, 1);
        assert_eq!(status.per_agent_load.get("a"), Some(&1));
        assert_eq!(status.per_agent_load.get("b"), Some(&0));
        assert_eq!(status.runnable_count, 1);
    }

    #[tokio::test]
    async fn test_select_agent_prefers_lowest_load_then_registration() {
        let (scheduler, mut rx) = scheduler();
        assert_eq!(scheduler.select_agent(&implementation("s1")).await, None);

        scheduler.register_agent(AgentProfile::with_tags("writer", ["documentation"])).await;
        assert_eq!(scheduler.select_agent(&implementation("s1")).await, None);

        scheduler.register_agent(AgentProfile::with_tags("a", ["implementation"])).await;
        scheduler.register_agent(AgentProfile::with_tags("b", ["implementation"])).await;
        assert_eq!(scheduler.select_agent(&implementation("s1")).await.as_deref(), Some("a"));

        scheduler.assign(&implementation("s1"), Some("a")).await.unwrap();
        assert_eq!(scheduler.select_agent(&implementation("s2")).await.as_deref(), Some("b"));

        scheduler.assign(&implementation("s2"), Some("b")).await.unwrap();
        assert_eq!(scheduler.select_agent(&implementation("s3")).await.as_deref(), Some("a"));

        // Selection alone binds nothing and emits nothing
        assert_eq!(scheduler.current_load("a").await, 1);
        assert_eq!(scheduler.subtask_status("t1", "s3").await, None);
        assert!(!names(&mut rx).contains(&EventName::TaskSchedulingFailed));
    }

    #[tokio::test]
    async fn test_prune_forgets_only_finished_tasks() {
        let (scheduler, _rx) = scheduler();
        scheduler.register_agent(AgentProfile::any("a")).await;

        let graph = DependencyResolver::new()
            .build_graph(
                "t1",
                vec![implementation("setup"), implementation("build").with_dependencies(["setup"])],
                GraphSource::Oracle,
            )
            .unwrap();
        scheduler.admit_graph(&graph).await.unwrap();
        let open = scheduler.assign(&Subtask::new("s1", "t2", "Open"), None).await.unwrap();

        let setup = scheduler.schedule_pass().await[0].id;
        scheduler.fail(setup, "flaky").await.unwrap();
        scheduler.retry("t1", "setup").await.unwrap();
        let setup = scheduler.schedule_pass().await[0].id;
        scheduler.complete(setup, serde_json::Value::Null).await.unwrap();
        assert!(scheduler.prune_completed_tasks().await.is_empty());

        let build = scheduler.schedule_pass().await[0].id;
        scheduler.complete(build, serde_json::Value::Null).await.unwrap();
        assert_eq!(scheduler.prune_completed_tasks().await, vec!["t1".to_string()]);

        assert_eq!(scheduler.subtask_status("t1", "setup").await, None);
        assert!(scheduler.assignment(build).await.is_none());
        assert_eq!(scheduler.subtask_status("t2", "s1").await, Some(SubtaskStatus::Assigned));
        let status = scheduler.status().await;
        assert_eq!(status.total_assignments, 1);
        assert_eq!(status.active_assignments, 1);
        assert_eq!(scheduler.assignment(open.id).await.map(|a| a.agent_id), Some("a".to_string()));
        scheduler.verify_load_invariant().await.unwrap();

        // A pruned task id can be admitted again
        assert_eq!(scheduler.admit_graph(&graph).await.unwrap().len(), 1);
    }
}
