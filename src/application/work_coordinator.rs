//! Work coordinator: the façade that takes a task from submission to
//! assignment.
//!
//! Analysis and decomposition talk to the oracle and run without touching
//! scheduler state. Only admission and the scheduling pass take the
//! scheduler lock.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentProfile, ComplexityAnalysis, Config, ScheduledAssignment, SchedulerConfig, SubtaskGraph, Task,
    TaskContext,
};
use crate::domain::ports::ComplexityOracle;
use crate::services::{ComplexityAnalyzer, EventBus, Scheduler, TaskDecomposer, UnregisterReport};

/// Outcome of submitting one task.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub task_id: String,
    pub analysis: ComplexityAnalysis,
    pub graph: SubtaskGraph,
    /// Assignments created for this task by the submission pass
    pub assignments: Vec<ScheduledAssignment>,
}

/// Drives analyze -> decompose -> admit -> schedule.
///
/// Components are built by the caller and shared through `Arc`, so several
/// coordinators can run side by side in one process.
pub struct WorkCoordinator {
    analyzer: ComplexityAnalyzer,
    decomposer: TaskDecomposer,
    scheduler: Arc<Scheduler>,
    rescan_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkCoordinator {
    pub fn new(analyzer: ComplexityAnalyzer, decomposer: TaskDecomposer, scheduler: Arc<Scheduler>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            analyzer,
            decomposer,
            scheduler,
            rescan_interval: Duration::from_millis(SchedulerConfig::default().rescan_interval_ms),
            shutdown_tx,
        }
    }

    /// Wire every component from configuration around one oracle and a
    /// fresh event bus.
    pub fn from_config(oracle: Arc<dyn ComplexityOracle>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());
        let analyzer = ComplexityAnalyzer::new(Arc::clone(&oracle), &config.analyzer);
        let decomposer = TaskDecomposer::new(oracle, &config.decomposer);
        Self::new(analyzer, decomposer, Arc::new(Scheduler::new(events)))
            .with_rescan_interval(Duration::from_millis(config.scheduler.rescan_interval_ms))
    }

    pub fn with_rescan_interval(mut self, rescan_interval: Duration) -> Self {
        self.rescan_interval = rescan_interval;
        self
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.scheduler.events()
    }

    pub fn rescan_interval(&self) -> Duration {
        self.rescan_interval
    }

    /// Analyze and decompose a task without admitting it.
    pub async fn plan(
        &self,
        task: &Task,
        context: Option<&TaskContext>,
    ) -> DomainResult<(ComplexityAnalysis, SubtaskGraph)> {
        let analysis = self.analyzer.analyze(task, context).await;
        let graph = self.decomposer.decompose(task, &analysis, None).await?;
        Ok((analysis, graph))
    }

    /// Analyze, decompose, admit and run a scheduling pass.
    ///
    /// Subtasks without a capable agent stay runnable; they are picked up by
    /// later passes.
    #[instrument(skip(self, task, context), fields(task_id = %task.id))]
    pub async fn submit(&self, task: Task, context: Option<&TaskContext>) -> DomainResult<Submission> {
        let (analysis, graph) = self.plan(&task, context).await?;
        self.scheduler.admit_graph(&graph).await?;

        let assignments: Vec<ScheduledAssignment> = self
            .scheduler
            .schedule_pass()
            .await
            .into_iter()
            .filter(|a| a.subtask.task_id == task.id)
            .collect();

        info!(
            score = analysis.score,
            subtasks = graph.len(),
            critical_path_hours = graph.critical_path_hours(),
            assigned = assignments.len(),
            "Task submitted"
        );

        Ok(Submission {
            task_id: task.id,
            analysis,
            graph,
            assignments,
        })
    }

    /// Register an agent and immediately offer it waiting work.
    pub async fn register_agent(&self, profile: AgentProfile) -> Vec<ScheduledAssignment> {
        self.scheduler.register_agent(profile).await;
        self.scheduler.schedule_pass().await
    }

    /// Remove an agent, move its work, then rescan.
    pub async fn unregister_agent(&self, agent_id: &str) -> DomainResult<UnregisterReport> {
        let report = self.scheduler.unregister_agent(agent_id).await?;
        self.scheduler.schedule_pass().await;
        Ok(report)
    }

    /// Spawn the periodic rescan that retries subtasks left waiting and
    /// prunes tasks whose subtasks have all completed.
    ///
    /// The task stops on [`shutdown`](Self::shutdown).
    pub fn spawn_rescan(&self) -> JoinHandle<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let period = self.rescan_interval.max(Duration::from_millis(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = period.as_millis() as u64, "Scheduler rescan started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let created = scheduler.schedule_pass().await;
                        if !created.is_empty() {
                            debug!(assigned = created.len(), "Rescan assigned waiting subtasks");
                        }
                        scheduler.prune_completed_tasks().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            info!("Scheduler rescan stopped");
        })
    }

    /// Stop background rescans.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
