//! Property tests for analysis bounds, graph invariants and agent load.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;

use taskforge::domain::models::GraphSource;
use taskforge::{
    AgentProfile, AssignmentId, ComplexityAnalyzer, DependencyResolver, EventBus, Scheduler, Subtask, SubtaskKind,
    Task,
};

/// Random DAG: each node may only depend on earlier nodes.
fn dag_strategy() -> impl Strategy<Value = Vec<Subtask>> {
    (1usize..25).prop_flat_map(|size| {
        (
            prop::collection::vec(0.5f64..40.0, size),
            prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), size),
        )
            .prop_map(move |(hours, deps)| {
                (0..size)
                    .map(|i| {
                        let depends_on: Vec<String> = if i == 0 {
                            Vec::new()
                        } else {
                            deps[i].iter().map(|idx| format!("s{}", idx.index(i))).collect()
                        };
                        Subtask::new(format!("s{i}"), "t1", format!("Subtask {i}"))
                            .with_hours(hours[i])
                            .with_dependencies(depends_on)
                    })
                    .collect()
            })
    })
}

proptest! {
    /// Property: the heuristic estimate is always within bounds
    #[test]
    fn prop_heuristic_within_bounds(description in "[a-zA-Z ]{0,400}") {
        let analysis = ComplexityAnalyzer::heuristic(&Task::new("t1", "Task", description));
        prop_assert!(analysis.is_within_bounds());
        prop_assert!(analysis.is_heuristic());
    }

    /// Property: any parsed oracle reply is clamped into bounds
    #[test]
    fn prop_parsed_reply_within_bounds(
        score in -1.0e6f64..1.0e6,
        hours in -1.0e6f64..1.0e6,
        count in -1000i64..1000,
    ) {
        let reply = format!(
            r#"{{"score": {score}, "estimated_hours": {hours}, "recommended_subtask_count": {count}}}"#
        );
        let analysis = ComplexityAnalyzer::parse_reply("t1", &reply)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(analysis.is_within_bounds());
    }

    /// Property: every valid DAG yields consistent critical-path figures
    #[test]
    fn prop_graph_hours_consistent(subtasks in dag_strategy()) {
        let expected_total: f64 = subtasks.iter().map(|s| s.estimated_hours).sum();
        let max_single = subtasks.iter().map(|s| s.estimated_hours).fold(0.0, f64::max);

        let graph = DependencyResolver::new()
            .build_graph("t1", subtasks, GraphSource::Oracle)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert!((graph.total_estimated_hours() - expected_total).abs() < 1e-6);
        prop_assert!(graph.critical_path_hours() + 1e-6 >= max_single);
        prop_assert!(graph.critical_path_hours() <= graph.total_estimated_hours() + 1e-6);

        // The path is a dependency chain whose hours add up
        let path = graph.critical_path();
        let path_hours: f64 = path.iter().filter_map(|id| graph.get(id)).map(|s| s.estimated_hours).sum();
        prop_assert!((path_hours - graph.critical_path_hours()).abs() < 1e-6);
        for pair in path.windows(2) {
            let next = graph.get(&pair[1]).ok_or_else(|| TestCaseError::fail("missing node"))?;
            prop_assert!(next.depends_on.contains(&pair[0]));
        }
    }

    /// Property: topological order places dependencies first
    #[test]
    fn prop_topological_order_respects_edges(subtasks in dag_strategy()) {
        let order = DependencyResolver::new()
            .topological_order(&subtasks)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(order.len(), subtasks.len());

        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (subtasks[idx].id.as_str(), pos))
            .collect();
        for subtask in &subtasks {
            for dep in &subtask.depends_on {
                prop_assert!(position[dep.as_str()] < position[subtask.id.as_str()]);
            }
        }
    }

    /// Property: closing a chain back on itself is always detected
    #[test]
    fn prop_cycles_detected(subtasks in dag_strategy()) {
        prop_assume!(subtasks.len() >= 2);
        let last = format!("s{}", subtasks.len() - 1);
        let mut cyclic = subtasks;
        // Chain every node to its predecessor, then close the loop
        for (i, subtask) in cyclic.iter_mut().enumerate().skip(1) {
            subtask.depends_on.insert(format!("s{}", i - 1));
        }
        cyclic[0].depends_on.insert(last);

        prop_assert!(DependencyResolver::new().detect_cycle(&cyclic).is_some());
        prop_assert!(DependencyResolver::new().build_graph("t1", cyclic, GraphSource::Oracle).is_err());
    }
}

#[derive(Debug, Clone)]
enum Op {
    Register(usize, bool),
    Unregister(usize),
    Assign(usize, SubtaskKind),
    Start(prop::sample::Index),
    Complete(prop::sample::Index),
    Fail(prop::sample::Index),
    Pass,
    Prune,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let kind = prop_oneof![
        Just(SubtaskKind::Implementation),
        Just(SubtaskKind::Testing),
        Just(SubtaskKind::Documentation),
    ];
    prop_oneof![
        (0usize..4, any::<bool>()).prop_map(|(agent, any)| Op::Register(agent, any)),
        (0usize..4).prop_map(Op::Unregister),
        (0usize..12, kind).prop_map(|(subtask, kind)| Op::Assign(subtask, kind)),
        any::<prop::sample::Index>().prop_map(Op::Start),
        any::<prop::sample::Index>().prop_map(Op::Complete),
        any::<prop::sample::Index>().prop_map(Op::Fail),
        Just(Op::Pass),
        Just(Op::Prune),
    ]
}

async fn pick_assignment(scheduler: &Scheduler, pick: prop::sample::Index) -> Option<AssignmentId> {
    let assignments = scheduler.assignments().await;
    if assignments.is_empty() {
        return None;
    }
    Some(assignments[pick.index(assignments.len())].id)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: recorded load equals active assignments after every operation
    #[test]
    fn prop_load_invariant_holds(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        runtime.block_on(async {
            let scheduler = Scheduler::new(std::sync::Arc::new(EventBus::new()));

            for op in ops {
                match op {
                    Op::Register(agent, any) => {
                        let id = format!("agent-{agent}");
                        let profile = if any {
                            AgentProfile::any(id)
                        } else {
                            AgentProfile::with_tags(id, ["implementation"])
                        };
                        scheduler.register_agent(profile).await;
                    }
                    Op::Unregister(agent) => {
                        let _ = scheduler.unregister_agent(&format!("agent-{agent}")).await;
                    }
                    Op::Assign(subtask, kind) => {
                        let subtask = Subtask::new(format!("s{subtask}"), "t1", "Work").with_kind(kind);
                        let _ = scheduler.assign(&subtask, None).await;
                    }
                    Op::Start(pick) => {
                        if let Some(id) = pick_assignment(&scheduler, pick).await {
                            let _ = scheduler.start(id).await;
                        }
                    }
                    Op::Complete(pick) => {
                        if let Some(id) = pick_assignment(&scheduler, pick).await {
                            let _ = scheduler.complete(id, serde_json::Value::Null).await;
                        }
                    }
                    Op::Fail(pick) => {
                        if let Some(id) = pick_assignment(&scheduler, pick).await {
                            let _ = scheduler.fail(id, "boom").await;
                        }
                    }
                    Op::Pass => {
                        scheduler.schedule_pass().await;
                    }
                    Op::Prune => {
                        scheduler.prune_completed_tasks().await;
                    }
                }

                scheduler
                    .verify_load_invariant()
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
