//! Complexity analysis and decomposition against scripted oracles.

mod common;

use std::sync::Arc;
use std::time::Duration;

use taskforge::adapters::oracles::{MockOracle, MockReply, OfflineOracle};
use taskforge::domain::models::{AnalyzerConfig, DecomposerConfig, GraphSource};
use taskforge::{
    BreakdownPolicy, ComplexityAnalyzer, ComplexityLevel, DomainError, Task, TaskContext, TaskDecomposer,
};

fn analyzer(oracle: MockOracle) -> ComplexityAnalyzer {
    ComplexityAnalyzer::new(Arc::new(oracle), &AnalyzerConfig::default())
}

fn decomposer(oracle: MockOracle) -> TaskDecomposer {
    TaskDecomposer::new(Arc::new(oracle), &DecomposerConfig::default())
}

#[tokio::test]
async fn test_short_task_with_oracle_down() {
    let analyzer = ComplexityAnalyzer::new(Arc::new(OfflineOracle::new()), &AnalyzerConfig::default());
    let task = Task::new("t1", "Rename", "Rename the button");

    let analysis = analyzer.analyze(&task, None).await;

    assert_eq!(analysis.score, 3);
    assert_eq!(analysis.level, ComplexityLevel::Simple);
    assert_eq!(analysis.breakdown_policy, BreakdownPolicy::Optional);
    assert!(analysis.is_heuristic());
    assert!(analysis.is_within_bounds());
}

#[tokio::test]
async fn test_hanging_oracle_is_bounded() {
    let analyzer = analyzer(MockOracle::with_default_reply(MockReply::hang()))
        .with_timeout(Duration::from_millis(20));
    let task = Task::new("t1", "Search", "Design the search architecture for the catalog");

    let analysis = tokio::time::timeout(Duration::from_secs(2), analyzer.analyze(&task, None))
        .await
        .expect("analysis must not hang");

    assert!(analysis.is_heuristic());
    assert_eq!(analysis.score, 5);
}

#[tokio::test]
async fn test_out_of_range_reply_is_clamped() {
    let reply = "```json\n{\"complexityScore\": 42, \"estimatedHours\": -3, \"recommendedSubtaskCount\": 50}\n```";
    let analysis = analyzer(MockOracle::new().with_reply(MockReply::success(reply)))
        .analyze(&Task::new("t1", "Huge", "Rewrite everything"), None)
        .await;

    assert!(!analysis.is_heuristic());
    assert_eq!(analysis.score, 10);
    assert!((analysis.estimated_hours - 0.5).abs() < f64::EPSILON);
    assert_eq!(analysis.recommended_subtask_count, 10);
}

#[tokio::test]
async fn test_context_reaches_the_oracle() {
    let oracle = Arc::new(MockOracle::with_default_reply(MockReply::success(r#"{"score": 4}"#)));
    let analyzer = ComplexityAnalyzer::new(oracle.clone(), &AnalyzerConfig::default());
    let context = TaskContext::new()
        .with_project_type("cli tool")
        .with_tech_stack(vec!["rust".to_string(), "tokio".to_string()]);

    analyzer
        .analyze(&Task::new("t1", "Flags", "Add a verbose flag"), Some(&context))
        .await;

    let prompt = &oracle.prompts()[0];
    assert!(prompt.contains("cli tool"));
    assert!(prompt.contains("rust, tokio"));
}

#[tokio::test]
async fn test_atomic_task_has_single_node_path() {
    let reply = r#"{"score": 1, "breakdown_policy": "none"}"#;
    let task = Task::new("t1", "Typo", "Fix typo");
    let analysis = analyzer(MockOracle::new().with_reply(MockReply::success(reply)))
        .analyze(&task, None)
        .await;

    let graph = decomposer(MockOracle::new()).decompose(&task, &analysis, None).await.unwrap();

    assert_eq!(graph.len(), 1);
    assert_eq!(graph.subtasks()[0].id, task.id);
    assert_eq!(graph.subtasks()[0].title, task.title);
    assert_eq!(graph.critical_path(), [task.id.clone()]);
    assert_eq!(graph.source(), GraphSource::Atomic);
}

#[tokio::test]
async fn test_oracle_breakdown_end_to_end() {
    let task = Task::new("t1", "Checkout", "Build the checkout flow with payment integration");
    let analysis = ComplexityAnalyzer::heuristic(&task);
    let reply = r#"Sure! Here is the plan:
```json
{
  "subtasks": [
    {"id": "schema", "title": "Define schema", "type": "setup", "estimated_hours": 2},
    {"id": "api", "title": "Payment API", "type": "implementation", "priority": "high",
     "estimated_hours": 6, "depends_on": ["schema"]},
    {"id": "ui", "title": "Checkout UI", "type": "implementation", "estimated_hours": 4,
     "depends_on": ["schema"]},
    {"id": "e2e", "title": "End-to-end tests", "type": "testing", "estimated_hours": 3,
     "depends_on": ["api", "ui"]}
  ]
}
```"#;

    let graph = decomposer(MockOracle::new().with_reply(MockReply::success(reply)))
        .decompose(&task, &analysis, Some(4))
        .await
        .unwrap();

    assert_eq!(graph.source(), GraphSource::Oracle);
    assert_eq!(graph.critical_path(), ["schema", "api", "e2e"].map(String::from));
    assert!((graph.critical_path_hours() - 11.0).abs() < 1e-9);
    assert!((graph.total_estimated_hours() - 15.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_cyclic_breakdown_fails_the_decomposition() {
    let task = Task::new("t1", "Loop", "Something circular in the system");
    let analysis = ComplexityAnalyzer::heuristic(&task);
    let reply = r#"{"subtasks": [
        {"id": "a", "title": "A", "depends_on": ["b"]},
        {"id": "b", "title": "B", "depends_on": ["a"]}
    ]}"#;

    let result = decomposer(MockOracle::new().with_reply(MockReply::success(reply)))
        .decompose(&task, &analysis, None)
        .await;

    match result {
        Err(DomainError::CyclicDependency(path)) => {
            assert_eq!(path.len(), 2);
            assert!(path.contains(&"a".to_string()) && path.contains(&"b".to_string()));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}
