use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GraphSource, Subtask, SubtaskGraph};

/// Floating point slack when comparing accumulated hours.
const HOURS_EPSILON: f64 = 1e-9;

/// Graph algorithms over the subtasks of one task: reference validation,
/// cycle detection, topological ordering and critical path.
///
/// Every traversal visits nodes in insertion order so results are
/// deterministic for a given subtask list.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util(
    node: usize,
    edges: &[Vec<usize>],
    visited: &mut [bool],
    on_stack: &mut [bool],
    path: &mut Vec<usize>,
) -> bool {
    visited[node] = true;
    on_stack[node] = true;
    path.push(node);

    for &next in &edges[node] {
        if !visited[next] {
            if detect_cycle_util(next, edges, visited, on_stack, path) {
                return true;
            }
        } else if on_stack[next] {
            if let Some(cycle_start) = path.iter().position(|&idx| idx == next) {
                path.drain(0..cycle_start);
                return true;
            }
        }
    }

    on_stack[node] = false;
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Validate ids: no duplicates, and every `depends_on` entry names a
    /// subtask in the same list.
    pub fn validate_references(&self, subtasks: &[Subtask]) -> DomainResult<()> {
        let mut seen = HashSet::with_capacity(subtasks.len());
        for subtask in subtasks {
            if !seen.insert(subtask.id.as_str()) {
                return Err(DomainError::DuplicateSubtaskId(subtask.id.clone()));
            }
        }

        for subtask in subtasks {
            if let Some(missing) = subtask.depends_on.iter().find(|dep| !seen.contains(dep.as_str())) {
                return Err(DomainError::UnknownDependency {
                    subtask_id: subtask.id.clone(),
                    dependency_id: missing.clone(),
                });
            }
        }

        Ok(())
    }

    /// Detect a dependency cycle. Returns the ids on the cycle, starting at
    /// the first node reached twice.
    ///
    /// References to unknown ids are ignored here; run
    /// [`validate_references`](Self::validate_references) first.
    pub fn detect_cycle(&self, subtasks: &[Subtask]) -> Option<Vec<String>> {
        let edges = dependency_edges(subtasks);
        let mut visited = vec![false; subtasks.len()];
        let mut on_stack = vec![false; subtasks.len()];
        let mut path = Vec::new();

        for start in 0..subtasks.len() {
            if !visited[start]
                && detect_cycle_util(start, &edges, &mut visited, &mut on_stack, &mut path)
            {
                return Some(path.into_iter().map(|idx| subtasks[idx].id.clone()).collect());
            }
        }

        None
    }

    /// Topological order as indices into `subtasks`, dependencies first.
    /// Among ready nodes the earliest inserted goes first.
    pub fn topological_order(&self, subtasks: &[Subtask]) -> DomainResult<Vec<usize>> {
        if let Some(cycle) = self.detect_cycle(subtasks) {
            return Err(DomainError::CyclicDependency(cycle));
        }

        let edges = dependency_edges(subtasks);
        let mut in_degree: Vec<usize> = edges.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); subtasks.len()];
        for (idx, deps) in edges.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(idx);
            }
        }

        // Kahn's algorithm; the ordered set keeps insertion-order tie breaks
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut sorted = Vec::with_capacity(subtasks.len());
        while let Some(idx) = ready.pop_first() {
            sorted.push(idx);
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if sorted.len() != subtasks.len() {
            return Err(DomainError::ValidationFailed(
                "topological sort did not cover every subtask".to_string(),
            ));
        }

        Ok(sorted)
    }

    /// Longest chain by cumulative estimated hours.
    ///
    /// Returns the ordered ids along the chain and its total hours. Ties are
    /// broken towards the earliest inserted subtask, both when choosing a
    /// node's predecessor and when choosing where the chain ends.
    pub fn critical_path(&self, subtasks: &[Subtask]) -> DomainResult<(Vec<String>, f64)> {
        let order = self.topological_order(subtasks)?;
        let edges = dependency_edges(subtasks);

        let mut best = vec![0.0_f64; subtasks.len()];
        let mut predecessor: Vec<Option<usize>> = vec![None; subtasks.len()];

        for &idx in &order {
            let mut chosen: Option<usize> = None;
            for &dep in &edges[idx] {
                let better = match chosen {
                    None => true,
                    Some(current) => {
                        best[dep] > best[current] + HOURS_EPSILON
                            || ((best[dep] - best[current]).abs() <= HOURS_EPSILON && dep < current)
                    }
                };
                if better {
                    chosen = Some(dep);
                }
            }
            best[idx] = subtasks[idx].estimated_hours + chosen.map_or(0.0, |dep| best[dep]);
            predecessor[idx] = chosen;
        }

        let mut end: Option<usize> = None;
        for idx in 0..subtasks.len() {
            let better = match end {
                None => true,
                Some(current) => best[idx] > best[current] + HOURS_EPSILON,
            };
            if better {
                end = Some(idx);
            }
        }

        let Some(end) = end else {
            return Ok((Vec::new(), 0.0));
        };

        let mut chain = vec![end];
        let mut cursor = end;
        while let Some(prev) = predecessor[cursor] {
            chain.push(prev);
            cursor = prev;
        }
        chain.reverse();

        let ids = chain.iter().map(|&idx| subtasks[idx].id.clone()).collect();
        Ok((ids, best[end]))
    }

    /// Validate `subtasks` and assemble a graph with its critical path.
    pub fn build_graph(
        &self,
        task_id: impl Into<String>,
        subtasks: Vec<Subtask>,
        source: GraphSource,
    ) -> DomainResult<SubtaskGraph> {
        self.validate_references(&subtasks)?;
        let (critical_path, critical_path_hours) = self.critical_path(&subtasks)?;
        Ok(SubtaskGraph::from_parts(
            task_id.into(),
            subtasks,
            critical_path,
            critical_path_hours,
            source,
        ))
    }
}

/// Adjacency from each subtask to the subtasks it depends on, by index.
/// Dependencies are listed in insertion order; unknown ids are skipped.
fn dependency_edges(subtasks: &[Subtask]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = subtasks
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.id.as_str(), idx))
        .collect();

    subtasks
        .iter()
        .map(|subtask| {
            let mut deps: Vec<usize> = subtask
                .depends_on
                .iter()
                .filter_map(|dep| index.get(dep.as_str()).copied())
                .collect();
            deps.sort_unstable();
            deps
        })
        .collect()
}
