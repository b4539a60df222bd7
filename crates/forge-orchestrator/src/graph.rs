use std::collections::{HashMap, HashSet};

use chrono::Utc;
use forge_core::{ForgeError, TaskKind};

use crate::types::{NodeStatus, TaskNode};

/// The fixed dependency edges every job's graph is built from. Kept in one
/// place so the scheduler's dispatch order and `forge_agents::builders`'
/// per-agent `required_deps` stay visibly in sync — a change to one without
/// the other is a design error, not a runtime one.
const fn deps_of(kind: TaskKind) -> &'static [TaskKind] {
    use TaskKind::*;
    match kind {
        Literature => &[],
        Introduction => &[Literature],
        Methodology => &[Introduction],
        Risk => &[Methodology],
        Optimizer => &[Methodology, Introduction],
        Visualization => &[Methodology],
        Qa => &[Introduction, Literature, Methodology, Risk],
        References => &[Literature],
        FrontMatter => &[Introduction, Literature, Methodology, Visualization],
        Formatting => &[
            FrontMatter,
            Introduction,
            Literature,
            Methodology,
            Visualization,
            Risk,
            References,
            Qa,
        ],
        Assembly => &[Formatting],
    }
}

/// Nodes that gain nothing from retrying on the same input: their output is a
/// deterministic function of their dependencies, not an LLM call prone to
/// transient network failure.
fn default_max_retries(kind: TaskKind, default_for_llm_kinds: u32) -> u32 {
    match kind {
        TaskKind::Formatting | TaskKind::Assembly => 0,
        _ => default_for_llm_kinds,
    }
}

/// A job's task graph: one node per [`TaskKind`], built from the canonical
/// dependency edges and mutated only by the scheduler's control loop.
pub struct TaskGraph {
    nodes: HashMap<TaskKind, TaskNode>,
}

impl TaskGraph {
    /// Builds the canonical graph, validating acyclicity and that
    /// `literature` is the only root (the only node with no dependencies).
    pub fn build(default_max_retries_for_llm_kinds: u32) -> Result<Self, ForgeError> {
        let mut nodes = HashMap::with_capacity(TaskKind::ALL.len());
        for kind in TaskKind::ALL {
            let retries = default_max_retries(kind, default_max_retries_for_llm_kinds);
            nodes.insert(kind, TaskNode::new(kind, deps_of(kind), retries));
        }

        let graph = Self { nodes };
        graph.check_acyclic()?;
        graph.check_single_root()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), ForgeError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            InProgress,
            Done,
        }
        let mut marks: HashMap<TaskKind, Mark> = HashMap::new();

        fn visit(
            graph: &TaskGraph,
            kind: TaskKind,
            marks: &mut HashMap<TaskKind, Mark>,
        ) -> Result<(), ForgeError> {
            match marks.get(&kind) {
                Some(Mark::InProgress) => {
                    return Err(ForgeError::Internal(format!(
                        "cycle detected in task graph at {kind}"
                    )))
                }
                Some(Mark::Done) => return Ok(()),
                None => {}
            }
            marks.insert(kind, Mark::InProgress);
            for &dep in graph.node(kind).deps {
                visit(graph, dep, marks)?;
            }
            marks.insert(kind, Mark::Done);
            Ok(())
        }

        for kind in TaskKind::ALL {
            visit(self, kind, &mut marks)?;
        }
        Ok(())
    }

    fn check_single_root(&self) -> Result<(), ForgeError> {
        let roots: Vec<TaskKind> = TaskKind::ALL
            .into_iter()
            .filter(|k| self.node(*k).deps.is_empty())
            .collect();
        if roots != [TaskKind::Literature] {
            return Err(ForgeError::Internal(format!(
                "expected literature as the sole graph root, found {roots:?}"
            )));
        }
        Ok(())
    }

    pub fn node(&self, kind: TaskKind) -> &TaskNode {
        self.nodes.get(&kind).unwrap_or_else(|| unreachable!("every TaskKind has a node"))
    }

    fn node_mut(&mut self, kind: TaskKind) -> &mut TaskNode {
        self.nodes.get_mut(&kind).unwrap_or_else(|| unreachable!("every TaskKind has a node"))
    }

    /// Kinds whose status is `Pending` and whose declared dependencies have
    /// all `Succeeded`.
    pub fn ready_kinds(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|&k| {
                let node = self.node(k);
                node.status == NodeStatus::Pending
                    && node.deps.iter().all(|d| self.node(*d).status == NodeStatus::Succeeded)
            })
            .collect()
    }

    pub fn mark_running(&mut self, kind: TaskKind) {
        let node = self.node_mut(kind);
        node.status = NodeStatus::Running;
        node.attempts += 1;
        node.started_at.get_or_insert(Utc::now());
    }

    pub fn mark_succeeded(&mut self, kind: TaskKind, attempts: u32) {
        let node = self.node_mut(kind);
        node.status = NodeStatus::Succeeded;
        node.attempts = attempts;
        node.finished_at = Some(Utc::now());
    }

    /// Marks `kind` failed and cascades `Cancelled` to every transitive
    /// descendant that hasn't already reached a terminal state.
    pub fn mark_failed(&mut self, kind: TaskKind, message: String, attempts: u32) {
        {
            let node = self.node_mut(kind);
            node.status = NodeStatus::Failed;
            node.attempts = attempts;
            node.finished_at = Some(Utc::now());
            node.error = Some(message);
        }
        self.cancel_descendants(kind);
    }

    /// Whether every node is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        TaskKind::ALL.into_iter().all(|k| self.node(k).status.is_terminal())
    }

    /// Marks every non-terminal node `Cancelled` (used on job-level abort or
    /// external cancellation).
    pub fn cancel_all_non_terminal(&mut self) {
        for kind in TaskKind::ALL {
            let node = self.node_mut(kind);
            if !node.status.is_terminal() {
                node.status = NodeStatus::Cancelled;
                node.finished_at = Some(Utc::now());
            }
        }
    }

    /// Whether `kind` lies on a path to `assembly` — i.e. whether its failure
    /// must abort the whole job rather than just its own branch. Computed by
    /// reachability rather than hardcoded, so a future optional node that
    /// `assembly` doesn't depend on is correctly treated as non-critical.
    pub fn is_critical(&self, kind: TaskKind) -> bool {
        if kind == TaskKind::Assembly {
            return true;
        }
        let mut stack = vec![TaskKind::Assembly];
        let mut seen = HashSet::new();
        while let Some(k) = stack.pop() {
            if !seen.insert(k) {
                continue;
            }
            for &dep in self.node(k).deps {
                if dep == kind {
                    return true;
                }
                stack.push(dep);
            }
        }
        false
    }

    fn cancel_descendants(&mut self, kind: TaskKind) {
        let mut stack: Vec<TaskKind> = self.direct_successors(kind);
        let mut seen: HashSet<TaskKind> = HashSet::new();
        while let Some(k) = stack.pop() {
            if !seen.insert(k) {
                continue;
            }
            let node = self.node_mut(k);
            if !node.status.is_terminal() {
                node.status = NodeStatus::Cancelled;
                node.finished_at = Some(Utc::now());
            }
            stack.extend(self.direct_successors(k));
        }
    }

    fn direct_successors(&self, kind: TaskKind) -> Vec<TaskKind> {
        TaskKind::ALL.into_iter().filter(|&k| self.node(k).deps.contains(&kind)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_graph_builds_without_cycles() {
        let graph = TaskGraph::build(2).unwrap();
        assert_eq!(graph.ready_kinds(), vec![TaskKind::Literature]);
    }

    #[test]
    fn assembly_depends_transitively_on_every_other_kind() {
        let graph = TaskGraph::build(2).unwrap();
        for kind in TaskKind::ALL {
            assert!(graph.is_critical(kind), "{kind} should be critical");
        }
    }

    #[test]
    fn formatting_and_assembly_default_to_zero_retries() {
        let graph = TaskGraph::build(2).unwrap();
        assert_eq!(graph.node(TaskKind::Formatting).max_retries, 0);
        assert_eq!(graph.node(TaskKind::Assembly).max_retries, 0);
        assert_eq!(graph.node(TaskKind::Introduction).max_retries, 2);
    }

    #[test]
    fn failure_cascades_cancellation_to_every_descendant() {
        let mut graph = TaskGraph::build(2).unwrap();
        graph.mark_running(TaskKind::Literature);
        graph.mark_failed(TaskKind::Literature, "upstream down".to_string(), 1);
        for kind in TaskKind::ALL {
            if kind == TaskKind::Literature {
                continue;
            }
            assert_eq!(graph.node(kind).status, NodeStatus::Cancelled, "{kind} should be cancelled");
        }
    }

    #[test]
    fn successful_completion_unblocks_direct_successors_only() {
        let mut graph = TaskGraph::build(2).unwrap();
        graph.mark_running(TaskKind::Literature);
        graph.mark_succeeded(TaskKind::Literature, 1);
        let ready = graph.ready_kinds();
        assert!(ready.contains(&TaskKind::Introduction));
        assert!(ready.contains(&TaskKind::References));
        assert!(!ready.contains(&TaskKind::Methodology));
    }
}
