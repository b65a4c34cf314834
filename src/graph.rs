//! Task reference graph and root selection.
//!
//! Tasks reference each other through set operations and subquery values.
//! The root task is the one nobody references:
//!
//! 1. exactly one unreferenced task → that task
//! 2. several unreferenced tasks → the numerically largest id
//! 3. every task referenced (cycle or malformed plan) → the last declared task
//!
//! Rules 2 and 3 are fallbacks, not guarantees; [`ReferenceGraph::cycles`]
//! reports the strongly connected components that trigger rule 3.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::plan::{ConditionNode, Plan, StructuralLogicItem, Task, TaskId, ValueNode};

/// How one task refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    SetOperation,
    Subquery,
}

/// Directed graph: referencing task → referenced task.
#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    graph: DiGraph<TaskId, ReferenceKind>,

    /// Index: task id → NodeIndex (insertion order is declaration order)
    nodes: HashMap<TaskId, NodeIndex>,

    /// References to ids absent from the plan: (from, to)
    dangling: Vec<(TaskId, TaskId)>,
}

impl ReferenceGraph {
    pub fn build(plan: &Plan) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::with_capacity(plan.len());
        for id in plan.ids() {
            nodes.insert(id, graph.add_node(id));
        }

        let mut dangling = Vec::new();
        for task in plan.tasks() {
            let from = nodes[&task.id];
            for (target, kind) in task_references(task) {
                match nodes.get(&target) {
                    Some(&to) => {
                        graph.add_edge(from, to, kind);
                    }
                    None => dangling.push((task.id, target)),
                }
            }
        }

        Self {
            graph,
            nodes,
            dangling,
        }
    }

    /// Every id referenced by some task, including ids missing from the plan.
    pub fn referenced_ids(&self) -> BTreeSet<TaskId> {
        self.graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(_, to)| self.graph[to])
            .chain(self.dangling.iter().map(|&(_, to)| to))
            .collect()
    }

    /// Unreferenced task ids, ascending.
    pub fn root_candidates(&self) -> Vec<TaskId> {
        let referenced = self.referenced_ids();
        let mut candidates: Vec<TaskId> = self
            .nodes
            .keys()
            .filter(|id| !referenced.contains(id))
            .copied()
            .collect();
        candidates.sort();
        candidates
    }

    /// Apply the root selection rules. `None` only for an empty plan.
    pub fn find_root(&self) -> Option<TaskId> {
        let candidates = self.root_candidates();
        if let Some(&root) = candidates.last() {
            if candidates.len() > 1 {
                tracing::debug!(?candidates, %root, "several root candidates, taking the largest id");
            }
            return Some(root);
        }

        let last = self.graph.node_indices().last().map(|node| self.graph[node]);
        if let Some(root) = last {
            tracing::warn!(%root, "every task is referenced, falling back to the last declared task");
        }
        last
    }

    /// Reference cycles, each sorted by id. Self-references count as cycles.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut ids: Vec<TaskId> = component.into_iter().map(|n| self.graph[n]).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// References whose target is not in the plan.
    pub fn dangling(&self) -> &[(TaskId, TaskId)] {
        &self.dangling
    }

    /// Tasks referenced directly by `id`, in declaration order.
    pub fn dependencies(&self, id: TaskId) -> Vec<(TaskId, ReferenceKind)> {
        let Some(&node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        // petgraph walks outgoing edges newest first
        let mut deps: Vec<_> = self
            .graph
            .edges(node)
            .map(|edge| (self.graph[edge.target()], *edge.weight()))
            .collect();
        deps.reverse();
        deps
    }
}

/// Find the entry-point task of a plan.
pub fn find_root(plan: &Plan) -> Option<TaskId> {
    ReferenceGraph::build(plan).find_root()
}

// =============================================================================
// Reference collection
// =============================================================================

/// Every task id a task refers to, in the order encountered.
///
/// Walks set operations plus every value and condition tree: targets, join
/// conditions, WHERE, HAVING and ORDER BY.
pub fn task_references(task: &Task) -> Vec<(TaskId, ReferenceKind)> {
    let mut refs = Vec::new();

    for item in &task.targets {
        collect_value(&item.value, &mut refs);
    }
    for item in &task.structural_logic {
        match item {
            StructuralLogicItem::Join { condition, .. } => collect_condition(condition, &mut refs),
            StructuralLogicItem::SetOp { target_task_id, .. } => {
                refs.push((*target_task_id, ReferenceKind::SetOperation))
            }
        }
    }
    if let Some(condition) = &task.where_clause {
        collect_condition(condition, &mut refs);
    }
    if let Some(condition) = &task.having {
        collect_condition(condition, &mut refs);
    }
    for item in &task.order_by {
        collect_value(&item.value, &mut refs);
    }

    refs
}

fn collect_value(node: &ValueNode, refs: &mut Vec<(TaskId, ReferenceKind)>) {
    match node {
        ValueNode::Literal { .. } | ValueNode::ColumnRef { .. } | ValueNode::Semantic { .. } => {}
        ValueNode::FunctionCall { params, .. } => {
            for param in params {
                collect_value(param, refs);
            }
        }
        ValueNode::Case {
            branches,
            otherwise,
        } => {
            for branch in branches {
                collect_value(&branch.when, refs);
                collect_value(&branch.then, refs);
            }
            if let Some(otherwise) = otherwise {
                collect_value(otherwise, refs);
            }
        }
        ValueNode::ConditionAsValue { condition } => collect_condition(condition, refs),
        ValueNode::SubqueryRef { target_task_id } => {
            refs.push((*target_task_id, ReferenceKind::Subquery))
        }
    }
}

fn collect_condition(node: &ConditionNode, refs: &mut Vec<(TaskId, ReferenceKind)>) {
    match node {
        ConditionNode::Branch { children, .. } => {
            for child in children {
                collect_condition(child, refs);
            }
        }
        ConditionNode::Leaf { left, right, .. } => {
            collect_value(left, refs);
            collect_value(right, refs);
        }
    }
}
