//! Definition graph validation and pure routing.
//!
//! Uses `petgraph` to model the node chain as a directed graph: topological
//! sort rejects cycles at publish time, a reachability walk rejects dangling
//! nodes. Routing (`route_after`) and node evaluation (`evaluate_node`) are
//! pure functions over in-memory data; all storage effects live in the
//! engine that calls them.

use std::collections::{HashMap, HashSet};

use greenlight_types::definition::{ApprovalMode, NodeDefinition};
use greenlight_types::instance::InstanceStatus;
use greenlight_types::task::{ApprovalTask, TaskStatus};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use thiserror::Error;

/// Errors from definition graph validation and routing.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("definition has no nodes")]
    EmptyDefinition,

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("node '{node}' points to unknown node '{next}'")]
    UnknownNext { node: String, next: String },

    #[error("cycle detected involving node '{0}'")]
    CycleDetected(String),

    #[error("node '{0}' is unreachable from the entry node")]
    UnreachableNode(String),

    #[error("node '{0}' requires a quorum of at least 1")]
    ZeroQuorum(String),

    #[error("instance points at unknown node '{0}'")]
    UnknownNode(String),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a definition's node chain: non-empty, unique IDs, every `next`
/// resolves, no cycles, every node reachable from the entry, quorums >= 1.
pub fn validate_nodes(nodes: &[NodeDefinition]) -> Result<(), GraphError> {
    if nodes.is_empty() {
        return Err(GraphError::EmptyDefinition);
    }

    let mut id_to_idx: HashMap<&str, usize> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if id_to_idx.insert(node.id.as_str(), i).is_some() {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
    }

    for node in nodes {
        if let ApprovalMode::Quorum { count: 0 } = node.approval_mode {
            return Err(GraphError::ZeroQuorum(node.id.clone()));
        }
    }

    // Build directed graph: edge from node -> its successor
    let mut graph = DiGraph::<&str, ()>::new();
    let node_indices: Vec<_> = nodes.iter().map(|n| graph.add_node(n.id.as_str())).collect();

    for (i, node) in nodes.iter().enumerate() {
        if let Some(next) = &node.next {
            let to_idx =
                id_to_idx
                    .get(next.as_str())
                    .ok_or_else(|| GraphError::UnknownNext {
                        node: node.id.clone(),
                        next: next.clone(),
                    })?;
            graph.add_edge(node_indices[i], node_indices[*to_idx], ());
        }
    }

    // Topological sort -- detects cycles
    toposort(&graph, None).map_err(|cycle| {
        let node_id = graph[cycle.node_id()];
        GraphError::CycleDetected(node_id.to_string())
    })?;

    // Every node must be reachable by walking `next` from the entry
    let mut reachable: HashSet<&str> = HashSet::new();
    let mut current = Some(&nodes[0]);
    while let Some(node) = current {
        reachable.insert(node.id.as_str());
        current = node
            .next
            .as_deref()
            .and_then(|next| find_node(nodes, next));
    }
    for node in nodes {
        if !reachable.contains(node.id.as_str()) {
            return Err(GraphError::UnreachableNode(node.id.clone()));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Walking
// ---------------------------------------------------------------------------

/// The node a fresh instance starts at: the first node of the chain.
pub fn entry_node(nodes: &[NodeDefinition]) -> Option<&NodeDefinition> {
    nodes.first()
}

/// Look a node up by ID.
pub fn find_node<'a>(nodes: &'a [NodeDefinition], id: &str) -> Option<&'a NodeDefinition> {
    nodes.iter().find(|n| n.id == id)
}

/// Where an instance goes after a node reaches a decision.
#[derive(Debug, PartialEq)]
pub enum RouteStep<'a> {
    /// The instance moves on to another approval node.
    Next(&'a NodeDefinition),
    /// The instance ends with a terminal outcome.
    Finish(InstanceStatus),
}

/// Compute the instance's next move once a node's tasks have been evaluated.
///
/// Deterministic and side-effect free: rejection short-circuits to a
/// rejected instance from any node; approval either walks to the successor
/// node or, at the end of the chain, approves the instance. `Wait` yields
/// `None` -- the node still needs more verdicts.
pub fn route_after<'a>(
    nodes: &'a [NodeDefinition],
    node_id: &str,
    decision: NodeDecision,
) -> Result<Option<RouteStep<'a>>, GraphError> {
    let node =
        find_node(nodes, node_id).ok_or_else(|| GraphError::UnknownNode(node_id.to_string()))?;

    match decision {
        NodeDecision::Wait => Ok(None),
        NodeDecision::Rejected => Ok(Some(RouteStep::Finish(InstanceStatus::Rejected))),
        NodeDecision::Approved => match &node.next {
            Some(next) => {
                let next_node = find_node(nodes, next)
                    .ok_or_else(|| GraphError::UnknownNode(next.clone()))?;
                Ok(Some(RouteStep::Next(next_node)))
            }
            None => Ok(Some(RouteStep::Finish(InstanceStatus::Approved))),
        },
    }
}

// ---------------------------------------------------------------------------
// Node evaluation
// ---------------------------------------------------------------------------

/// Aggregate verdict of one node's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeDecision {
    /// The node's approval requirement is met.
    Approved,
    /// At least one live task was rejected; rejection wins over any mode.
    Rejected,
    /// More verdicts are needed.
    Wait,
}

/// Evaluate a node's tasks against its approval mode.
///
/// Only live tasks count: transferred and delegated tasks were superseded
/// by a replacement task, cancelled tasks belong to an already decided
/// node. A single live rejection decides the node regardless of mode.
pub fn evaluate_node(mode: ApprovalMode, tasks: &[ApprovalTask]) -> NodeDecision {
    let live: Vec<&ApprovalTask> = tasks
        .iter()
        .filter(|t| {
            matches!(
                t.status,
                TaskStatus::Pending | TaskStatus::Approved | TaskStatus::Rejected
            )
        })
        .collect();

    if live.iter().any(|t| t.status == TaskStatus::Rejected) {
        return NodeDecision::Rejected;
    }

    let approvals = live
        .iter()
        .filter(|t| t.status == TaskStatus::Approved)
        .count();

    let met = match mode {
        ApprovalMode::All => !live.is_empty() && approvals == live.len(),
        ApprovalMode::Any => approvals >= 1,
        ApprovalMode::Quorum { count } => approvals >= count as usize,
    };

    if met {
        NodeDecision::Approved
    } else {
        NodeDecision::Wait
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use greenlight_types::definition::AssigneeRule;
    use greenlight_types::id::{InstanceId, TaskId, TenantId, UserId};

    /// Helper: build a node with the given ID and successor.
    fn node(id: &str, next: Option<&str>) -> NodeDefinition {
        NodeDefinition {
            id: id.to_string(),
            name: id.to_string(),
            assignee: AssigneeRule::Role {
                role: "reviewers".to_string(),
            },
            approval_mode: ApprovalMode::All,
            next: next.map(String::from),
        }
    }

    /// Helper: build a task in the given status.
    fn task(status: TaskStatus) -> ApprovalTask {
        ApprovalTask {
            id: TaskId::new(),
            tenant_id: TenantId::new(),
            instance_id: InstanceId::new(),
            node_id: "n".to_string(),
            assignee_id: UserId::new(),
            status,
            decision: None,
            comment: None,
            delegated_by: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_validate_linear_chain() {
        let nodes = vec![node("a", Some("b")), node("b", Some("c")), node("c", None)];
        assert!(validate_nodes(&nodes).is_ok());
    }

    #[test]
    fn test_validate_empty_definition() {
        let err = validate_nodes(&[]).unwrap_err();
        assert!(matches!(err, GraphError::EmptyDefinition));
    }

    #[test]
    fn test_validate_duplicate_node_id() {
        let nodes = vec![node("a", Some("b")), node("a", None), node("b", None)];
        let err = validate_nodes(&nodes).unwrap_err();
        assert!(err.to_string().contains("duplicate node id 'a'"));
    }

    #[test]
    fn test_validate_unknown_next() {
        let nodes = vec![node("a", Some("missing"))];
        let err = validate_nodes(&nodes).unwrap_err();
        assert!(err.to_string().contains("unknown node 'missing'"));
    }

    #[test]
    fn test_validate_cycle() {
        let nodes = vec![node("a", Some("b")), node("b", Some("a"))];
        let err = validate_nodes(&nodes).unwrap_err();
        assert!(err.to_string().contains("cycle detected"));
    }

    #[test]
    fn test_validate_unreachable_node() {
        let nodes = vec![node("a", None), node("orphan", None)];
        let err = validate_nodes(&nodes).unwrap_err();
        assert!(err.to_string().contains("'orphan' is unreachable"));
    }

    #[test]
    fn test_validate_zero_quorum() {
        let mut bad = node("a", None);
        bad.approval_mode = ApprovalMode::Quorum { count: 0 };
        let err = validate_nodes(&[bad]).unwrap_err();
        assert!(matches!(err, GraphError::ZeroQuorum(_)));
    }

    // -----------------------------------------------------------------------
    // Walking
    // -----------------------------------------------------------------------

    #[test]
    fn test_entry_node_is_first() {
        let nodes = vec![node("first", Some("second")), node("second", None)];
        assert_eq!(entry_node(&nodes).unwrap().id, "first");
        assert!(entry_node(&[]).is_none());
    }

    #[test]
    fn test_route_approved_advances_to_next() {
        let nodes = vec![node("a", Some("b")), node("b", None)];
        let step = route_after(&nodes, "a", NodeDecision::Approved)
            .unwrap()
            .unwrap();
        match step {
            RouteStep::Next(n) => assert_eq!(n.id, "b"),
            other => panic!("expected Next, got {other:?}"),
        }
    }

    #[test]
    fn test_route_approved_at_last_node_finishes_approved() {
        let nodes = vec![node("a", Some("b")), node("b", None)];
        let step = route_after(&nodes, "b", NodeDecision::Approved)
            .unwrap()
            .unwrap();
        assert_eq!(step, RouteStep::Finish(InstanceStatus::Approved));
    }

    #[test]
    fn test_route_rejected_short_circuits_from_any_node() {
        let nodes = vec![node("a", Some("b")), node("b", None)];
        let step = route_after(&nodes, "a", NodeDecision::Rejected)
            .unwrap()
            .unwrap();
        assert_eq!(step, RouteStep::Finish(InstanceStatus::Rejected));
    }

    #[test]
    fn test_route_wait_yields_nothing() {
        let nodes = vec![node("a", None)];
        assert!(route_after(&nodes, "a", NodeDecision::Wait)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_route_unknown_node_errors() {
        let nodes = vec![node("a", None)];
        let err = route_after(&nodes, "ghost", NodeDecision::Approved).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(_)));
    }

    // -----------------------------------------------------------------------
    // Node evaluation
    // -----------------------------------------------------------------------

    #[test]
    fn test_all_mode_waits_until_everyone_approves() {
        let tasks = vec![task(TaskStatus::Approved), task(TaskStatus::Pending)];
        assert_eq!(evaluate_node(ApprovalMode::All, &tasks), NodeDecision::Wait);

        let tasks = vec![task(TaskStatus::Approved), task(TaskStatus::Approved)];
        assert_eq!(
            evaluate_node(ApprovalMode::All, &tasks),
            NodeDecision::Approved
        );
    }

    #[test]
    fn test_any_mode_needs_one_approval() {
        let tasks = vec![
            task(TaskStatus::Approved),
            task(TaskStatus::Pending),
            task(TaskStatus::Pending),
        ];
        assert_eq!(
            evaluate_node(ApprovalMode::Any, &tasks),
            NodeDecision::Approved
        );

        let tasks = vec![task(TaskStatus::Pending)];
        assert_eq!(evaluate_node(ApprovalMode::Any, &tasks), NodeDecision::Wait);
    }

    #[test]
    fn test_quorum_mode_counts_approvals() {
        let two_of_three = vec![
            task(TaskStatus::Approved),
            task(TaskStatus::Approved),
            task(TaskStatus::Pending),
        ];
        assert_eq!(
            evaluate_node(ApprovalMode::Quorum { count: 2 }, &two_of_three),
            NodeDecision::Approved
        );

        let one_of_three = vec![
            task(TaskStatus::Approved),
            task(TaskStatus::Pending),
            task(TaskStatus::Pending),
        ];
        assert_eq!(
            evaluate_node(ApprovalMode::Quorum { count: 2 }, &one_of_three),
            NodeDecision::Wait
        );
    }

    #[test]
    fn test_single_rejection_wins_over_every_mode() {
        for mode in [
            ApprovalMode::All,
            ApprovalMode::Any,
            ApprovalMode::Quorum { count: 1 },
        ] {
            let tasks = vec![
                task(TaskStatus::Approved),
                task(TaskStatus::Rejected),
                task(TaskStatus::Pending),
            ];
            assert_eq!(evaluate_node(mode, &tasks), NodeDecision::Rejected);
        }
    }

    #[test]
    fn test_superseded_tasks_do_not_count() {
        // The transferred task was replaced; only its replacement's verdict
        // matters.
        let tasks = vec![task(TaskStatus::Transferred), task(TaskStatus::Approved)];
        assert_eq!(
            evaluate_node(ApprovalMode::All, &tasks),
            NodeDecision::Approved
        );

        let tasks = vec![task(TaskStatus::Delegated), task(TaskStatus::Pending)];
        assert_eq!(evaluate_node(ApprovalMode::All, &tasks), NodeDecision::Wait);
    }

    #[test]
    fn test_cancelled_tasks_do_not_count() {
        let tasks = vec![task(TaskStatus::Cancelled), task(TaskStatus::Approved)];
        assert_eq!(
            evaluate_node(ApprovalMode::Any, &tasks),
            NodeDecision::Approved
        );
    }

    #[test]
    fn test_all_mode_with_no_live_tasks_waits() {
        let tasks = vec![task(TaskStatus::Cancelled)];
        assert_eq!(evaluate_node(ApprovalMode::All, &tasks), NodeDecision::Wait);
    }
}
