//! Dependency ordering.
//!
//! Depth-first traversal with a three-state marker. Visiting a node first
//! visits its dependencies, then appends the node, so every dependency lands
//! before its dependents. Reaching a node that is still in progress is a cycle.
//!
//! Ties between independent components are broken deterministically: traversal
//! roots are taken in lexicographic order and dependencies in declared order.

use std::collections::{BTreeMap, HashMap};

use modhost_protocols::ComponentError;

/// Component name to the names it depends on.
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Fail with `MissingDependency` on the first dependency that is not a graph key.
pub fn check_dependencies(graph: &DependencyGraph) -> Result<(), ComponentError> {
    for (name, deps) in graph {
        if let Some(missing) = deps.iter().find(|d| !graph.contains_key(d.as_str())) {
            return Err(ComponentError::MissingDependency {
                component: name.clone(),
                dependency: missing.clone(),
            });
        }
    }
    Ok(())
}

/// Dependency-first initialization order.
pub fn resolve_order(graph: &DependencyGraph) -> Result<Vec<String>, ComponentError> {
    check_dependencies(graph)?;
    traverse(graph)
}

/// Like [`resolve_order`], but edges to absent components are ignored.
///
/// Used for teardown, where a dependency may already have been unloaded.
pub fn resolve_order_lenient(graph: &DependencyGraph) -> Result<Vec<String>, ComponentError> {
    traverse(graph)
}

/// Exact reverse of the initialization order.
pub fn shutdown_order(graph: &DependencyGraph) -> Result<Vec<String>, ComponentError> {
    let mut order = resolve_order(graph)?;
    order.reverse();
    Ok(order)
}

fn traverse(graph: &DependencyGraph) -> Result<Vec<String>, ComponentError> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(graph.len());
    let mut order = Vec::with_capacity(graph.len());

    for name in graph.keys() {
        visit(name, graph, &mut marks, &mut order)?;
    }

    Ok(order)
}

fn visit<'a>(
    name: &'a str,
    graph: &'a DependencyGraph,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
) -> Result<(), ComponentError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => return Err(ComponentError::CyclicDependency(name.to_string())),
        None => {}
    }

    marks.insert(name, Mark::InProgress);

    if let Some(deps) = graph.get(name) {
        for dep in deps {
            if graph.contains_key(dep.as_str()) {
                visit(dep, graph, marks, order)?;
            }
        }
    }

    marks.insert(name, Mark::Done);
    order.push(name.to_string());
    Ok(())
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
