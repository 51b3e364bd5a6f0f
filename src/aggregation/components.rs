//! Resolution of an aggregate's components, explicit or inferred from the
//! name hierarchy, and validation of explicit declarations.
use crate::error::ConfigurationError;
use crate::names::{Depth, Namespace};
use crate::store::{Component, ComponentSet, VariableCode};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Aggregate name to the component sets it was checked against. Only members
/// present in the dataset are listed.
pub type AggregationMap = BTreeMap<String, Vec<ComponentSet>>;

/// Component sets of `code` restricted to the variables in `present`.
///
/// Without an explicit declaration the direct children of the aggregate in
/// `present` form a single unit-weight set. Sets left without members are
/// dropped, so an empty result means there is nothing to compare.
pub(crate) fn resolve(code: &VariableCode, present: &Namespace) -> Vec<ComponentSet> {
    match &code.components {
        Some(components) => components
            .sets
            .iter()
            .filter_map(|set| {
                let members: Vec<Component> =
                    set.members.iter().filter(|c| present.contains(&c.name)).cloned().collect();
                (!members.is_empty()).then(|| ComponentSet { label: set.label.clone(), members })
            })
            .collect(),
        None => {
            let children = present.children_of(&code.name, Depth::Limited(1));
            if children.is_empty() {
                Vec::new()
            } else {
                vec![ComponentSet::unlabelled(children.into_iter().map(Component::new).collect())]
            }
        }
    }
}

/// Rejects explicit component declarations that cannot be evaluated.
pub(crate) fn validate_declarations<'a, I>(codes: I) -> Result<(), ConfigurationError>
where
    I: IntoIterator<Item = &'a VariableCode>,
{
    let mut graph: DiGraphMap<&'a str, ()> = DiGraphMap::new();

    for code in codes {
        let Some(components) = &code.components else { continue };
        let malformed = |reason: String| ConfigurationError::MalformedComponents {
            variable: code.name.clone(),
            reason,
        };

        if components.sets.is_empty() {
            return Err(malformed("no component sets declared".into()));
        }
        for set in &components.sets {
            let label = set.label.as_deref().unwrap_or("default");
            if set.members.is_empty() {
                return Err(malformed(format!("component set '{label}' is empty")));
            }
            let mut seen = BTreeSet::new();
            for member in &set.members {
                if member.name == code.name {
                    return Err(malformed("lists itself as a component".into()));
                }
                if !seen.insert(member.name.as_str()) {
                    return Err(malformed(format!("'{}' appears twice in set '{label}'", member.name)));
                }
                if !member.weight.is_finite() {
                    return Err(malformed(format!("weight of '{}' is not finite", member.name)));
                }
                graph.add_edge(code.name.as_str(), member.name.as_str(), ());
            }
        }
    }

    // Self references are rejected above, so any cycle spans at least two nodes.
    let mut cycles: Vec<BTreeSet<&str>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| scc.into_iter().collect())
        .collect();
    cycles.sort();
    match cycles.first() {
        Some(members) => Err(ConfigurationError::ComponentCycle { variables: cycle_path(&graph, members) }),
        None => Ok(()),
    }
}

/// Shortest cycle through the smallest member of a strongly connected
/// component, closed by repeating its first node.
fn cycle_path(graph: &DiGraphMap<&str, ()>, members: &BTreeSet<&str>) -> Vec<String> {
    let Some(&start) = members.first() else { return Vec::new() };
    let mut previous: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if !members.contains(next) {
                continue;
            }
            if next == start {
                let mut path = vec![node];
                let mut current = node;
                while let Some(&parent) = previous.get(current) {
                    path.push(parent);
                    current = parent;
                }
                path.reverse();
                path.push(start);
                return path.into_iter().map(String::from).collect();
            }
            if !previous.contains_key(next) {
                previous.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    members.iter().map(|m| m.to_string()).collect()
}
