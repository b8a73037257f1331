//! Node collection along each XPath axis.
//!
//! Collectors append to `results` and skip anything already in `seen`. The
//! evaluator puts the output into proximity order afterwards, so collectors
//! only guarantee membership, not order.

use crate::ast::Axis;
use crate::datasource::DataSourceNode;
use std::collections::HashSet;

fn add_node<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    if seen.insert(node) {
        results.push(node);
    }
}

/// Collects the nodes on `axis` from `node`, in proximity order: document
/// order for forward axes, reverse document order for reverse axes.
pub fn collect<'a, N: DataSourceNode<'a>>(axis: Axis, node: N) -> Vec<N> {
    let mut seen = HashSet::new();
    let mut results = Vec::new();
    match axis {
        Axis::Child => collect_child_nodes(node, &mut seen, &mut results),
        Axis::Attribute => collect_attribute_nodes(node, &mut seen, &mut results),
        Axis::Descendant => collect_descendant_nodes(node, &mut seen, &mut results),
        Axis::DescendantOrSelf => {
            collect_descendant_or_self_nodes(node, &mut seen, &mut results)
        }
        Axis::Parent => collect_parent_nodes(node, &mut seen, &mut results),
        Axis::Ancestor => collect_ancestor_nodes(node, &mut seen, &mut results),
        Axis::AncestorOrSelf => {
            add_node(node, &mut seen, &mut results);
            collect_ancestor_nodes(node, &mut seen, &mut results);
        }
        Axis::SelfAxis => add_node(node, &mut seen, &mut results),
        Axis::FollowingSibling => {
            collect_following_sibling_nodes(node, &mut seen, &mut results)
        }
        Axis::PrecedingSibling => {
            collect_preceding_sibling_nodes(node, &mut seen, &mut results)
        }
        Axis::Following => collect_following_nodes(node, &mut seen, &mut results),
        Axis::Preceding => collect_preceding_nodes(node, &mut seen, &mut results),
    }
    if axis.is_reverse() {
        results.sort_unstable_by(|a, b| b.cmp(a));
    } else {
        results.sort_unstable();
    }
    results
}

pub fn collect_child_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    for child in node.children() {
        add_node(child, seen, results);
    }
}

pub fn collect_attribute_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    for attr in node.attributes() {
        add_node(attr, seen, results);
    }
}

/// Pre-order walk, so results come out in document order.
pub fn collect_descendant_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    let mut stack: Vec<N> = node.children().collect();
    stack.reverse();
    while let Some(current) = stack.pop() {
        add_node(current, seen, results);
        let mut children: Vec<N> = current.children().collect();
        children.reverse();
        stack.extend(children);
    }
}

pub fn collect_descendant_or_self_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    add_node(node, seen, results);
    collect_descendant_nodes(node, seen, results);
}

pub fn collect_parent_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    if let Some(parent) = node.parent() {
        add_node(parent, seen, results);
    }
}

pub fn collect_ancestor_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    let mut current = node.parent();
    while let Some(p) = current {
        add_node(p, seen, results);
        current = p.parent();
    }
}

fn is_attribute<'a, N: DataSourceNode<'a>>(node: N) -> bool {
    node.node_type() == crate::datasource::NodeType::Attribute
}

pub fn collect_following_sibling_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    if is_attribute(node) {
        return;
    }
    if let Some(parent) = node.parent() {
        for sibling in parent.children().skip_while(|s| *s != node).skip(1) {
            add_node(sibling, seen, results);
        }
    }
}

pub fn collect_preceding_sibling_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    if is_attribute(node) {
        return;
    }
    if let Some(parent) = node.parent() {
        for sibling in parent.children().take_while(|s| *s != node) {
            add_node(sibling, seen, results);
        }
    }
}

/// Everything after `node` in document order, excluding its descendants.
pub fn collect_following_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    // An attribute's following nodes start with its owner's children.
    if is_attribute(node) {
        if let Some(owner) = node.parent() {
            collect_descendant_nodes(owner, seen, results);
        }
    }
    let mut current = Some(node);
    while let Some(c) = current {
        let parent = c.parent();
        if let Some(p) = parent {
            if !is_attribute(c) {
                for sibling in p.children().skip_while(|s| *s != c).skip(1) {
                    collect_descendant_or_self_nodes(sibling, seen, results);
                }
            }
        }
        current = parent;
    }
}

/// Everything before `node` in document order, excluding its ancestors.
pub fn collect_preceding_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    let mut current = Some(node);
    while let Some(c) = current {
        let parent = c.parent();
        if let Some(p) = parent {
            if !is_attribute(c) {
                for sibling in p.children().take_while(|s| *s != c) {
                    collect_descendant_or_self_nodes(sibling, seen, results);
                }
            }
        }
        current = parent;
    }
}
