//! Separate-diagram decomposition.
//!
//! Instead of one full diagram, separate mode yields one context diagram
//! per group plus a residual top-level diagram. A group's context diagram
//! shows the group collapsed to a single placeholder cell between the
//! outside elements it exchanges edges with, while the group keeps its own
//! members and internal edges (in group-relative coordinates) for its inner
//! rendering. The residual diagram shows the top level with every direct
//! group collapsed the same way.
//!
//! Each sub-diagram starts from a fresh clone of the unlaid build, so the
//! destructive endpoint rewriting never leaks between iterations.

use log::debug;

use crate::builder::build_tree;
use crate::diagram::{Diagram, Edge, ElementId};
use crate::error::DiagramError;
use crate::ir::Stmt;
use crate::layout;

/// Build `stmts` and decompose into per-group context diagrams followed by
/// the residual top-level diagram. A build with N groups yields N+1
/// laid-out sub-diagrams.
pub(crate) fn separate(stmts: &[Stmt]) -> Result<Vec<Diagram>, DiagramError> {
    let base = build_tree(stmts)?;
    let root = base.root();
    let groups = base.traverse_groups(root, true);
    let mut out = Vec::with_capacity(groups.len() + 1);

    for &group in &groups {
        let mut sub = base.clone();
        focus_on_group(&mut sub, group);
        layout::layout(&mut sub);
        sub.finalize()?;
        out.push(sub);
    }

    let mut residual = base;
    focus_on_root(&mut residual);
    layout::layout(&mut residual);
    residual.finalize()?;
    out.push(residual);

    debug!("separated into {} sub-diagrams", out.len());
    Ok(out)
}

/// The element standing for `elem` at `group`'s nesting level: the group
/// itself for anything inside it, the same-level enclosing group for
/// elements nested in a sibling branch, and the element unchanged when it
/// is already visible at that level.
fn representative(
    diagram: &Diagram,
    group: ElementId,
    group_level: u32,
    elem: ElementId,
) -> ElementId {
    if diagram.is_ancestor(group, elem) {
        return group;
    }
    let mut cursor = elem;
    loop {
        if diagram.elem(cursor).is_group() && diagram.level(cursor) == group_level {
            return cursor;
        }
        match diagram.elem(cursor).parent {
            Some(parent) => cursor = parent,
            None => return elem,
        }
    }
}

/// Rewrite `sub` into the context diagram for `group`: the root's children
/// become the elements with edges into the group (in edge order), the group
/// itself, then the elements its edges leave for. Boundary edges terminate
/// at those representatives; edges not touching the group are dropped;
/// edges wholly inside the group survive untouched for the inner rendering.
fn focus_on_group(sub: &mut Diagram, group: ElementId) {
    let root = sub.root();
    let group_level = sub.group_body(group).map(|body| body.level).unwrap_or(1);
    let saved: Vec<Edge> = sub
        .edge_handles()
        .map(|eid| sub.edge_ref(eid).clone())
        .collect();
    sub.clear_edges();

    let mut incoming: Vec<ElementId> = Vec::new();
    let mut outgoing: Vec<ElementId> = Vec::new();
    let mut kept: Vec<(ElementId, ElementId, Edge)> = Vec::new();
    for edge in saved {
        let from = representative(sub, group, group_level, edge.from);
        let to = representative(sub, group, group_level, edge.to);
        match (from == group, to == group) {
            (true, true) => {
                // Inside the group at any depth; a collapsed self-reference
                // on the group itself carries no information.
                if edge.from != edge.to || sub.is_ancestor(group, edge.from) {
                    kept.push((edge.from, edge.to, edge));
                }
            }
            (false, true) => {
                if !incoming.contains(&from) {
                    incoming.push(from);
                }
                kept.push((from, to, edge));
            }
            (true, false) => {
                if !outgoing.contains(&to) {
                    outgoing.push(to);
                }
                kept.push((from, to, edge));
            }
            (false, false) => {}
        }
    }

    let mut members = incoming;
    members.push(group);
    for id in outgoing {
        if !members.contains(&id) {
            members.push(id);
        }
    }
    for &member in &members {
        if sub.elem(member).is_group() {
            if let Some(body) = sub.group_body_mut(member) {
                body.separated = true;
                if member != group {
                    body.children.clear();
                }
            }
        }
        sub.elem_mut(member).parent = Some(root);
    }
    if let Some(body) = sub.group_body_mut(root) {
        body.children = members;
    }
    renumber_levels(sub, root, 0);

    restore_edges(sub, kept);
}

/// Rewrite `residual` into the top-level diagram: every direct child group
/// collapses to a placeholder and edges terminate at root-level children.
fn focus_on_root(residual: &mut Diagram) {
    let root = residual.root();
    let saved: Vec<Edge> = residual
        .edge_handles()
        .map(|eid| residual.edge_ref(eid).clone())
        .collect();
    residual.clear_edges();

    let mut kept: Vec<(ElementId, ElementId, Edge)> = Vec::new();
    for edge in saved {
        let from = top_representative(residual, edge.from);
        let to = top_representative(residual, edge.to);
        if from == to && edge.from != edge.to {
            continue;
        }
        kept.push((from, to, edge));
    }

    for child in residual.children(root).to_vec() {
        if let Some(body) = residual.group_body_mut(child) {
            body.separated = true;
            body.children.clear();
        }
    }
    restore_edges(residual, kept);
}

/// The direct child of the root containing `elem`.
fn top_representative(diagram: &Diagram, elem: ElementId) -> ElementId {
    let root = diagram.root();
    let mut cursor = elem;
    loop {
        match diagram.elem(cursor).parent {
            Some(parent) if parent == root => return cursor,
            Some(parent) => cursor = parent,
            None => return elem,
        }
    }
}

fn renumber_levels(sub: &mut Diagram, at: ElementId, level: u32) {
    for child in sub.children(at).to_vec() {
        if sub.elem(child).is_group() {
            if let Some(body) = sub.group_body_mut(child) {
                body.level = level + 1;
            }
            renumber_levels(sub, child, level + 1);
        }
    }
}

/// Re-intern the surviving edges in declaration order, carrying their
/// presentation attributes, and rebind them to their owning groups.
fn restore_edges(sub: &mut Diagram, kept: Vec<(ElementId, ElementId, Edge)>) {
    for (from, to, proto) in kept {
        let (eid, _) = sub.edge(from, to);
        let edge = sub.edge_mut(eid);
        edge.label = proto.label;
        edge.dir = proto.dir;
        edge.style = proto.style;
        edge.color = proto.color;
        edge.folded = proto.folded;
    }
    sub.bind_edges();
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::diagram::XY;

    fn names(diagram: &Diagram) -> HashSet<String> {
        diagram
            .traverse_nodes(diagram.root())
            .into_iter()
            .filter_map(|id| diagram.elem(id).name.clone())
            .collect()
    }

    #[test]
    fn one_group_yields_context_plus_residual() {
        let subs = separate(&[
            Stmt::edge("A", "B"),
            Stmt::group("g", vec![Stmt::chain(["B", "C"])]),
            Stmt::edge("C", "D"),
        ])
        .unwrap();
        assert_eq!(subs.len(), 2);

        let context = &subs[0];
        let g = context.find_group("g").unwrap();
        assert!(context.group_body(g).unwrap().separated);
        assert_eq!(context.elem(g).width, 1);
        assert_eq!(context.elem(g).height, 1);
        let a = context.find_node("A").unwrap();
        let d = context.find_node("D").unwrap();
        assert_eq!(context.elem(a).xy, XY::new(0, 0));
        assert_eq!(context.elem(g).xy, XY::new(1, 0));
        assert_eq!(context.elem(d).xy, XY::new(2, 0));
        // the group keeps its members for the inner rendering
        assert_eq!(context.children(g).len(), 2);

        let residual = subs.last().unwrap();
        assert_eq!(
            names(residual),
            HashSet::from(["A".to_string(), "D".to_string()])
        );
    }

    #[test]
    fn node_sets_reassemble_the_original_diagram() {
        let subs = separate(&[
            Stmt::group("g1", vec![Stmt::chain(["A", "B"])]),
            Stmt::group("g2", vec![Stmt::chain(["C", "D"])]),
            Stmt::edge("B", "C"),
            Stmt::edge("X", "A"),
        ])
        .unwrap();
        assert_eq!(subs.len(), 3);

        let mut recovered = HashSet::new();
        for sub in &subs {
            recovered.extend(names(sub));
        }
        let expected: HashSet<String> = ["A", "B", "C", "D", "X"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn focused_group_with_nested_subgroup_keeps_one_frame() {
        // The edge from a direct member to a node inside a nested subgroup
        // must classify in the focused group's own frame instead of
        // comparing coordinates across two unrelated frames.
        let subs = separate(&[Stmt::group(
            "outer",
            vec![
                Stmt::node("B"),
                Stmt::group("inner", vec![Stmt::node("C")]),
                Stmt::edge("B", "C"),
            ],
        )])
        .unwrap();
        assert_eq!(subs.len(), 3);

        let context = &subs[0]; // outer's context
        let b = context.find_node("B").unwrap();
        let c = context.find_node("C").unwrap();
        assert_eq!(context.elem(b).xy, XY::new(0, 0));
        assert_eq!(context.elem(c).xy, XY::new(1, 0));
        let edge = context.find_edge(b, c).unwrap();
        assert!(!context.edge_ref(edge).skipped);
    }

    #[test]
    fn cross_group_edges_terminate_at_the_sibling_group() {
        let subs = separate(&[
            Stmt::group("g1", vec![Stmt::chain(["A", "B"])]),
            Stmt::group("g2", vec![Stmt::chain(["C", "D"])]),
            Stmt::edge("B", "C"),
        ])
        .unwrap();

        let context = &subs[0]; // g1's context
        let g1 = context.find_group("g1").unwrap();
        let g2 = context.find_group("g2").unwrap();
        assert!(context.find_edge(g1, g2).is_some());
        // the sibling group is a bare placeholder here
        assert!(context.children(g2).is_empty());
        assert!(context.group_body(g2).unwrap().separated);

        let residual = subs.last().unwrap();
        let g1 = residual.find_group("g1").unwrap();
        let g2 = residual.find_group("g2").unwrap();
        assert!(residual.find_edge(g1, g2).is_some());
        assert_eq!(residual.elem(g1).xy, XY::new(0, 0));
        assert_eq!(residual.elem(g2).xy, XY::new(1, 0));
    }
}
