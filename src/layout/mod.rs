//! Grid layout engine.
//!
//! Layout runs one pass per group, innermost groups first and the root
//! diagram last, so each pass sees the final extents of the groups nested
//! inside it. Within a pass a group child is an atomic cell block; its
//! internal coordinates stay relative until [`Diagram::finalize`] makes
//! everything absolute.
//!
//! Column assignment pushes every edge target at least one column past its
//! source (longest path wins), except across detected circular references.
//! Row assignment then walks each column-zero tree depth-first, taking the
//! first non-colliding row for every element.

mod cycles;
mod order;

use std::collections::HashSet;

use log::debug;

use crate::diagram::{Diagram, EdgeId, ElementId, ElementKind, Orientation, XY};

/// Lay out every group of `diagram`, leaving group-internal coordinates
/// relative. Call [`Diagram::finalize`] afterwards.
pub(crate) fn layout(diagram: &mut Diagram) {
    let root = diagram.root();
    for group in diagram.traverse_groups(root, false) {
        LayoutPass::new(diagram, group).run();
    }
    LayoutPass::new(diagram, root).run();
}

enum Relation {
    /// Nodes this one points at.
    Child,
    /// Nodes pointing at this one.
    Parent,
}

/// One layout pass over the direct children of a single group.
struct LayoutPass<'a> {
    diagram: &'a mut Diagram,
    target: ElementId,
    /// Edges bound to the target group; endpoints may sit in nested groups
    /// and are resolved to direct children through [`LayoutPass::level_peer`].
    edges: Vec<EdgeId>,
    /// Disjoint circular-reference families among the direct children.
    circulars: Vec<Vec<ElementId>>,
    /// Occupied cells, in the target group's relative frame.
    coordinates: HashSet<XY>,
    /// Children already assigned a row.
    placed: HashSet<ElementId>,
}

impl<'a> LayoutPass<'a> {
    fn new(diagram: &'a mut Diagram, target: ElementId) -> Self {
        let edges = diagram
            .group_body(target)
            .map(|body| body.edges.clone())
            .unwrap_or_default();
        Self {
            diagram,
            target,
            edges,
            circulars: Vec::new(),
            coordinates: HashSet::new(),
            placed: HashSet::new(),
        }
    }

    fn run(&mut self) {
        self.detect_circulars();
        self.set_node_width();
        self.adjust_node_order();
        self.set_rows();
        if self.orientation() == Orientation::Portrait {
            self.rotate();
        }
        self.diagram.fixiate(self.target, true);
        debug!(
            "laid out {}: {} children, {} edges, {} circular families",
            self.diagram.elem(self.target).display_name(),
            self.diagram.children(self.target).len(),
            self.edges.len(),
            self.circulars.len()
        );
    }

    fn orientation(&self) -> Orientation {
        self.diagram
            .group_body(self.target)
            .map(|body| body.orientation)
            .unwrap_or_default()
    }

    /// Resolve an edge endpoint to the direct child of the target group that
    /// contains it, or `None` if the endpoint sits outside the subtree.
    fn level_peer(&self, endpoint: ElementId) -> Option<ElementId> {
        let mut cursor = endpoint;
        loop {
            match self.diagram.elem(cursor).parent {
                Some(parent) if parent == self.target => return Some(cursor),
                Some(parent) => cursor = parent,
                None => return None,
            }
        }
    }

    /// Level peers related to `node` through unfolded pass edges, deduplicated
    /// in edge-declaration order, the node itself excluded.
    fn related(&self, node: ElementId, relation: Relation) -> Vec<ElementId> {
        let mut out = Vec::new();
        for &eid in &self.edges {
            let edge = self.diagram.edge_ref(eid);
            if edge.folded {
                continue;
            }
            let (near, far) = match relation {
                Relation::Child => (edge.from, edge.to),
                Relation::Parent => (edge.to, edge.from),
            };
            if self.level_peer(near) != Some(node) {
                continue;
            }
            let Some(peer) = self.level_peer(far) else {
                continue;
            };
            if peer != node && !out.contains(&peer) {
                out.push(peer);
            }
        }
        out
    }

    fn child_nodes(&self, node: ElementId) -> Vec<ElementId> {
        self.related(node, Relation::Child)
    }

    fn parent_nodes(&self, node: ElementId) -> Vec<ElementId> {
        self.related(node, Relation::Parent)
    }

    /// Longest-path column assignment: every edge target ends at least one
    /// column past its source. Edges closing a circular reference are
    /// skipped so the fixed point terminates.
    fn set_node_width(&mut self) {
        let children = self.diagram.children(self.target).to_vec();
        let mut depth = 0;
        loop {
            for &node in &children {
                if self.diagram.elem(node).xy.x != depth {
                    continue;
                }
                let push_to = depth + self.diagram.elem(node).width;
                for child in self.child_nodes(node) {
                    if self.is_circular_ref(node, child) {
                        continue;
                    }
                    if self.diagram.elem(child).xy.x < push_to {
                        self.diagram.elem_mut(child).xy.x = push_to;
                    }
                }
            }
            depth += 1;
            let more = children
                .iter()
                .any(|&node| self.diagram.elem(node).xy.x >= depth);
            if !more {
                break;
            }
        }
    }

    /// Place every column-zero child and its reachable subtree, then sweep up
    /// anything an edge never reached.
    fn set_rows(&mut self) {
        let children = self.diagram.children(self.target).to_vec();
        let mut cursor = 0;
        for &node in &children {
            if self.diagram.elem(node).xy.x != 0 || self.placed.contains(&node) {
                continue;
            }
            let mut row = cursor;
            while !self.set_node_height(node, row) {
                row += 1;
            }
            self.placed.insert(node);
            cursor = self.max_row().map_or(0, |max| max + 1);
        }
        // Children only reachable through folded or circular edges.
        for &node in &children {
            if self.placed.contains(&node) {
                continue;
            }
            let mut row = 0;
            while !self.set_node_height(node, row) {
                row += 1;
            }
            self.placed.insert(node);
        }
    }

    /// Try to put `node` at `row` and recursively place its children. Fails
    /// without mutating anything when the node's cells are already taken.
    fn set_node_height(&mut self, node: ElementId, row: u32) -> bool {
        let elem = self.diagram.elem(node);
        let (x, w, h) = (elem.xy.x, elem.width, elem.height);
        for cx in x..x + w {
            for cy in row..row + h {
                if self.coordinates.contains(&XY::new(cx, cy)) {
                    return false;
                }
            }
        }
        self.diagram.elem_mut(node).xy.y = row;
        for cx in x..x + w {
            for cy in row..row + h {
                self.coordinates.insert(XY::new(cx, cy));
            }
        }

        let mut kids = self.child_nodes(node);
        kids.sort_by_key(|&kid| {
            let elem = self.diagram.elem(kid);
            (elem.xy.x, elem.xy.y)
        });
        let branching = kids
            .iter()
            .filter(|&&kid| !self.child_nodes(kid).is_empty())
            .count();

        let mut cursor = row;
        let mut prev: Option<ElementId> = None;
        for kid in kids {
            if self.placed.contains(&kid) {
                prev = Some(kid);
                continue;
            }
            // Back and circular references are placed from their own roots.
            if self.diagram.elem(kid).xy.x <= x {
                continue;
            }
            let mut base = cursor;
            if self.diagram.elem(node).is_group() {
                if let Some(floor) = self.departure_row(node, kid, row) {
                    base = base.max(floor);
                }
            }
            if let Some(prev) = prev {
                if branching > 1 && !self.is_rhombus(prev, kid) {
                    let column = self.diagram.elem(kid).xy.x;
                    if let Some(max) = self.max_row_beyond(column) {
                        base = base.max(max + 1);
                    }
                }
            }
            let mut kid_row = base;
            while !self.set_node_height(kid, kid_row) {
                kid_row += 1;
            }
            self.placed.insert(kid);
            cursor = kid_row + 1;
            prev = Some(kid);
        }
        true
    }

    /// Minimum row at which an edge leaves group `node` for `kid`, measured
    /// in the pass frame. Keeps a group's successors from floating above the
    /// rows their edges actually depart from.
    fn departure_row(&self, node: ElementId, kid: ElementId, node_row: u32) -> Option<u32> {
        let mut best: Option<u32> = None;
        for &eid in &self.edges {
            let edge = self.diagram.edge_ref(eid);
            if edge.folded
                || self.level_peer(edge.to) != Some(kid)
                || self.level_peer(edge.from) != Some(node)
            {
                continue;
            }
            let row = node_row + self.relative_row(edge.from, node);
            best = Some(best.map_or(row, |prev| prev.min(row)));
        }
        best
    }

    /// Row of `elem` relative to the top of `within`, summing the relative
    /// frames between them.
    fn relative_row(&self, elem: ElementId, within: ElementId) -> u32 {
        let mut sum = 0;
        let mut cursor = elem;
        while cursor != within {
            sum += self.diagram.elem(cursor).xy.y;
            match self.diagram.elem(cursor).parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        sum
    }

    /// Two siblings form a rhombus when their single-child chains move
    /// strictly rightward and converge on the same element.
    fn is_rhombus(&self, a: ElementId, b: ElementId) -> bool {
        let (mut at_a, mut at_b) = (a, b);
        loop {
            if at_a == at_b {
                return true;
            }
            let next_a = self.child_nodes(at_a);
            let next_b = self.child_nodes(at_b);
            if next_a.len() != 1 || next_b.len() != 1 {
                return false;
            }
            let advancing = self.diagram.elem(next_a[0]).xy.x > self.diagram.elem(at_a).xy.x
                && self.diagram.elem(next_b[0]).xy.x > self.diagram.elem(at_b).xy.x;
            if !advancing {
                return false;
            }
            at_a = next_a[0];
            at_b = next_b[0];
        }
    }

    fn max_row(&self) -> Option<u32> {
        self.coordinates.iter().map(|cell| cell.y).max()
    }

    /// Highest occupied row at or beyond `column`.
    fn max_row_beyond(&self, column: u32) -> Option<u32> {
        self.coordinates
            .iter()
            .filter(|cell| cell.x >= column)
            .map(|cell| cell.y)
            .max()
    }

    /// Transpose the whole subtree into portrait. Each nested group's own
    /// orientation flips so its already-run pass composes with this one
    /// instead of rotating twice.
    fn rotate(&mut self) {
        let subtree = self.diagram.traverse_elements(self.target, true);
        for id in subtree {
            let elem = self.diagram.elem_mut(id);
            elem.xy = elem.xy.transposed();
            std::mem::swap(&mut elem.width, &mut elem.height);
            if let ElementKind::Group(body) = &mut elem.kind {
                body.orientation = body.orientation.toggled();
            }
        }
    }
}
