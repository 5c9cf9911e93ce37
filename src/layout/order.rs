//! Sibling-order normalization.
//!
//! Row assignment places children in list order, so two tweaks run before
//! it: siblings that will share a column because of a common parent (or a
//! common child) become adjacent in the list, and a group's successors are
//! reordered to follow the declaration order of the edges leaving the group
//! for them. Orders are renumbered afterwards so later passes see the new
//! sequence.

use std::cmp::Ordering;

use super::LayoutPass;
use crate::diagram::ElementId;

impl LayoutPass<'_> {
    pub(super) fn adjust_node_order(&mut self) {
        let children = self.diagram.children(self.target).to_vec();
        for &node in &children {
            let parents = self.parent_nodes(node);
            if parents.len() > 1 && self.same_column(parents[0], parents[1]) {
                self.make_adjacent(parents[0], parents[1]);
            }
            let kids = self.child_nodes(node);
            if kids.len() > 1 && self.same_column(kids[0], kids[1]) {
                self.make_adjacent(kids[0], kids[1]);
            }
            if self.diagram.elem(node).is_group() {
                self.sort_group_successors(node);
            }
        }
        self.diagram.update_order(self.target);
    }

    fn same_column(&self, a: ElementId, b: ElementId) -> bool {
        self.diagram.elem(a).xy.x == self.diagram.elem(b).xy.x
    }

    /// Move `b` right after `a` in the target's child list (or `a` after `b`
    /// when `b` comes first). Endpoints in nested groups are left alone.
    fn make_adjacent(&mut self, a: ElementId, b: ElementId) {
        if a == b {
            return;
        }
        let Some(body) = self.diagram.group_body_mut(self.target) else {
            return;
        };
        let Some(pos_a) = body.children.iter().position(|&child| child == a) else {
            return;
        };
        let Some(pos_b) = body.children.iter().position(|&child| child == b) else {
            return;
        };
        let (anchor, moved) = if pos_a < pos_b {
            (pos_a, pos_b)
        } else {
            (pos_b, pos_a)
        };
        let element = body.children.remove(moved);
        body.children.insert(anchor + 1, element);
    }

    /// Bubble-sort the successors of child group `group` within the target's
    /// child list, keyed by the declaration order of the edges leaving the
    /// group for each successor. Keeps the first-declared exit edge from
    /// crossing the later ones.
    fn sort_group_successors(&mut self, group: ElementId) {
        let children = self.diagram.children(self.target).to_vec();
        let position = |id: ElementId| children.iter().position(|&child| child == id);
        let mut successors: Vec<ElementId> = self
            .child_nodes(group)
            .into_iter()
            .filter(|&succ| position(succ).is_some())
            .collect();
        successors.sort_by_key(|&succ| position(succ));

        for i in 0..successors.len() {
            for j in i + 1..successors.len() {
                let ordering = self.compare_exit_order(group, successors[i], successors[j]);
                if ordering == Ordering::Greater {
                    self.swap_positions(successors[i], successors[j]);
                    successors.swap(i, j);
                }
            }
        }
    }

    fn swap_positions(&mut self, a: ElementId, b: ElementId) {
        let Some(body) = self.diagram.group_body_mut(self.target) else {
            return;
        };
        let Some(pos_a) = body.children.iter().position(|&child| child == a) else {
            return;
        };
        let Some(pos_b) = body.children.iter().position(|&child| child == b) else {
            return;
        };
        body.children.swap(pos_a, pos_b);
    }

    /// Successors reached by an exit edge compare by the earliest such
    /// edge's declaration order; unreached successors sort last.
    fn compare_exit_order(&self, group: ElementId, a: ElementId, b: ElementId) -> Ordering {
        match (self.exit_order(group, a), self.exit_order(group, b)) {
            (Some(first), Some(second)) => first.cmp(&second),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Declaration order of the earliest unfolded pass edge leaving `group`
    /// for `successor`.
    fn exit_order(&self, group: ElementId, successor: ElementId) -> Option<u32> {
        let mut best: Option<u32> = None;
        for &eid in &self.edges {
            let edge = self.diagram.edge_ref(eid);
            if edge.folded
                || self.level_peer(edge.from) != Some(group)
                || self.level_peer(edge.to) != Some(successor)
            {
                continue;
            }
            best = Some(best.map_or(edge.order, |prev| prev.min(edge.order)));
        }
        best
    }
}
