//! Circular-reference detection.
//!
//! Column assignment pushes edge targets rightward forever if a cycle feeds
//! back into itself, so each pass first collects the cycles among its
//! children and later skips the edges that close them. Overlapping cycles
//! merge into one family; a family shares a single traversal order.

use super::LayoutPass;
use crate::diagram::ElementId;

impl LayoutPass<'_> {
    pub(super) fn detect_circulars(&mut self) {
        let children = self.diagram.children(self.target).to_vec();
        for &node in &children {
            if self.in_circular(node) {
                continue;
            }
            let mut path = vec![node];
            self.walk_circulars(node, &mut path);
        }
        self.merge_circulars();
    }

    fn in_circular(&self, node: ElementId) -> bool {
        self.circulars.iter().any(|family| family.contains(&node))
    }

    fn walk_circulars(&mut self, node: ElementId, path: &mut Vec<ElementId>) {
        for child in self.child_nodes(node) {
            if let Some(start) = path.iter().position(|&seen| seen == child) {
                self.circulars.push(path[start..].to_vec());
            } else {
                path.push(child);
                self.walk_circulars(child, path);
                path.pop();
            }
        }
    }

    fn merge_circulars(&mut self) {
        loop {
            let Some((keep, drop, union)) = self.find_overlap() else {
                break;
            };
            let absorbed = self.circulars.remove(drop);
            if union {
                for node in absorbed {
                    if !self.circulars[keep].contains(&node) {
                        self.circulars[keep].push(node);
                    }
                }
            }
        }
    }

    /// First pair of families sharing a member: `(keep, drop, union)` where
    /// `union` is false when `drop` is wholly contained in `keep`.
    fn find_overlap(&self) -> Option<(usize, usize, bool)> {
        for i in 0..self.circulars.len() {
            for j in 0..self.circulars.len() {
                if i == j {
                    continue;
                }
                let contained = self.circulars[j]
                    .iter()
                    .all(|node| self.circulars[i].contains(node));
                if contained {
                    let (keep, drop) = if i < j { (i, j) } else { (i - 1, j) };
                    return Some((keep, drop, false));
                }
                let overlaps = self.circulars[j]
                    .iter()
                    .any(|node| self.circulars[i].contains(node));
                if overlaps {
                    let (keep, drop) = if i < j { (i, j) } else { (i - 1, j) };
                    return Some((keep, drop, true));
                }
            }
        }
        None
    }

    /// True when the edge `n1 -> n2` closes a circular reference, i.e. both
    /// sit in one family and the family's traversal order puts `n1` after
    /// `n2`. The entry point is the member first reached from outside the
    /// cycle; with no outside parent, family order decides.
    pub(super) fn is_circular_ref(&self, n1: ElementId, n2: ElementId) -> bool {
        let Some(family) = self
            .circulars
            .iter()
            .find(|family| family.contains(&n1) && family.contains(&n2))
        else {
            return false;
        };
        let index = |node: ElementId| family.iter().position(|&member| member == node);

        let mut outside: Vec<ElementId> = Vec::new();
        for &member in family {
            for parent in self.parent_nodes(member) {
                if !family.contains(&parent) && !outside.contains(&parent) {
                    outside.push(parent);
                }
            }
        }
        outside.sort_by_key(|&parent| self.diagram.elem(parent).order);

        for parent in outside {
            let reached = self.child_nodes(parent);
            let hits_n1 = reached.contains(&n1);
            let hits_n2 = reached.contains(&n2);
            match (hits_n1, hits_n2) {
                (true, true) => return index(n1) > index(n2),
                (false, true) => return true,
                (true, false) => return false,
                (false, false) => {}
            }
        }
        index(n1) > index(n2)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::build_tree;
    use crate::ir::Stmt;

    use super::super::LayoutPass;

    fn pass_with(stmts: &[Stmt]) -> crate::diagram::Diagram {
        build_tree(stmts).unwrap()
    }

    #[test]
    fn overlapping_cycles_merge_into_one_family() {
        let mut diagram = pass_with(&[
            Stmt::chain(["A", "B", "C", "A"]),
            Stmt::chain(["B", "D", "B"]),
        ]);
        let root = diagram.root();
        let mut pass = LayoutPass::new(&mut diagram, root);
        pass.detect_circulars();
        assert_eq!(pass.circulars.len(), 1);
        assert_eq!(pass.circulars[0].len(), 4);
    }

    #[test]
    fn entry_point_decides_the_skipped_direction() {
        // X feeds the cycle at B, so B is the entry and C -> B closes it.
        let mut diagram = pass_with(&[Stmt::edge("X", "B"), Stmt::chain(["B", "C", "B"])]);
        let root = diagram.root();
        let b = diagram.find_node("B").unwrap();
        let c = diagram.find_node("C").unwrap();
        let mut pass = LayoutPass::new(&mut diagram, root);
        pass.detect_circulars();
        assert!(pass.is_circular_ref(c, b));
        assert!(!pass.is_circular_ref(b, c));
    }

    #[test]
    fn nodes_outside_any_cycle_are_never_circular() {
        let mut diagram = pass_with(&[Stmt::chain(["A", "B", "A"]), Stmt::edge("A", "C")]);
        let root = diagram.root();
        let a = diagram.find_node("A").unwrap();
        let c = diagram.find_node("C").unwrap();
        let mut pass = LayoutPass::new(&mut diagram, root);
        pass.detect_circulars();
        assert!(!pass.is_circular_ref(a, c));
        assert!(!pass.is_circular_ref(c, a));
    }
}
