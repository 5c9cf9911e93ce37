//! Tree-to-graph builder.
//!
//! Walks the parsed statement tree into a [`Diagram`] arena: nodes, edges
//! and groups are interned on first reference, ownership conflicts between
//! groups are resolved (or rejected), empty groups are pruned, and every
//! edge is bound to the deepest group owning both endpoints.

use log::debug;

use crate::attr;
use crate::diagram::{Diagram, ElementId};
use crate::error::DiagramError;
use crate::ir::{Attr, DefaultsTarget, EdgeStmt, GroupStmt, NodeStmt, Stmt};

pub(crate) fn build_tree(stmts: &[Stmt]) -> Result<Diagram, DiagramError> {
    let mut builder = Builder::new();
    let root = builder.diagram.root();
    builder.instantiate(root, stmts)?;
    builder.finish()
}

struct Builder {
    diagram: Diagram,
    node_defaults: Vec<Attr>,
    edge_defaults: Vec<Attr>,
}

impl Builder {
    fn new() -> Self {
        Self {
            diagram: Diagram::new(),
            node_defaults: Vec::new(),
            edge_defaults: Vec::new(),
        }
    }

    fn instantiate(&mut self, group: ElementId, stmts: &[Stmt]) -> Result<(), DiagramError> {
        for stmt in stmts {
            match stmt {
                Stmt::Attr(attr) => self.set_group_level_attr(group, attr)?,
                Stmt::Node(node) => self.instantiate_node(group, node)?,
                Stmt::Group(sub) => self.instantiate_group(group, sub)?,
                Stmt::Edge(edge) => self.instantiate_edge(group, edge)?,
                Stmt::Defaults(defaults) => match defaults.target {
                    DefaultsTarget::Diagram => {
                        for attr in &defaults.attrs {
                            self.set_group_level_attr(group, attr)?;
                        }
                    }
                    DefaultsTarget::Node => self.node_defaults.extend_from_slice(&defaults.attrs),
                    DefaultsTarget::Edge => self.edge_defaults.extend_from_slice(&defaults.attrs),
                },
            }
        }
        Ok(())
    }

    fn set_group_level_attr(&mut self, group: ElementId, attr: &Attr) -> Result<(), DiagramError> {
        if group == self.diagram.root() {
            attr::set_diagram_attr(&mut self.diagram, attr)
        } else {
            attr::set_group_attr(&mut self.diagram, group, attr)
        }
    }

    fn instantiate_node(&mut self, group: ElementId, stmt: &NodeStmt) -> Result<(), DiagramError> {
        // `A [group = g]` behaves like `group g { A }`; rewrite it into an
        // implicit one-node subgraph unless it names the enclosing group.
        if let Some(target) = stmt
            .attrs
            .iter()
            .find(|attr| attr.name == "group")
            .map(|attr| attr.value.clone())
        {
            let enclosing = self.diagram.elem(group).name.clone();
            if enclosing.as_deref() != Some(target.as_str()) {
                let implicit = GroupStmt {
                    id: target,
                    stmts: vec![Stmt::Node(NodeStmt {
                        id: stmt.id.clone(),
                        attrs: stmt
                            .attrs
                            .iter()
                            .filter(|attr| attr.name != "group")
                            .cloned()
                            .collect(),
                    })],
                };
                return self.instantiate_group(group, &implicit);
            }
        }

        let node = self.create_node(&stmt.id)?;
        self.belong_to(node, group)?;
        for attr in &stmt.attrs {
            attr::set_node_attr(&mut self.diagram, node, attr)?;
        }
        Ok(())
    }

    fn create_node(&mut self, id: &str) -> Result<ElementId, DiagramError> {
        let (node, created) = self.diagram.node(id);
        if created {
            for attr in self.node_defaults.clone() {
                attr::set_node_attr(&mut self.diagram, node, &attr)?;
            }
        }
        Ok(node)
    }

    fn instantiate_group(&mut self, parent: ElementId, stmt: &GroupStmt) -> Result<(), DiagramError> {
        let (child, created) = self.diagram.group(&stmt.id);
        if created {
            // Parent link first, membership later: statements inside the
            // group may re-home a node out of `parent`, and the vacated slot
            // is where this group should appear.
            self.diagram.elem_mut(child).parent = Some(parent);
        } else {
            self.belong_to(child, parent)?;
        }
        self.instantiate(child, &stmt.stmts)?;
        if !self.diagram.children(parent).contains(&child) {
            if let Some(body) = self.diagram.group_body_mut(parent) {
                body.children.push(child);
            }
        }
        Ok(())
    }

    fn instantiate_edge(&mut self, group: ElementId, stmt: &EdgeStmt) -> Result<(), DiagramError> {
        let mut sets: Vec<Vec<ElementId>> = Vec::with_capacity(stmt.points.len());
        for point in &stmt.points {
            let mut resolved = Vec::with_capacity(point.len());
            for id in point {
                let node = self.create_node(id)?;
                self.belong_to(node, group)?;
                resolved.push(node);
            }
            sets.push(resolved);
        }

        // A chain expands hop by hop; each hop's targets become the next
        // hop's sources.
        for hop in sets.windows(2) {
            for &from in &hop[0] {
                for &to in &hop[1] {
                    let (edge, created) = self.diagram.edge(from, to);
                    if created {
                        for attr in self.edge_defaults.clone() {
                            attr::set_edge_attr(&mut self.diagram, edge, &attr)?;
                        }
                    }
                    for attr in &stmt.attrs {
                        attr::set_edge_attr(&mut self.diagram, edge, attr)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Assign `elem` to `group`, resolving a competing claim by an earlier
    /// group. The deeper (more specific) group wins; moving a node down
    /// leaves the subgroup chain's top in the vacated slot so sibling order
    /// survives. Claims from unrelated groups are a structural error.
    fn belong_to(&mut self, elem: ElementId, group: ElementId) -> Result<(), DiagramError> {
        match self.diagram.elem(elem).parent {
            None => {
                self.adopt(elem, group);
                Ok(())
            }
            Some(old) if old == group => {
                self.adopt(elem, group);
                Ok(())
            }
            Some(old) => {
                if self.diagram.is_ancestor(old, group) {
                    let slot = self
                        .diagram
                        .children(old)
                        .iter()
                        .position(|&c| c == elem);
                    if let Some(slot) = slot {
                        let top = self.chain_top(group, old);
                        if let Some(body) = self.diagram.group_body_mut(old) {
                            body.children.remove(slot);
                            if !body.children.contains(&top) {
                                body.children.insert(slot, top);
                            }
                        }
                    }
                    self.adopt(elem, group);
                } else if self.diagram.is_ancestor(group, old) {
                    // Already owned by a more specific group; keep it.
                } else {
                    return Err(DiagramError::OwnershipConflict {
                        node: self.diagram.elem(elem).display_name().to_string(),
                        first: self.diagram.elem(old).display_name().to_string(),
                        second: self.diagram.elem(group).display_name().to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    fn adopt(&mut self, elem: ElementId, group: ElementId) {
        self.diagram.elem_mut(elem).parent = Some(group);
        if !self.diagram.children(group).contains(&elem) {
            if let Some(body) = self.diagram.group_body_mut(group) {
                body.children.push(elem);
            }
        }
    }

    /// The ancestor of `from` (or `from` itself) whose parent is `old`.
    fn chain_top(&self, mut from: ElementId, old: ElementId) -> ElementId {
        while let Some(parent) = self.diagram.elem(from).parent {
            if parent == old {
                break;
            }
            from = parent;
        }
        from
    }

    fn finish(mut self) -> Result<Diagram, DiagramError> {
        self.prune_empty_groups();
        self.renumber_levels(self.diagram.root(), 0);
        self.diagram.bind_edges();
        let root = self.diagram.root();
        self.diagram.update_order(root);
        debug!(
            "built diagram graph: {} nodes, {} groups, {} edges",
            self.diagram.traverse_nodes(root).len(),
            self.diagram.traverse_groups(root, true).len(),
            self.diagram.edge_count()
        );
        Ok(self.diagram)
    }

    fn prune_empty_groups(&mut self) {
        loop {
            let root = self.diagram.root();
            let empty: Vec<ElementId> = self
                .diagram
                .traverse_groups(root, false)
                .into_iter()
                .filter(|&g| self.diagram.children(g).is_empty())
                .collect();
            if empty.is_empty() {
                break;
            }
            for group in empty {
                if let Some(parent) = self.diagram.elem(group).parent {
                    if let Some(body) = self.diagram.group_body_mut(parent) {
                        body.children.retain(|&c| c != group);
                    }
                }
                self.diagram.elem_mut(group).parent = None;
            }
        }
    }

    fn renumber_levels(&mut self, group: ElementId, level: u32) {
        if let Some(body) = self.diagram.group_body_mut(group) {
            body.level = level;
        }
        for child in self.diagram.children(group).to_vec() {
            if self.diagram.elem(child).is_group() {
                self.renumber_levels(child, level + 1);
            }
        }
    }
}
