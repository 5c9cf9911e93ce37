//! Graph elements and the per-build arena.
//!
//! A [`Diagram`] owns every element and edge of one build. Identity follows
//! the interning maps: asking for the same node/group id (or the same ordered
//! edge pair) twice always returns the same handle, and the maps live and die
//! with the arena, so independent builds never share state.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::trace;

use crate::error::DiagramError;

/// Handle to an element (node or group) in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u32);

/// Handle to an edge in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) u32);

/// Integer grid cell; `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XY {
    pub x: u32,
    pub y: u32,
}

impl XY {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn transposed(self) -> Self {
        Self {
            x: self.y,
            y: self.x,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineStyle {
    #[default]
    Solid,
    Dotted,
    Dashed,
}

impl LineStyle {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "solid" => Some(Self::Solid),
            "dotted" => Some(Self::Dotted),
            "dashed" => Some(Self::Dashed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Dotted => "dotted",
            Self::Dashed => "dashed",
        }
    }
}

/// Declared edge direction. This is presentational (arrowheads); layout
/// always flows from `from` to `to` as declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeDir {
    #[default]
    Forward,
    Back,
    Both,
    None,
}

impl EdgeDir {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "forward" | "->" => Some(Self::Forward),
            "back" | "<-" => Some(Self::Back),
            "both" | "<->" => Some(Self::Both),
            "none" | "--" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Back => "back",
            Self::Both => "both",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "landscape" => Some(Self::Landscape),
            "portrait" => Some(Self::Portrait),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Landscape => Self::Portrait,
            Self::Portrait => Self::Landscape,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }
}

/// Node-only presentation attributes.
#[derive(Debug, Clone, Default)]
pub struct NodeBody {
    pub style: LineStyle,
    pub numbered: Option<u32>,
    pub background: Option<PathBuf>,
    pub description: Option<String>,
}

/// Group-only state. The root diagram is a group with `name == None` and
/// `level == 0`.
#[derive(Debug, Clone)]
pub struct GroupBody {
    pub children: Vec<ElementId>,
    pub edges: Vec<EdgeId>,
    pub level: u32,
    pub separated: bool,
    pub orientation: Orientation,
}

impl GroupBody {
    fn new(level: u32) -> Self {
        Self {
            children: Vec::new(),
            edges: Vec::new(),
            level,
            separated: false,
            orientation: Orientation::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Node(NodeBody),
    Group(GroupBody),
}

/// A drawable element. Nodes and groups share the grid fields; the body
/// carries what is specific to each kind.
#[derive(Debug, Clone)]
pub struct Element {
    /// Source id; `None` only for the root diagram.
    pub name: Option<String>,
    pub label: String,
    pub xy: XY,
    pub width: u32,
    pub height: u32,
    pub order: u32,
    pub parent: Option<ElementId>,
    pub color: Option<String>,
    pub kind: ElementKind,
}

impl Element {
    fn new(name: Option<String>, kind: ElementKind) -> Self {
        let label = name.clone().unwrap_or_default();
        Self {
            name,
            label,
            xy: XY::default(),
            width: 1,
            height: 1,
            order: 0,
            parent: None,
            color: None,
            kind,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ElementKind::Group(_))
    }

    /// Display name used in error messages and dumps.
    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => "diagram",
        }
    }
}

/// One declared edge. At most one edge object exists per ordered
/// `(from, to)` pair; repeated declarations merge their attributes onto it.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: ElementId,
    pub to: ElementId,
    pub label: Option<String>,
    pub dir: EdgeDir,
    pub style: LineStyle,
    pub color: Option<String>,
    /// Excluded from layout pressure when set.
    pub folded: bool,
    /// Computed at finalization: endpoints are not grid-adjacent, so the
    /// renderer must route the line around other cells.
    pub skipped: bool,
    /// Declaration index, stable across the build.
    pub order: u32,
}

/// Diagram-level render metrics, settable through diagram attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub node_width: u32,
    pub node_height: u32,
    pub span_width: u32,
    pub span_height: u32,
    pub fontsize: u32,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            node_width: 128,
            node_height: 40,
            span_width: 64,
            span_height: 40,
            fontsize: 11,
        }
    }
}

/// The element/edge arena for one build.
#[derive(Debug, Clone)]
pub struct Diagram {
    elements: Vec<Element>,
    edges: Vec<Edge>,
    root: ElementId,
    node_ids: HashMap<String, ElementId>,
    group_ids: HashMap<String, ElementId>,
    edge_ids: HashMap<(ElementId, ElementId), EdgeId>,
    pub metrics: Metrics,
}

impl Default for Diagram {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagram {
    pub fn new() -> Self {
        let root = Element::new(None, ElementKind::Group(GroupBody::new(0)));
        Self {
            elements: vec![root],
            edges: Vec::new(),
            root: ElementId(0),
            node_ids: HashMap::new(),
            group_ids: HashMap::new(),
            edge_ids: HashMap::new(),
            metrics: Metrics::default(),
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn elem(&self, id: ElementId) -> &Element {
        &self.elements[id.0 as usize]
    }

    pub(crate) fn elem_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0 as usize]
    }

    pub fn edge_ref(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.0 as usize]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_handles(&self) -> impl Iterator<Item = EdgeId> + use<> {
        (0..self.edges.len()).map(|i| EdgeId(i as u32))
    }

    pub fn find_node(&self, id: &str) -> Option<ElementId> {
        self.node_ids.get(id).copied()
    }

    pub fn find_group(&self, id: &str) -> Option<ElementId> {
        self.group_ids.get(id).copied()
    }

    pub fn find_edge(&self, from: ElementId, to: ElementId) -> Option<EdgeId> {
        self.edge_ids.get(&(from, to)).copied()
    }

    /// Get-or-create the node interned under `id`. Returns the handle and
    /// whether it was created by this call.
    pub fn node(&mut self, id: &str) -> (ElementId, bool) {
        if let Some(found) = self.node_ids.get(id) {
            return (*found, false);
        }
        let handle = ElementId(self.elements.len() as u32);
        self.elements.push(Element::new(
            Some(id.to_string()),
            ElementKind::Node(NodeBody::default()),
        ));
        self.node_ids.insert(id.to_string(), handle);
        (handle, true)
    }

    /// Get-or-create the group interned under `id`. Groups and nodes intern
    /// in separate namespaces, so a group may share an id with a node.
    pub fn group(&mut self, id: &str) -> (ElementId, bool) {
        if let Some(found) = self.group_ids.get(id) {
            return (*found, false);
        }
        let handle = ElementId(self.elements.len() as u32);
        self.elements.push(Element::new(
            Some(id.to_string()),
            ElementKind::Group(GroupBody::new(0)),
        ));
        self.group_ids.insert(id.to_string(), handle);
        (handle, true)
    }

    /// Get-or-create the edge for the ordered pair `(from, to)`.
    pub fn edge(&mut self, from: ElementId, to: ElementId) -> (EdgeId, bool) {
        if let Some(found) = self.edge_ids.get(&(from, to)) {
            return (*found, false);
        }
        let handle = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            from,
            to,
            label: None,
            dir: EdgeDir::default(),
            style: LineStyle::default(),
            color: None,
            folded: false,
            skipped: false,
            order: handle.0,
        });
        self.edge_ids.insert((from, to), handle);
        (handle, true)
    }

    pub fn group_body(&self, id: ElementId) -> Option<&GroupBody> {
        match &self.elem(id).kind {
            ElementKind::Group(body) => Some(body),
            ElementKind::Node(_) => None,
        }
    }

    pub(crate) fn group_body_mut(&mut self, id: ElementId) -> Option<&mut GroupBody> {
        match &mut self.elem_mut(id).kind {
            ElementKind::Group(body) => Some(body),
            ElementKind::Node(_) => None,
        }
    }

    pub fn node_body(&self, id: ElementId) -> Option<&NodeBody> {
        match &self.elem(id).kind {
            ElementKind::Node(body) => Some(body),
            ElementKind::Group(_) => None,
        }
    }

    pub(crate) fn node_body_mut(&mut self, id: ElementId) -> Option<&mut NodeBody> {
        match &mut self.elem_mut(id).kind {
            ElementKind::Node(body) => Some(body),
            ElementKind::Group(_) => None,
        }
    }

    /// Direct children of a group, empty for nodes.
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        match &self.elem(id).kind {
            ElementKind::Group(body) => &body.children,
            ElementKind::Node(_) => &[],
        }
    }

    /// Nesting depth: a group's own level, or for a node the level of its
    /// owning group.
    pub fn level(&self, id: ElementId) -> u32 {
        match &self.elem(id).kind {
            ElementKind::Group(body) => body.level,
            ElementKind::Node(_) => self.elem(id).parent.map(|p| self.level(p)).unwrap_or(0),
        }
    }

    /// Depth-first listing of every drawable element below `from`.
    /// With `preorder` a group precedes its descendants, otherwise it
    /// follows them.
    pub fn traverse_elements(&self, from: ElementId, preorder: bool) -> Vec<ElementId> {
        let mut out = Vec::new();
        self.collect_elements(from, preorder, &mut out);
        out
    }

    fn collect_elements(&self, at: ElementId, preorder: bool, out: &mut Vec<ElementId>) {
        for &child in self.children(at) {
            if preorder {
                out.push(child);
            }
            if self.elem(child).is_group() {
                self.collect_elements(child, preorder, out);
            }
            if !preorder {
                out.push(child);
            }
        }
    }

    /// All nodes in the subtree below `from`, depth-first.
    pub fn traverse_nodes(&self, from: ElementId) -> Vec<ElementId> {
        self.traverse_elements(from, true)
            .into_iter()
            .filter(|id| !self.elem(*id).is_group())
            .collect()
    }

    /// All groups strictly below `from`.
    pub fn traverse_groups(&self, from: ElementId, preorder: bool) -> Vec<ElementId> {
        self.traverse_elements(from, preorder)
            .into_iter()
            .filter(|id| self.elem(*id).is_group())
            .collect()
    }

    /// Renumber `order` over a flattened preorder traversal from `from`.
    pub(crate) fn update_order(&mut self, from: ElementId) {
        let mut next = 0u32;
        self.elem_mut(from).order = next;
        for id in self.traverse_elements(from, true) {
            next += 1;
            self.elem_mut(id).order = next;
        }
    }

    /// Ancestor chain of `id`, nearest first, ending at the root.
    pub(crate) fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut cursor = self.elem(id).parent;
        while let Some(parent) = cursor {
            out.push(parent);
            cursor = self.elem(parent).parent;
        }
        out
    }

    pub(crate) fn is_ancestor(&self, ancestor: ElementId, of: ElementId) -> bool {
        self.ancestors(of).contains(&ancestor)
    }

    /// Deepest group containing both endpoints.
    pub(crate) fn common_ancestor(&self, a: ElementId, b: ElementId) -> ElementId {
        let above_a: HashSet<ElementId> = self.ancestors(a).into_iter().collect();
        for candidate in self.ancestors(b) {
            if above_a.contains(&candidate) {
                return candidate;
            }
        }
        self.root
    }

    /// Rebind every edge to the deepest group owning both endpoints. An edge
    /// crossing group boundaries lands on the nearest common ancestor, not
    /// on either child group.
    pub(crate) fn bind_edges(&mut self) {
        let groups: Vec<ElementId> = std::iter::once(self.root)
            .chain(self.traverse_groups(self.root, true))
            .collect();
        for group in groups {
            if let Some(body) = self.group_body_mut(group) {
                body.edges.clear();
            }
        }
        for eid in self.edge_handles().collect::<Vec<_>>() {
            let edge = self.edge_ref(eid);
            let owner = self.common_ancestor(edge.from, edge.to);
            if let Some(body) = self.group_body_mut(owner) {
                body.edges.push(eid);
            }
        }
    }

    /// Drop every edge and group binding; used by the separate-diagram
    /// decomposer before rebuilding edges at a coarser granularity.
    pub(crate) fn clear_edges(&mut self) {
        self.edges.clear();
        self.edge_ids.clear();
        let groups: Vec<ElementId> = std::iter::once(self.root)
            .chain(self.traverse_groups(self.root, true))
            .collect();
        for group in groups {
            if let Some(body) = self.group_body_mut(group) {
                body.edges.clear();
            }
        }
    }

    /// Compute extents bottom-up and, unless `only_groups` is set, convert
    /// group-relative coordinates into absolute ones. A `separated` group
    /// collapses to a 1x1 placeholder: its children keep coordinates in the
    /// group's own frame for the inner rendering, with nested subgroups
    /// flattened into that frame so every descendant shares it. The root
    /// never short-circuits.
    pub(crate) fn fixiate(&mut self, target: ElementId, only_groups: bool) {
        let Some(body) = self.group_body(target) else {
            return;
        };
        if body.separated && target != self.root {
            let kids: Vec<ElementId> = body.children.clone();
            let elem = self.elem_mut(target);
            elem.width = 1;
            elem.height = 1;
            if !only_groups {
                for &kid in &kids {
                    if self.elem(kid).is_group() {
                        self.fixiate(kid, only_groups);
                    }
                }
            }
            return;
        }
        let kids: Vec<ElementId> = body.children.clone();

        let mut width = 0;
        let mut height = 0;
        for &kid in &kids {
            let elem = self.elem(kid);
            width = width.max(elem.xy.x + elem.width);
            height = height.max(elem.xy.y + elem.height);
        }
        if target == self.root {
            width = width.max(1);
            height = height.max(1);
        }
        let origin = {
            let elem = self.elem_mut(target);
            elem.width = width;
            elem.height = height;
            elem.xy
        };

        if !only_groups {
            for &kid in &kids {
                let elem = self.elem_mut(kid);
                elem.xy = XY::new(elem.xy.x + origin.x, elem.xy.y + origin.y);
            }
        }
        for &kid in &kids {
            if self.elem(kid).is_group() {
                self.fixiate(kid, only_groups);
            }
        }
    }

    /// Finalize a laid-out diagram: absolute coordinates everywhere, then
    /// skipped-edge classification from the absolute grid.
    pub(crate) fn finalize(&mut self) -> Result<(), DiagramError> {
        self.fixiate(self.root, false);
        self.compute_skipped()?;
        trace!(
            "finalized diagram: {}x{} cells, {} elements, {} edges",
            self.elem(self.root).width,
            self.elem(self.root).height,
            self.elements.len() - 1,
            self.edges.len()
        );
        Ok(())
    }

    fn compute_skipped(&mut self) -> Result<(), DiagramError> {
        for eid in self.edge_handles().collect::<Vec<_>>() {
            let edge = self.edge_ref(eid);
            if edge.from == edge.to {
                self.edge_mut(eid).skipped = false;
                continue;
            }
            let a = self.elem(edge.from);
            let b = self.elem(edge.to);
            let a_rect = (a.xy, a.width, a.height);
            let b_rect = (b.xy, b.width, b.height);
            if rects_intersect(a_rect, b_rect)
                && !self.is_ancestor(edge.from, edge.to)
                && !self.is_ancestor(edge.to, edge.from)
            {
                return Err(DiagramError::LayoutInvariant {
                    from: a.display_name().to_string(),
                    to: b.display_name().to_string(),
                });
            }
            let skipped = !rects_adjacent(a_rect, b_rect);
            self.edge_mut(eid).skipped = skipped;
        }
        Ok(())
    }
}

type Rect = (XY, u32, u32);

fn rects_intersect((a_xy, a_w, a_h): Rect, (b_xy, b_w, b_h): Rect) -> bool {
    a_xy.x < b_xy.x + b_w
        && b_xy.x < a_xy.x + a_w
        && a_xy.y < b_xy.y + b_h
        && b_xy.y < a_xy.y + a_h
}

/// Grid adjacency: the cells sit in touching columns (either direction), or
/// in touching rows with overlapping column extents. Anything further apart
/// needs a routed line.
fn rects_adjacent((a_xy, a_w, a_h): Rect, (b_xy, b_w, b_h): Rect) -> bool {
    if b_xy.x == a_xy.x + a_w || a_xy.x == b_xy.x + b_w {
        return true;
    }
    let columns_overlap = a_xy.x < b_xy.x + b_w && b_xy.x < a_xy.x + a_w;
    columns_overlap && (b_xy.y == a_xy.y + a_h || a_xy.y == b_xy.y + b_h)
}
