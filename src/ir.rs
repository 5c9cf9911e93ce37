//! Statement-tree input model.
//!
//! This is the contract with the external text parser: a diagram source is
//! delivered as a flat list of typed statements, attribute values already
//! unquoted. The builder consumes this tree; nothing here carries layout
//! state.

/// A single `name = value` attribute pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Which element kind a `Defaults` statement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultsTarget {
    Diagram,
    Node,
    Edge,
}

impl DefaultsTarget {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "diagram" | "graph" => Some(Self::Diagram),
            "node" => Some(Self::Node),
            "edge" => Some(Self::Edge),
            _ => None,
        }
    }
}

/// A node declaration: `A [label = "..."]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStmt {
    pub id: String,
    pub attrs: Vec<Attr>,
}

/// An edge declaration. `points` holds one id set per chain position, so
/// `A, B -> C -> D` becomes `[[A, B], [C], [D]]`; every consecutive pair of
/// sets is expanded into from-set x to-set edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeStmt {
    pub points: Vec<Vec<String>>,
    pub attrs: Vec<Attr>,
}

/// A subgraph declaration: `group g { ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStmt {
    pub id: String,
    pub stmts: Vec<Stmt>,
}

/// A default-attribute declaration: `node { style = dashed }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultsStmt {
    pub target: DefaultsTarget,
    pub attrs: Vec<Attr>,
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Node(NodeStmt),
    Edge(EdgeStmt),
    Group(GroupStmt),
    Defaults(DefaultsStmt),
    /// A bare `name = value` pair inside a diagram or group body, setting an
    /// attribute on the enclosing group itself.
    Attr(Attr),
}

impl Stmt {
    pub fn node(id: impl Into<String>) -> Self {
        Self::Node(NodeStmt {
            id: id.into(),
            attrs: Vec::new(),
        })
    }

    pub fn node_with(id: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Self::Node(NodeStmt {
            id: id.into(),
            attrs,
        })
    }

    /// A plain chain `A -> B -> C` with one node per position.
    pub fn chain<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Edge(EdgeStmt {
            points: ids.into_iter().map(|id| vec![id.into()]).collect(),
            attrs: Vec::new(),
        })
    }

    pub fn chain_with<I, S>(ids: I, attrs: Vec<Attr>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Edge(EdgeStmt {
            points: ids.into_iter().map(|id| vec![id.into()]).collect(),
            attrs,
        })
    }

    pub fn edge(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::chain([from.into(), to.into()])
    }

    pub fn group(id: impl Into<String>, stmts: Vec<Stmt>) -> Self {
        Self::Group(GroupStmt {
            id: id.into(),
            stmts,
        })
    }

    pub fn attr(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attr(Attr::new(name, value))
    }

    pub fn defaults(target: DefaultsTarget, attrs: Vec<Attr>) -> Self {
        Self::Defaults(DefaultsStmt { target, attrs })
    }
}
