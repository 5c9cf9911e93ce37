pub mod attr;
pub mod builder;
pub mod diagram;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod separate;

pub use diagram::{
    Diagram, Edge, EdgeDir, EdgeId, Element, ElementId, LineStyle, Metrics, Orientation, XY,
};
pub use error::DiagramError;
pub use ir::{Attr, DefaultsTarget, Stmt};

/// Build and lay out one diagram from a parsed statement tree.
pub fn build(stmts: &[Stmt]) -> Result<Diagram, DiagramError> {
    let mut diagram = builder::build_tree(stmts)?;
    layout::layout(&mut diagram);
    diagram.finalize()?;
    Ok(diagram)
}

/// Build in separate mode: one context diagram per group, then the
/// residual top-level diagram.
pub fn build_separate(stmts: &[Stmt]) -> Result<Vec<Diagram>, DiagramError> {
    separate::separate(stmts)
}
