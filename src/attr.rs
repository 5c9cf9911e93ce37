//! Attribute validation and application.
//!
//! Each element kind recognizes a closed set of attribute names. Unknown
//! names are fatal; a recognized name with an unparseable enum value
//! (style, dir) is warned about and ignored, leaving the default in place.

use std::path::PathBuf;

use log::warn;

use crate::diagram::{Diagram, EdgeDir, EdgeId, ElementId, LineStyle, Orientation};
use crate::error::DiagramError;
use crate::ir::Attr;

fn parse_positive(element: &'static str, attr: &Attr) -> Result<u32, DiagramError> {
    match attr.value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(DiagramError::InvalidAttributeValue {
            element,
            name: attr.name.clone(),
            value: attr.value.clone(),
        }),
    }
}

pub(crate) fn set_node_attr(
    diagram: &mut Diagram,
    node: ElementId,
    attr: &Attr,
) -> Result<(), DiagramError> {
    match attr.name.as_str() {
        "label" => diagram.elem_mut(node).label = attr.value.clone(),
        "color" => diagram.elem_mut(node).color = Some(attr.value.clone()),
        "style" => match LineStyle::from_token(&attr.value) {
            Some(style) => {
                if let Some(body) = diagram.node_body_mut(node) {
                    body.style = style;
                }
            }
            None => warn!("unknown node style '{}', ignored", attr.value),
        },
        "numbered" => {
            let badge = parse_positive("node", attr)?;
            if let Some(body) = diagram.node_body_mut(node) {
                body.numbered = Some(badge);
            }
        }
        "background" => {
            let path = PathBuf::from(&attr.value);
            if path.exists() {
                if let Some(body) = diagram.node_body_mut(node) {
                    body.background = Some(path);
                }
            } else {
                warn!("background image not found: {}", attr.value);
            }
        }
        "description" => {
            if let Some(body) = diagram.node_body_mut(node) {
                body.description = Some(attr.value.clone());
            }
        }
        "width" => diagram.elem_mut(node).width = parse_positive("node", attr)?,
        "height" => diagram.elem_mut(node).height = parse_positive("node", attr)?,
        // Ownership was already resolved by the builder's implicit-subgraph
        // rewrite; nothing left to apply here.
        "group" => {}
        _ => {
            return Err(DiagramError::UnknownAttribute {
                element: "node",
                name: attr.name.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn set_group_attr(
    diagram: &mut Diagram,
    group: ElementId,
    attr: &Attr,
) -> Result<(), DiagramError> {
    match attr.name.as_str() {
        "label" => diagram.elem_mut(group).label = attr.value.clone(),
        "color" => diagram.elem_mut(group).color = Some(attr.value.clone()),
        "orientation" => match Orientation::from_token(&attr.value) {
            Some(orientation) => {
                if let Some(body) = diagram.group_body_mut(group) {
                    body.orientation = orientation;
                }
            }
            None => warn!("unknown orientation '{}', ignored", attr.value),
        },
        _ => {
            return Err(DiagramError::UnknownAttribute {
                element: "group",
                name: attr.name.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn set_diagram_attr(
    diagram: &mut Diagram,
    attr: &Attr,
) -> Result<(), DiagramError> {
    match attr.name.as_str() {
        "node_width" => diagram.metrics.node_width = parse_positive("diagram", attr)?,
        "node_height" => diagram.metrics.node_height = parse_positive("diagram", attr)?,
        "span_width" => diagram.metrics.span_width = parse_positive("diagram", attr)?,
        "span_height" => diagram.metrics.span_height = parse_positive("diagram", attr)?,
        "fontsize" => diagram.metrics.fontsize = parse_positive("diagram", attr)?,
        "label" | "color" | "orientation" => {
            let root = diagram.root();
            set_group_attr(diagram, root, attr)?;
        }
        _ => {
            return Err(DiagramError::UnknownAttribute {
                element: "diagram",
                name: attr.name.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn set_edge_attr(
    diagram: &mut Diagram,
    edge: EdgeId,
    attr: &Attr,
) -> Result<(), DiagramError> {
    match attr.name.as_str() {
        "label" => diagram.edge_mut(edge).label = Some(attr.value.clone()),
        "color" => diagram.edge_mut(edge).color = Some(attr.value.clone()),
        "dir" => match EdgeDir::from_token(&attr.value) {
            Some(dir) => diagram.edge_mut(edge).dir = dir,
            None => warn!("unknown edge dir '{}', ignored", attr.value),
        },
        "style" => match LineStyle::from_token(&attr.value) {
            Some(style) => diagram.edge_mut(edge).style = style,
            None => warn!("unknown edge style '{}', ignored", attr.value),
        },
        "folded" => diagram.edge_mut(edge).folded = true,
        "nofolded" => diagram.edge_mut(edge).folded = false,
        _ => {
            return Err(DiagramError::UnknownAttribute {
                element: "edge",
                name: attr.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Attr;

    #[test]
    fn unknown_node_attribute_is_fatal() {
        let mut diagram = Diagram::new();
        let (node, _) = diagram.node("A");
        let err = set_node_attr(&mut diagram, node, &Attr::new("wrongattr", "1")).unwrap_err();
        assert!(matches!(err, DiagramError::UnknownAttribute { .. }));
    }

    #[test]
    fn bad_style_value_is_ignored() {
        let mut diagram = Diagram::new();
        let (node, _) = diagram.node("A");
        set_node_attr(&mut diagram, node, &Attr::new("style", "wavy")).unwrap();
        assert_eq!(diagram.node_body(node).unwrap().style, LineStyle::Solid);
    }

    #[test]
    fn size_attributes_must_be_positive_integers() {
        let mut diagram = Diagram::new();
        let (node, _) = diagram.node("A");
        set_node_attr(&mut diagram, node, &Attr::new("width", "3")).unwrap();
        assert_eq!(diagram.elem(node).width, 3);
        let err = set_node_attr(&mut diagram, node, &Attr::new("width", "0")).unwrap_err();
        assert!(matches!(err, DiagramError::InvalidAttributeValue { .. }));
        let err = set_diagram_attr(&mut diagram, &Attr::new("fontsize", "big")).unwrap_err();
        assert!(matches!(err, DiagramError::InvalidAttributeValue { .. }));
    }

    #[test]
    fn edge_dir_accepts_symbolic_tokens() {
        let mut diagram = Diagram::new();
        let (a, _) = diagram.node("A");
        let (b, _) = diagram.node("B");
        let (edge, _) = diagram.edge(a, b);
        set_edge_attr(&mut diagram, edge, &Attr::new("dir", "<->")).unwrap();
        assert_eq!(diagram.edge_ref(edge).dir, EdgeDir::Both);
        set_edge_attr(&mut diagram, edge, &Attr::new("dir", "--")).unwrap();
        assert_eq!(diagram.edge_ref(edge).dir, EdgeDir::None);
    }
}
