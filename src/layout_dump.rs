use crate::diagram::Diagram;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub orientation: String,
    pub width: u32,
    pub height: u32,
    pub node_width: u32,
    pub node_height: u32,
    pub span_width: u32,
    pub span_height: u32,
    pub fontsize: u32,
    pub nodes: Vec<NodeDump>,
    pub groups: Vec<GroupDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub order: u32,
    pub group: Option<String>,
    pub style: String,
    pub color: Option<String>,
    pub numbered: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GroupDump {
    pub id: String,
    pub label: String,
    pub level: u32,
    pub separated: bool,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub dir: String,
    pub style: String,
    pub label: Option<String>,
    pub folded: bool,
    pub skipped: bool,
}

impl LayoutDump {
    pub fn from_diagram(diagram: &Diagram) -> Self {
        let root = diagram.root();

        let nodes = diagram
            .traverse_nodes(root)
            .into_iter()
            .filter_map(|id| {
                let elem = diagram.elem(id);
                let body = diagram.node_body(id)?;
                Some(NodeDump {
                    id: elem.display_name().to_string(),
                    label: elem.label.clone(),
                    x: elem.xy.x,
                    y: elem.xy.y,
                    width: elem.width,
                    height: elem.height,
                    order: elem.order,
                    group: elem
                        .parent
                        .filter(|&parent| parent != root)
                        .map(|parent| diagram.elem(parent).display_name().to_string()),
                    style: body.style.as_str().to_string(),
                    color: elem.color.clone(),
                    numbered: body.numbered,
                })
            })
            .collect();

        let groups = diagram
            .traverse_groups(root, true)
            .into_iter()
            .filter_map(|id| {
                let elem = diagram.elem(id);
                let body = diagram.group_body(id)?;
                Some(GroupDump {
                    id: elem.display_name().to_string(),
                    label: elem.label.clone(),
                    level: body.level,
                    separated: body.separated,
                    x: elem.xy.x,
                    y: elem.xy.y,
                    width: elem.width,
                    height: elem.height,
                    nodes: body
                        .children
                        .iter()
                        .map(|&child| diagram.elem(child).display_name().to_string())
                        .collect(),
                    color: elem.color.clone(),
                })
            })
            .collect();

        let edges = diagram
            .edge_handles()
            .map(|eid| {
                let edge = diagram.edge_ref(eid);
                EdgeDump {
                    from: diagram.elem(edge.from).display_name().to_string(),
                    to: diagram.elem(edge.to).display_name().to_string(),
                    dir: edge.dir.as_str().to_string(),
                    style: edge.style.as_str().to_string(),
                    label: edge.label.clone(),
                    folded: edge.folded,
                    skipped: edge.skipped,
                }
            })
            .collect();

        LayoutDump {
            orientation: diagram
                .group_body(root)
                .map(|body| body.orientation.as_str().to_string())
                .unwrap_or_default(),
            width: diagram.elem(root).width,
            height: diagram.elem(root).height,
            node_width: diagram.metrics.node_width,
            node_height: diagram.metrics.node_height,
            span_width: diagram.metrics.span_width,
            span_height: diagram.metrics.span_height,
            fontsize: diagram.metrics.fontsize,
            nodes,
            groups,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, diagram: &Diagram) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_diagram(diagram);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
