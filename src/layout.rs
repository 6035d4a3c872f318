//! Screen geometry for flow graphs.
//!
//! `sankey` places the two value columns of a [`FlowGraph`] on the left and
//! right of the viewport with heights proportional to aggregate counts.
//! `chord` lays source values on the left half of a circle and target values
//! on the right half. Angles follow the SVG chord convention: zero at twelve
//! o'clock, increasing clockwise.

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::binning::TenureBucket;
use crate::flow::{FlowGraph, Side, SYNTHETIC_WEIGHT};
use crate::models::Attribute;

pub const NODE_WIDTH: f64 = 24.0;
pub const NODE_PADDING: f64 = 24.0;
pub const CHORD_GAP: f64 = PI * 0.06;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1100.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

pub const SANKEY_MARGINS: Margins = Margins {
    top: 20.0,
    right: 180.0,
    bottom: 20.0,
    left: 180.0,
};

pub const CHORD_MARGINS: Margins = Margins {
    top: 60.0,
    right: 60.0,
    bottom: 80.0,
    left: 60.0,
};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeBox {
    pub id: String,
    pub label: String,
    pub attribute: Option<Attribute>,
    pub side: Side,
    pub count: usize,
    pub synthetic: bool,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl NodeBox {
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn center_y(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }
}

/// A link band. `y0`/`y1` are the centre line at the source and target ends.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkBand {
    pub source: String,
    pub target: String,
    pub source_label: String,
    pub target_label: String,
    pub count: usize,
    pub synthetic: bool,
    pub width: f64,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

/// Coordinates are relative to the chart area inside `margins`.
#[derive(Debug, Clone, PartialEq)]
pub struct SankeyLayout {
    pub viewport: Viewport,
    pub margins: Margins,
    pub scale: f64,
    pub nodes: Vec<NodeBox>,
    pub links: Vec<LinkBand>,
}

fn chart_size(viewport: Viewport, margins: Margins) -> (f64, f64) {
    let width = (viewport.width - margins.left - margins.right).max(NODE_WIDTH * 2.0);
    let height = (viewport.height - margins.top - margins.bottom).max(1.0);
    (width, height)
}

pub fn sankey(graph: &FlowGraph, viewport: Viewport) -> SankeyLayout {
    let margins = SANKEY_MARGINS;
    let (chart_width, chart_height) = chart_size(viewport, margins);

    let mut synthetic_weight: HashMap<&str, f64> = HashMap::new();
    for edge in graph.edges.iter().filter(|edge| edge.synthetic) {
        *synthetic_weight.entry(edge.source.as_str()).or_insert(0.0) += edge.weight();
        *synthetic_weight.entry(edge.target.as_str()).or_insert(0.0) += edge.weight();
    }
    let node_value = |id: &str, count: usize, synthetic: bool| -> f64 {
        let value = if synthetic {
            synthetic_weight.get(id).copied().unwrap_or(0.0)
        } else {
            count as f64
        };
        value.max(SYNTHETIC_WEIGHT)
    };

    let columns = [Side::Source, Side::Target];
    let mut scale = f64::INFINITY;
    for side in columns {
        let column: Vec<f64> = graph
            .nodes
            .iter()
            .filter(|node| node.side == side)
            .map(|node| node_value(&node.id, node.count, node.synthetic))
            .collect();
        if column.is_empty() {
            continue;
        }
        let total: f64 = column.iter().sum();
        let available = (chart_height - NODE_PADDING * (column.len() - 1) as f64).max(1.0);
        scale = scale.min(available / total);
    }
    if !scale.is_finite() {
        scale = 0.0;
    }

    let mut nodes: Vec<NodeBox> = Vec::with_capacity(graph.nodes.len());
    for side in columns {
        let column: Vec<_> = graph.nodes.iter().filter(|node| node.side == side).collect();
        let heights: Vec<f64> = column
            .iter()
            .map(|node| node_value(&node.id, node.count, node.synthetic) * scale)
            .collect();
        let used = heights.iter().sum::<f64>()
            + NODE_PADDING * column.len().saturating_sub(1) as f64;
        let mut y = ((chart_height - used) / 2.0).max(0.0);
        let (x0, x1) = match side {
            Side::Source => (0.0, NODE_WIDTH),
            Side::Target => (chart_width - NODE_WIDTH, chart_width),
        };

        for (node, height) in column.into_iter().zip(heights) {
            nodes.push(NodeBox {
                id: node.id.clone(),
                label: node.label.clone(),
                attribute: node.attribute,
                side,
                count: node.count,
                synthetic: node.synthetic,
                x0,
                x1,
                y0: y,
                y1: y + height,
            });
            y += height + NODE_PADDING;
        }
    }

    let order: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.as_str(), index))
        .collect();

    // Bands leave a source in target order and enter a target in source order.
    let mut outgoing: Vec<usize> = (0..graph.edges.len()).collect();
    outgoing.sort_by_key(|&i| order.get(graph.edges[i].target.as_str()).copied());
    let mut incoming: Vec<usize> = (0..graph.edges.len()).collect();
    incoming.sort_by_key(|&i| order.get(graph.edges[i].source.as_str()).copied());

    let mut source_offsets: HashMap<&str, f64> = HashMap::new();
    let mut y0s = vec![0.0; graph.edges.len()];
    for i in outgoing {
        let edge = &graph.edges[i];
        let width = edge.weight() * scale;
        let Some(node) = order.get(edge.source.as_str()).map(|&n| &nodes[n]) else {
            continue;
        };
        let offset = source_offsets.entry(edge.source.as_str()).or_insert(0.0);
        y0s[i] = node.y0 + *offset + width / 2.0;
        *offset += width;
    }

    let mut target_offsets: HashMap<&str, f64> = HashMap::new();
    let mut y1s = vec![0.0; graph.edges.len()];
    for i in incoming {
        let edge = &graph.edges[i];
        let width = edge.weight() * scale;
        let Some(node) = order.get(edge.target.as_str()).map(|&n| &nodes[n]) else {
            continue;
        };
        let offset = target_offsets.entry(edge.target.as_str()).or_insert(0.0);
        y1s[i] = node.y0 + *offset + width / 2.0;
        *offset += width;
    }

    let links = graph
        .edges
        .iter()
        .enumerate()
        .map(|(i, edge)| LinkBand {
            source: edge.source.clone(),
            target: edge.target.clone(),
            source_label: edge.source_label.clone(),
            target_label: edge.target_label.clone(),
            count: edge.count,
            synthetic: edge.synthetic,
            width: edge.weight() * scale,
            x0: NODE_WIDTH,
            x1: chart_width - NODE_WIDTH,
            y0: y0s[i],
            y1: y1s[i],
        })
        .collect();

    SankeyLayout {
        viewport,
        margins,
        scale,
        nodes,
        links,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArcSpan {
    pub label: String,
    pub attribute: Attribute,
    pub side: Side,
    pub count: usize,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl ArcSpan {
    pub fn span(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn mid_angle(&self) -> f64 {
        (self.start_angle + self.end_angle) / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ribbon {
    pub source_label: String,
    pub target_label: String,
    pub count: usize,
    pub source_start: f64,
    pub source_end: f64,
    pub target_start: f64,
    pub target_end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChordLayout {
    pub viewport: Viewport,
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub arcs: Vec<ArcSpan>,
    pub ribbons: Vec<Ribbon>,
}

/// Point on a circle for a chord angle.
pub fn polar(center_x: f64, center_y: f64, radius: f64, angle: f64) -> (f64, f64) {
    (center_x + radius * angle.sin(), center_y - radius * angle.cos())
}

fn side_arcs(graph: &FlowGraph, side: Side, start: f64, end: f64) -> Vec<ArcSpan> {
    let attribute = match side {
        Side::Source => graph.source,
        Side::Target => graph.target,
    };
    let present: HashMap<&str, usize> = graph
        .visible_nodes(side)
        .map(|node| (node.label.as_str(), node.count))
        .collect();

    // Tenure always shows every bucket with an equal share of the half circle.
    let values: Vec<(String, usize)> = match attribute {
        Attribute::Tenure => TenureBucket::LABELS
            .iter()
            .map(|label| (label.to_string(), present.get(label).copied().unwrap_or(0)))
            .collect(),
        _ => graph
            .visible_nodes(side)
            .map(|node| (node.label.clone(), node.count))
            .collect(),
    };

    let total: usize = values.iter().map(|(_, count)| count).sum();
    let span = end - start;
    let mut angle = start;

    values
        .into_iter()
        .map(|(label, count)| {
            let share = match attribute {
                Attribute::Tenure => span / TenureBucket::LABELS.len() as f64,
                _ => span * count as f64 / total.max(1) as f64,
            };
            let arc = ArcSpan {
                label,
                attribute,
                side,
                count,
                start_angle: angle,
                end_angle: angle + share,
            };
            angle += share;
            arc
        })
        .collect()
}

pub fn chord(graph: &FlowGraph, viewport: Viewport) -> ChordLayout {
    let margins = CHORD_MARGINS;
    let chart_width = (viewport.width - margins.left - margins.right).max(1.0);
    let chart_height = (viewport.height - margins.top - margins.bottom).max(1.0);
    let radius = (chart_width.min(chart_height) / 2.0 - 100.0).max(10.0);

    let mut arcs = side_arcs(graph, Side::Source, PI + CHORD_GAP, 2.0 * PI - CHORD_GAP);
    arcs.extend(side_arcs(graph, Side::Target, CHORD_GAP, PI - CHORD_GAP));

    let mut source_cursor: HashMap<String, f64> = HashMap::new();
    let mut target_cursor: HashMap<String, f64> = HashMap::new();

    let position = |side: Side, label: &str| {
        arcs.iter()
            .position(|arc| arc.side == side && arc.label == label)
    };

    let mut edges: Vec<_> = graph.real_edges().collect();
    edges.sort_by_key(|edge| {
        (
            position(Side::Source, &edge.source_label),
            position(Side::Target, &edge.target_label),
        )
    });

    let mut ribbons = Vec::with_capacity(edges.len());
    for edge in edges {
        let (Some(s), Some(t)) = (
            position(Side::Source, &edge.source_label),
            position(Side::Target, &edge.target_label),
        ) else {
            continue;
        };
        let (source_arc, target_arc) = (&arcs[s], &arcs[t]);

        let source_width = source_arc.span() * edge.count as f64 / source_arc.count.max(1) as f64;
        let target_width = target_arc.span() * edge.count as f64 / target_arc.count.max(1) as f64;

        let source_start = *source_cursor
            .entry(edge.source_label.clone())
            .or_insert(source_arc.start_angle);
        let target_start = *target_cursor
            .entry(edge.target_label.clone())
            .or_insert(target_arc.start_angle);
        source_cursor.insert(edge.source_label.clone(), source_start + source_width);
        target_cursor.insert(edge.target_label.clone(), target_start + target_width);

        ribbons.push(Ribbon {
            source_label: edge.source_label.clone(),
            target_label: edge.target_label.clone(),
            count: edge.count,
            source_start,
            source_end: source_start + source_width,
            target_start,
            target_end: target_start + target_width,
        });
    }

    ChordLayout {
        viewport,
        center_x: margins.left + chart_width / 2.0,
        center_y: margins.top + chart_height / 2.0,
        radius,
        inner_radius: radius * 0.8,
        outer_radius: radius * 0.9,
        arcs,
        ribbons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::tests::record;
    use crate::flow::{aggregate, DUMMY_TARGET_ID};

    const EPS: f64 = 1e-9;

    fn node<'a>(layout: &'a SankeyLayout, id: &str) -> &'a NodeBox {
        layout.nodes.iter().find(|node| node.id == id).unwrap()
    }

    fn arc<'a>(layout: &'a ChordLayout, side: Side, label: &str) -> &'a ArcSpan {
        layout
            .arcs
            .iter()
            .find(|arc| arc.side == side && arc.label == label)
            .unwrap()
    }

    fn sample_graph() -> FlowGraph {
        let records = vec![
            record(1, Some(2), Some("Visual"), Some("Making a difference")),
            record(2, Some(3), Some("Visual"), Some("Making a difference")),
            record(3, Some(4), Some("Auditory"), Some("Learning and growth")),
            record(4, Some(12), Some("Visual"), None),
            record(5, Some(25), None, Some("Learning and growth")),
        ];
        aggregate(&records, Attribute::Tenure, Attribute::LearningStyle)
    }

    #[test]
    fn sankey_nodes_stay_inside_the_chart() {
        let viewport = Viewport::default();
        let layout = sankey(&sample_graph(), viewport);
        let chart_height = viewport.height - SANKEY_MARGINS.top - SANKEY_MARGINS.bottom;

        for node in &layout.nodes {
            assert!(node.y0 >= -EPS, "{} starts above the chart", node.id);
            assert!(node.y1 <= chart_height + EPS, "{} ends below the chart", node.id);
            assert!(node.height() > 0.0, "{} collapsed", node.id);
            assert!((node.x1 - node.x0 - NODE_WIDTH).abs() < EPS);
        }
    }

    #[test]
    fn sankey_heights_follow_counts() {
        let layout = sankey(&sample_graph(), Viewport::default());
        let small = node(&layout, "tenure:11-15");
        let large = node(&layout, "tenure:0-5");
        assert!((large.height() / small.height() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn sankey_synthetic_nodes_are_thin_but_present() {
        let layout = sankey(&sample_graph(), Viewport::default());
        let sink = node(&layout, DUMMY_TARGET_ID);
        assert!(sink.height() > 0.0);
        assert!(sink.height() < 0.1);
    }

    #[test]
    fn sankey_bands_fit_inside_their_nodes() {
        let layout = sankey(&sample_graph(), Viewport::default());
        for link in layout.links.iter().filter(|link| !link.synthetic) {
            let source = node(&layout, &link.source);
            let target = node(&layout, &link.target);
            assert!(link.y0 - link.width / 2.0 >= source.y0 - EPS);
            assert!(link.y0 + link.width / 2.0 <= source.y1 + EPS);
            assert!(link.y1 - link.width / 2.0 >= target.y0 - EPS);
            assert!(link.y1 + link.width / 2.0 <= target.y1 + EPS);
        }
    }

    #[test]
    fn chord_tenure_arcs_are_equal_and_complete() {
        let layout = chord(&sample_graph(), Viewport::default());
        let tenure: Vec<&ArcSpan> = layout
            .arcs
            .iter()
            .filter(|arc| arc.side == Side::Source)
            .collect();
        assert_eq!(tenure.len(), 5);

        let expected = (PI - 2.0 * CHORD_GAP) / 5.0;
        assert!(tenure.iter().all(|arc| (arc.span() - expected).abs() < EPS));
        assert!(arc(&layout, Side::Source, "16-20").is_empty());
        assert!((tenure[0].start_angle - (PI + CHORD_GAP)).abs() < EPS);
        assert!((tenure[4].end_angle - (2.0 * PI - CHORD_GAP)).abs() < EPS);
    }

    #[test]
    fn chord_categorical_arcs_follow_count_share() {
        let layout = chord(&sample_graph(), Viewport::default());
        let visual = arc(&layout, Side::Target, "Visual");
        let auditory = arc(&layout, Side::Target, "Auditory");
        assert!((visual.span() / auditory.span() - 3.0).abs() < 1e-6);

        let total: f64 = layout
            .arcs
            .iter()
            .filter(|arc| arc.side == Side::Target)
            .map(ArcSpan::span)
            .sum();
        assert!((total - (PI - 2.0 * CHORD_GAP)).abs() < EPS);
    }

    #[test]
    fn chord_ribbons_stay_within_their_arcs() {
        let layout = chord(&sample_graph(), Viewport::default());
        assert_eq!(layout.ribbons.len(), 3);
        for ribbon in &layout.ribbons {
            let source = arc(&layout, Side::Source, &ribbon.source_label);
            let target = arc(&layout, Side::Target, &ribbon.target_label);
            assert!(ribbon.source_start >= source.start_angle - EPS);
            assert!(ribbon.source_end <= source.end_angle + EPS);
            assert!(ribbon.target_start >= target.start_angle - EPS);
            assert!(ribbon.target_end <= target.end_angle + EPS);
        }
    }

    #[test]
    fn polar_points_clockwise_from_top() {
        let (x, y) = polar(0.0, 0.0, 10.0, 0.0);
        assert!(x.abs() < EPS && (y + 10.0).abs() < EPS);
        let (x, y) = polar(0.0, 0.0, 10.0, PI / 2.0);
        assert!((x - 10.0).abs() < EPS && y.abs() < EPS);
    }
}
