//! Aggregation of response records into a weighted bipartite flow graph.
//!
//! Source and target values are the distinct values present in the data,
//! ordered by bucket order for tenure and lexicographically otherwise. Edge
//! weights count records that carry both values. Values left without any real
//! edge are anchored to a hidden synthetic node so layouts keep them visible;
//! synthetic nodes and edges never contribute to counts or statistics.

use std::collections::HashMap;

use crate::binning::TenureBucket;
use crate::models::{Attribute, ResponseRecord};

/// Weight given to synthetic anchor edges.
pub const SYNTHETIC_WEIGHT: f64 = 1e-4;

pub const DUMMY_SOURCE_ID: &str = "__dummy_source__";
pub const DUMMY_TARGET_ID: &str = "__dummy_target__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    pub attribute: Option<Attribute>,
    pub side: Side,
    /// Records carrying this value. Zero for synthetic nodes.
    pub count: usize,
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    pub source_label: String,
    pub target_label: String,
    /// Records sharing both values. Zero for synthetic edges.
    pub count: usize,
    pub synthetic: bool,
}

impl FlowEdge {
    /// Layout weight: the real count, or [`SYNTHETIC_WEIGHT`] for anchors.
    pub fn weight(&self) -> f64 {
        if self.synthetic {
            SYNTHETIC_WEIGHT
        } else {
            self.count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowGraph {
    pub source: Attribute,
    pub target: Attribute,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
    /// Source column, then target column. Synthetic nodes close their column.
    pub nodes: Vec<FlowNode>,
    /// Real edges in first-encountered order, then synthetic edges.
    pub edges: Vec<FlowEdge>,
    /// Number of records that went into the aggregation.
    pub records: usize,
}

pub fn node_id(attribute: Attribute, value: &str, side: Side, same_attribute: bool) -> String {
    match (side, same_attribute) {
        (Side::Target, true) => format!("{}:{}#target", attribute.key(), value),
        _ => format!("{}:{}", attribute.key(), value),
    }
}

/// Order values the way they are displayed: bucket order for tenure,
/// lexicographic otherwise.
pub fn order_values(attribute: Attribute, values: &mut [String]) {
    match attribute {
        Attribute::Tenure => {
            values.sort_by_key(|value| TenureBucket::position(value).unwrap_or(usize::MAX))
        }
        _ => values.sort(),
    }
}

fn distinct_values(attribute: Attribute, records: &[&ResponseRecord]) -> (Vec<String>, HashMap<String, usize>) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        if let Some(value) = attribute.value_of(record) {
            *counts.entry(value.into_owned()).or_insert(0) += 1;
        }
    }

    let mut values: Vec<String> = counts.keys().cloned().collect();
    order_values(attribute, &mut values);
    (values, counts)
}

pub fn aggregate<'a, I>(records: I, source: Attribute, target: Attribute) -> FlowGraph
where
    I: IntoIterator<Item = &'a ResponseRecord>,
{
    let records: Vec<&ResponseRecord> = records.into_iter().collect();
    let same_attribute = source == target;

    let (sources, source_counts) = distinct_values(source, &records);
    let (targets, target_counts) = distinct_values(target, &records);

    let source_index: HashMap<&str, usize> = sources
        .iter()
        .enumerate()
        .map(|(index, value)| (value.as_str(), index))
        .collect();
    let target_index: HashMap<&str, usize> = targets
        .iter()
        .enumerate()
        .map(|(index, value)| (value.as_str(), index))
        .collect();

    let mut edges: Vec<FlowEdge> = Vec::new();
    let mut edge_slots: HashMap<(usize, usize), usize> = HashMap::new();
    let mut has_outgoing = vec![false; sources.len()];
    let mut has_incoming = vec![false; targets.len()];

    for record in &records {
        let (Some(source_value), Some(target_value)) =
            (source.value_of(record), target.value_of(record))
        else {
            continue;
        };
        let (Some(&s), Some(&t)) = (
            source_index.get(source_value.as_ref()),
            target_index.get(target_value.as_ref()),
        ) else {
            continue;
        };

        has_outgoing[s] = true;
        has_incoming[t] = true;

        match edge_slots.get(&(s, t)) {
            Some(&slot) => edges[slot].count += 1,
            None => {
                edge_slots.insert((s, t), edges.len());
                edges.push(FlowEdge {
                    source: node_id(source, &sources[s], Side::Source, same_attribute),
                    target: node_id(target, &targets[t], Side::Target, same_attribute),
                    source_label: sources[s].clone(),
                    target_label: targets[t].clone(),
                    count: 1,
                    synthetic: false,
                });
            }
        }
    }

    let mut source_nodes: Vec<FlowNode> = sources
        .iter()
        .map(|value| FlowNode {
            id: node_id(source, value, Side::Source, same_attribute),
            label: value.clone(),
            attribute: Some(source),
            side: Side::Source,
            count: source_counts.get(value).copied().unwrap_or(0),
            synthetic: false,
        })
        .collect();
    let mut target_nodes: Vec<FlowNode> = targets
        .iter()
        .map(|value| FlowNode {
            id: node_id(target, value, Side::Target, same_attribute),
            label: value.clone(),
            attribute: Some(target),
            side: Side::Target,
            count: target_counts.get(value).copied().unwrap_or(0),
            synthetic: false,
        })
        .collect();

    // Anchor values with no real edge so the layout keeps them visible.
    let mut anchors: Vec<FlowEdge> = Vec::new();
    for (index, value) in targets.iter().enumerate().filter(|(i, _)| !has_incoming[*i]) {
        anchors.push(FlowEdge {
            source: DUMMY_SOURCE_ID.to_string(),
            target: target_nodes[index].id.clone(),
            source_label: String::new(),
            target_label: value.clone(),
            count: 0,
            synthetic: true,
        });
    }
    if !anchors.is_empty() {
        source_nodes.push(synthetic_node(DUMMY_SOURCE_ID, Side::Source));
    }

    let target_anchors = anchors.len();
    for (index, value) in sources.iter().enumerate().filter(|(i, _)| !has_outgoing[*i]) {
        anchors.push(FlowEdge {
            source: source_nodes[index].id.clone(),
            target: DUMMY_TARGET_ID.to_string(),
            source_label: value.clone(),
            target_label: String::new(),
            count: 0,
            synthetic: true,
        });
    }
    if anchors.len() > target_anchors {
        target_nodes.push(synthetic_node(DUMMY_TARGET_ID, Side::Target));
    }

    edges.extend(anchors);
    source_nodes.extend(target_nodes);

    FlowGraph {
        source,
        target,
        sources,
        targets,
        nodes: source_nodes,
        edges,
        records: records.len(),
    }
}

fn synthetic_node(id: &str, side: Side) -> FlowNode {
    FlowNode {
        id: id.to_string(),
        label: String::new(),
        attribute: None,
        side,
        count: 0,
        synthetic: true,
    }
}

impl FlowGraph {
    pub fn real_edges(&self) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(|edge| !edge.synthetic)
    }

    pub fn visible_nodes(&self, side: Side) -> impl Iterator<Item = &FlowNode> {
        self.nodes
            .iter()
            .filter(move |node| node.side == side && !node.synthetic)
    }

    /// Sum of real edge weights: records with both attributes answered.
    pub fn total_flow(&self) -> usize {
        self.real_edges().map(|edge| edge.count).sum()
    }

    /// The heaviest real edge; ties go to the edge encountered first.
    pub fn most_common_flow(&self) -> Option<&FlowEdge> {
        let mut best: Option<&FlowEdge> = None;
        for edge in self.real_edges() {
            if best.map_or(true, |current| edge.count > current.count) {
                best = Some(edge);
            }
        }
        best
    }

    pub fn weight(&self, source_value: &str, target_value: &str) -> usize {
        self.real_edges()
            .find(|edge| edge.source_label == source_value && edge.target_label == target_value)
            .map(|edge| edge.count)
            .unwrap_or(0)
    }

    /// Real flow leaving a source value, zero when it only has an anchor.
    pub fn outgoing(&self, source_value: &str) -> usize {
        self.real_edges()
            .filter(|edge| edge.source_label == source_value)
            .map(|edge| edge.count)
            .sum()
    }

    pub fn incoming(&self, target_value: &str) -> usize {
        self.real_edges()
            .filter(|edge| edge.target_label == target_value)
            .map(|edge| edge.count)
            .sum()
    }

    pub fn is_connected(&self, source_value: &str, target_value: &str) -> bool {
        self.weight(source_value, target_value) > 0
    }

    pub fn view_label(&self) -> String {
        format!("{} → {}", self.source.label(), self.target.label())
    }
}
