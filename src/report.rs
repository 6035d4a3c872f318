use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::flow::{FlowGraph, Side};
use crate::models::ApprovedQuote;
use crate::settings::DataSource;

/// Figures shown in the insight panel next to the diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insights {
    pub total_responses: usize,
    pub view: String,
    pub most_common: Option<(String, String, usize)>,
    pub total_connections: usize,
}

impl Insights {
    pub fn from_graph(graph: &FlowGraph) -> Self {
        Self {
            total_responses: graph.records,
            view: graph.view_label(),
            most_common: graph
                .most_common_flow()
                .map(|edge| (edge.source_label.clone(), edge.target_label.clone(), edge.count)),
            total_connections: graph.total_flow(),
        }
    }

    pub fn most_common_label(&self) -> String {
        match &self.most_common {
            Some((source, target, count)) => format!("{source} → {target} ({count})"),
            None => "None".to_string(),
        }
    }
}

pub fn build_report(
    graph: &FlowGraph,
    source: DataSource,
    generated_at: DateTime<Utc>,
    quotes: &[ApprovedQuote],
    sample: bool,
) -> String {
    let insights = Insights::from_graph(graph);
    let mut output = String::new();

    let _ = writeln!(output, "# Conference Pulse Report");
    let _ = writeln!(
        output,
        "Generated {} from {} data{}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        match source {
            DataSource::Test => "test",
            DataSource::Live => "live",
        },
        if sample { " (sample fallback)" } else { "" }
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    let _ = writeln!(output, "- Total responses: {}", insights.total_responses);
    let _ = writeln!(output, "- Current view: {}", insights.view);
    let _ = writeln!(output, "- Most common flow: {}", insights.most_common_label());
    let _ = writeln!(output, "- Total connections: {}", insights.total_connections);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Flows");

    let mut edges: Vec<_> = graph.real_edges().collect();
    edges.sort_by(|a, b| b.count.cmp(&a.count));
    if edges.is_empty() {
        let _ = writeln!(output, "No flows for this pair.");
    } else {
        let _ = writeln!(output, "| {} | {} | Responses |", graph.source.label(), graph.target.label());
        let _ = writeln!(output, "| --- | --- | ---: |");
        for edge in edges {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                edge.source_label, edge.target_label, edge.count
            );
        }
    }

    for (side, attribute) in [(Side::Source, graph.source), (Side::Target, graph.target)] {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", attribute.label());
        let mut any = false;
        for node in graph.visible_nodes(side) {
            any = true;
            let flow = match side {
                Side::Source => graph.outgoing(&node.label),
                Side::Target => graph.incoming(&node.label),
            };
            let _ = writeln!(
                output,
                "- {}: {} responses, {} connected",
                node.label, node.count, flow
            );
        }
        if !any {
            let _ = writeln!(output, "No answers recorded.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Approved Quotes");
    if quotes.is_empty() {
        let _ = writeln!(output, "No approved quotes yet.");
    } else {
        for quote in quotes.iter().take(10) {
            let _ = writeln!(output, "> {}", quote.text.trim());
            let _ = writeln!(output, "> - {}", quote.author());
            let _ = writeln!(output);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::flow::aggregate;
    use crate::flow::tests::record;
    use crate::models::Attribute;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap()
    }

    #[test]
    fn report_lists_insights_and_flows() {
        let records = vec![
            record(1, Some(3), Some("Visual"), None),
            record(2, Some(4), Some("Visual"), None),
            record(3, Some(12), Some("Auditory"), None),
            record(4, None, Some("Auditory"), None),
        ];
        let graph = aggregate(&records, Attribute::Tenure, Attribute::LearningStyle);
        let report = build_report(&graph, DataSource::Live, generated_at(), &[], false);

        assert!(report.contains("Generated 2025-06-02 14:30 UTC from live data\n"));
        assert!(report.contains("- Total responses: 4"));
        assert!(report.contains("- Current view: Years at Company → Learning Style"));
        assert!(report.contains("- Most common flow: 0-5 → Visual (2)"));
        assert!(report.contains("- Total connections: 3"));
        assert!(report.contains("| 0-5 | Visual | 2 |"));
        assert!(report.contains("- Auditory: 2 responses, 1 connected"));
        assert!(report.contains("No approved quotes yet."));
    }

    #[test]
    fn empty_graph_reports_none() {
        let none: Vec<crate::models::ResponseRecord> = Vec::new();
        let graph = aggregate(&none, Attribute::Motivation, Attribute::ShapedBy);
        let report = build_report(&graph, DataSource::Test, generated_at(), &[], true);

        assert!(report.contains("from test data (sample fallback)"));
        assert!(report.contains("- Most common flow: None"));
        assert!(report.contains("No flows for this pair."));
    }

    #[test]
    fn anonymous_quotes_are_attributed_anonymously() {
        let quotes = vec![ApprovedQuote {
            text: "  I collect vintage maps. ".to_string(),
            first_name: "Kiara".to_string(),
            last_name: Some("Patel".to_string()),
            is_anonymous: true,
        }];
        let none: Vec<crate::models::ResponseRecord> = Vec::new();
        let graph = aggregate(&none, Attribute::Tenure, Attribute::Motivation);
        let report = build_report(&graph, DataSource::Live, generated_at(), &quotes, false);

        assert!(report.contains("> I collect vintage maps.\n> - Anonymous"));
        assert!(!report.contains("Kiara"));
    }
}
