//! SVG rendering of the alluvial and chord views.

use std::borrow::Cow;
use std::fmt::Write;

use crate::color;
use crate::flow::{FlowGraph, Side};
use crate::layout::{self, polar, ChordLayout, SankeyLayout, Viewport};
use crate::models::{ApprovedQuote, Attribute};
use crate::report::Insights;
use crate::settings::{DisplaySettings, ThemeColors};

pub const LINK_HIGHLIGHTED: f64 = 0.9;
pub const LINK_DIMMED: f64 = 0.1;
pub const LINK_NEUTRAL: f64 = 0.6;
pub const NODE_DIMMED: f64 = 0.1;
pub const EMPTY_LABEL_OPACITY: f64 = 0.5;
pub const EMPTY_ARC_OPACITY: f64 = 0.15;

/// Height of the insight, legend and quote panel under the diagram.
const PANEL_HEIGHT: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Alluvial,
    Chord,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alluvial" | "sankey" => Ok(Mode::Alluvial),
            "chord" => Ok(Mode::Chord),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Everything needed to paint one frame.
pub struct Frame<'a> {
    pub graph: &'a FlowGraph,
    pub settings: &'a DisplaySettings,
    /// Index into `graph.sources`.
    pub highlight: Option<usize>,
    pub quote: Option<&'a ApprovedQuote>,
    pub viewport: Viewport,
}

impl Frame<'_> {
    fn highlighted(&self) -> Option<&str> {
        self.highlight
            .and_then(|index| self.graph.sources.get(index))
            .map(String::as_str)
    }
}

pub fn render(frame: &Frame<'_>, mode: Mode) -> String {
    match mode {
        Mode::Alluvial => alluvial_svg(frame),
        Mode::Chord => chord_svg(frame),
    }
}

pub fn link_opacity(highlighted: Option<&str>, source_label: &str) -> f64 {
    match highlighted {
        None => LINK_NEUTRAL,
        Some(label) if label == source_label => LINK_HIGHLIGHTED,
        Some(_) => LINK_DIMMED,
    }
}

pub fn target_opacity(graph: &FlowGraph, highlighted: Option<&str>, target_label: &str) -> f64 {
    match highlighted {
        Some(source) if !graph.is_connected(source, target_label) => NODE_DIMMED,
        _ => 1.0,
    }
}

fn flow_of(graph: &FlowGraph, side: Side, label: &str) -> usize {
    match side {
        Side::Source => graph.outgoing(label),
        Side::Target => graph.incoming(label),
    }
}

fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn open_document(output: &mut String, viewport: Viewport, colors: ThemeColors) {
    let height = viewport.height + PANEL_HEIGHT;
    let _ = writeln!(
        output,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = viewport.width,
        h = height
    );
    let _ = writeln!(
        output,
        r#"<rect width="100%" height="100%" fill="{}"/>"#,
        colors.background
    );
}

fn write_panel(output: &mut String, frame: &Frame<'_>, legend: &[(Attribute, String)]) {
    let colors = frame.settings.colors();
    let insights = Insights::from_graph(frame.graph);
    let top = frame.viewport.height;

    let _ = writeln!(
        output,
        r#"<g class="insights" transform="translate(20,{top})" fill="{}" font-size="13">"#,
        colors.text
    );
    let lines = [
        format!("Total responses: {}", insights.total_responses),
        format!("Current view: {}", insights.view),
        format!("Most common flow: {}", insights.most_common_label()),
        format!("Total connections: {}", insights.total_connections),
    ];
    for (row, line) in lines.iter().enumerate() {
        let _ = writeln!(
            output,
            r#"<text y="{}">{}</text>"#,
            18 + row * 18,
            escape(line)
        );
    }
    let _ = writeln!(output, "</g>");

    let _ = writeln!(
        output,
        r#"<g class="legend" transform="translate({},{top})" font-size="11" fill="{}">"#,
        frame.viewport.width / 2.0,
        colors.text
    );
    let columns = 2;
    for (index, (attribute, value)) in legend.iter().enumerate() {
        let x = (index % columns) as f64 * 220.0;
        let y = 8.0 + (index / columns) as f64 * 16.0;
        let _ = writeln!(
            output,
            r#"<rect x="{x}" y="{y}" width="10" height="10" fill="{}"/><text x="{}" y="{}">{}</text>"#,
            frame.settings.color_for(*attribute, value),
            x + 14.0,
            y + 9.0,
            escape(value)
        );
    }
    let _ = writeln!(output, "</g>");

    if let Some(quote) = frame.quote {
        let _ = writeln!(
            output,
            r#"<text class="quote" x="20" y="{}" font-size="14" font-style="italic" fill="{}">"{}" - {}</text>"#,
            top + PANEL_HEIGHT - 20.0,
            colors.muted,
            escape(quote.text.trim()),
            escape(&quote.author())
        );
    }
}

fn legend_entries(graph: &FlowGraph) -> Vec<(Attribute, String)> {
    [(Side::Source, graph.source), (Side::Target, graph.target)]
        .into_iter()
        .flat_map(|(side, attribute)| {
            graph
                .visible_nodes(side)
                .map(move |node| (attribute, node.label.clone()))
        })
        .collect()
}

pub fn alluvial_svg(frame: &Frame<'_>) -> String {
    let layout = layout::sankey(frame.graph, frame.viewport);
    let colors = frame.settings.colors();
    let highlighted = frame.highlighted();
    let mut output = String::new();

    open_document(&mut output, frame.viewport, colors);
    let _ = writeln!(
        output,
        r#"<g transform="translate({},{})">"#,
        layout.margins.left, layout.margins.top
    );

    write_links(&mut output, frame, &layout, highlighted);
    write_nodes(&mut output, frame, &layout, highlighted, colors);

    let _ = writeln!(output, "</g>");
    write_panel(&mut output, frame, &legend_entries(frame.graph));
    let _ = writeln!(output, "</svg>");
    output
}

fn write_links(output: &mut String, frame: &Frame<'_>, layout: &SankeyLayout, highlighted: Option<&str>) {
    let _ = writeln!(output, r#"<g class="links" fill="none">"#);
    for link in layout.links.iter().filter(|link| !link.synthetic) {
        let middle = (link.x0 + link.x1) / 2.0;
        let _ = writeln!(
            output,
            r#"<path d="M{:.2},{:.2} C{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" stroke="{}" stroke-width="{:.2}" stroke-opacity="{}"><title>{} → {}: {}</title></path>"#,
            link.x0,
            link.y0,
            middle,
            link.y0,
            middle,
            link.y1,
            link.x1,
            link.y1,
            frame.settings.color_for(frame.graph.source, &link.source_label),
            link.width.max(1.0),
            link_opacity(highlighted, &link.source_label),
            escape(&link.source_label),
            escape(&link.target_label),
            link.count
        );
    }
    let _ = writeln!(output, "</g>");
}

fn write_nodes(
    output: &mut String,
    frame: &Frame<'_>,
    layout: &SankeyLayout,
    highlighted: Option<&str>,
    colors: ThemeColors,
) {
    let _ = writeln!(output, r#"<g class="nodes" font-size="12">"#);
    for node in layout.nodes.iter().filter(|node| !node.synthetic) {
        let Some(attribute) = node.attribute else {
            continue;
        };
        let opacity = match node.side {
            Side::Source => 1.0,
            Side::Target => target_opacity(frame.graph, highlighted, &node.label),
        };
        let connected = flow_of(frame.graph, node.side, &node.label) > 0;
        let label_opacity = if connected { opacity } else { EMPTY_LABEL_OPACITY };
        let stroke = if highlighted == Some(node.label.as_str()) && node.side == Side::Source {
            colors.text
        } else {
            colors.stroke
        };
        let (label_x, anchor) = match node.side {
            Side::Source => (node.x0 - 8.0, "end"),
            Side::Target => (node.x1 + 8.0, "start"),
        };

        let _ = writeln!(
            output,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" fill-opacity="{}" stroke="{}"><title>{}: {} responses</title></rect>"#,
            node.x0,
            node.y0,
            node.x1 - node.x0,
            node.height().max(1.0),
            frame.settings.color_for(attribute, &node.label),
            opacity,
            stroke,
            escape(&node.label),
            node.count
        );
        let _ = writeln!(
            output,
            r#"<text x="{:.2}" y="{:.2}" dy="0.35em" text-anchor="{anchor}" fill="{}" fill-opacity="{}">{}</text>"#,
            label_x,
            node.center_y(),
            colors.text,
            label_opacity,
            escape(&node.label)
        );
    }
    let _ = writeln!(output, "</g>");
}

fn arc_path(layout: &ChordLayout, start: f64, end: f64) -> String {
    let (cx, cy) = (layout.center_x, layout.center_y);
    let (outer, inner) = (layout.outer_radius, layout.inner_radius);
    let large = u8::from(end - start > std::f64::consts::PI);
    let (ox0, oy0) = polar(cx, cy, outer, start);
    let (ox1, oy1) = polar(cx, cy, outer, end);
    let (ix1, iy1) = polar(cx, cy, inner, end);
    let (ix0, iy0) = polar(cx, cy, inner, start);
    format!(
        "M{ox0:.2},{oy0:.2} A{outer:.2},{outer:.2} 0 {large} 1 {ox1:.2},{oy1:.2} \
         L{ix1:.2},{iy1:.2} A{inner:.2},{inner:.2} 0 {large} 0 {ix0:.2},{iy0:.2} Z"
    )
}

fn ribbon_path(layout: &ChordLayout, source: (f64, f64), target: (f64, f64)) -> String {
    let (cx, cy) = (layout.center_x, layout.center_y);
    let r = layout.inner_radius;
    let (s0x, s0y) = polar(cx, cy, r, source.0);
    let (s1x, s1y) = polar(cx, cy, r, source.1);
    let (t0x, t0y) = polar(cx, cy, r, target.0);
    let (t1x, t1y) = polar(cx, cy, r, target.1);
    format!(
        "M{s0x:.2},{s0y:.2} A{r:.2},{r:.2} 0 0 1 {s1x:.2},{s1y:.2} Q{cx:.2},{cy:.2} {t0x:.2},{t0y:.2} \
         A{r:.2},{r:.2} 0 0 1 {t1x:.2},{t1y:.2} Q{cx:.2},{cy:.2} {s0x:.2},{s0y:.2} Z"
    )
}

pub fn chord_svg(frame: &Frame<'_>) -> String {
    let layout = layout::chord(frame.graph, frame.viewport);
    let colors = frame.settings.colors();
    let highlighted = frame.highlighted();
    let mut output = String::new();

    open_document(&mut output, frame.viewport, colors);

    let _ = writeln!(output, r#"<g class="ribbons">"#);
    for ribbon in &layout.ribbons {
        let fill = color::blend(
            frame.settings.color_for(frame.graph.source, &ribbon.source_label),
            frame.settings.color_for(frame.graph.target, &ribbon.target_label),
            0.5,
        );
        let _ = writeln!(
            output,
            r#"<path d="{}" fill="{fill}" fill-opacity="{}" stroke="{}" stroke-width="0.5"><title>{} → {}: {}</title></path>"#,
            ribbon_path(
                &layout,
                (ribbon.source_start, ribbon.source_end),
                (ribbon.target_start, ribbon.target_end)
            ),
            link_opacity(highlighted, &ribbon.source_label),
            colors.stroke,
            escape(&ribbon.source_label),
            escape(&ribbon.target_label),
            ribbon.count
        );
    }
    let _ = writeln!(output, "</g>");

    let _ = writeln!(output, r#"<g class="arcs" font-size="12">"#);
    for arc in &layout.arcs {
        let opacity = if arc.is_empty() {
            EMPTY_ARC_OPACITY
        } else if arc.side == Side::Target {
            target_opacity(frame.graph, highlighted, &arc.label)
        } else {
            1.0
        };
        let connected = flow_of(frame.graph, arc.side, &arc.label) > 0;
        let label_opacity = if connected { 1.0 } else { EMPTY_LABEL_OPACITY };
        let (lx, ly) = polar(
            layout.center_x,
            layout.center_y,
            layout.outer_radius + 14.0,
            arc.mid_angle(),
        );
        let anchor = match arc.side {
            Side::Source => "end",
            Side::Target => "start",
        };

        let _ = writeln!(
            output,
            r#"<path d="{}" fill="{}" fill-opacity="{opacity}" stroke="{}"><title>{}: {} responses</title></path>"#,
            arc_path(&layout, arc.start_angle, arc.end_angle),
            frame.settings.color_for(arc.attribute, &arc.label),
            colors.stroke,
            escape(&arc.label),
            arc.count
        );
        let _ = writeln!(
            output,
            r#"<text x="{lx:.2}" y="{ly:.2}" dy="0.35em" text-anchor="{anchor}" fill="{}" fill-opacity="{label_opacity}">{}</text>"#,
            colors.text,
            escape(&arc.label)
        );
    }
    let _ = writeln!(output, "</g>");

    let legend: Vec<(Attribute, String)> = layout
        .arcs
        .iter()
        .map(|arc| (arc.attribute, arc.label.clone()))
        .collect();
    write_panel(&mut output, frame, &legend);
    let _ = writeln!(output, "</svg>");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::aggregate;
    use crate::flow::tests::record;

    fn sample_graph() -> FlowGraph {
        let records = vec![
            record(1, Some(2), Some("Visual"), None),
            record(2, Some(3), Some("Visual"), None),
            record(3, Some(12), Some("Auditory"), None),
            record(4, Some(25), None, None),
            record(5, None, Some("Reading/Writing"), None),
        ];
        aggregate(&records, Attribute::Tenure, Attribute::LearningStyle)
    }

    fn frame<'a>(graph: &'a FlowGraph, settings: &'a DisplaySettings, highlight: Option<usize>) -> Frame<'a> {
        Frame {
            graph,
            settings,
            highlight,
            quote: None,
            viewport: Viewport::default(),
        }
    }

    #[test]
    fn link_opacity_levels() {
        assert_eq!(link_opacity(None, "0-5"), LINK_NEUTRAL);
        assert_eq!(link_opacity(Some("0-5"), "0-5"), LINK_HIGHLIGHTED);
        assert_eq!(link_opacity(Some("0-5"), "6-10"), LINK_DIMMED);
    }

    #[test]
    fn unconnected_targets_dim_under_a_highlight() {
        let graph = sample_graph();
        assert_eq!(target_opacity(&graph, Some("0-5"), "Visual"), 1.0);
        assert_eq!(target_opacity(&graph, Some("0-5"), "Auditory"), NODE_DIMMED);
        assert_eq!(target_opacity(&graph, None, "Auditory"), 1.0);
    }

    #[test]
    fn tooltips_show_real_counts_only() {
        let graph = sample_graph();
        let settings = DisplaySettings::default();
        let svg = alluvial_svg(&frame(&graph, &settings, None));

        assert!(svg.contains("<title>0-5 → Visual: 2</title>"));
        assert!(svg.contains("<title>11-15 → Auditory: 1</title>"));
        assert!(!svg.contains("0.0001"));
        assert!(!svg.contains("__dummy"));
        assert!(svg.contains("Total connections: 3"));
    }

    #[test]
    fn highlight_changes_link_opacity() {
        let graph = sample_graph();
        let settings = DisplaySettings::default();
        let svg = alluvial_svg(&frame(&graph, &settings, Some(0)));

        assert!(svg.contains(r#"stroke-opacity="0.9"><title>0-5 → Visual"#));
        assert!(svg.contains(r#"stroke-opacity="0.1"><title>11-15 → Auditory"#));
    }

    #[test]
    fn colour_overrides_reach_the_output() {
        let graph = sample_graph();
        let mut settings = DisplaySettings::default();
        settings.set_color(Attribute::LearningStyle, "Visual", "#123ABC");
        let svg = alluvial_svg(&frame(&graph, &settings, None));
        assert!(svg.contains("#123ABC"));
    }

    #[test]
    fn chord_flags_empty_tenure_buckets() {
        let graph = sample_graph();
        let settings = DisplaySettings::default();
        let svg = chord_svg(&frame(&graph, &settings, None));

        assert!(svg.contains(
            r##"fill-opacity="0.15" stroke="#22223B"><title>16-20: 0 responses</title>"##
        ));
        assert!(svg.contains("<title>0-5 → Visual: 2</title>"));
    }

    #[test]
    fn quotes_and_labels_are_escaped() {
        let graph = sample_graph();
        let settings = DisplaySettings::default();
        let quote = ApprovedQuote {
            text: "I <3 spreadsheets & maps".to_string(),
            first_name: "Omar".to_string(),
            last_name: None,
            is_anonymous: false,
        };
        let mut frame = frame(&graph, &settings, None);
        frame.quote = Some(&quote);
        let svg = render(&frame, Mode::Chord);

        assert!(svg.contains("I &lt;3 spreadsheets &amp; maps"));
        assert!(svg.contains("- Omar</text>"));
    }

    #[test]
    fn modes_parse() {
        assert_eq!("chord".parse::<Mode>().unwrap(), Mode::Chord);
        assert_eq!("Sankey".parse::<Mode>().unwrap(), Mode::Alluvial);
        assert!("pie".parse::<Mode>().is_err());
    }
}
