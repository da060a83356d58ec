//! Built-in SVG renderer.
//!
//! Needs no external binary, so it serves environments without Graphviz
//! and test suites. Only the `svg` format is supported.

use std::{fs, path::Path};

use log::debug;
use svg::{
    Document,
    node::{Text as SvgText, element as svg_element},
};

use diagrammer_core::diagram::LineStyle;

use super::{
    RenderError, Renderer, check_format,
    layout::{LayoutEngine, Rect, SceneLayout},
};
use crate::{
    request::OutputFormat,
    scene::{Arrow, Scene, SceneEdge, SceneNode, Shape},
};

const FONT: &str = "Helvetica, Arial, sans-serif";
const STROKE: &str = "#2d3436";
const MARKER_END: &str = "arrow-end";
const MARKER_START: &str = "arrow-start";

/// Renders scenes to SVG without external tools.
#[derive(Debug, Clone, Default)]
pub struct SvgRenderer {
    engine: LayoutEngine,
}

impl Renderer for SvgRenderer {
    fn name(&self) -> &'static str {
        "native"
    }

    fn supports(&self, format: OutputFormat) -> bool {
        format == OutputFormat::Svg
    }

    fn render(
        &self,
        scene: &Scene,
        out_dir: &Path,
        stem: &str,
        format: OutputFormat,
    ) -> Result<(), RenderError> {
        check_format(self, format)?;
        let document = self.render_document(scene);
        let path = out_dir.join(format!("{stem}.{}", format.extension()));
        fs::write(&path, document.to_string())?;
        debug!(path = path.display().to_string(); "SVG written");
        Ok(())
    }
}

impl SvgRenderer {
    /// Lays out `scene` and draws it.
    pub fn render_document(&self, scene: &Scene) -> Document {
        let layout = self.engine.calculate(scene);

        let mut doc = Document::new()
            .set(
                "viewBox",
                format!("0 0 {} {}", layout.width(), layout.height()),
            )
            .set("width", layout.width())
            .set("height", layout.height())
            .add(marker_definitions())
            .add(
                svg_element::Rectangle::new()
                    .set("width", "100%")
                    .set("height", "100%")
                    .set("fill", "white"),
            )
            .add(self.text_block(
                &[scene.title()],
                layout.width() / 2.0,
                self.engine.margin() + self.engine.line_height() / 2.0,
                18,
                true,
            ));

        // Outer groups first so nested ones paint on top.
        let mut groups: Vec<usize> = (0..scene.groups().len()).collect();
        groups.sort_by_key(|&group| scene.group_depth(group));
        for group in groups {
            if let Some(bounds) = layout.group(group) {
                doc = doc.add(self.draw_group(scene, group, bounds));
            }
        }

        for edge in scene.edges() {
            doc = doc.add(self.draw_edge(edge, &layout));
        }

        for (node, bounds) in scene.nodes().iter().zip(layout.nodes()) {
            doc = doc.add(self.draw_node(node, *bounds));
        }

        doc
    }

    fn draw_group(&self, scene: &Scene, group: usize, bounds: Rect) -> svg_element::Group {
        let info = &scene.groups()[group];
        let fill = info
            .background()
            .map_or_else(|| "none".to_string(), |color| color.to_hex());
        svg_element::Group::new()
            .add(
                rect(bounds)
                    .set("fill", fill)
                    .set("stroke", "#aeb6be")
                    .set("stroke-dasharray", "4 2")
                    .set("rx", 4.0),
            )
            .add(self.text_block(
                &[info.label()],
                bounds.center().0,
                bounds.y() + self.engine.line_height() / 2.0 + 4.0,
                12,
                false,
            ))
    }

    fn draw_node(&self, node: &SceneNode, bounds: Rect) -> svg_element::Group {
        let fill = node.fill().map_or_else(|| "white".to_string(), |c| c.to_hex());
        let (cx, cy) = bounds.center();
        let mut group = svg_element::Group::new();

        match node.shape() {
            Shape::Box | Shape::RoundedBox | Shape::Table => {
                let radius = if node.shape() == Shape::RoundedBox { 8.0 } else { 0.0 };
                group = group.add(
                    rect(bounds)
                        .set("fill", fill)
                        .set("stroke", STROKE)
                        .set("rx", radius),
                );
            }
            Shape::Ellipse => {
                group = group.add(
                    svg_element::Ellipse::new()
                        .set("cx", cx)
                        .set("cy", cy)
                        .set("rx", bounds.width() / 2.0)
                        .set("ry", bounds.height() / 2.0)
                        .set("fill", fill)
                        .set("stroke", STROKE),
                );
            }
            Shape::Diamond => {
                let points = format!(
                    "{cx},{} {},{cy} {cx},{} {},{cy}",
                    bounds.y(),
                    bounds.max_x(),
                    bounds.max_y(),
                    bounds.x()
                );
                group = group.add(
                    svg_element::Polygon::new()
                        .set("points", points)
                        .set("fill", fill)
                        .set("stroke", STROKE),
                );
            }
        }

        if node.shape() == Shape::Table {
            return self.draw_table_text(group, node, bounds);
        }

        let mut lines: Vec<&str> = node.label().lines().collect();
        lines.extend(node.detail());
        group.add(self.text_block(&lines, cx, cy, 13, false))
    }

    fn draw_table_text(
        &self,
        mut group: svg_element::Group,
        node: &SceneNode,
        bounds: Rect,
    ) -> svg_element::Group {
        let line_height = self.engine.line_height();
        let header_bottom = bounds.y() + line_height + 10.0;
        group = group
            .add(self.text_block(
                &[node.label()],
                bounds.center().0,
                bounds.y() + (line_height + 10.0) / 2.0,
                13,
                true,
            ))
            .add(
                svg_element::Line::new()
                    .set("x1", bounds.x())
                    .set("y1", header_bottom)
                    .set("x2", bounds.max_x())
                    .set("y2", header_bottom)
                    .set("stroke", STROKE),
            );

        for (i, row) in node.rows().iter().enumerate() {
            let y = header_bottom + line_height * (i as f32 + 0.5);
            group = group.add(
                svg_element::Text::new("")
                    .set("x", bounds.x() + 8.0)
                    .set("y", y)
                    .set("dominant-baseline", "central")
                    .set("font-family", FONT)
                    .set("font-size", 12)
                    .add(SvgText::new(row.as_str())),
            );
        }
        group
    }

    fn draw_edge(&self, edge: &SceneEdge, layout: &SceneLayout) -> svg_element::Group {
        let from = layout.nodes()[edge.from()];
        let to = layout.nodes()[edge.to()];
        let (x1, y1) = boundary_point(from, to.center());
        let (x2, y2) = boundary_point(to, from.center());
        let stroke = edge.color().map_or_else(|| STROKE.to_string(), |c| c.to_hex());

        let mut line = svg_element::Line::new()
            .set("x1", x1)
            .set("y1", y1)
            .set("x2", x2)
            .set("y2", y2)
            .set("stroke", stroke);
        line = match edge.line() {
            LineStyle::Solid => line,
            LineStyle::Dashed => line.set("stroke-dasharray", "6 4"),
            LineStyle::Dotted => line.set("stroke-dasharray", "2 3"),
            LineStyle::Bold => line.set("stroke-width", 3),
        };
        line = match edge.arrow() {
            Arrow::Forward => line.set("marker-end", format!("url(#{MARKER_END})")),
            Arrow::Back => line.set("marker-start", format!("url(#{MARKER_START})")),
            Arrow::None => line,
        };

        let mut group = svg_element::Group::new().add(line);
        if let Some(label) = edge.label() {
            group = group.add(self.text_block(&[label], (x1 + x2) / 2.0, (y1 + y2) / 2.0 - 8.0, 11, false));
        }
        // End labels sit a fifth of the way in from each end.
        let along = |t: f32| (x1 + (x2 - x1) * t, y1 + (y2 - y1) * t - 8.0);
        if let Some(tail) = edge.tail_label() {
            let (x, y) = along(0.2);
            group = group.add(self.text_block(&[tail], x, y, 11, false));
        }
        if let Some(head) = edge.head_label() {
            let (x, y) = along(0.8);
            group = group.add(self.text_block(&[head], x, y, 11, false));
        }
        group
    }

    /// Centered multi-line text around (`x`, `y`).
    fn text_block(&self, lines: &[&str], x: f32, y: f32, size: u32, bold: bool) -> svg_element::Text {
        let line_height = self.engine.line_height();
        let first_y = y - line_height * (lines.len() as f32 - 1.0) / 2.0;

        let mut text = svg_element::Text::new("")
            .set("text-anchor", "middle")
            .set("dominant-baseline", "central")
            .set("font-family", FONT)
            .set("font-size", size);
        if bold {
            text = text.set("font-weight", "bold");
        }
        for (i, line) in lines.iter().enumerate() {
            text = text.add(
                svg_element::TSpan::new("")
                    .set("x", x)
                    .set("y", first_y + line_height * i as f32)
                    .add(SvgText::new(*line)),
            );
        }
        text
    }
}

fn rect(bounds: Rect) -> svg_element::Rectangle {
    svg_element::Rectangle::new()
        .set("x", bounds.x())
        .set("y", bounds.y())
        .set("width", bounds.width())
        .set("height", bounds.height())
}

/// Point where the segment from the center of `bounds` to `target` leaves
/// the rectangle.
fn boundary_point(bounds: Rect, target: (f32, f32)) -> (f32, f32) {
    let (cx, cy) = bounds.center();
    let (dx, dy) = (target.0 - cx, target.1 - cy);
    if dx == 0.0 && dy == 0.0 {
        return (cx, cy);
    }
    let scale_x = if dx == 0.0 { f32::INFINITY } else { (bounds.width() / 2.0) / dx.abs() };
    let scale_y = if dy == 0.0 { f32::INFINITY } else { (bounds.height() / 2.0) / dy.abs() };
    let scale = scale_x.min(scale_y);
    (cx + dx * scale, cy + dy * scale)
}

fn marker_definitions() -> svg_element::Definitions {
    let color = STROKE;
    let marker = |id: &str, path: &str, ref_x: u32| {
        svg_element::Marker::new()
            .set("id", id)
            .set("viewBox", "0 0 10 10")
            .set("refX", ref_x)
            .set("refY", 5)
            .set("markerWidth", 6)
            .set("markerHeight", 6)
            .set("orient", "auto")
            .add(svg_element::Path::new().set("d", path).set("fill", color))
    };
    svg_element::Definitions::new()
        .add(marker(MARKER_END, "M 0 0 L 10 5 L 0 10 z", 9))
        .add(marker(MARKER_START, "M 10 0 L 0 5 L 10 10 z", 1))
}
