//! Layered layout for the native renderer.
//!
//! Nodes are assigned to layers by a breadth-first walk from the nodes
//! with no incoming edges. Layers advance along the scene direction and
//! nodes stack across it, kept together by group. Groups are drawn as
//! padded boxes around every node they contain.

use std::{
    cmp::Ordering,
    collections::{HashSet, VecDeque},
};

use petgraph::{
    Direction as EdgeDirection,
    graph::{DiGraph, NodeIndex},
};

use diagrammer_core::diagram::Direction;

use crate::scene::{Scene, SceneNode, Shape};

/// Axis-aligned rectangle in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Smallest rectangle containing both.
    pub fn merge(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.max_x().max(other.max_x()) - x,
            self.max_y().max(other.max_y()) - y,
        )
    }

    /// Grows the rectangle by `amount` on every side and by `top` more above.
    fn pad(&self, amount: f32, top: f32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount - top,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount + top,
        )
    }

    fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Returns `true` if `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }
}

/// Positions of every scene element.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLayout {
    nodes: Vec<Rect>,
    groups: Vec<Option<Rect>>,
    width: f32,
    height: f32,
}

impl SceneLayout {
    /// Bounds of each node, indexed like [`Scene::nodes`].
    pub fn nodes(&self) -> &[Rect] {
        &self.nodes
    }

    /// Bounds of each group; `None` for the root and for empty groups.
    pub fn group(&self, group: usize) -> Option<Rect> {
        self.groups.get(group).copied().flatten()
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }
}

/// Text metrics and spacing of the layout.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    padding: f32,
    group_padding: f32,
    text_padding: f32,
    char_width: f32,
    line_height: f32,
    margin: f32,
    title_height: f32,
    min_node_width: f32,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            padding: 40.0,
            group_padding: 14.0,
            text_padding: 10.0,
            char_width: 8.0,
            line_height: 18.0,
            margin: 20.0,
            title_height: 36.0,
            min_node_width: 80.0,
        }
    }
}

impl LayoutEngine {
    pub fn char_width(&self) -> f32 {
        self.char_width
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Size of a node's outline.
    pub fn node_size(&self, node: &SceneNode) -> (f32, f32) {
        let width = (node.widest_line() as f32 * self.char_width + 2.0 * self.text_padding)
            .max(self.min_node_width);
        let height = node.line_count() as f32 * self.line_height + 2.0 * self.text_padding;
        match node.shape() {
            Shape::Ellipse | Shape::Diamond => (width * 1.4, height * 1.4),
            Shape::Box | Shape::RoundedBox | Shape::Table => (width, height),
        }
    }

    /// Lays out `scene`.
    pub fn calculate(&self, scene: &Scene) -> SceneLayout {
        let sizes: Vec<(f32, f32)> = scene.nodes().iter().map(|n| self.node_size(n)).collect();
        let horizontal = scene.direction().is_horizontal();
        // Extent of a node along the direction of flow and across it.
        let along = |idx: usize| if horizontal { sizes[idx].0 } else { sizes[idx].1 };
        let across = |idx: usize| if horizontal { sizes[idx].1 } else { sizes[idx].0 };

        // Step 1: Assign layers
        let mut layers = assign_layers(&node_graph(scene));
        let group_order = group_order(scene);
        for layer in &mut layers {
            layer.sort_by_key(|&idx| (group_order[scene.nodes()[idx].group()], idx));
        }

        // Step 2: Calculate layer extents and spacings
        let layer_extents: Vec<f32> = layers
            .iter()
            .map(|layer| {
                layer
                    .iter()
                    .map(|&idx| along(idx))
                    .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Less))
                    .unwrap_or_default()
            })
            .collect();
        let spacings = self.layer_spacings(scene, &layers);

        // Step 3: Calculate positions of the layers along the flow
        let mut layer_positions = Vec::with_capacity(layers.len());
        let mut position = 0.0;
        for (i, extent) in layer_extents.iter().enumerate() {
            layer_positions.push(position + extent / 2.0);
            position += extent + spacings.get(i).copied().unwrap_or(self.padding);
        }
        let flow_length = position;

        // Step 4: Stack nodes across each layer, centered on the widest layer
        let stack_extent = |layer: &[usize]| -> f32 {
            let gaps = layer.len().saturating_sub(1) as f32 * self.padding;
            layer.iter().map(|&idx| across(idx)).sum::<f32>() + gaps
        };
        let widest = layers
            .iter()
            .map(|layer| stack_extent(layer))
            .fold(0.0_f32, f32::max);

        let mut nodes = vec![Rect::default(); scene.nodes().len()];
        for (layer_idx, layer) in layers.iter().enumerate() {
            let mut offset = (widest - stack_extent(layer)) / 2.0;
            for &idx in layer {
                let mut flow = layer_positions[layer_idx];
                if matches!(
                    scene.direction(),
                    Direction::BottomTop | Direction::RightLeft
                ) {
                    flow = flow_length - flow;
                }
                let cross = offset + across(idx) / 2.0;
                let (cx, cy) = if horizontal {
                    (flow, cross)
                } else {
                    (cross, flow)
                };
                nodes[idx] = Rect::from_center(cx, cy, sizes[idx].0, sizes[idx].1);
                offset += across(idx) + self.padding;
            }
        }

        // Step 5: Wrap groups around their nodes
        let mut groups: Vec<Option<Rect>> = (0..scene.groups().len())
            .map(|group| {
                if group == Scene::ROOT {
                    return None;
                }
                let members = (0..scene.nodes().len())
                    .filter(|&idx| scene.is_within(scene.nodes()[idx].group(), group))
                    .map(|idx| nodes[idx]);
                let bounds = members.reduce(|acc, rect| acc.merge(&rect))?;
                let depth_below = nesting_below(scene, group) as f32;
                Some(bounds.pad(
                    self.group_padding * (1.0 + depth_below),
                    self.line_height * (1.0 + depth_below),
                ))
            })
            .collect();

        // Step 6: Move everything below the title, inside the margin
        let content = nodes
            .iter()
            .chain(groups.iter().flatten())
            .copied()
            .reduce(|acc, rect| acc.merge(&rect))
            .unwrap_or_default();
        let dx = self.margin - content.x();
        let dy = self.margin + self.title_height - content.y();
        for rect in nodes.iter_mut().chain(groups.iter_mut().flatten()) {
            *rect = rect.translate(dx, dy);
        }

        let title_width = scene.title().chars().count() as f32 * self.char_width * 1.5;
        SceneLayout {
            nodes,
            groups,
            width: content.width().max(title_width) + 2.0 * self.margin,
            height: content.height() + self.title_height + 2.0 * self.margin,
        }
    }

    /// Widens the gap after a layer when an edge label leaving it needs room.
    fn layer_spacings(&self, scene: &Scene, layers: &[Vec<usize>]) -> Vec<f32> {
        let mut layer_of = vec![0; scene.nodes().len()];
        for (layer_idx, layer) in layers.iter().enumerate() {
            for &idx in layer {
                layer_of[idx] = layer_idx;
            }
        }

        let mut spacings = vec![self.padding; layers.len().saturating_sub(1)];
        for edge in scene.edges() {
            let Some(label) = edge.label() else {
                continue;
            };
            let (from, to) = (layer_of[edge.from()], layer_of[edge.to()]);
            if from == to {
                continue;
            }
            let needed = label.chars().count() as f32 * self.char_width + 30.0;
            if let Some(spacing) = spacings.get_mut(from.min(to)) {
                *spacing = spacing.max(needed);
            }
        }
        spacings
    }
}

fn node_graph(scene: &Scene) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::new();
    let indices: Vec<NodeIndex> = (0..scene.nodes().len()).map(|idx| graph.add_node(idx)).collect();
    for edge in scene.edges() {
        if edge.from() != edge.to() {
            graph.add_edge(indices[edge.from()], indices[edge.to()], ());
        }
    }
    graph
}

/// Breadth-first layering from the roots. Nodes only reachable through a
/// cycle seed a new walk so every node lands in some layer.
fn assign_layers(graph: &DiGraph<usize, ()>) -> Vec<Vec<usize>> {
    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut visited = HashSet::new();

    let roots = graph.node_indices().filter(|&idx| {
        graph
            .neighbors_directed(idx, EdgeDirection::Incoming)
            .next()
            .is_none()
    });
    let seeds: Vec<NodeIndex> = roots.chain(graph.node_indices()).collect();

    for seed in seeds {
        if visited.contains(&seed) {
            continue;
        }
        let mut queue = VecDeque::from([(seed, 0)]);
        while let Some((idx, layer)) = queue.pop_front() {
            if !visited.insert(idx) {
                continue;
            }
            while layers.len() <= layer {
                layers.push(Vec::new());
            }
            layers[layer].push(graph[idx]);

            for child in graph.neighbors(idx) {
                if !visited.contains(&child) {
                    queue.push_back((child, layer + 1));
                }
            }
        }
    }

    layers
}

/// Pre-order position of every group, so siblings stack in declaration order.
fn group_order(scene: &Scene) -> Vec<usize> {
    let mut order = vec![0; scene.groups().len()];
    let mut next = 0;
    let mut stack = vec![Scene::ROOT];
    while let Some(group) = stack.pop() {
        order[group] = next;
        next += 1;
        let children: Vec<usize> = scene.child_groups(group).collect();
        stack.extend(children.into_iter().rev());
    }
    order
}

/// Number of group levels nested inside `group`.
fn nesting_below(scene: &Scene, group: usize) -> usize {
    scene
        .child_groups(group)
        .map(|child| 1 + nesting_below(scene, child))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use diagrammer_core::capability::build_capabilities;
    use diagrammer_parser::{Limits, evaluate};

    use super::*;

    fn scene(source: &str) -> Scene {
        let caps = build_capabilities("onprem").unwrap();
        Scene::from_diagram(&evaluate(source, &caps, &Limits::default()).unwrap())
    }

    #[test]
    fn test_left_right_layers_advance_along_x() {
        let layout = LayoutEngine::default().calculate(&scene(
            "with Diagram('x') as graph:\n    Nginx('a') >> Server('b') >> Redis('c')\n",
        ));
        let xs: Vec<f32> = layout.nodes().iter().map(|r| r.center().0).collect();
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
        let ys: Vec<f32> = layout.nodes().iter().map(|r| r.center().1).collect();
        assert!(approx_eq!(f32, ys[0], ys[1]));
        assert!(approx_eq!(f32, ys[1], ys[2]));
    }

    #[test]
    fn test_bottom_top_is_mirrored() {
        let layout = LayoutEngine::default().calculate(&scene(
            "with Diagram('x', direction='BT') as graph:\n    Nginx('a') >> Server('b')\n",
        ));
        let (a, b) = (layout.nodes()[0], layout.nodes()[1]);
        assert!(a.center().1 > b.center().1);
        assert!(approx_eq!(f32, a.center().0, b.center().0));
    }

    #[test]
    fn test_fan_out_stacks_across_the_layer() {
        let layout = LayoutEngine::default().calculate(&scene(
            "with Diagram('x', direction='TB') as graph:\n    Nginx('lb') >> [Server('a'), Server('b')]\n",
        ));
        let (a, b) = (layout.nodes()[1], layout.nodes()[2]);
        assert!(approx_eq!(f32, a.center().1, b.center().1));
        assert!(a.max_x() < b.x());
        // The single root is centered over its children.
        let root_x = layout.nodes()[0].center().0;
        assert!(approx_eq!(f32, root_x, (a.center().0 + b.center().0) / 2.0, epsilon = 0.01));
    }

    #[test]
    fn test_groups_enclose_their_nodes() {
        let scene = scene(
            "with Diagram('x') as graph:\n    with Cluster('outer'):\n        with Cluster('inner'):\n            a = Server('a')\n        b = Server('b')\n    a >> b\n",
        );
        let layout = LayoutEngine::default().calculate(&scene);
        let outer = layout.group(1).unwrap();
        let inner = layout.group(2).unwrap();
        assert!(outer.contains(&inner));
        assert!(inner.contains(&layout.nodes()[0]));
        assert!(outer.contains(&layout.nodes()[1]));
        assert!(layout.group(Scene::ROOT).is_none());
    }

    #[test]
    fn test_cycles_place_every_node() {
        let layout = LayoutEngine::default().calculate(&scene(
            "with Diagram('x') as graph:\n    a = Server('a')\n    b = Server('b')\n    a >> b\n    b >> a\n",
        ));
        let (a, b) = (layout.nodes()[0], layout.nodes()[1]);
        assert!(a.max_x() < b.x());
    }

    #[test]
    fn test_edge_labels_widen_the_gap() {
        let engine = LayoutEngine::default();
        let plain = engine.calculate(&scene(
            "with Diagram('x') as graph:\n    Server('a') >> Server('b')\n",
        ));
        let labelled = engine.calculate(&scene(
            "with Diagram('x') as graph:\n    Server('a') >> Edge(label='a rather long label') >> Server('b')\n",
        ));
        let gap = |layout: &SceneLayout| layout.nodes()[1].x() - layout.nodes()[0].max_x();
        assert!(approx_eq!(f32, gap(&plain), 40.0));
        assert!(gap(&labelled) > gap(&plain));
    }

    #[test]
    fn test_content_starts_inside_the_margin() {
        let engine = LayoutEngine::default();
        let layout = engine.calculate(&scene("with Diagram('x') as graph:\n    Server('a')\n"));
        let node = layout.nodes()[0];
        assert!(approx_eq!(f32, node.x(), engine.margin()));
        assert!(layout.width() >= node.max_x() + engine.margin() - 0.01);
        assert!(layout.height() >= node.max_y() + engine.margin() - 0.01);
    }

    #[test]
    fn test_empty_scene() {
        let layout = LayoutEngine::default().calculate(&Scene::new("empty", Direction::LeftRight));
        assert!(layout.nodes().is_empty());
        assert!(layout.width() > 0.0);
    }
}
