//! Renderer-neutral scene graph.
//!
//! Every family lowers its evaluated input into a [`Scene`]: nested groups,
//! nodes and edges with presentation hints. Renderers only ever see scenes,
//! so adding a family never touches a renderer and vice versa.

use log::debug;
use thiserror::Error;

use diagrammer_core::{
    capability::Category,
    color::Color,
    diagram::{Diagram, Direction, EdgeDirection, LineStyle},
    erd::Schema,
};

/// Outline of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Box,
    RoundedBox,
    Ellipse,
    /// Diamond with marked corners (Graphviz `Mdiamond`).
    Diamond,
    /// A titled list of rows, one per entity column.
    Table,
}

/// Where an edge draws its arrow head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arrow {
    /// At the target.
    Forward,
    /// At the source.
    Back,
    None,
}

impl From<EdgeDirection> for Arrow {
    fn from(direction: EdgeDirection) -> Self {
        match direction {
            EdgeDirection::Forward => Arrow::Forward,
            EdgeDirection::Back => Arrow::Back,
            EdgeDirection::Undirected => Arrow::None,
        }
    }
}

/// A nested container of nodes. Group 0 is the scene itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    label: String,
    parent: Option<usize>,
    background: Option<Color>,
}

impl Group {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    label: String,
    detail: Option<String>,
    rows: Vec<String>,
    shape: Shape,
    fill: Option<Color>,
    group: usize,
}

impl SceneNode {
    fn new(label: impl Into<String>, shape: Shape, group: usize) -> Self {
        Self {
            label: label.into(),
            detail: None,
            rows: Vec::new(),
            shape,
            fill: None,
            group,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn with_fill(mut self, fill: Option<Color>) -> Self {
        self.fill = fill;
        self
    }

    fn with_rows(mut self, rows: Vec<String>) -> Self {
        self.rows = rows;
        self
    }

    /// Main text.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Secondary text drawn smaller under the label.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Table rows; empty unless the shape is [`Shape::Table`].
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn fill(&self) -> Option<Color> {
        self.fill
    }

    pub fn group(&self) -> usize {
        self.group
    }

    /// Number of text lines the node displays.
    pub fn line_count(&self) -> usize {
        1 + usize::from(self.detail.is_some()) + self.rows.len()
    }

    /// Length in characters of the longest displayed line.
    pub fn widest_line(&self) -> usize {
        std::iter::once(self.label.as_str())
            .chain(self.detail.as_deref())
            .chain(self.rows.iter().map(String::as_str))
            .flat_map(str::lines)
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEdge {
    from: usize,
    to: usize,
    arrow: Arrow,
    label: Option<String>,
    color: Option<Color>,
    line: LineStyle,
    tail_label: Option<String>,
    head_label: Option<String>,
}

impl SceneEdge {
    fn new(from: usize, to: usize, arrow: Arrow) -> Self {
        Self {
            from,
            to,
            arrow,
            label: None,
            color: None,
            line: LineStyle::default(),
            tail_label: None,
            head_label: None,
        }
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    pub fn arrow(&self) -> Arrow {
        self.arrow
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn line(&self) -> LineStyle {
        self.line
    }

    /// Text at the source end, such as a cardinality.
    pub fn tail_label(&self) -> Option<&str> {
        self.tail_label.as_deref()
    }

    /// Text at the target end.
    pub fn head_label(&self) -> Option<&str> {
        self.head_label.as_deref()
    }
}

/// Returned when a JSON document expands to more nodes than allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("JSON document expands to more than {limit} nodes")]
pub struct JsonTooLarge {
    pub limit: usize,
}

/// A renderer-neutral diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    title: String,
    direction: Direction,
    attributes: Vec<(String, String)>,
    groups: Vec<Group>,
    nodes: Vec<SceneNode>,
    edges: Vec<SceneEdge>,
}

impl Scene {
    /// Creates an empty scene; its root group carries `title`.
    pub fn new(title: impl Into<String>, direction: Direction) -> Self {
        let title = title.into();
        Self {
            groups: vec![Group {
                label: title.clone(),
                parent: None,
                background: None,
            }],
            title,
            direction,
            attributes: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub const ROOT: usize = 0;

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Extra graph attributes passed through to renderers that know them.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[SceneEdge] {
        &self.edges
    }

    /// Groups directly nested in `parent`.
    pub fn child_groups(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(_, group)| group.parent == Some(parent))
            .map(|(idx, _)| idx)
    }

    /// Nodes directly in `group`.
    pub fn group_nodes(&self, group: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.group == group)
            .map(|(idx, _)| idx)
    }

    /// Nesting depth of `group`; the root is 0.
    pub fn group_depth(&self, group: usize) -> usize {
        let mut depth = 0;
        let mut current = self.groups.get(group).and_then(|g| g.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.groups.get(parent).and_then(|g| g.parent);
        }
        depth
    }

    /// Returns `true` if `group` is `ancestor` or nested inside it.
    pub fn is_within(&self, group: usize, ancestor: usize) -> bool {
        let mut current = Some(group);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.groups.get(idx).and_then(|g| g.parent);
        }
        false
    }

    fn add_group(&mut self, parent: usize, label: impl Into<String>, background: Option<Color>) -> usize {
        self.groups.push(Group {
            label: label.into(),
            parent: Some(parent),
            background,
        });
        self.groups.len() - 1
    }

    fn add_node(&mut self, node: SceneNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn add_edge(&mut self, edge: SceneEdge) {
        self.edges.push(edge);
    }

    /// Lowers a diagram built by a script.
    ///
    /// Clusters become groups with the same indices, so group 0 is the
    /// diagram's root cluster. Nodes show their label with the provider
    /// symbol as detail and are tinted by category.
    pub fn from_diagram(diagram: &Diagram) -> Self {
        let mut scene = Scene::new(diagram.name(), diagram.direction());
        scene.attributes = diagram.graph_attrs().to_vec();

        for cluster in diagram.clusters().iter().skip(1) {
            let parent = cluster.parent().map_or(Scene::ROOT, |p| p.index());
            scene.add_group(parent, cluster.title(), cluster.background());
        }

        for node in diagram.nodes() {
            let kind = node.kind();
            let scene_node = if node.label().is_empty() {
                SceneNode::new(kind.name(), Shape::Box, node.cluster().index())
            } else {
                SceneNode::new(node.label(), Shape::Box, node.cluster().index())
                    .with_detail(kind.name())
            };
            scene.add_node(scene_node.with_fill(category_fill(kind.category())));
        }

        for edge in diagram.edges() {
            let style = edge.style();
            let mut scene_edge = SceneEdge::new(
                edge.from().index(),
                edge.to().index(),
                Arrow::from(edge.direction()),
            );
            scene_edge.label = style.label().map(str::to_string);
            scene_edge.color = style.color();
            scene_edge.line = style.line();
            scene.add_edge(scene_edge);
        }

        debug!(
            nodes = scene.nodes.len(),
            edges = scene.edges.len(),
            groups = scene.groups.len();
            "Diagram lowered to scene"
        );
        scene
    }

    /// Lowers an entity-relationship schema.
    ///
    /// Entities become tables listing their columns; relations become
    /// undirected edges with the cardinality ranges at each end.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut scene = Scene::new(schema.title().unwrap_or(""), Direction::LeftRight);

        for entity in schema.entities() {
            let rows = entity.columns().iter().map(|c| c.display_text()).collect();
            let node = SceneNode::new(entity.title(), Shape::Table, Scene::ROOT)
                .with_rows(rows)
                .with_fill(entity.background());
            scene.add_node(node);
        }

        let index_of = |name: &str| schema.entities().iter().position(|e| e.name() == name);
        for relation in schema.relations() {
            let (Some(from), Some(to)) = (index_of(relation.left()), index_of(relation.right()))
            else {
                continue;
            };
            let mut edge = SceneEdge::new(from, to, Arrow::None);
            edge.label = relation.label().map(str::to_string);
            edge.tail_label = Some(relation.left_cardinality().range().to_string());
            edge.head_label = Some(relation.right_cardinality().range().to_string());
            scene.add_edge(edge);
        }

        debug!(
            entities = scene.nodes.len(),
            relations = scene.edges.len();
            "Schema lowered to scene"
        );
        scene
    }

    /// Lowers a JSON document into a tree rooted at a "JSON Root" node.
    ///
    /// Object members become rounded boxes labelled with their key; scalar
    /// members show their JSON-encoded value as detail. Array items are
    /// labelled `Index n`: containers as ellipses, scalars as boxes with
    /// their value.
    ///
    /// # Errors
    ///
    /// Returns [`JsonTooLarge`] if the tree would exceed `max_nodes`.
    pub fn from_json(value: &serde_json::Value, max_nodes: usize) -> Result<Self, JsonTooLarge> {
        let mut scene = Scene::new("JSON", Direction::TopBottom);
        let root = scene.add_node(SceneNode::new("JSON Root", Shape::Diamond, Scene::ROOT));

        let mut pending = vec![(value, root)];
        while let Some((value, parent)) = pending.pop() {
            let children: Vec<(SceneNode, Option<&serde_json::Value>)> = match value {
                serde_json::Value::Object(members) => members
                    .iter()
                    .map(|(key, member)| {
                        let node = SceneNode::new(key.as_str(), Shape::RoundedBox, Scene::ROOT);
                        if is_container(member) {
                            (node, Some(member))
                        } else {
                            (node.with_detail(member.to_string()), None)
                        }
                    })
                    .collect(),
                serde_json::Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        let label = format!("Index {idx}");
                        if is_container(item) {
                            (SceneNode::new(label, Shape::Ellipse, Scene::ROOT), Some(item))
                        } else {
                            (
                                SceneNode::new(label, Shape::Box, Scene::ROOT)
                                    .with_detail(item.to_string()),
                                None,
                            )
                        }
                    })
                    .collect(),
                _ => Vec::new(),
            };

            // Push in reverse so siblings are expanded in document order.
            let mut expand = Vec::new();
            for (node, nested) in children {
                if scene.nodes.len() >= max_nodes {
                    return Err(JsonTooLarge { limit: max_nodes });
                }
                let id = scene.add_node(node);
                scene.add_edge(SceneEdge::new(parent, id, Arrow::Forward));
                if let Some(nested) = nested {
                    expand.push((nested, id));
                }
            }
            pending.extend(expand.into_iter().rev());
        }

        debug!(nodes = scene.nodes.len(); "JSON document lowered to scene");
        Ok(scene)
    }
}

fn is_container(value: &serde_json::Value) -> bool {
    value.is_object() || value.is_array()
}

fn category_fill(category: Category) -> Option<Color> {
    let hex = match category {
        Category::Compute => "#fde9d9",
        Category::Database => "#dae8fc",
        Category::Network => "#e1d5e7",
        Category::Storage => "#d5e8d4",
        Category::Analytics => "#fff2cc",
    };
    Color::new(hex).ok()
}

#[cfg(test)]
mod tests {
    use diagrammer_core::capability::build_capabilities;
    use diagrammer_parser::{Limits, evaluate, parse_erd};
    use serde_json::json;

    use super::*;

    fn script_scene(source: &str) -> Scene {
        let caps = build_capabilities("aws").unwrap();
        Scene::from_diagram(&evaluate(source, &caps, &Limits::default()).unwrap())
    }

    #[test]
    fn test_single_cluster_diagram() {
        let scene = script_scene("graph = Diagram('t')\n");
        assert_eq!(scene.title(), "t");
        assert_eq!(scene.groups().len(), 1);
        assert_eq!(scene.groups()[0].label(), "t");
        assert!(scene.nodes().is_empty());
    }

    #[test]
    fn test_diagram_lowering() {
        let scene = script_scene(
            "with Diagram('web', direction='TB') as graph:\n    with Cluster('tier', graph_attr={'bgcolor': 'lightyellow'}):\n        a = EC2('app')\n    a >> Edge(label='sql') >> RDS('')\n",
        );

        assert_eq!(scene.direction(), Direction::TopBottom);
        assert_eq!(scene.groups().len(), 2);
        assert!(scene.groups()[1].background().is_some());
        assert_eq!(scene.group_depth(1), 1);

        let app = &scene.nodes()[0];
        assert_eq!(app.label(), "app");
        assert_eq!(app.detail(), Some("EC2"));
        assert_eq!(app.group(), 1);
        assert!(app.fill().is_some());

        // Unlabelled nodes fall back to their symbol.
        assert_eq!(scene.nodes()[1].label(), "RDS");
        assert_eq!(scene.nodes()[1].detail(), None);

        let edge = &scene.edges()[0];
        assert_eq!(edge.arrow(), Arrow::Forward);
        assert_eq!(edge.label(), Some("sql"));
    }

    #[test]
    fn test_schema_lowering() {
        let schema = parse_erd("title {label: \"Shop\"}\n[Person]\n*id\n[City]\nPerson *--1 City\n").unwrap();
        let scene = Scene::from_schema(&schema);

        assert_eq!(scene.title(), "Shop");
        assert_eq!(scene.nodes()[0].shape(), Shape::Table);
        assert_eq!(scene.nodes()[0].rows(), ["PK id"]);
        let edge = &scene.edges()[0];
        assert_eq!(edge.arrow(), Arrow::None);
        assert_eq!(edge.tail_label(), Some("0..N"));
        assert_eq!(edge.head_label(), Some("1"));
    }

    #[test]
    fn test_json_lowering_follows_document_order() {
        let doc = json!({
            "name": "shop",
            "tags": ["a", {"k": 1}],
        });
        let scene = Scene::from_json(&doc, 100).unwrap();
        let labels: Vec<(&str, Option<&str>, Shape)> = scene
            .nodes()
            .iter()
            .map(|n| (n.label(), n.detail(), n.shape()))
            .collect();

        assert_eq!(
            labels,
            [
                ("JSON Root", None, Shape::Diamond),
                ("name", Some("\"shop\""), Shape::RoundedBox),
                ("tags", None, Shape::RoundedBox),
                ("Index 0", Some("\"a\""), Shape::Box),
                ("Index 1", None, Shape::Ellipse),
                ("k", Some("1"), Shape::RoundedBox),
            ]
        );
        assert_eq!(scene.edges().len(), 5);
        assert!(scene.edges().iter().all(|e| e.arrow() == Arrow::Forward));
    }

    #[test]
    fn test_json_scalar_root_is_just_the_root() {
        let scene = Scene::from_json(&json!(42), 10).unwrap();
        assert_eq!(scene.nodes().len(), 1);
    }

    #[test]
    fn test_json_node_limit() {
        let doc = serde_json::Value::Array((0..50).map(|i| json!(i)).collect());
        assert_eq!(Scene::from_json(&doc, 10), Err(JsonTooLarge { limit: 10 }));
    }

    #[test]
    fn test_node_text_metrics() {
        let node = SceneNode::new("web", Shape::Table, 0)
            .with_detail("EC2")
            .with_rows(vec!["PK identifier".to_string()]);
        assert_eq!(node.line_count(), 3);
        assert_eq!(node.widest_line(), 13);
    }
}
