//! In-memory diagram model.
//!
//! A [`Diagram`] is what a script evaluation produces: a tree of clusters
//! rooted at a cluster titled with the diagram name, provider nodes placed
//! in those clusters, and edges between nodes. Renderers consume it through
//! the `diagrammer` crate's scene lowering.

use std::{fmt, str::FromStr};

use crate::{capability::NodeKind, color::Color};

/// Index of a cluster within its [`Diagram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(usize);

impl ClusterId {
    /// Position of the cluster in [`Diagram::clusters`].
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Index of a node within its [`Diagram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in [`Diagram::nodes`].
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Flow direction of the rendered diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    LeftRight,
    TopBottom,
    BottomTop,
    RightLeft,
}

impl Direction {
    /// Graphviz `rankdir` spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::LeftRight => "LR",
            Direction::TopBottom => "TB",
            Direction::BottomTop => "BT",
            Direction::RightLeft => "RL",
        }
    }

    /// Returns `true` when ranks advance along the x axis.
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::LeftRight | Direction::RightLeft)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LR" => Ok(Direction::LeftRight),
            "TB" => Ok(Direction::TopBottom),
            "BT" => Ok(Direction::BottomTop),
            "RL" => Ok(Direction::RightLeft),
            other => Err(format!(
                "invalid direction `{other}`; expected one of LR, TB, BT, RL"
            )),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way an edge points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeDirection {
    /// Written `a >> b`; arrow head at `b`.
    Forward,
    /// Written `a << b`; arrow head at `a`.
    Back,
    /// Written `a - b`; no arrow head.
    Undirected,
}

/// Line style of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Bold,
}

impl LineStyle {
    /// Graphviz `style` spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStyle::Solid => "solid",
            LineStyle::Dashed => "dashed",
            LineStyle::Dotted => "dotted",
            LineStyle::Bold => "bold",
        }
    }
}

impl FromStr for LineStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solid" => Ok(LineStyle::Solid),
            "dashed" => Ok(LineStyle::Dashed),
            "dotted" => Ok(LineStyle::Dotted),
            "bold" => Ok(LineStyle::Bold),
            other => Err(format!(
                "invalid edge style `{other}`; expected one of solid, dashed, dotted, bold"
            )),
        }
    }
}

/// Optional presentation attributes of an edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeStyle {
    label: Option<String>,
    color: Option<Color>,
    line: LineStyle,
}

impl EdgeStyle {
    /// Creates an edge style.
    pub fn new(label: Option<String>, color: Option<Color>, line: LineStyle) -> Self {
        Self { label, color, line }
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
}

/// A group of nodes drawn inside a labelled box.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    title: String,
    parent: Option<ClusterId>,
    background: Option<Color>,
}

impl Cluster {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Enclosing cluster; `None` only for the diagram's root cluster.
    pub fn parent(&self) -> Option<ClusterId> {
        self.parent
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }
}

/// A provider node such as `EC2("web")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    label: String,
    kind: NodeKind,
    cluster: ClusterId,
}

impl Node {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Cluster that directly contains the node.
    pub fn cluster(&self) -> ClusterId {
        self.cluster
    }
}

/// A connection between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    from: NodeId,
    to: NodeId,
    direction: EdgeDirection,
    style: EdgeStyle,
}

impl Edge {
    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn direction(&self) -> EdgeDirection {
        self.direction
    }

    pub fn style(&self) -> &EdgeStyle {
        &self.style
    }
}

/// A complete diagram.
///
/// # Examples
///
/// ```
/// use diagrammer_core::{
///     capability::{Capability, CapabilitySet},
///     diagram::{Diagram, EdgeDirection, EdgeStyle},
///     family::Family,
/// };
///
/// let caps = CapabilitySet::for_family(Family::Aws);
/// let Some(Capability::Node(ec2)) = caps.get("EC2") else { unreachable!() };
///
/// let mut diagram = Diagram::new("web");
/// let cluster = diagram.add_cluster(diagram.root(), "tier");
/// let a = diagram.add_node(cluster, *ec2, "a");
/// let b = diagram.add_node(diagram.root(), *ec2, "b");
/// diagram.add_edge(a, b, EdgeDirection::Forward, EdgeStyle::default());
///
/// assert_eq!(diagram.clusters().len(), 2);
/// assert_eq!(diagram.clusters()[0].title(), "web");
/// assert_eq!(diagram.edges().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    name: String,
    direction: Direction,
    filename: Option<String>,
    graph_attrs: Vec<(String, String)>,
    clusters: Vec<Cluster>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Diagram {
    /// Creates an empty diagram whose root cluster is titled `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            clusters: vec![Cluster {
                title: name.clone(),
                parent: None,
                background: None,
            }],
            name,
            direction: Direction::default(),
            filename: None,
            graph_attrs: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Requested output file stem, if the script chose one.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = Some(filename.into());
    }

    /// Extra renderer attributes, in insertion order.
    pub fn graph_attrs(&self) -> &[(String, String)] {
        &self.graph_attrs
    }

    /// Sets a renderer attribute, replacing an earlier value for `key`.
    pub fn set_graph_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.graph_attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.graph_attrs.push((key, value)),
        }
    }

    /// The root cluster, titled with the diagram name.
    pub fn root(&self) -> ClusterId {
        ClusterId(0)
    }

    /// All clusters; index 0 is the root.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id.0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Adds a cluster nested in `parent`.
    pub fn add_cluster(&mut self, parent: ClusterId, title: impl Into<String>) -> ClusterId {
        self.clusters.push(Cluster {
            title: title.into(),
            parent: Some(parent),
            background: None,
        });
        ClusterId(self.clusters.len() - 1)
    }

    pub fn set_cluster_background(&mut self, id: ClusterId, color: Color) {
        self.clusters[id.0].background = Some(color);
    }

    /// Adds a node to `cluster`.
    pub fn add_node(
        &mut self,
        cluster: ClusterId,
        kind: NodeKind,
        label: impl Into<String>,
    ) -> NodeId {
        self.nodes.push(Node {
            label: label.into(),
            kind,
            cluster,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Connects two nodes.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        direction: EdgeDirection,
        style: EdgeStyle,
    ) {
        self.edges.push(Edge {
            from,
            to,
            direction,
            style,
        });
    }

    /// Clusters directly nested in `parent`.
    pub fn child_clusters(&self, parent: ClusterId) -> impl Iterator<Item = ClusterId> + '_ {
        self.clusters
            .iter()
            .enumerate()
            .filter(move |(_, cluster)| cluster.parent == Some(parent))
            .map(|(idx, _)| ClusterId(idx))
    }

    /// Nodes directly contained in `cluster`.
    pub fn cluster_nodes(&self, cluster: ClusterId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.cluster == cluster)
            .map(|(idx, _)| NodeId(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capability::{Capability, CapabilitySet},
        family::Family,
    };

    fn server_kind() -> NodeKind {
        match CapabilitySet::for_family(Family::Onprem).get("Server") {
            Some(Capability::Node(kind)) => *kind,
            other => panic!("Expected Server node, got {other:?}"),
        }
    }

    #[test]
    fn test_new_diagram_has_root_cluster() {
        let diagram = Diagram::new("t");
        assert_eq!(diagram.name(), "t");
        assert_eq!(diagram.clusters().len(), 1);
        assert_eq!(diagram.cluster(diagram.root()).title(), "t");
        assert!(diagram.cluster(diagram.root()).parent().is_none());
        assert!(diagram.nodes().is_empty());
        assert_eq!(diagram.direction(), Direction::LeftRight);
    }

    #[test]
    fn test_nested_clusters_and_membership() {
        let mut diagram = Diagram::new("infra");
        let outer = diagram.add_cluster(diagram.root(), "outer");
        let inner = diagram.add_cluster(outer, "inner");
        let node = diagram.add_node(inner, server_kind(), "app");
        diagram.add_node(diagram.root(), server_kind(), "edge");

        assert_eq!(diagram.child_clusters(diagram.root()).collect::<Vec<_>>(), vec![outer]);
        assert_eq!(diagram.child_clusters(outer).collect::<Vec<_>>(), vec![inner]);
        assert_eq!(diagram.cluster_nodes(inner).collect::<Vec<_>>(), vec![node]);
        assert_eq!(diagram.cluster_nodes(diagram.root()).count(), 1);
        assert_eq!(diagram.node(node).label(), "app");
    }

    #[test]
    fn test_graph_attr_replaces_existing_key() {
        let mut diagram = Diagram::new("t");
        diagram.set_graph_attr("bgcolor", "white");
        diagram.set_graph_attr("pad", "0.5");
        diagram.set_graph_attr("bgcolor", "lightgrey");

        assert_eq!(
            diagram.graph_attrs(),
            &[
                ("bgcolor".to_string(), "lightgrey".to_string()),
                ("pad".to_string(), "0.5".to_string()),
            ]
        );
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("TB".parse::<Direction>(), Ok(Direction::TopBottom));
        assert!("diagonal".parse::<Direction>().is_err());
        assert!(Direction::RightLeft.is_horizontal());
        assert!(!Direction::BottomTop.is_horizontal());
    }

    #[test]
    fn test_line_style_parse() {
        assert_eq!("dashed".parse::<LineStyle>(), Ok(LineStyle::Dashed));
        assert!("wavy".parse::<LineStyle>().is_err());
    }
}
