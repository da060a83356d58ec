//! Graphviz backend.
//!
//! The scene is converted into a `dot-structures` graph. The `dot` format
//! is printed straight to the output file; every other format is produced
//! by piping the printed graph through the Graphviz binary, which is killed
//! once the configured timeout has passed.

use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use dot_structures::{
    Attribute, Edge, EdgeTy, Graph, GraphAttributes, Id, Node, NodeId, Stmt, Subgraph, Vertex,
};
use graphviz_rust::printer::PrinterContext;
use log::{debug, info, warn};

use super::{RenderError, Renderer, check_format};
use crate::{
    request::OutputFormat,
    scene::{Arrow, Scene, SceneNode, Shape},
};

const FONT: &str = "helvetica";

const ENGINES: [&str; 7] = ["dot", "neato", "twopi", "circo", "fdp", "sfdp", "patchwork"];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Renders through the Graphviz toolchain.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    engine: String,
    timeout: Duration,
}

impl GraphvizRenderer {
    /// Creates a renderer using the named layout engine.
    ///
    /// A Graphviz run that is still going after `timeout` is killed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Unavailable`] for an unknown engine name.
    pub fn new(engine: &str, timeout: Duration) -> Result<Self, RenderError> {
        if !ENGINES.contains(&engine) {
            return Err(RenderError::Unavailable(format!(
                "unknown Graphviz layout engine `{engine}`"
            )));
        }
        Ok(Self {
            engine: engine.to_string(),
            timeout,
        })
    }

    fn spawn(&self, format: OutputFormat, path: &Path) -> Result<Child, RenderError> {
        Command::new("dot")
            .arg(format!("-K{}", self.engine))
            .arg(format!("-T{}", format.extension()))
            .arg("-o")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => {
                    RenderError::Unavailable("the Graphviz `dot` binary is not installed".to_string())
                }
                _ => RenderError::Io(err),
            })
    }

    /// Waits for `child` until the deadline, killing it when time runs out.
    fn wait(&self, child: &mut Child) -> Result<ExitStatus, RenderError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if Instant::now() >= deadline {
                warn!(
                    engine = self.engine.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64;
                    "Graphviz did not finish in time, terminating"
                );
                if let Err(err) = child.kill() {
                    debug!(err:? = err; "Graphviz exited before it could be killed");
                }
                child.wait()?;
                return Err(RenderError::Timeout(self.timeout));
            }
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for GraphvizRenderer {
    fn default() -> Self {
        Self {
            engine: "dot".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Renderer for GraphvizRenderer {
    fn name(&self) -> &'static str {
        "graphviz"
    }

    fn supports(&self, _format: OutputFormat) -> bool {
        true
    }

    fn render(
        &self,
        scene: &Scene,
        out_dir: &Path,
        stem: &str,
        format: OutputFormat,
    ) -> Result<(), RenderError> {
        check_format(self, format)?;
        let path = out_dir.join(format!("{stem}.{}", format.extension()));
        let source = graphviz_rust::print(to_graph(scene), &mut PrinterContext::default());

        if format == OutputFormat::Dot {
            fs::write(&path, source)?;
            debug!(path = path.display().to_string(); "DOT source written");
            return Ok(());
        }

        info!(format = format.extension(), engine = self.engine.as_str(); "Invoking Graphviz");
        let mut child = self.spawn(format, &path)?;

        // Pipes are serviced off-thread; the deadline must hold even when one fills.
        let feeder = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || stdin.write_all(source.as_bytes()))
        });
        let drainer = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                stderr.read_to_string(&mut text).map(|_| text)
            })
        });

        let status = self.wait(&mut child)?;
        if let Some(Ok(Err(err))) = feeder.map(thread::JoinHandle::join) {
            debug!(err:? = err; "Graphviz stopped reading its input");
        }
        if status.success() {
            return Ok(());
        }
        let stderr = drainer
            .and_then(|handle| handle.join().ok())
            .and_then(Result::ok)
            .unwrap_or_default();
        Err(RenderError::Io(io::Error::other(format!(
            "Graphviz exited with {status}: {}",
            stderr.trim()
        ))))
    }
}

/// Builds the DOT graph of `scene`.
pub fn to_graph(scene: &Scene) -> Graph {
    let mut stmts = vec![
        Stmt::GAttribute(GraphAttributes::Graph(vec![
            attr("rankdir", plain(scene.direction().as_str())),
            attr("label", quoted(scene.title())),
            attr("labelloc", plain("t")),
            attr("fontname", plain(FONT)),
        ])),
        Stmt::GAttribute(GraphAttributes::Node(vec![
            attr("fontname", plain(FONT)),
            attr("shape", plain("box")),
        ])),
        Stmt::GAttribute(GraphAttributes::Edge(vec![attr("fontname", plain(FONT))])),
    ];
    for (key, value) in scene.attributes() {
        stmts.push(Stmt::Attribute(attr(key, quoted(value))));
    }

    group_stmts(scene, Scene::ROOT, &mut stmts);

    for edge in scene.edges() {
        let dir = match edge.arrow() {
            Arrow::Forward => "forward",
            Arrow::Back => "back",
            Arrow::None => "none",
        };
        let mut attributes = vec![
            attr("dir", plain(dir)),
            attr("style", plain(edge.line().as_str())),
        ];
        if let Some(label) = edge.label() {
            attributes.push(attr("label", quoted(label)));
        }
        if let Some(color) = edge.color() {
            attributes.push(attr("color", quoted(&color.to_hex())));
        }
        if let Some(tail) = edge.tail_label() {
            attributes.push(attr("taillabel", quoted(tail)));
        }
        if let Some(head) = edge.head_label() {
            attributes.push(attr("headlabel", quoted(head)));
        }
        stmts.push(Stmt::Edge(Edge {
            ty: EdgeTy::Pair(
                Vertex::N(node_id(edge.from())),
                Vertex::N(node_id(edge.to())),
            ),
            attributes,
        }));
    }

    Graph::DiGraph {
        id: quoted(scene.title()),
        strict: false,
        stmts,
    }
}

fn group_stmts(scene: &Scene, group: usize, stmts: &mut Vec<Stmt>) {
    for node in scene.group_nodes(group) {
        stmts.push(Stmt::Node(Node {
            id: node_id(node),
            attributes: node_attributes(&scene.nodes()[node]),
        }));
    }

    for child in scene.child_groups(group) {
        let info = &scene.groups()[child];
        let mut inner = vec![Stmt::Attribute(attr("label", quoted(info.label())))];
        if let Some(background) = info.background() {
            inner.push(Stmt::Attribute(attr("style", plain("filled"))));
            inner.push(Stmt::Attribute(attr(
                "fillcolor",
                quoted(&background.to_hex()),
            )));
        }
        group_stmts(scene, child, &mut inner);
        stmts.push(Stmt::Subgraph(Subgraph {
            id: Id::Plain(format!("cluster_{child}")),
            stmts: inner,
        }));
    }
}

fn node_attributes(node: &SceneNode) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    let mut styles = Vec::new();

    match node.shape() {
        Shape::Box => {}
        Shape::RoundedBox => styles.push("rounded"),
        Shape::Ellipse => attributes.push(attr("shape", plain("ellipse"))),
        Shape::Diamond => attributes.push(attr("shape", plain("Mdiamond"))),
        Shape::Table => attributes.push(attr("shape", plain("plain"))),
    }

    let label = if node.shape() == Shape::Table {
        Id::Html(table_label(node))
    } else if let Some(detail) = node.detail() {
        Id::Html(format!(
            "<{}<BR/><FONT POINT-SIZE=\"10\">{}</FONT>>",
            escape_html(node.label()),
            escape_html(detail)
        ))
    } else {
        quoted(node.label())
    };
    attributes.push(attr("label", label));

    if let Some(fill) = node.fill().filter(|_| node.shape() != Shape::Table) {
        styles.push("filled");
        attributes.push(attr("fillcolor", quoted(&fill.to_hex())));
    }
    if !styles.is_empty() {
        attributes.push(attr("style", quoted(&styles.join(","))));
    }
    attributes
}

fn table_label(node: &SceneNode) -> String {
    let header_fill = node
        .fill()
        .map(|color| format!(" BGCOLOR=\"{}\"", color.to_hex()))
        .unwrap_or_default();
    let mut html = format!(
        "<<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\" CELLPADDING=\"4\">\
         <TR><TD{header_fill}><B>{}</B></TD></TR>",
        escape_html(node.label())
    );
    for row in node.rows() {
        html.push_str(&format!(
            "<TR><TD ALIGN=\"LEFT\">{}</TD></TR>",
            escape_html(row)
        ));
    }
    html.push_str("</TABLE>>");
    html
}

fn attr(key: &str, value: Id) -> Attribute {
    Attribute(Id::Plain(key.to_string()), value)
}

fn plain(value: &str) -> Id {
    Id::Plain(value.to_string())
}

fn quoted(value: &str) -> Id {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Id::Escaped(format!("\"{escaped}\""))
}

fn node_id(index: usize) -> NodeId {
    NodeId(Id::Plain(format!("n{index}")), None)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\n', "<BR/>")
}
