//! The bounded stack machine that runs compiled scripts.
//!
//! The machine only ever touches values it created and the diagrams in its
//! own arena. Every instruction counts against a step budget and the wall
//! clock is checked at a fixed stride, so a hostile loop ends with a
//! timeout instead of hanging the caller.

use std::{
    rc::Rc,
    time::{Duration, Instant},
};

use log::{debug, info};

use diagrammer_core::{
    capability::{Capability, NodeKind},
    color::Color,
    diagram::{ClusterId, Diagram, Direction, EdgeDirection, EdgeStyle, LineStyle},
};

use crate::{
    builtins,
    compile::{Instruction, Program, RESULT_NAME, missing_result},
    error::{Diagnostic, DiagnosticError, ErrorCode},
    parser_types::{BinaryOp, CompareOp, UnaryOp},
    span::Span,
    value::{NodeRef, Value},
};

/// The wall clock is read once every this many instructions.
const DEADLINE_STRIDE: u64 = 1024;

/// Deepest stack of lists and dicts a script may build.
const MAX_VALUE_NESTING: usize = 32;

/// Graph attributes a script may set through `graph_attr=`.
///
/// Attributes that make the renderer read files (`imagepath`, `fontpath`,
/// `image`, ...) are absent.
pub const ALLOWED_GRAPH_ATTRS: &[&str] = &[
    "bgcolor",
    "fontcolor",
    "fontsize",
    "labelloc",
    "nodesep",
    "pad",
    "ranksep",
    "splines",
];

/// Output formats accepted by `Diagram(outformat=...)`.
const SCRIPT_OUTFORMATS: &[&str] = &["png", "jpg", "svg", "pdf", "dot"];

/// Resource budget of one evaluation.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use diagrammer_parser::Limits;
///
/// let limits = Limits {
///     timeout: Duration::from_millis(500),
///     ..Limits::default()
/// };
/// assert_eq!(limits.max_nodes, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Wall-clock budget; exceeding it fails with "timeout".
    pub timeout: Duration,
    /// Maximum number of executed instructions.
    pub max_steps: u64,
    /// Maximum number of nodes and clusters across all diagrams.
    pub max_nodes: usize,
    /// Maximum number of edges across all diagrams.
    pub max_edges: usize,
    /// Maximum length of any list, including `range` results.
    pub max_list_len: usize,
    /// Maximum length of any string in bytes.
    pub max_string_len: usize,
    /// Maximum size of the script itself in bytes.
    pub max_source_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_steps: 1_000_000,
            max_nodes: 500,
            max_edges: 2_000,
            max_list_len: 10_000,
            max_string_len: 64 * 1024,
            max_source_len: 128 * 1024,
        }
    }
}

/// A runtime failure before it is attached to a source span.
#[derive(Debug)]
pub(crate) struct Fault {
    code: ErrorCode,
    message: String,
    help: Option<&'static str>,
}

impl Fault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    fn into_diagnostic(self, span: Span) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.message)
            .with_code(self.code)
            .with_label(span, self.code.description());
        match self.help {
            Some(help) => diagnostic.with_help(help),
            None => diagnostic,
        }
    }
}

pub(crate) type Outcome<T> = Result<T, Fault>;

/// Positional and keyword arguments of one call.
pub(crate) struct Arguments {
    callee: &'static str,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new(callee: &'static str, positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self {
            callee,
            positional,
            keywords,
        }
    }

    pub fn callee(&self) -> &'static str {
        self.callee
    }

    /// Match arguments to `params`; the first `max_positional` parameters
    /// may be passed by position.
    pub fn bind(self, params: &[&'static str], max_positional: usize) -> Outcome<Vec<Option<Value>>> {
        let callee = self.callee;
        if self.positional.len() > max_positional {
            return Err(Fault::new(
                ErrorCode::E304,
                format!(
                    "`{callee}` takes at most {max_positional} positional argument{}, got {}",
                    if max_positional == 1 { "" } else { "s" },
                    self.positional.len()
                ),
            ));
        }

        let mut bound: Vec<Option<Value>> = vec![None; params.len()];
        for (slot, value) in bound.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        for (name, value) in self.keywords {
            let Some(idx) = params.iter().position(|p| *p == name) else {
                return Err(Fault::new(
                    ErrorCode::E304,
                    format!("`{callee}` got an unexpected keyword argument `{name}`"),
                ));
            };
            if bound[idx].is_some() {
                return Err(Fault::new(
                    ErrorCode::E304,
                    format!("`{callee}` got multiple values for argument `{name}`"),
                ));
            }
            bound[idx] = Some(value);
        }
        Ok(bound)
    }

    /// Require exactly the positional arguments and no keywords.
    pub fn positional_only(self, min: usize, max: usize) -> Outcome<Vec<Value>> {
        let callee = self.callee;
        if let Some((name, _)) = self.keywords.first() {
            return Err(Fault::new(
                ErrorCode::E304,
                format!("`{callee}` got an unexpected keyword argument `{name}`"),
            ));
        }
        let count = self.positional.len();
        if count < min || count > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(Fault::new(
                ErrorCode::E304,
                format!("`{callee}` expects {expected} argument(s), got {count}"),
            ));
        }
        Ok(self.positional)
    }
}

pub(crate) fn type_error(message: impl Into<String>) -> Fault {
    Fault::new(ErrorCode::E300, message)
}

fn bad_argument(message: impl Into<String>) -> Fault {
    Fault::new(ErrorCode::E304, message)
}

/// Extract an optional string argument.
fn string_arg(value: Option<Value>, callee: &str, param: &str) -> Outcome<Option<Rc<str>>> {
    match value {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s)),
        Some(other) => Err(type_error(format!(
            "`{callee}` expects `{param}` to be a str, got {}",
            other.type_name()
        ))),
    }
}

/// A file stem with no directory component.
fn is_plain_stem(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && !name.contains(['/', '\\', ':', '\0'])
}

/// An open `with` block.
#[derive(Debug, Clone, Copy)]
enum Frame {
    Diagram(usize),
    Cluster { diagram: usize, cluster: ClusterId },
}

/// Executes one compiled program.
pub(crate) struct Machine<'p> {
    program: &'p Program,
    limits: &'p Limits,
    stack: Vec<Value>,
    locals: Vec<Option<Value>>,
    diagrams: Vec<Diagram>,
    contexts: Vec<Frame>,
    current_diagram: Option<usize>,
    elements: usize,
    edges: usize,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program, limits: &'p Limits) -> Self {
        Self {
            program,
            limits,
            stack: Vec::new(),
            locals: vec![None; program.locals.len()],
            diagrams: Vec::new(),
            contexts: Vec::new(),
            current_diagram: None,
            elements: 0,
            edges: 0,
        }
    }

    /// Run the program to completion and return the diagram bound to the
    /// result name.
    pub fn run(mut self) -> Result<Diagram, DiagnosticError> {
        let program = self.program;
        let started = Instant::now();
        let deadline = started.checked_add(self.limits.timeout);

        let mut pc = 0;
        let mut steps: u64 = 0;
        while let Some((instruction, span)) = program.code.get(pc) {
            if steps % DEADLINE_STRIDE == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(steps = steps, elapsed_ms = started.elapsed().as_millis() as u64; "Script timed out");
                return Err(Fault::new(ErrorCode::E302, "timeout")
                    .into_diagnostic(*span)
                    .into());
            }
            steps += 1;
            if steps > self.limits.max_steps {
                return Err(Fault::new(
                    ErrorCode::E303,
                    format!("script exceeded its budget of {} steps", self.limits.max_steps),
                )
                .with_help("reduce loop sizes or the number of elements created")
                .into_diagnostic(*span)
                .into());
            }

            pc = self
                .step(instruction, pc)
                .map_err(|fault| fault.into_diagnostic(*span))?;
        }

        let end = program.code.last().map(|(_, span)| *span).unwrap_or_default();
        self.finish(steps, end)
    }

    fn finish(mut self, steps: u64, end: Span) -> Result<Diagram, DiagnosticError> {
        match self.locals[self.program.result_slot].take() {
            Some(Value::Diagram(idx)) => {
                let diagram = self.diagrams.swap_remove(idx);
                info!(
                    steps = steps,
                    nodes = diagram.nodes().len(),
                    edges = diagram.edges().len(),
                    clusters = diagram.clusters().len();
                    "Script evaluated"
                );
                Ok(diagram)
            }
            Some(other) => Err(Fault::new(
                ErrorCode::E301,
                format!("`{RESULT_NAME}` must be a Diagram, found {}", other.type_name()),
            )
            .into_diagnostic(end)
            .into()),
            None => Err(missing_result(end).into()),
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Outcome<Value> {
        self.stack
            .pop()
            .ok_or_else(|| type_error("internal error: operand stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Outcome<Vec<Value>> {
        let at = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| type_error("internal error: operand stack underflow"))?;
        Ok(self.stack.split_off(at))
    }

    fn top(&self) -> Outcome<&Value> {
        self.stack
            .last()
            .ok_or_else(|| type_error("internal error: operand stack underflow"))
    }

    fn check_list_len(&self, len: usize) -> Outcome<()> {
        if len > self.limits.max_list_len {
            return Err(Fault::new(
                ErrorCode::E306,
                format!("list of {len} items exceeds the limit of {}", self.limits.max_list_len),
            ));
        }
        Ok(())
    }

    fn check_nesting(&self, value: &Value) -> Outcome<()> {
        let depth = value.nesting();
        if depth > MAX_VALUE_NESTING {
            return Err(Fault::new(
                ErrorCode::E306,
                format!("lists and dicts nest {depth} levels deep, the limit is {MAX_VALUE_NESTING}"),
            )
            .with_help("assign inner lists to names and keep them flat"));
        }
        Ok(())
    }

    fn check_string_len(&self, len: usize) -> Outcome<()> {
        if len > self.limits.max_string_len {
            return Err(Fault::new(
                ErrorCode::E306,
                format!(
                    "string of {len} bytes exceeds the limit of {}",
                    self.limits.max_string_len
                ),
            ));
        }
        Ok(())
    }

    /// Execute one instruction and return the next program counter.
    fn step(&mut self, instruction: &Instruction, pc: usize) -> Outcome<usize> {
        match instruction {
            Instruction::Const(value) => self.push(value.clone()),
            Instruction::LoadCapability(capability) => self.push(Value::Callable(*capability)),
            Instruction::LoadLocal(slot) => match self.locals[*slot].clone() {
                Some(value) => self.push(value),
                None => {
                    let name = self
                        .program
                        .locals
                        .get_index(*slot)
                        .map(String::as_str)
                        .unwrap_or("?");
                    return Err(Fault::new(
                        ErrorCode::E307,
                        format!("`{name}` is used before it is assigned"),
                    ));
                }
            },
            Instruction::StoreLocal(slot) => {
                let value = self.pop()?;
                self.locals[*slot] = Some(value);
            }
            Instruction::BuildList(n) => {
                self.check_list_len(*n)?;
                let list = Value::list(self.pop_n(*n)?);
                self.check_nesting(&list)?;
                self.push(list);
            }
            Instruction::BuildDict(n) => {
                let flat = self.pop_n(n * 2)?;
                let mut entries = Vec::with_capacity(*n);
                let mut iter = flat.into_iter();
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    let Value::Str(key) = key else {
                        return Err(type_error(format!(
                            "dict keys must be str, got {}",
                            key.type_name()
                        )));
                    };
                    entries.push((key, value));
                }
                let dict = Value::dict(entries);
                self.check_nesting(&dict)?;
                self.push(dict);
            }
            Instruction::Call { argc, keywords } => {
                let keyword_values = self.pop_n(keywords.len())?;
                let positional = self.pop_n(*argc)?;
                let callee = self.pop()?;
                let keywords = keywords.iter().cloned().zip(keyword_values).collect();
                let result = self.call(callee, positional, keywords)?;
                self.push(result);
            }
            Instruction::Unary(op) => {
                let operand = self.pop()?;
                let result = unary(*op, operand)?;
                self.push(result);
            }
            Instruction::Binary(op) => {
                let right = self.pop()?;
                let left = self.pop()?;
                let result = self.binary(*op, left, right)?;
                self.push(result);
            }
            Instruction::Compare(op) => {
                let right = self.pop()?;
                let left = self.pop()?;
                self.push(Value::Bool(compare(*op, &left, &right)?));
            }
            Instruction::Jump(target) => return Ok(*target),
            Instruction::JumpIfFalse(target) => {
                if !self.pop()?.is_truthy() {
                    return Ok(*target);
                }
            }
            Instruction::JumpIfFalseOrPop(target) => {
                if !self.top()?.is_truthy() {
                    return Ok(*target);
                }
                self.pop()?;
            }
            Instruction::JumpIfTrueOrPop(target) => {
                if self.top()?.is_truthy() {
                    return Ok(*target);
                }
                self.pop()?;
            }
            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::EnterContext => {
                let frame = match self.top()? {
                    Value::Diagram(idx) => Frame::Diagram(*idx),
                    Value::Cluster { diagram, cluster } => Frame::Cluster {
                        diagram: *diagram,
                        cluster: *cluster,
                    },
                    other => {
                        return Err(type_error(format!(
                            "`with` expects a Diagram or Cluster, got {}",
                            other.type_name()
                        )));
                    }
                };
                self.contexts.push(frame);
            }
            Instruction::ExitContext => {
                self.contexts.pop();
            }
            Instruction::GetIter => {
                let items: Rc<[Value]> = match self.pop()? {
                    Value::List(items) => items.shared(),
                    Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
                    Value::Dict(entries) => entries
                        .iter()
                        .map(|(key, _)| Value::Str(key.clone()))
                        .collect(),
                    other => {
                        return Err(type_error(format!(
                            "{} is not iterable",
                            other.type_name()
                        )));
                    }
                };
                self.push(Value::Iter { items, next: 0 });
            }
            Instruction::ForIter(exit) => {
                let item = match self.stack.last_mut() {
                    Some(Value::Iter { items, next }) => {
                        let item = items.get(*next).cloned();
                        *next += 1;
                        item
                    }
                    _ => return Err(type_error("internal error: loop without iterator")),
                };
                match item {
                    Some(item) => self.push(item),
                    None => {
                        self.pop()?;
                        return Ok(*exit);
                    }
                }
            }
        }
        Ok(pc + 1)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call(
        &mut self,
        callee: Value,
        positional: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> Outcome<Value> {
        let Value::Callable(capability) = callee else {
            return Err(type_error(format!(
                "{} is not callable",
                callee.type_name()
            )));
        };

        match capability {
            Capability::Diagram => {
                self.new_diagram(Arguments::new("Diagram", positional, keywords))
            }
            Capability::Cluster => {
                self.new_cluster(Arguments::new("Cluster", positional, keywords))
            }
            Capability::Edge => new_edge(Arguments::new("Edge", positional, keywords)),
            Capability::Node(kind) => {
                self.new_node(kind, Arguments::new(kind.name(), positional, keywords))
            }
            Capability::Builtin(builtin) => builtins::call(
                builtin,
                Arguments::new(builtin.name(), positional, keywords),
                self.limits,
            ),
        }
    }

    fn count_element(&mut self, what: &str) -> Outcome<()> {
        self.elements += 1;
        if self.elements > self.limits.max_nodes {
            return Err(Fault::new(
                ErrorCode::E306,
                format!(
                    "creating this {what} exceeds the limit of {} diagram elements",
                    self.limits.max_nodes
                ),
            ));
        }
        Ok(())
    }

    /// The cluster new elements attach to: the innermost `with` block, else
    /// the root of the most recently created diagram.
    fn attachment_point(&self, what: &str) -> Outcome<(usize, ClusterId)> {
        match self.contexts.last() {
            Some(Frame::Diagram(idx)) => Ok((*idx, self.diagrams[*idx].root())),
            Some(Frame::Cluster { diagram, cluster }) => Ok((*diagram, *cluster)),
            None => match self.current_diagram {
                Some(idx) => Ok((idx, self.diagrams[idx].root())),
                None => Err(Fault::new(
                    ErrorCode::E305,
                    format!("{what} created outside of a Diagram"),
                )
                .with_help("create the diagram first, e.g. `with Diagram(\"web\") as graph:`")),
            },
        }
    }

    fn new_diagram(&mut self, args: Arguments) -> Outcome<Value> {
        let callee = args.callee();
        let [name, filename, direction, curvestyle, outformat, _show, graph_attr] = bind_array(
            args.bind(
                &[
                    "name",
                    "filename",
                    "direction",
                    "curvestyle",
                    "outformat",
                    "show",
                    "graph_attr",
                ],
                3,
            )?,
        )?;

        let name = string_arg(name, callee, "name")?;
        let mut diagram = Diagram::new(name.as_deref().unwrap_or(""));

        if let Some(filename) = string_arg(filename, callee, "filename")? {
            if !is_plain_stem(&filename) {
                return Err(Fault::new(
                    ErrorCode::E203,
                    format!("file name `{filename}` must be a plain name without directories"),
                )
                .with_help("the output location is chosen by the service"));
            }
            diagram.set_filename(filename.as_ref());
        }

        if let Some(direction) = string_arg(direction, callee, "direction")? {
            let direction: Direction = direction.parse().map_err(bad_argument)?;
            diagram.set_direction(direction);
        }

        if let Some(style) = string_arg(curvestyle, callee, "curvestyle")? {
            match style.as_ref() {
                "ortho" | "curved" => diagram.set_graph_attr("splines", style.as_ref()),
                other => {
                    return Err(bad_argument(format!(
                        "invalid curvestyle `{other}`; expected `ortho` or `curved`"
                    )));
                }
            }
        }

        validate_outformat(outformat)?;

        for (key, value) in graph_attributes(graph_attr, callee)? {
            diagram.set_graph_attr(key, value);
        }

        self.count_element("Diagram")?;
        self.diagrams.push(diagram);
        let idx = self.diagrams.len() - 1;
        self.current_diagram = Some(idx);
        debug!(diagram = idx, name = self.diagrams[idx].name(); "Diagram created");
        Ok(Value::Diagram(idx))
    }

    fn new_cluster(&mut self, args: Arguments) -> Outcome<Value> {
        let callee = args.callee();
        let [label, direction, graph_attr] =
            bind_array(args.bind(&["label", "direction", "graph_attr"], 1)?)?;

        let label = string_arg(label, callee, "label")?;
        if let Some(direction) = string_arg(direction, callee, "direction")? {
            direction
                .parse::<Direction>()
                .map_err(bad_argument)?;
        }
        let attrs = graph_attributes(graph_attr, callee)?;

        let (diagram, parent) = self.attachment_point("Cluster")?;
        self.count_element("Cluster")?;
        let target = &mut self.diagrams[diagram];
        let cluster = target.add_cluster(parent, label.as_deref().unwrap_or("cluster"));
        for (key, value) in attrs {
            if key == "bgcolor" {
                let color = Color::new(&value).map_err(bad_argument)?;
                target.set_cluster_background(cluster, color);
            }
        }
        Ok(Value::Cluster { diagram, cluster })
    }

    fn new_node(&mut self, kind: NodeKind, args: Arguments) -> Outcome<Value> {
        let callee = args.callee();
        let [label] = bind_array(args.bind(&["label"], 1)?)?;
        let label = match label {
            Some(Value::Number(n)) => Rc::from(crate::value::format_number(n)),
            other => string_arg(other, callee, "label")?.unwrap_or_else(|| Rc::from("")),
        };

        let (diagram, cluster) = self.attachment_point(callee)?;
        self.count_element(callee)?;
        let node = self.diagrams[diagram].add_node(cluster, kind, label.as_ref());
        Ok(Value::Node(NodeRef { diagram, node }))
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Outcome<Value> {
        match (op, left, right) {
            (BinaryOp::ShiftRight, left, right) => {
                self.connect(op, EdgeDirection::Forward, left, right)
            }
            (BinaryOp::ShiftLeft, left, right) => self.connect(op, EdgeDirection::Back, left, right),
            (BinaryOp::Sub, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            (BinaryOp::Sub, left, right) => {
                self.connect(op, EdgeDirection::Undirected, left, right)
            }
            (BinaryOp::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
                self.check_string_len(a.len() + b.len())?;
                Ok(Value::str(format!("{a}{b}")))
            }
            (BinaryOp::Add, Value::List(a), Value::List(b)) => {
                self.check_list_len(a.len() + b.len())?;
                let joined = Value::list(a.iter().chain(b.iter()).cloned().collect::<Vec<_>>());
                self.check_nesting(&joined)?;
                Ok(joined)
            }
            (BinaryOp::Mul, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            (BinaryOp::Mul, Value::Str(s), Value::Number(n))
            | (BinaryOp::Mul, Value::Number(n), Value::Str(s)) => {
                let count = repeat_count(n)?;
                // An empty operand still costs one unit per repetition.
                self.check_string_len(s.len().max(1).saturating_mul(count))?;
                Ok(Value::str(s.repeat(count)))
            }
            (BinaryOp::Mul, Value::List(items), Value::Number(n))
            | (BinaryOp::Mul, Value::Number(n), Value::List(items)) => {
                let count = repeat_count(n)?;
                self.check_list_len(items.len().max(1).saturating_mul(count))?;
                Ok(Value::list(
                    (0..count)
                        .flat_map(|_| items.iter().cloned())
                        .collect::<Vec<_>>(),
                ))
            }
            (BinaryOp::Div | BinaryOp::Mod, Value::Number(_), Value::Number(b)) if b == 0.0 => {
                Err(bad_argument("division by zero"))
            }
            (BinaryOp::Div, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            (BinaryOp::Mod, Value::Number(a), Value::Number(b)) => {
                Ok(Value::Number(a - b * (a / b).floor()))
            }
            (op, left, right) => Err(type_error(format!(
                "unsupported operand types for `{}`: {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ))),
        }
    }

    /// Draw edges for `left op right` and return the right operand.
    fn connect(
        &mut self,
        op: BinaryOp,
        direction: EdgeDirection,
        left: Value,
        right: Value,
    ) -> Outcome<Value> {
        let symbol = op.symbol();
        let (sources, style, from_template): (Vec<NodeRef>, EdgeStyle, bool) = match &left {
            Value::Node(node) => (vec![*node], EdgeStyle::default(), false),
            Value::List(items) => (node_list(items, symbol)?, EdgeStyle::default(), false),
            Value::PendingEdge { sources, style } => (sources.to_vec(), (**style).clone(), true),
            Value::EdgeTemplate(_) => {
                return Err(type_error(format!(
                    "an Edge needs a source node on the left of `{symbol}`"
                )));
            }
            other => {
                return Err(type_error(format!(
                    "unsupported operand types for `{symbol}`: {} and {}",
                    other.type_name(),
                    right.type_name()
                )));
            }
        };

        match right {
            Value::EdgeTemplate(template) if !from_template => Ok(Value::PendingEdge {
                sources: sources.into(),
                style: template,
            }),
            Value::Node(target) => {
                for source in &sources {
                    self.add_edge(*source, target, direction, style.clone())?;
                }
                Ok(Value::Node(target))
            }
            Value::List(items) if !matches!(left, Value::List(_)) => {
                let targets = node_list(&items, symbol)?;
                for source in &sources {
                    for target in &targets {
                        self.add_edge(*source, *target, direction, style.clone())?;
                    }
                }
                Ok(Value::List(items))
            }
            Value::List(_) => Err(type_error(format!(
                "cannot connect a list to a list with `{symbol}`"
            ))),
            other => Err(type_error(format!(
                "unsupported operand types for `{symbol}`: {} and {}",
                left.type_name(),
                other.type_name()
            ))),
        }
    }

    fn add_edge(
        &mut self,
        from: NodeRef,
        to: NodeRef,
        direction: EdgeDirection,
        style: EdgeStyle,
    ) -> Outcome<()> {
        if from.diagram != to.diagram {
            return Err(type_error("cannot connect nodes of different diagrams"));
        }
        self.edges += 1;
        if self.edges > self.limits.max_edges {
            return Err(Fault::new(
                ErrorCode::E306,
                format!("edge count exceeds the limit of {}", self.limits.max_edges),
            ));
        }
        self.diagrams[from.diagram].add_edge(from.node, to.node, direction, style);
        Ok(())
    }
}

/// Convert a bound argument vector into a fixed-size array.
fn bind_array<const N: usize>(bound: Vec<Option<Value>>) -> Outcome<[Option<Value>; N]> {
    bound
        .try_into()
        .map_err(|_| type_error("internal error: argument count mismatch"))
}

fn node_list(items: &[Value], symbol: &str) -> Outcome<Vec<NodeRef>> {
    items
        .iter()
        .map(|item| match item {
            Value::Node(node) => Ok(*node),
            other => Err(type_error(format!(
                "lists connected with `{symbol}` may only contain nodes, found {}",
                other.type_name()
            ))),
        })
        .collect()
}

fn repeat_count(n: f64) -> Outcome<usize> {
    if n.fract() != 0.0 || n < 0.0 {
        return Err(bad_argument(format!(
            "repeat count must be a non-negative integer, got {}",
            crate::value::format_number(n)
        )));
    }
    Ok(n as usize)
}

fn validate_outformat(value: Option<Value>) -> Outcome<()> {
    let formats: Vec<Value> = match value {
        None | Some(Value::None) => return Ok(()),
        Some(Value::List(items)) => items.to_vec(),
        Some(single) => vec![single],
    };
    for format in formats {
        match format {
            Value::Str(s) if SCRIPT_OUTFORMATS.contains(&s.as_ref()) => {}
            other => {
                return Err(bad_argument(format!(
                    "invalid outformat `{other}`; expected one of {}",
                    SCRIPT_OUTFORMATS.join(", ")
                )));
            }
        }
    }
    Ok(())
}

/// Check `graph_attr=` against the allow-list and stringify its values.
fn graph_attributes(value: Option<Value>, callee: &str) -> Outcome<Vec<(String, String)>> {
    let entries = match value {
        None | Some(Value::None) => return Ok(Vec::new()),
        Some(Value::Dict(entries)) => entries,
        Some(other) => {
            return Err(type_error(format!(
                "`{callee}` expects `graph_attr` to be a dict, got {}",
                other.type_name()
            )));
        }
    };

    entries
        .iter()
        .map(|(key, value)| {
            if !ALLOWED_GRAPH_ATTRS.contains(&key.as_ref()) {
                return Err(Fault::new(
                    ErrorCode::E204,
                    format!("graph attribute `{key}` is not allowed"),
                )
                .with_help("allowed: bgcolor, fontcolor, fontsize, labelloc, nodesep, pad, ranksep, splines"));
            }
            let value = match value {
                Value::Str(s) => s.to_string(),
                Value::Number(n) => crate::value::format_number(*n),
                other => {
                    return Err(type_error(format!(
                        "graph attribute `{key}` must be a str or number, got {}",
                        other.type_name()
                    )));
                }
            };
            Ok((key.to_string(), value))
        })
        .collect()
}

fn new_edge(args: Arguments) -> Outcome<Value> {
    let callee = args.callee();
    let [label, color, style] = bind_array(args.bind(&["label", "color", "style"], 0)?)?;

    let label = string_arg(label, callee, "label")?
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string());
    let color = string_arg(color, callee, "color")?
        .filter(|c| !c.is_empty())
        .map(|c| Color::new(&c))
        .transpose()
        .map_err(bad_argument)?;
    let line = match string_arg(style, callee, "style")? {
        Some(style) if !style.is_empty() => style.parse::<LineStyle>().map_err(bad_argument)?,
        _ => LineStyle::default(),
    };

    Ok(Value::EdgeTemplate(Rc::new(EdgeStyle::new(label, color, line))))
}

fn unary(op: UnaryOp, operand: Value) -> Outcome<Value> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Pos, Value::Number(n)) => Ok(Value::Number(n)),
        (_, other) => Err(type_error(format!(
            "bad operand type for unary operator: {}",
            other.type_name()
        ))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Outcome<bool> {
    match op {
        CompareOp::Eq => return Ok(left.equals(right)),
        CompareOp::Ne => return Ok(!left.equals(right)),
        _ => {}
    }

    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (l, r) => {
            return Err(type_error(format!(
                "cannot order {} and {}",
                l.type_name(),
                r.type_name()
            )));
        }
    };

    // NaN compares false with everything.
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => ordering.is_ne(),
    })
}
