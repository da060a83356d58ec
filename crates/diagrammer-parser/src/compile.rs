//! Static resolution and code generation.
//!
//! Every name in the script is resolved once, before anything runs: a name
//! the script assigns becomes a local slot, a name in the family's
//! [`CapabilitySet`] becomes a constant reference to that capability, and
//! anything else is a capability violation. Violations are collected for
//! the whole script so a rejected script reports every offending name.

use indexmap::IndexSet;

use diagrammer_core::capability::{Capability, CapabilitySet};

use crate::{
    error::{Diagnostic, DiagnosticCollector, DiagnosticError, ErrorCode},
    parser_types::{BinaryOp, CompareOp, Expr, ExprKind, LogicalOp, Stmt, UnaryOp},
    span::Span,
    value::Value,
};

/// The name a script must bind its diagram to.
pub const RESULT_NAME: &str = "graph";

/// One instruction of the script machine.
#[derive(Debug, Clone)]
pub(crate) enum Instruction {
    Const(Value),
    LoadCapability(Capability),
    LoadLocal(usize),
    StoreLocal(usize),
    BuildList(usize),
    BuildDict(usize),
    /// Stack: callee, positional args, keyword values (in `keywords` order).
    Call {
        argc: usize,
        keywords: Vec<String>,
    },
    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(CompareOp),
    Jump(usize),
    /// Pops the condition.
    JumpIfFalse(usize),
    /// Keeps the operand and jumps if it is falsy, else pops it.
    JumpIfFalseOrPop(usize),
    /// Keeps the operand and jumps if it is truthy, else pops it.
    JumpIfTrueOrPop(usize),
    Pop,
    /// Opens the Diagram or Cluster on top of the stack as the innermost
    /// context, leaving it on the stack.
    EnterContext,
    ExitContext,
    GetIter,
    /// Pushes the next item, or pops the iterator and jumps when exhausted.
    ForIter(usize),
}

/// A compiled script.
#[derive(Debug)]
pub(crate) struct Program {
    pub code: Vec<(Instruction, Span)>,
    pub locals: IndexSet<String>,
    pub result_slot: usize,
}

struct Compiler<'a> {
    capabilities: &'a CapabilitySet,
    locals: IndexSet<String>,
    code: Vec<(Instruction, Span)>,
    diagnostics: DiagnosticCollector,
}

impl<'a> Compiler<'a> {
    fn new(capabilities: &'a CapabilitySet) -> Self {
        Self {
            capabilities,
            locals: IndexSet::new(),
            code: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    fn emit(&mut self, instruction: Instruction, span: Span) -> usize {
        self.code.push((instruction, span));
        self.code.len() - 1
    }

    /// Point the jump at `at` to the next instruction.
    fn patch(&mut self, at: usize) {
        let target = self.code.len();
        match &mut self.code[at].0 {
            Instruction::Jump(t)
            | Instruction::JumpIfFalse(t)
            | Instruction::JumpIfFalseOrPop(t)
            | Instruction::JumpIfTrueOrPop(t)
            | Instruction::ForIter(t) => *t = target,
            _ => {}
        }
    }

    fn violation(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.emit(diagnostic);
    }

    // ------------------------------------------------------------------
    // Pass 1: declare every name the script assigns
    // ------------------------------------------------------------------

    fn declare(&mut self, name: &str, span: Span) {
        if is_dunder(name) {
            self.violation(dunder_violation(name, span));
            return;
        }
        self.locals.insert(name.to_string());
    }

    fn declare_all(&mut self, body: &[Stmt<'_>]) {
        for stmt in body {
            match stmt {
                Stmt::Assign { target, .. } => self.declare(target.inner(), target.span()),
                Stmt::For { target, body, .. } => {
                    self.declare(target.inner(), target.span());
                    self.declare_all(body);
                }
                Stmt::With { items, body } => {
                    for binding in items.iter().filter_map(|item| item.binding.as_ref()) {
                        self.declare(binding.inner(), binding.span());
                    }
                    self.declare_all(body);
                }
                Stmt::If {
                    branches,
                    otherwise,
                } => {
                    for (_, branch) in branches {
                        self.declare_all(branch);
                    }
                    self.declare_all(otherwise);
                }
                Stmt::Expr(_) | Stmt::Pass(_) => {}
            }
        }
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.locals.get_index_of(name)
    }

    // ------------------------------------------------------------------
    // Pass 2: code generation
    // ------------------------------------------------------------------

    fn statements(&mut self, body: &[Stmt<'_>]) {
        for stmt in body {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &Stmt<'_>) {
        match stmt {
            Stmt::Assign { target, value } => {
                self.expression(value);
                if let Some(slot) = self.slot(target.inner()) {
                    self.emit(Instruction::StoreLocal(slot), target.span());
                }
            }
            Stmt::Expr(expr) => {
                self.expression(expr);
                self.emit(Instruction::Pop, expr.span);
            }
            Stmt::With { items, body } => {
                for item in items {
                    self.expression(&item.context);
                    self.emit(Instruction::EnterContext, item.context.span);
                    match item.binding.as_ref().and_then(|b| Some((self.slot(b.inner())?, b.span()))) {
                        Some((slot, span)) => self.emit(Instruction::StoreLocal(slot), span),
                        None => self.emit(Instruction::Pop, item.context.span),
                    };
                }
                self.statements(body);
                for item in items.iter().rev() {
                    self.emit(Instruction::ExitContext, item.context.span);
                }
            }
            Stmt::For {
                target,
                iterable,
                body,
            } => {
                self.expression(iterable);
                self.emit(Instruction::GetIter, iterable.span);
                let loop_start = self.code.len();
                let exit = self.emit(Instruction::ForIter(usize::MAX), iterable.span);
                if let Some(slot) = self.slot(target.inner()) {
                    self.emit(Instruction::StoreLocal(slot), target.span());
                } else {
                    self.emit(Instruction::Pop, target.span());
                }
                self.statements(body);
                self.emit(Instruction::Jump(loop_start), iterable.span);
                self.patch(exit);
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                let mut to_end = Vec::new();
                for (condition, branch) in branches {
                    self.expression(condition);
                    let next = self.emit(Instruction::JumpIfFalse(usize::MAX), condition.span);
                    self.statements(branch);
                    to_end.push(self.emit(Instruction::Jump(usize::MAX), condition.span));
                    self.patch(next);
                }
                self.statements(otherwise);
                for at in to_end {
                    self.patch(at);
                }
            }
            Stmt::Pass(_) => {}
        }
    }

    fn expression(&mut self, expr: &Expr<'_>) {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Str(s) => {
                self.emit(Instruction::Const(Value::str(s.as_str())), span);
            }
            ExprKind::Number(n) => {
                self.emit(Instruction::Const(Value::Number(*n)), span);
            }
            ExprKind::Bool(b) => {
                self.emit(Instruction::Const(Value::Bool(*b)), span);
            }
            ExprKind::None => {
                self.emit(Instruction::Const(Value::None), span);
            }
            ExprKind::List(items) => {
                for item in items {
                    self.expression(item);
                }
                self.emit(Instruction::BuildList(items.len()), span);
            }
            ExprKind::Dict(entries) => {
                for (key, value) in entries {
                    self.expression(key);
                    self.expression(value);
                }
                self.emit(Instruction::BuildDict(entries.len()), span);
            }
            ExprKind::Name(name) => self.name(name, span),
            ExprKind::Attribute { object, name } => {
                self.expression(object);
                self.violation(
                    Diagnostic::error(format!(
                        "attribute access `.{}` is not allowed",
                        name.inner()
                    ))
                    .with_code(ErrorCode::E201)
                    .with_label(name.span(), "attribute access")
                    .with_help("pass options as keyword arguments instead, e.g. `Edge(label=\"x\")`"),
                );
            }
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                self.expression(callee);
                for arg in args {
                    self.expression(arg);
                }
                for (_, value) in kwargs {
                    self.expression(value);
                }
                let keywords = kwargs
                    .iter()
                    .map(|(name, _)| name.inner().to_string())
                    .collect();
                self.emit(
                    Instruction::Call {
                        argc: args.len(),
                        keywords,
                    },
                    span,
                );
            }
            ExprKind::Unary { op, operand } => {
                self.expression(operand);
                self.emit(Instruction::Unary(*op), span);
            }
            ExprKind::Binary { op, left, right } => {
                self.expression(left);
                self.expression(right);
                self.emit(Instruction::Binary(*op), span);
            }
            ExprKind::Compare { op, left, right } => {
                self.expression(left);
                self.expression(right);
                self.emit(Instruction::Compare(*op), span);
            }
            ExprKind::Logical { op, left, right } => {
                self.expression(left);
                let jump = match op {
                    LogicalOp::And => Instruction::JumpIfFalseOrPop(usize::MAX),
                    LogicalOp::Or => Instruction::JumpIfTrueOrPop(usize::MAX),
                };
                let at = self.emit(jump, span);
                self.expression(right);
                self.patch(at);
            }
        }
    }

    fn name(&mut self, name: &str, span: Span) {
        if is_dunder(name) {
            self.violation(dunder_violation(name, span));
            return;
        }
        if let Some(slot) = self.slot(name) {
            self.emit(Instruction::LoadLocal(slot), span);
            return;
        }
        if let Some(capability) = self.capabilities.get(name) {
            self.emit(Instruction::LoadCapability(*capability), span);
            return;
        }

        let family = self.capabilities.family();
        self.violation(
            Diagnostic::error(format!("`{name}` is not available in {family} diagrams"))
                .with_code(ErrorCode::E200)
                .with_label(span, "unknown name")
                .with_help(format!(
                    "available names: {}",
                    self.capabilities.names().collect::<Vec<_>>().join(", ")
                )),
        );
    }
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn dunder_violation(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(format!("`{name}` is not allowed"))
        .with_code(ErrorCode::E200)
        .with_label(span, "introspection name")
        .with_help("names wrapped in double underscores are reserved")
}

/// Compile a parsed script against a capability set.
///
/// # Errors
///
/// Returns every capability violation found in the script. A script with no
/// violation that never assigns [`RESULT_NAME`] fails with E301.
pub(crate) fn compile(
    body: &[Stmt<'_>],
    capabilities: &CapabilitySet,
) -> Result<Program, DiagnosticError> {
    let mut compiler = Compiler::new(capabilities);
    compiler.declare_all(body);
    compiler.statements(body);

    let Compiler {
        locals,
        code,
        diagnostics,
        ..
    } = compiler;
    diagnostics.finish()?;

    let Some(result_slot) = locals.get_index_of(RESULT_NAME) else {
        return Err(missing_result(Span::default()).into());
    };

    log::debug!(
        instructions = code.len(),
        locals = locals.len();
        "Compiled script"
    );
    Ok(Program {
        code,
        locals,
        result_slot,
    })
}

/// The diagnostic for a script that never produced its diagram.
pub(crate) fn missing_result(span: Span) -> Diagnostic {
    Diagnostic::error("script completed without producing a result")
        .with_code(ErrorCode::E301)
        .with_label(span, "no diagram bound here")
        .with_help(format!(
            "assign the diagram to `{RESULT_NAME}`, e.g. `with Diagram(\"web\") as {RESULT_NAME}:`"
        ))
}
