//! C99 emission.
//!
//! Renders declarations (`#include`, lifted `#define` units, typed
//! functions) and their statement bodies to text. Expressions are fully
//! parenthesized; macro parameters are additionally wrapped in parentheses
//! at every use so that `LAMBDA_0(a[i] + 1)` expands with the intended
//! grouping.
//!
//! The emitter does not lower anything: a [`Node::Lambda`] or
//! [`Node::Composite`] reaching it is an [`EmitError::Unlowered`].

use crate::node::{ForLoop, FunctionDef, Literal, MacroDef, Node, UnaryOp};
use crate::types::CType;

/// Error raised when a tree cannot be rendered as C.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("{kind} node must be lowered before emission")]
    Unlowered { kind: &'static str },
    #[error("{kind} node cannot appear in expression position")]
    NotAnExpression { kind: &'static str },
    #[error("{kind} node cannot appear at the top level of a translation unit")]
    NotADeclaration { kind: &'static str },
    #[error("parameter `{param}` of function `{function}` has no type")]
    UntypedParam { function: String, param: String },
    #[error("function `{function}` has no return type")]
    UntypedReturn { function: String },
    #[error("float literal `{literal}` has no C spelling")]
    NonFinite { literal: String },
}

/// Indentation-aware C text builder.
#[derive(Debug, Default)]
pub struct CEmitter {
    indent: usize,
    output: String,
    /// Parameters of the macro currently being emitted.
    macro_params: Vec<String>,
}

impl CEmitter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::with_capacity(4096),
            macro_params: Vec::new(),
        }
    }

    /// Take the generated output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0, "dedent called with zero indent");
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write a line to output (with indentation and newline).
    pub fn writeln(&mut self, s: &str) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(s);
        self.output.push('\n');
    }

    pub fn newline(&mut self) {
        self.output.push('\n');
    }

    pub fn emit_include(&mut self, header: &str) {
        self.writeln(&format!("#include <{header}>"));
    }

    /// Emit one top-level declaration.
    pub fn emit_decl(&mut self, node: &Node) -> Result<(), EmitError> {
        match node {
            Node::Define(def) => self.emit_define(def),
            Node::Function(def) => self.emit_function(def),
            Node::Block(decls) => decls.iter().try_for_each(|decl| self.emit_decl(decl)),
            other => Err(EmitError::NotADeclaration {
                kind: other.kind_name(),
            }),
        }
    }

    fn emit_define(&mut self, def: &MacroDef) -> Result<(), EmitError> {
        self.macro_params.clone_from(&def.params);
        let body = self.expr(&def.body);
        self.macro_params.clear();
        let body = body?;
        self.writeln(&format!(
            "#define {}({}) ({body})",
            def.name,
            def.params.join(", ")
        ));
        Ok(())
    }

    fn emit_function(&mut self, def: &FunctionDef) -> Result<(), EmitError> {
        let ret = def.ret.ok_or_else(|| EmitError::UntypedReturn {
            function: def.name.clone(),
        })?;
        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = param.ty.ok_or_else(|| EmitError::UntypedParam {
                function: def.name.clone(),
                param: param.name.clone(),
            })?;
            params.push(format!("{ty} {}", param.name));
        }
        let params = if params.is_empty() {
            "void".to_owned()
        } else {
            params.join(", ")
        };

        self.newline();
        self.writeln(&format!("{ret} {}({params}) {{", def.name));
        self.indent();
        for stmt in &def.body {
            self.emit_stmt(stmt)?;
        }
        self.dedent();
        self.writeln("}");
        Ok(())
    }

    /// Emit a statement at the current indentation.
    pub fn emit_stmt(&mut self, node: &Node) -> Result<(), EmitError> {
        match node {
            Node::Assign { target, value } => {
                let lhs = match target.as_ref() {
                    Node::Symbol(sym) => match sym.ty {
                        Some(ty) => format!("{ty} {}", sym.name),
                        None => sym.name.clone(),
                    },
                    other => self.expr(other)?,
                };
                let rhs = self.expr(value)?;
                self.writeln(&format!("{lhs} = {rhs};"));
            }
            Node::For(ForLoop {
                var,
                start,
                end,
                body,
            }) => {
                let start = self.expr(start)?;
                let end = self.expr(end)?;
                self.writeln(&format!(
                    "for ({} {var} = {start}; {var} < {end}; ++{var}) {{",
                    CType::Index
                ));
                self.indent();
                for stmt in body {
                    self.emit_stmt(stmt)?;
                }
                self.dedent();
                self.writeln("}");
            }
            Node::Return(None) => self.writeln("return;"),
            Node::Return(Some(value)) => {
                let value = self.expr(value)?;
                self.writeln(&format!("return {value};"));
            }
            Node::Block(stmts) => {
                for stmt in stmts {
                    self.emit_stmt(stmt)?;
                }
            }
            expr => {
                let expr = self.expr(expr)?;
                self.writeln(&format!("{expr};"));
            }
        }
        Ok(())
    }

    /// Render an expression.
    pub fn expr(&self, node: &Node) -> Result<String, EmitError> {
        Ok(match node {
            Node::Literal(Literal::Int(value)) => value.to_string(),
            Node::Literal(Literal::Float(value)) => {
                if !value.is_finite() {
                    return Err(EmitError::NonFinite {
                        literal: value.to_string(),
                    });
                }
                format!("{value:?}")
            }
            Node::Symbol(sym) => {
                if self.macro_params.iter().any(|p| *p == sym.name) {
                    format!("({})", sym.name)
                } else {
                    sym.name.clone()
                }
            }
            Node::Unary {
                op: UnaryOp::Neg,
                operand,
            } => format!("(-{})", self.expr(operand)?),
            Node::Binary { op, lhs, rhs } => {
                format!("({} {op} {})", self.expr(lhs)?, self.expr(rhs)?)
            }
            Node::Call { callee, args } => {
                let callee = match callee.as_ref() {
                    Node::Symbol(sym) => sym.name.clone(),
                    other => format!("({})", self.expr(other)?),
                };
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{callee}({})", args.join(", "))
            }
            Node::Index { base, index } => {
                format!("{}[{}]", self.expr(base)?, self.expr(index)?)
            }
            Node::Lambda(_) | Node::Composite(_) => {
                return Err(EmitError::Unlowered {
                    kind: node.kind_name(),
                })
            }
            other => {
                return Err(EmitError::NotAnExpression {
                    kind: other.kind_name(),
                })
            }
        })
    }
}
