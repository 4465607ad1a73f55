//! The interpreter proper.

use loopjit_ir::{walk_node, CType, FunctionDef, Lambda, Literal, MacroDef, Node, Symbol, Visitor};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::EvalError;
use crate::memory::Buffer;
use crate::value::Value;

/// Deepest chain of function, macro and lambda applications.
pub const MAX_CALL_DEPTH: usize = 64;

/// Definitions a program can call, plus the built-in operations
/// `map`, `reduce` and `elementwise`.
#[derive(Clone, Debug, Default)]
pub struct Machine {
    macros: FxHashMap<String, MacroDef>,
    functions: FxHashMap<String, FunctionDef>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a translation unit's declarations.
    pub fn from_decls(decls: &[Node]) -> Result<Self, EvalError> {
        let mut machine = Self::new();
        for decl in decls {
            machine.define(decl.clone())?;
        }
        Ok(machine)
    }

    pub fn define(&mut self, decl: Node) -> Result<(), EvalError> {
        match decl {
            Node::Define(def) => self.define_macro(def),
            Node::Function(func) => self.define_function(func),
            Node::Block(decls) => decls.into_iter().try_for_each(|decl| self.define(decl)),
            other => Err(EvalError::NotADeclaration {
                kind: other.kind_name(),
            }),
        }
    }

    pub fn define_macro(&mut self, def: MacroDef) -> Result<(), EvalError> {
        self.check_fresh(&def.name)?;
        self.macros.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn define_function(&mut self, func: FunctionDef) -> Result<(), EvalError> {
        self.check_fresh(&func.name)?;
        self.functions.insert(func.name.clone(), func);
        Ok(())
    }

    fn check_fresh(&self, name: &str) -> Result<(), EvalError> {
        if self.macros.contains_key(name) || self.functions.contains_key(name) {
            return Err(EvalError::DuplicateDefinition {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Callee names that resolve to no definition, sorted.
    ///
    /// Built-in operations count as unresolved: a lowered unit must not
    /// depend on them.
    pub fn unresolved(&self) -> Vec<String> {
        let mut callees = Callees::default();
        for func in self.functions.values() {
            for stmt in &func.body {
                callees.visit_node(stmt);
            }
        }
        for def in self.macros.values() {
            callees.visit_node(&def.body);
        }
        let mut missing: Vec<String> = callees
            .names
            .into_iter()
            .filter(|name| !self.macros.contains_key(name) && !self.functions.contains_key(name))
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Call the function `name`.
    ///
    /// `args` are the argument values in parameter order; a
    /// [`Value::Buffer`] argument refers to `buffers` by position.
    /// Returns `None` for a function that returns nothing.
    pub fn call(
        &self,
        name: &str,
        buffers: &mut [&mut Buffer],
        args: &[Value],
    ) -> Result<Option<Value>, EvalError> {
        let func = self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction {
                name: name.to_owned(),
            })?;
        tracing::trace!(function = name, args = args.len(), "interpreting call");
        let mut exec = Exec {
            machine: self,
            buffers,
            depth: 0,
        };
        exec.call_function(func, args.to_vec())
    }
}

#[derive(Default)]
struct Callees {
    names: FxHashSet<String>,
}

impl Visitor for Callees {
    fn visit_node(&mut self, node: &Node) {
        if let Some(name) = node.callee_name() {
            self.names.insert(name.to_owned());
        }
        walk_node(self, node);
    }
}

struct Local {
    value: Value,
    ty: Option<CType>,
}

#[derive(Default)]
struct Frame {
    locals: FxHashMap<String, Local>,
}

impl Frame {
    fn bind(&mut self, name: &str, value: Value, ty: Option<CType>) -> Result<(), EvalError> {
        let value = match ty {
            Some(ty) => value.coerce(ty)?,
            None => value,
        };
        self.locals.insert(name.to_owned(), Local { value, ty });
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Value, EvalError> {
        self.locals
            .get(name)
            .map(|local| local.value)
            .ok_or_else(|| EvalError::UnknownVariable {
                name: name.to_owned(),
            })
    }
}

enum Flow {
    Next,
    Return(Option<Value>),
}

enum Callable<'n> {
    Lambda(&'n Lambda),
    Macro(&'n MacroDef),
}

struct Exec<'m, 'a, 'b> {
    machine: &'m Machine,
    buffers: &'a mut [&'b mut Buffer],
    depth: usize,
}

impl<'m> Exec<'m, '_, '_> {
    fn enter(&mut self) -> Result<(), EvalError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth {
                limit: MAX_CALL_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn buffer(&self, slot: usize) -> Result<&Buffer, EvalError> {
        self.buffers
            .get(slot)
            .map(|buffer| &**buffer)
            .ok_or(EvalError::UnknownBuffer { slot })
    }

    fn buffer_mut(&mut self, slot: usize) -> Result<&mut Buffer, EvalError> {
        self.buffers
            .get_mut(slot)
            .map(|buffer| &mut **buffer)
            .ok_or(EvalError::UnknownBuffer { slot })
    }

    fn call_function(&mut self, func: &FunctionDef, args: Vec<Value>) -> Result<Option<Value>, EvalError> {
        check_arity(&func.name, func.params.len(), args.len())?;
        self.enter()?;
        let mut frame = Frame::default();
        for (param, arg) in func.params.iter().zip(args) {
            frame.bind(&param.name, arg, param.ty)?;
        }
        let flow = self.exec_stmts(&mut frame, &func.body)?;
        self.depth -= 1;

        let value = match flow {
            Flow::Return(value) => value,
            Flow::Next => None,
        };
        match (value, func.ret) {
            (Some(value), Some(ret)) if ret != CType::Void => value.coerce(ret).map(Some),
            (value, _) => Ok(value),
        }
    }

    fn apply(&mut self, callable: &Callable<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
        let (name, params, body) = match callable {
            Callable::Lambda(lambda) => ("lambda", &lambda.params, &*lambda.body),
            Callable::Macro(def) => (def.name.as_str(), &def.params, &*def.body),
        };
        check_arity(name, params.len(), args.len())?;
        self.enter()?;
        let mut frame = Frame::default();
        for (param, arg) in params.iter().zip(args) {
            frame.bind(param, arg, None)?;
        }
        let value = self.eval(&mut frame, body)?;
        self.depth -= 1;
        Ok(value)
    }

    fn exec_stmts(&mut self, frame: &mut Frame, stmts: &[Node]) -> Result<Flow, EvalError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec_stmt(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, frame: &mut Frame, stmt: &Node) -> Result<Flow, EvalError> {
        match stmt {
            Node::Assign { target, value } => {
                let value = self.eval(frame, value)?;
                self.assign(frame, target, value)?;
            }
            Node::For(lp) => {
                let start = self.eval(frame, &lp.start)?.as_int()?;
                let end = self.eval(frame, &lp.end)?.as_int()?;
                let shadowed = frame.locals.remove(&lp.var);
                let mut flow = Flow::Next;
                for i in start..end {
                    frame.bind(&lp.var, Value::Int(i), Some(CType::Index))?;
                    flow = self.exec_stmts(frame, &lp.body)?;
                    if matches!(flow, Flow::Return(_)) {
                        break;
                    }
                }
                match shadowed {
                    Some(local) => {
                        frame.locals.insert(lp.var.clone(), local);
                    }
                    None => {
                        frame.locals.remove(&lp.var);
                    }
                }
                return Ok(flow);
            }
            Node::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.eval(frame, value)?),
                    None => None,
                };
                return Ok(Flow::Return(value));
            }
            Node::Block(stmts) => return self.exec_stmts(frame, stmts),
            Node::Composite(composite) => {
                let flow = self.exec_stmts(frame, &composite.stmts)?;
                if matches!(flow, Flow::Return(_)) {
                    return Ok(flow);
                }
            }
            Node::Call { callee, args } => {
                self.call(frame, callee, args)?;
            }
            Node::Function(_) | Node::Define(_) => {
                return Err(EvalError::Unsupported {
                    kind: stmt.kind_name(),
                })
            }
            expr => {
                self.eval(frame, expr)?;
            }
        }
        Ok(Flow::Next)
    }

    fn assign(&mut self, frame: &mut Frame, target: &Node, value: Value) -> Result<(), EvalError> {
        match target {
            Node::Symbol(Symbol { name, ty: Some(ty) }) => frame.bind(name, value, Some(*ty)),
            Node::Symbol(Symbol { name, ty: None }) => {
                let declared = frame.locals.get(name.as_str()).and_then(|local| local.ty);
                frame.bind(name, value, declared)
            }
            Node::Index { base, index } => {
                let slot = self.eval(frame, base)?.as_buffer()?;
                let index = self.eval(frame, index)?.as_int()?;
                self.buffer_mut(slot)?.store(index, value)
            }
            other => Err(EvalError::Unsupported {
                kind: other.kind_name(),
            }),
        }
    }

    fn eval(&mut self, frame: &mut Frame, node: &Node) -> Result<Value, EvalError> {
        match node {
            Node::Literal(Literal::Int(n)) => Ok(Value::Int(*n)),
            Node::Literal(Literal::Float(x)) => Ok(Value::Float(*x)),
            Node::Symbol(sym) => frame.get(&sym.name),
            Node::Unary { operand, .. } => self.eval(frame, operand)?.neg(),
            Node::Binary { op, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                Value::binary(*op, lhs, rhs)
            }
            Node::Index { base, index } => {
                let slot = self.eval(frame, base)?.as_buffer()?;
                let index = self.eval(frame, index)?.as_int()?;
                self.buffer(slot)?.load(index)
            }
            Node::Call { callee, args } => {
                self.call(frame, callee, args)?
                    .ok_or(EvalError::TypeMismatch {
                        expected: "value",
                        found: "void",
                    })
            }
            Node::Composite(composite) => {
                if let Flow::Return(_) = self.exec_stmts(frame, &composite.stmts)? {
                    return Err(EvalError::Unsupported { kind: "return" });
                }
                self.eval(frame, &composite.result)
            }
            other => Err(EvalError::Unsupported {
                kind: other.kind_name(),
            }),
        }
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &[Node]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.eval(frame, arg)).collect()
    }

    fn call(&mut self, frame: &mut Frame, callee: &Node, args: &[Node]) -> Result<Option<Value>, EvalError> {
        let Some(name) = callee.as_symbol() else {
            return Err(EvalError::Unsupported {
                kind: callee.kind_name(),
            });
        };
        let machine = self.machine;
        if let Some(def) = machine.macros.get(name) {
            let args = self.eval_args(frame, args)?;
            return self.apply(&Callable::Macro(def), args).map(Some);
        }
        if let Some(func) = machine.functions.get(name) {
            let args = self.eval_args(frame, args)?;
            return self.call_function(func, args);
        }
        let op = match name {
            "map" => "map",
            "elementwise" => "elementwise",
            "reduce" => "reduce",
            _ => {
                return Err(EvalError::UnknownFunction {
                    name: name.to_owned(),
                })
            }
        };
        self.builtin(frame, op, args).map(Some)
    }

    /// High-level semantics of the recognized operations.
    fn builtin(&mut self, frame: &mut Frame, name: &'static str, args: &[Node]) -> Result<Value, EvalError> {
        let expected = if name == "elementwise" { 3 } else { 2 };
        check_arity(name, expected, args.len())?;

        let machine = self.machine;
        let callable = match &args[0] {
            Node::Lambda(lambda) => Callable::Lambda(lambda),
            Node::Symbol(sym) => match machine.macros.get(&sym.name) {
                Some(def) => Callable::Macro(def),
                None => {
                    return Err(EvalError::UnknownFunction {
                        name: sym.name.clone(),
                    })
                }
            },
            other => {
                return Err(EvalError::TypeMismatch {
                    expected: "lambda",
                    found: other.kind_name(),
                })
            }
        };
        let slots = self
            .eval_args(frame, &args[1..])?
            .into_iter()
            .map(Value::as_buffer)
            .collect::<Result<Vec<_>, _>>()?;
        let a = slots[0];
        let len = self.buffer(a)?.len();
        let elem = self.buffer(a)?.elem_type();
        let index = |i: usize| i64::try_from(i).unwrap_or(i64::MAX);

        match name {
            "map" => {
                for i in 0..len {
                    let x = self.buffer(a)?.load(index(i))?;
                    let y = self.apply(&callable, vec![x])?;
                    self.buffer_mut(a)?.store(index(i), y)?;
                }
                Ok(Value::Buffer(a))
            }
            "elementwise" => {
                let b = slots[1];
                let other = self.buffer(b)?.len();
                if other != len {
                    return Err(EvalError::LengthMismatch { left: len, right: other });
                }
                for i in 0..len {
                    let x = self.buffer(a)?.load(index(i))?;
                    let y = self.buffer(b)?.load(index(i))?;
                    let z = self.apply(&callable, vec![x, y])?;
                    self.buffer_mut(a)?.store(index(i), z)?;
                }
                Ok(Value::Buffer(a))
            }
            _ => {
                if len == 0 {
                    return Err(EvalError::EmptyReduce { op: name });
                }
                let mut acc = self.buffer(a)?.load(0)?.coerce_elem(elem)?;
                for i in 1..len {
                    let x = self.buffer(a)?.load(index(i))?;
                    acc = self.apply(&callable, vec![acc, x])?.coerce_elem(elem)?;
                }
                Ok(acc)
            }
        }
    }
}

fn check_arity(name: &str, expected: usize, found: usize) -> Result<(), EvalError> {
    if expected == found {
        Ok(())
    } else {
        Err(EvalError::Arity {
            name: name.to_owned(),
            expected,
            found,
        })
    }
}
